use {
    super::telegram::{MessageEntity, MessageEntityKind},
    regex::Regex,
    std::sync::LazyLock,
};

#[expect(clippy::expect_used, reason = "the pattern is a constant")]
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Command {
        /// With the leading `/`, without the `@username` suffix.
        name: &'a str,
        /// The bot the command is addressed to, if specified.
        target: Option<&'a str>,
        args: &'a str,
    },
    Url(&'a str),
    Search(&'a str),
    Empty,
}

/// A message is a link only if, trimmed, it's a single `http(s)://` token.
pub fn is_url(text: &str) -> bool {
    URL.is_match(text.trim())
}

pub fn is_playlist(url: &str) -> bool {
    url.to_lowercase().contains("playlist")
}

pub fn classify<'a>(text: &'a str, entities: &[MessageEntity]) -> Request<'a> {
    if let [MessageEntity { length, offset: 0, kind: MessageEntityKind::BotCommand }, ..] = entities {
        if let Some((cmd, args)) = text.get(..*length).zip(text.get(*length..)) {
            let (name, target) = cmd.split_once('@').map_or((cmd, None), |(name, to)| (name, Some(to)));
            return Request::Command { name, target, args: args.trim() };
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        Request::Empty
    } else if is_url(trimmed) {
        Request::Url(trimmed)
    } else {
        Request::Search(trimmed)
    }
}
