pub mod api;
mod cache;
mod classify;
pub mod pipeline;
mod session;
pub mod telegram;

use {
    self::{
        api::{Button, ChatApi},
        cache::{PendingResult, PendingResults},
        classify::{classify, Request},
        pipeline::{Job, Pipeline, BUSY},
        session::Sessions,
        telegram::{
            CallbackQuery, Client, DeleteWebhook, GetMe, Message, SetMyCommands, SetWebhook, Update,
            ALLOWED_UPDATES,
        },
    },
    crate::{
        config::Config,
        download::{Extractor, YtDlp},
        logger,
        search::{format_results, JioSaavn, SongSearch},
        tagging::{LoftyTagger, Tagger},
        utils::{truncate, Result},
        workspace::Workspace,
    },
    log::{set_max_level, LevelFilter},
    std::{io, path::PathBuf, sync::Arc, time::Duration},
    uuid::Uuid,
};

mod en {
    use {std::{sync::LazyLock, fmt::Write}, super::telegram::BotCommand};

    pub static COMMANDS: [BotCommand; 2] = [
        BotCommand { command: "/start", description: "Start the bot" },
        BotCommand { command: "/help", description: "Show this message" },
    ];

    pub static HELP_MSG: LazyLock<String> = LazyLock::new(|| {
        let mut text = "Send me a link to a song to get it as an audio file, \
                        or the song's name to look it up.\n\nAvailable commands:\n\n".to_owned();
        for &BotCommand { command, description } in &COMMANDS {
            _ = writeln!(text, "{command} - {description}");
        }
        text
    });

    pub static START_MSG: &str = "Hello! Please send me a song URL or song name";
    pub static OWNER_ONLY: &str = "This command is only available to the bot owner";
    pub static EXPIRED: &str = "This search result has expired, please search again.";
    pub static NO_LOGS: &str = "No logs available";
    pub static RESTARTING: &str = "Restarting...";
}

const POLL_TIMEOUT: u32 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Gives the update that requested the restart time to be acknowledged.
const RESTART_DELAY: Duration = Duration::from_secs(2);

pub struct Settings {
    pub username: Box<str>,
    pub owner_id: Option<i64>,
    pub search_results: usize,
    pub search_buttons: bool,
    pub search_ttl: Duration,
    pub log_file: PathBuf,
    /// Expected in the `X-Telegram-Bot-Api-Secret-Token` header in webhook mode.
    pub webhook_secret: Option<Box<str>>,
}

pub struct Bot<A = Client, E = YtDlp, T = LoftyTagger, S = JioSaavn> {
    settings: Settings,
    pub api: A,
    pipeline: Pipeline<E, T>,
    search: S,
    sessions: Sessions,
    pending: PendingResults,
}

impl Bot {
    async fn new(config: &Config) -> Result<Self> {
        let api = Client::new(&config.api_url, &config.bot_token);
        let username = api.request(&GetMe {}).await?.username
            .ok_or_else(|| io::Error::other("no bot username"))?;

        let workspace = Workspace::open(&config.downloads_dir)?;
        match workspace.clean() {
            Ok(removed) => log::info!("Removed {removed} stale file(s) from {}", workspace.dir().display()),
            Err(err) => log::warn!("Failed to clean {}: {err}", workspace.dir().display()),
        }

        let http = api.http().clone();
        let pipeline = Pipeline::new(YtDlp::new(&config.yt_dlp), LoftyTagger::new(http.clone()), workspace);
        let search = JioSaavn::new(http, &config.saavn_api_url);
        let settings = Settings {
            username,
            owner_id: config.owner_id,
            search_results: config.search_results,
            search_buttons: config.search_buttons,
            search_ttl: config.search_ttl,
            log_file: config.log_file.clone(),
            webhook_secret: config.webhook_url.as_ref().map(|_| Uuid::new_v4().simple().to_string().into()),
        };
        let res = Self::from_parts(settings, api, pipeline, search);

        match &config.webhook_url {
            Some(url) => res.api.request(&SetWebhook {
                url: &format!("{}/bot", url.trim_end_matches('/')),
                drop_pending_updates: true,
                allowed_updates: ALLOWED_UPDATES,
                secret_token: res.settings.webhook_secret.as_deref(),
            }).await?,
            None => res.api.request(&DeleteWebhook { drop_pending_updates: false }).await?,
        };
        res.api.request(&SetMyCommands { commands: &en::COMMANDS, language_code: None }).await?;
        if let Some(owner_id) = res.settings.owner_id {
            res.api.send_message(owner_id, "ON").await?;
        }

        Ok(res)
    }

    /// Long-polls for updates until the task is dropped, handling each one on its own task.
    pub async fn poll(self: Arc<Self>) {
        let mut offset = 0;
        loop {
            match self.api.receive_updates(offset, POLL_TIMEOUT).await {
                Ok(updates) => for update in updates {
                    offset = offset.max(update.id + 1);
                    let bot = Arc::clone(&self);
                    tokio::spawn(async move { bot.dispatch(&update).await });
                },
                Err(err) => {
                    log::error!("Failed to receive updates: {err}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }
}

impl<A: ChatApi, E: Extractor, T: Tagger, S: SongSearch> Bot<A, E, T, S> {
    pub fn from_parts(settings: Settings, api: A, pipeline: Pipeline<E, T>, search: S) -> Self {
        Self {
            pending: PendingResults::new(settings.search_ttl),
            sessions: Sessions::default(),
            settings,
            api,
            pipeline,
            search,
        }
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.settings.webhook_secret.as_deref()
    }

    /// Handles the update, logging instead of returning the error.
    pub async fn dispatch(&self, update: &Update) {
        if let Err(err) = self.handle_update(update).await {
            log::error!("Telegram bot error\nUpdate: {update:#?}\nError: {err}");
        }
    }

    async fn handle_update(&self, update: &Update) -> Result {
        if let Some(user) = update.from() {
            log::debug!("Update {} from user {}", update.id, user.id);
        }
        if let Some(query) = &update.callback_query {
            return self.handle_callback(query).await;
        }

        let Some(Message { chat, text: Some(text), entities, .. }) = &update.message else {
            return Ok(());
        };
        let chat_id = chat.id;
        self.sessions.touch(chat_id);

        match classify(text, entities) {
            Request::Command { name, target, args } => {
                if target.is_none_or(|to| to.eq_ignore_ascii_case(&self.settings.username)) {
                    self.handle_command(chat_id, name, args).await?;
                }
            }
            Request::Url(url) => {
                self.pipeline.run(&self.api, &self.sessions, Job { chat_id, url, artist_hint: None }).await?;
            }
            Request::Search(query) => self.handle_search(chat_id, query).await?,
            Request::Empty => {}
        }

        Ok(())
    }

    fn is_owner(&self, chat_id: i64) -> bool {
        self.settings.owner_id == Some(chat_id)
    }

    async fn handle_command(&self, chat_id: i64, cmd: &str, args: &str) -> Result {
        match cmd {
            "/start" => self.handle_start_command(chat_id).await,
            "/help" => self.handle_help_command(chat_id).await,

            "/clean" | "/logs" | "/loglevel" | "/restart" if !self.is_owner(chat_id) => {
                self.api.send_message(chat_id, en::OWNER_ONLY).await?;
                Ok(())
            }
            "/clean" => self.handle_clean_command(chat_id).await,
            "/logs" => self.handle_logs_command(chat_id).await,
            "/loglevel" => self.handle_loglevel_command(chat_id, args).await,
            "/restart" => self.handle_restart_command(chat_id).await,
            _ => Ok(()),
        }
    }

    async fn handle_start_command(&self, chat_id: i64) -> Result {
        self.sessions.touch(chat_id);
        self.api.send_message(chat_id, en::START_MSG).await?;
        Ok(())
    }

    async fn handle_help_command(&self, chat_id: i64) -> Result {
        self.api.send_message(chat_id, &en::HELP_MSG).await?;
        Ok(())
    }

    async fn handle_clean_command(&self, chat_id: i64) -> Result {
        let removed = self.pipeline.workspace().clean()?;
        log::info!("Removed {removed} file(s) on the owner's request");
        self.api.send_message(chat_id, &format!("Removed {removed} file(s)")).await?;
        Ok(())
    }

    async fn handle_logs_command(&self, chat_id: i64) -> Result {
        log::logger().flush();
        if self.settings.log_file.is_file() {
            self.api.send_document(chat_id, &self.settings.log_file).await?;
        } else {
            self.api.send_message(chat_id, en::NO_LOGS).await?;
        }
        Ok(())
    }

    async fn handle_loglevel_command(&self, chat_id: i64, args: &str) -> Result {
        match args.trim().parse::<LevelFilter>() {
            Ok(level) => {
                set_max_level(level);
                self.api.send_message(chat_id, &format!("Max log level is now {level:?}")).await?;
            }
            Err(err) => {
                self.api.send_message(chat_id, &format!("Error: {err}")).await?;
            }
        }
        Ok(())
    }

    async fn handle_restart_command(&self, chat_id: i64) -> Result {
        self.api.send_message(chat_id, en::RESTARTING).await?;
        log::warn!("Restarting on the owner's request");
        tokio::spawn(async {
            tokio::time::sleep(RESTART_DELAY).await;
            logger::deinit();
            log::error!("Failed to restart: {}", exec_self());
        });
        Ok(())
    }

    async fn handle_search(&self, chat_id: i64, query: &str) -> Result {
        if self.sessions.is_downloading(chat_id) {
            self.api.send_message(chat_id, BUSY).await?;
            return Ok(());
        }

        let mut hits = self.search.search(query).await?;
        hits.truncate(self.settings.search_results);
        if hits.is_empty() {
            log::info!("No search results for {query:?}");
            return Ok(());
        }

        if !self.settings.search_buttons {
            self.api.send_message(chat_id, &format_results(&hits, true)).await?;
            return Ok(());
        }

        let ids: Vec<Box<str>> = hits
            .iter()
            .map(|hit| self.pending.insert(PendingResult {
                source_url: hit.url.clone(),
                artist_names: hit.more_info.primary_artists.clone(),
            }))
            .collect();
        let labels: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("⬇ {}. {}", i + 1, truncate(&hit.title, 48)))
            .collect();
        let buttons: Vec<Button> = labels
            .iter()
            .zip(&ids)
            .map(|(text, data)| Button { text, data })
            .collect();
        log::debug!("{} search result(s) pending", self.pending.len());

        self.api.send_message_with_buttons(chat_id, &format_results(&hits, false), &buttons).await?;
        Ok(())
    }

    async fn handle_callback(&self, query: &CallbackQuery) -> Result {
        let chat_id = query.message.as_ref().map(|msg| msg.chat.id);
        // The result stays pending until a download for it can start
        if let Some(chat_id) = chat_id.filter(|&id| self.sessions.is_downloading(id)) {
            self.api.answer_callback(&query.id, Some(BUSY)).await?;
            self.api.send_message(chat_id, BUSY).await?;
            return Ok(());
        }
        let pending = query.data.as_deref().and_then(|id| self.pending.take(id));
        let (Some(chat_id), Some(result)) = (chat_id, pending) else {
            self.api.answer_callback(&query.id, Some(en::EXPIRED)).await?;
            if let Some(chat_id) = chat_id {
                self.api.send_message(chat_id, en::EXPIRED).await?;
            }
            return Ok(());
        };

        self.api.answer_callback(&query.id, None).await?;
        self.sessions.touch(chat_id);
        let job = Job {
            chat_id,
            url: &result.source_url,
            artist_hint: (!result.artist_names.is_empty()).then_some(&*result.artist_names),
        };
        self.pipeline.run(&self.api, &self.sessions, job).await?;
        Ok(())
    }
}

/// Replaces the process image with a fresh copy of the same executable, only returns on failure.
#[cfg(unix)]
fn exec_self() -> io::Error {
    use std::os::unix::process::CommandExt;

    match std::env::current_exe() {
        Ok(exe) => std::process::Command::new(exe).args(std::env::args_os().skip(1)).exec(),
        Err(err) => err,
    }
}

#[cfg(not(unix))]
fn exec_self() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "restarting is only supported on Unix")
}

pub async fn init(config: &Config) -> Result<Arc<Bot>> {
    Bot::new(config).await.map(Arc::new)
}

pub async fn deinit(bot: Arc<Bot>) -> Result {
    if bot.webhook_secret().is_some() {
        bot.api.request(&DeleteWebhook { drop_pending_updates: false }).await?;
    }
    if let Some(owner_id) = bot.settings.owner_id {
        bot.api.send_message(owner_id, "OFF").await?;
    }
    if Arc::strong_count(&bot) > 1 {
        log::warn!("Bot::deinit: Something else is still using the Bot instance");
    }
    Ok(())
}
