use {
    crate::utils::Result,
    log::LevelFilter,
    std::{path::PathBuf, str::FromStr, time::Duration},
};

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: Box<str>,
    pub api_url: Box<str>,
    /// The only chat allowed to run admin commands.
    pub owner_id: Option<i64>,
    pub downloads_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    pub port: u16,
    /// Public base URL of this server, enables webhook mode if set.
    pub webhook_url: Option<Box<str>>,
    pub yt_dlp: Box<str>,
    pub search_results: usize,
    pub search_buttons: bool,
    pub search_ttl: Duration,
    pub saavn_api_url: Box<str>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or("`BOT_TOKEN` environment variable is not set")?;

        Ok(Self {
            bot_token: bot_token.into(),
            api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_owned())
                .trim_end_matches('/')
                .into(),
            owner_id: get("OWNER_TELEGRAM_ID").map(|v| parse("OWNER_TELEGRAM_ID", &v)).transpose()?,
            downloads_dir: get("DOWNLOADS_DIR").unwrap_or_else(|| "downloads".to_owned()).into(),
            log_file: get("LOG_FILE").unwrap_or_else(|| "logs.txt".to_owned()).into(),
            log_level: get("LOG_LEVEL").map_or(Ok(LevelFilter::Info), |v| parse("LOG_LEVEL", &v))?,
            port: get("PORT").map_or(Ok(8180), |v| parse("PORT", &v))?,
            webhook_url: get("WEBHOOK_URL").map(|v| v.trim_end_matches('/').into()),
            yt_dlp: get("YT_DLP").unwrap_or_else(|| "yt-dlp".to_owned()).into(),
            search_results: get("SEARCH_RESULTS").map_or(Ok(3), |v| parse("SEARCH_RESULTS", &v))?,
            search_buttons: get("SEARCH_BUTTONS").map_or(Ok(true), |v| parse("SEARCH_BUTTONS", &v))?,
            search_ttl: get("SEARCH_TTL_SECS")
                .map_or(Ok(600), |v| parse("SEARCH_TTL_SECS", &v))
                .map(Duration::from_secs)?,
            saavn_api_url: get("SAAVN_API_URL")
                .unwrap_or_else(|| "https://www.jiosaavn.com/api.php".to_owned())
                .into(),
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err| format!("invalid value of `{key}` ({value:?}): {err}").into())
}
