//! Bot settings read from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the bot.
#[derive(Clone)]
pub struct BotSettings {
    /// Bot token from @BotFather.
    pub bot_token: String,

    /// Google API key with Sheets read access.
    pub google_api_key: String,

    /// Telegram user ids allowed to run admin commands.
    pub admin_ids: Vec<i64>,

    /// Path to the tracked tables JSON file.
    pub tables_path: PathBuf,

    pub users_path: PathBuf,

    pub links_path: PathBuf,

    /// Hours between scheduled refreshes.
    pub refresh_interval_hours: u64,

    /// Minimum gap between Sheets API requests.
    pub sheets_min_interval_ms: u64,
}

fn default_tables_path() -> PathBuf {
    PathBuf::from("tables.json")
}

fn default_users_path() -> PathBuf {
    PathBuf::from("users.json")
}

fn default_links_path() -> PathBuf {
    PathBuf::from("links.json")
}

const fn default_refresh_interval_hours() -> u64 {
    24
}

const fn default_sheets_min_interval_ms() -> u64 {
    1000
}

impl BotSettings {
    /// Reads settings from environment variables.
    ///
    /// Requires `TELEGRAM_BOT_TOKEN`, `GOOGLE_API_KEY` and `ADMIN_IDS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`BotSettings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnvVar(key))
        };
        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            lookup(key).map_or(Ok(default), |raw| {
                raw.trim()
                    .parse()
                    .ok()
                    .filter(|&n: &u64| n > 0)
                    .ok_or(ConfigError::InvalidNumber { key, value: raw })
            })
        };

        let admin_ids = parse_admin_ids(&required("ADMIN_IDS")?)?;

        Ok(Self {
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            google_api_key: required("GOOGLE_API_KEY")?,
            admin_ids,
            tables_path: lookup("TABLES_PATH").map_or_else(default_tables_path, PathBuf::from),
            users_path: lookup("USERS_PATH").map_or_else(default_users_path, PathBuf::from),
            links_path: lookup("LINKS_PATH").map_or_else(default_links_path, PathBuf::from),
            refresh_interval_hours: number("REFRESH_INTERVAL_HOURS", default_refresh_interval_hours())?,
            sheets_min_interval_ms: number("SHEETS_MIN_INTERVAL_MS", default_sheets_min_interval_ms())?,
        })
    }

    /// Interval between scheduled refreshes.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours * 3600)
    }

    #[must_use]
    pub const fn sheets_min_interval(&self) -> Duration {
        Duration::from_millis(self.sheets_min_interval_ms)
    }

    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

impl std::fmt::Debug for BotSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotSettings")
            .field("admin_ids", &self.admin_ids)
            .field("tables_path", &self.tables_path)
            .field("users_path", &self.users_path)
            .field("links_path", &self.links_path)
            .field("refresh_interval_hours", &self.refresh_interval_hours)
            .field("sheets_min_interval_ms", &self.sheets_min_interval_ms)
            .finish_non_exhaustive()
    }
}

/// Parses a comma separated list of Telegram user ids.
fn parse_admin_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse()
            .map_err(|_| ConfigError::InvalidAdminId(part.to_owned()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if ids.is_empty() {
        return Err(ConfigError::MissingEnvVar("ADMIN_IDS"));
    }
    Ok(ids)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid admin id {0:?} (must be a Telegram user id)")]
    InvalidAdminId(String),

    #[error("Invalid value for {key}: {value:?} (must be a positive integer)")]
    InvalidNumber { key: &'static str, value: String },
}
