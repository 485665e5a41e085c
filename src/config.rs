use std::env;
use std::path::PathBuf;

use chrono::Duration;
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a number, got {1:?}")]
    NotANumber(&'static str, String),
    #[error("BLOG_TIMEZONE is not a known timezone: {0:?}")]
    UnknownTimezone(String),
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub from_name: String,
    pub from_addr: String,
}

impl MailConfig {
    /// Address used as sender and as the recipient of contact form messages.
    pub fn sender_address(&self) -> &str {
        if self.from_addr.is_empty() {
            &self.username
        } else {
            &self.from_addr
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub accounts_database_url: String,
    pub comments_database_url: String,
    pub stats_database_url: String,
    pub content_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub app_base_url: String,
    pub timezone: Tz,
    pub session_lifetime: Duration,
    pub allowed_origins: Vec<String>,
    pub mail: MailConfig,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn flag_or(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => value == "1" || value.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

fn number_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotANumber(name, value)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let timezone_name = var_or("BLOG_TIMEZONE", "Asia/Riyadh");
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(timezone_name.clone()))?;
        let max_upload_mb: usize = number_or("MAX_UPLOAD_MB", 5)?;
        let session_hours: i64 = number_or("SESSION_TTL_HOURS", 24 * 14)?;
        Ok(Config {
            bind_address: var_or("BIND_ADDRESS", "127.0.0.1:8088"),
            accounts_database_url: var_or("ACCOUNTS_DATABASE_URL", "users.db"),
            comments_database_url: var_or("COMMENTS_DATABASE_URL", "comments.db"),
            stats_database_url: var_or("STATS_DATABASE_URL", "posts_stats.db"),
            content_dir: PathBuf::from(var_or("CONTENT_DIR", "markdown")),
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "static/uploads")),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            app_base_url: var_or("APP_BASE_URL", "http://127.0.0.1:8088")
                .trim_end_matches('/')
                .to_owned(),
            timezone,
            session_lifetime: Duration::hours(session_hours),
            allowed_origins: var_or("ALLOWED_ORIGINS", "http://127.0.0.1:8088")
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
            mail: MailConfig {
                server: var_or("MAIL_SERVER", "smtp.gmail.com"),
                port: number_or("MAIL_PORT", 587)?,
                username: var_or("MAIL_USERNAME", ""),
                password: var_or("MAIL_PASSWORD", ""),
                use_tls: flag_or("MAIL_USE_TLS", true),
                use_ssl: flag_or("MAIL_USE_SSL", false),
                from_name: var_or("MAIL_FROM_NAME", "CIT Blog"),
                from_addr: var_or("MAIL_FROM_ADDR", ""),
            },
        })
    }
}
