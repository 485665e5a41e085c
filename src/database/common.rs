use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single reading of the clock, in UTC for expiry arithmetic and in the
/// blog's timezone for display columns.
#[derive(Debug, Clone)]
pub struct Now {
    pub utc: NaiveDateTime,
    pub local: String,
}

impl Now {
    pub fn capture(timezone: Tz) -> Now {
        let now = Utc::now();
        Now {
            utc: now.naive_utc(),
            local: now.with_timezone(&timezone).format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    #[cfg(test)]
    pub fn at(utc: NaiveDateTime) -> Now {
        Now {
            utc,
            local: format_timestamp(utc),
        }
    }
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

/// Lowercase hex string carrying `bytes` bytes of randomness.
pub fn random_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..bytes)
        .map(|_| format!("{:02x}", rng.gen::<u8>()))
        .collect()
}

pub fn random_alphanumeric(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(length)
        .collect()
}
