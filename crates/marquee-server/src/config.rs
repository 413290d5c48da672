use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use marquee_engagement::{EngagementConfig, NotifierConfig};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MARQUEE_JWT_SECRET is unset or still a placeholder")]
    MissingSecret,

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub jwt_secret: String,
    pub engagement: EngagementConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("MARQUEE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::MissingSecret);
        }

        let host = var("MARQUEE_HOST", "0.0.0.0");
        let port: u16 = parse("MARQUEE_PORT", var("MARQUEE_PORT", "3000"))?;
        let addr = parse("MARQUEE_HOST", format!("{}:{}", host, port))?;

        let timeout_ms: u64 = parse(
            "MARQUEE_REQUEST_TIMEOUT_MS",
            var("MARQUEE_REQUEST_TIMEOUT_MS", "10000"),
        )?;
        let notifier = NotifierConfig {
            queue_capacity: parse("MARQUEE_NOTIFY_QUEUE", var("MARQUEE_NOTIFY_QUEUE", "256"))?,
            max_attempts: parse("MARQUEE_NOTIFY_ATTEMPTS", var("MARQUEE_NOTIFY_ATTEMPTS", "3"))?,
            ..NotifierConfig::default()
        };

        Ok(Self {
            db_path: var("MARQUEE_DB_PATH", "marquee.db").into(),
            addr,
            jwt_secret,
            engagement: EngagementConfig {
                public_origin: var("MARQUEE_PUBLIC_ORIGIN", "http://localhost:3000"),
                request_timeout: Duration::from_millis(timeout_ms),
                notifier,
                ..EngagementConfig::default()
            },
        })
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
