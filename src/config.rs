use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read once from the environment in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub owner_email: Option<String>,
    pub owner_password: Option<String>,
    pub owner_name: String,
    pub responder: ResponderConfig,
    pub history_limit: i64,
    pub presence_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            database_path: PathBuf::from(home_dir).join(".folio").join("folio.db"),
            owner_email: None,
            owner_password: None,
            owner_name: "the site owner".to_string(),
            responder: ResponderConfig::default(),
            history_limit: 50,
            presence_interval: Duration::from_secs(20),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let responder = ResponderConfig {
            api_key: get("RESPONDER_API_KEY"),
            base_url: get("RESPONDER_BASE_URL").unwrap_or(defaults.responder.base_url),
            model: get("RESPONDER_MODEL").unwrap_or(defaults.responder.model),
            timeout: parse_or(get("RESPONDER_TIMEOUT_SECS"), "RESPONDER_TIMEOUT_SECS", 30)
                .map(Duration::from_secs)?,
        };

        let presence_secs: u64 = parse_or(get("PRESENCE_INTERVAL_SECS"), "PRESENCE_INTERVAL_SECS", 20)?;
        if presence_secs == 0 {
            anyhow::bail!("PRESENCE_INTERVAL_SECS must be greater than zero");
        }

        let history_limit: i64 = parse_or(get("HISTORY_LIMIT"), "HISTORY_LIMIT", 50)?;
        if history_limit <= 0 {
            anyhow::bail!("HISTORY_LIMIT must be positive");
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            owner_email: get("OWNER_EMAIL"),
            // Passwords are taken verbatim; surrounding spaces are part of them.
            owner_password: lookup("OWNER_PASSWORD").filter(|v| !v.is_empty()),
            owner_name: get("OWNER_NAME").unwrap_or(defaults.owner_name),
            responder,
            history_limit,
            presence_interval: Duration::from_secs(presence_secs),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
