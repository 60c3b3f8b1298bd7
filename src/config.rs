// task_backend/src/config.rs
use chrono::Duration;
use std::env;
use thiserror::Error;

pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreKind,
    /// Required for [`StoreKind::Postgres`].
    pub database_url: Option<String>,
    /// Rocket secret key: 44/88 base64 characters or 64 hex characters.
    pub session_secret: String,
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
    pub ai: AiConfig,
}

impl AppConfig {
    /// Reads the process environment, honouring a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store = match get("TASK_STORE").as_deref() {
            None | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TASK_STORE",
                    reason: format!("expected `postgres` or `memory`, got `{}`", other),
                })
            }
        };

        let database_url = get("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let session_secret = get("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        validate_secret(&session_secret)?;

        let api_key = get("AI_API_KEY").ok_or(ConfigError::Missing("AI_API_KEY"))?;

        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS"), DEFAULT_SESSION_TTL_HOURS)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                reason: "must be positive".to_string(),
            });
        }

        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let ai = AiConfig {
            api_key,
            model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            base_url: get("AI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_tokens: parse_or("AI_MAX_TOKENS", get("AI_MAX_TOKENS"), DEFAULT_AI_MAX_TOKENS)?,
        };

        Ok(AppConfig {
            store,
            database_url,
            session_secret,
            session_ttl: Duration::hours(session_ttl_hours),
            bcrypt_cost,
            ai,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("`{}` is not a valid number", value),
        }),
    }
}

// Rocket only accepts 256/512-bit keys, base64 or hex encoded.
fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    let ok = match secret.len() {
        44 | 88 => secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')),
        64 => secret.chars().all(|c| c.is_ascii_hexdigit()),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: "SESSION_SECRET",
            reason: "expected a 256 or 512-bit key (e.g. `openssl rand -base64 32`)".to_string(),
        })
    }
}
