use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which examiner backend the service talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(ConfigError::InvalidValue(
                "EXAMINER_PROVIDER".to_string(),
                format!("'{other}' is not a supported provider"),
            )),
        }
    }

    /// The environment variable holding this provider's API key.
    fn key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_chat_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }
}

/// All configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub api_key: String,
    pub chat_model: String,
    pub examiner_timeout: Duration,
    pub session_ttl: Duration,
    pub case_file: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables, honouring a `.env`
    /// file in the current directory.
    ///
    /// *   `BIND_ADDRESS`: address and port to serve on. Default "0.0.0.0:3000".
    /// *   `EXAMINER_PROVIDER`: "openai" or "gemini". Default "openai".
    /// *   `OPENAI_API_KEY` / `GEMINI_API_KEY`: key for the chosen provider.
    /// *   `CHAT_MODEL`: model for question generation. Defaults to
    ///     "gpt-4o" (openai) or "gemini-2.0-flash" (gemini).
    /// *   `EXAMINER_TIMEOUT_SECS`: ceiling on one backend call. Default 30.
    /// *   `SESSION_TTL_MINUTES`: idle-session eviction. Default 120.
    /// *   `CASE_FILE`: optional path to a case JSON; the built-in
    ///     demonstration case is used when unset.
    /// *   `RUST_LOG`: logging level. Default "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_address = parse_bind_address(std::env::var("BIND_ADDRESS").ok())?;

        let provider =
            Provider::parse(&std::env::var("EXAMINER_PROVIDER").unwrap_or_else(|_| "openai".to_string()))?;

        let key_var = provider.key_var();
        let api_key =
            std::env::var(key_var).map_err(|_| ConfigError::MissingVar(key_var.to_string()))?;

        let chat_model = std::env::var("CHAT_MODEL")
            .unwrap_or_else(|_| provider.default_chat_model().to_string());

        let examiner_timeout = Duration::from_secs(parse_u64(
            "EXAMINER_TIMEOUT_SECS",
            std::env::var("EXAMINER_TIMEOUT_SECS").ok(),
            30,
        )?);
        let session_ttl = Duration::from_secs(
            60 * parse_u64(
                "SESSION_TTL_MINUTES",
                std::env::var("SESSION_TTL_MINUTES").ok(),
                120,
            )?,
        );

        let case_file = std::env::var("CASE_FILE").ok().map(PathBuf::from);

        let log_level = parse_log_level(std::env::var("RUST_LOG").ok())?;

        Ok(Self {
            bind_address,
            provider,
            api_key,
            chat_model,
            examiner_timeout,
            session_ttl,
            case_file,
            log_level,
        })
    }
}

fn parse_bind_address(raw: Option<String>) -> Result<SocketAddr, ConfigError> {
    raw.unwrap_or_else(|| "0.0.0.0:3000".to_string())
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))
}

fn parse_u64(name: &str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}

fn parse_log_level(raw: Option<String>) -> Result<Level, ConfigError> {
    let raw = raw.unwrap_or_else(|| "INFO".to_string());
    raw.parse::<Level>().map_err(|_| {
        ConfigError::InvalidValue(
            "RUST_LOG".to_string(),
            format!("'{raw}' is not a valid log level"),
        )
    })
}
