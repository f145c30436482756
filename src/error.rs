use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Browser connection lost")]
    ConnectionLost,

    #[error("Navigation timeout after {0}ms")]
    NavigationTimeout(u64),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timed out waiting for selector: {0}")]
    SelectorTimeout(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationError(String),

    #[error("Login timed out after {0}s")]
    LoginTimeout(u64),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid adapter: {0}")]
    InvalidAdapter(String),

    #[error("Invalid session name: {0}")]
    InvalidSessionName(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("General error: {0}")]
    General(String),
}

impl ScraperError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LaunchFailed(_) | Self::ConnectionLost => 3,
            Self::NavigationTimeout(_) | Self::NavigationFailed(_) | Self::LoginTimeout(_) => 4,
            Self::SelectorTimeout(_) | Self::EvaluationError(_) => 5,
            Self::IoError(_) | Self::JsonError(_) => 6,
            Self::ConfigError(_) | Self::TomlDeError(_) | Self::TomlSerError(_) => 7,
            Self::UnknownPlatform(_) | Self::InvalidAdapter(_) | Self::InvalidSessionName(_) => 2,
            _ => 1,
        }
    }
}
