use crate::timeouts::{ms, secs};
use crate::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    /// Explicit headless override. When unset, release builds run headless
    /// and debug builds run headed so the browser is visible during
    /// development.
    pub headless: Option<bool>,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl BrowserConfig {
    /// Override > packaged-vs-dev default.
    pub fn effective_headless(&self) -> bool {
        self.headless.unwrap_or(!cfg!(debug_assertions))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_login_poll_interval_ms")]
    pub login_poll_interval_ms: u64,
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StorageConfig {
    /// Root for sessions/ and adapters/. Defaults to the platform config dir.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_config_dir(),
        }
    }

    pub fn sessions_dir(&self) -> Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join("sessions"))
    }

    pub fn adapters_dir(&self) -> Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join("adapters"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    800
}
fn default_navigation_timeout_ms() -> u64 {
    ms::NAVIGATION
}
fn default_login_poll_interval_ms() -> u64 {
    ms::LOGIN_POLL_INTERVAL
}
fn default_login_timeout_secs() -> u64 {
    secs::LOGIN_CEILING
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            login_poll_interval_ms: default_login_poll_interval_ms(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    default_config_dir().map(|p| p.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("threadline"))
        .ok_or_else(|| ScraperError::ConfigError("Could not determine config directory".into()))
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let global_path = default_config_path()?;
        if global_path.exists() {
            let content = std::fs::read_to_string(&global_path)?;
            config = toml::from_str(&content)?;
        }

        config.load_from_env();

        Ok(config)
    }

    pub fn load_with_overrides(&self, overrides: ConfigOverrides) -> Self {
        let mut config = self.clone();

        if let Some(headless) = overrides.headless {
            config.browser.headless = Some(headless);
        }
        if let Some(chrome_path) = overrides.chrome_path {
            config.browser.chrome_path = Some(chrome_path);
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            config.scrape.navigation_timeout_ms = timeout_ms;
        }
        if let Some(port) = overrides.port {
            config.server.port = port;
        }
        if let Some(data_dir) = overrides.data_dir {
            config.storage.data_dir = Some(data_dir);
        }

        config
    }

    fn load_from_env(&mut self) {
        if let Ok(headless) = std::env::var("THREADLINE_HEADLESS") {
            self.browser.headless = Some(headless == "true" || headless == "1");
        }
        if let Ok(path) = std::env::var("THREADLINE_CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(timeout) = std::env::var("THREADLINE_TIMEOUT_MS")
            && let Ok(timeout) = timeout.parse()
        {
            self.scrape.navigation_timeout_ms = timeout;
        }
        if let Ok(port) = std::env::var("THREADLINE_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scrape.navigation_timeout_ms == 0 {
            return Err(ScraperError::ConfigError(
                "navigation_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.scrape.login_poll_interval_ms == 0 {
            return Err(ScraperError::ConfigError(
                "login_poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.server.port < 1024 {
            return Err(ScraperError::ConfigError(format!(
                "server port {} is out of valid range (1024-65535)",
                self.server.port
            )));
        }

        if let Some(ref path) = self.browser.chrome_path
            && !path.exists()
        {
            return Err(ScraperError::ConfigError(format!(
                "Chrome path does not exist: {}",
                path.display()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub headless: Option<bool>,
    pub chrome_path: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
}
