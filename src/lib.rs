pub mod adapters;
pub mod auth;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scrape;
pub mod server;
pub mod session;
pub mod timeouts;
pub mod utils;

pub use config::Config;
pub use error::ScraperError;

pub type Result<T> = std::result::Result<T, ScraperError>;
