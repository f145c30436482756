pub mod commands;
pub mod dispatch;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "threadline-scraper")]
#[command(version, about = "Browser-backed social profile scraper")]
#[command(
    long_about = "Scrapes social profiles through a real Chrome instance, with saved \
                  login sessions and per-platform adapters"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<commands::Command>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Run Chrome in headless mode")]
    pub headless: Option<bool>,

    #[arg(long, global = true, help = "Path to Chrome executable")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, global = true, help = "Navigation timeout in milliseconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "HTTP server port")]
    pub port: Option<u16>,

    #[arg(
        long,
        global = true,
        env = "THREADLINE_DATA_DIR",
        help = "Directory for sessions and adapters"
    )]
    pub data_dir: Option<PathBuf>,
}

pub async fn run() -> crate::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        crate::config::Config::load()?
    };

    let overrides = crate::config::ConfigOverrides {
        headless: cli.headless,
        chrome_path: cli.chrome_path.clone(),
        timeout_ms: cli.timeout,
        port: cli.port,
        data_dir: cli.data_dir.clone(),
    };

    let config = Arc::new(config.load_with_overrides(overrides));
    config.validate()?;

    dispatch::dispatch(cli, config).await
}
