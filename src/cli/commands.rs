use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the local HTTP server for the desktop UI
    Serve,

    /// Scrape a single URL
    Scrape {
        url: String,

        #[arg(long, help = "CSS selector (or XPath) to wait for before extracting")]
        selector: Option<String>,

        #[arg(long, help = "Extraction script run in the page context")]
        script: Option<String>,

        #[arg(long, help = "Include the page HTML in the output")]
        html: bool,

        #[arg(long, help = "Named session to scrape with")]
        session: Option<String>,

        #[arg(long, help = "Extra fixed wait after load, in milliseconds")]
        wait_ms: Option<u64>,

        #[arg(long, help = "User-Agent override")]
        user_agent: Option<String>,

        #[arg(long = "header", help = "Extra header as 'Name: value' (repeatable)")]
        headers: Vec<String>,

        #[arg(long, help = "Open a visible window and wait for it to be closed")]
        interactive: bool,
    },

    /// Scrape a profile through a saved adapter
    Profile {
        platform: String,
        id: String,

        #[arg(long, help = "Scrape the followers list instead of the profile")]
        followers: bool,

        #[arg(long, help = "Scrape the following list instead of the profile")]
        following: bool,
    },

    /// Log into a platform interactively and save the session
    Login {
        platform: String,

        #[arg(long, help = "Finish when the window is closed instead of polling the URL")]
        wait_close: bool,
    },

    /// Delete a platform's saved session
    Logout { platform: String },

    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        subcommand: SessionsCommand,
    },

    /// Manage platform adapters
    Adapters {
        #[command(subcommand)]
        subcommand: AdaptersCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List saved sessions
    List,
    /// Delete a saved session by name
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum AdaptersCommand {
    /// List installed adapters
    List,
    /// Print one adapter as JSON
    Show { platform: String },
    /// Install or overwrite an adapter from a JSON file
    Save { file: PathBuf },
    /// Install the built-in mock adapter for smoke testing
    Init,
}
