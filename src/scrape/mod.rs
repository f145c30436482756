pub mod orchestrator;

pub use orchestrator::Scraper;

use crate::output::{self, OutputFormatter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One unit of scraping work. Field names follow the wire contract the
/// desktop UI speaks (camelCase, all optional except `url`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapeRequest {
    pub url: String,
    /// CSS selector, or XPath when the string starts with `//` or `(`.
    pub wait_for_selector: Option<String>,
    /// Navigation and selector-wait timeout in milliseconds.
    pub timeout: Option<u64>,
    /// Extra fixed wait after load, for content that renders without a
    /// detectable selector.
    pub wait_for_timeout: Option<u64>,
    /// Function body run in the page context; must yield a JSON-serializable
    /// value.
    pub script: Option<String>,
    pub return_html: bool,
    pub headers: Option<HashMap<String, String>>,
    pub user_agent: Option<String>,
    /// Session snapshot name to hydrate from (and, for interactive requests,
    /// persist to).
    pub session: Option<String>,
    /// Open a headed browser and wait for the human to close the window.
    pub interactive: bool,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn timeout_ms(&self, default_ms: u64) -> u64 {
        self.timeout.unwrap_or(default_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl OutputFormatter for ScrapeResult {
    fn format_text(&self) -> String {
        use crate::output::text;

        if !self.ok {
            return text::error(&format!(
                "Scrape failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ));
        }

        let mut lines = vec![text::success("Scrape completed")];
        if let Some(ref data) = self.data {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_default();
            lines.push(text::key_value("Data", &pretty));
        }
        if let Some(ref html) = self.html {
            lines.push(text::key_value("HTML", &format!("{} bytes", html.len())));
        }
        lines.join("\n")
    }

    fn format_json(&self, pretty: bool) -> crate::Result<String> {
        output::to_json(self, pretty)
    }
}

/// Wrap a user-authored function body so it can be evaluated as a single
/// expression in the page context. Bodies that already produce a result are
/// left alone; bare expressions get an explicit `return`.
pub fn wrap_extraction_script(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.starts_with("return") {
        format!("(function() {{ {} }})()", trimmed)
    } else {
        format!("(function() {{ return ({}); }})()", trimmed)
    }
}
