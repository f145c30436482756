use super::{ScrapeRequest, ScrapeResult, wrap_extraction_script};
use crate::browser::page::wait_for_window_close;
use crate::browser::{BrowserSupervisor, CdpPage, PageDriver};
use crate::session::SessionStore;
use crate::timeouts::ms;
use crate::{Config, Result, ScraperError};
use std::sync::Arc;
use std::time::Duration;

/// Runs scrape requests against the shared browser. Each request gets its
/// own page in its own context, and the page is closed no matter how the
/// request ends; only a browser that cannot launch surfaces as `Err`.
pub struct Scraper {
    supervisor: Arc<BrowserSupervisor>,
    sessions: Arc<SessionStore>,
    default_timeout_ms: u64,
}

impl Scraper {
    pub fn new(
        supervisor: Arc<BrowserSupervisor>,
        sessions: Arc<SessionStore>,
        config: &Config,
    ) -> Self {
        Self {
            supervisor,
            sessions,
            default_timeout_ms: config.scrape.navigation_timeout_ms,
        }
    }

    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResult> {
        if request.url.trim().is_empty() {
            return Ok(ScrapeResult::failure("url must not be empty"));
        }

        let handle = self.supervisor.acquire(request.interactive).await?;

        let page = match CdpPage::open(&handle).await {
            Ok(page) => page,
            Err(e) => return Ok(ScrapeResult::failure(e.to_string())),
        };

        Ok(self.run_on(&page, request).await)
    }

    /// Drive the request on an already-open page. The close is structural,
    /// not a success-path afterthought.
    pub(crate) async fn run_on(&self, page: &dyn PageDriver, request: &ScrapeRequest) -> ScrapeResult {
        let outcome = self.drive(page, request).await;
        page.close().await.ok();

        match outcome {
            Ok(result) => result,
            Err(e) => ScrapeResult::failure(e.to_string()),
        }
    }

    async fn drive(&self, page: &dyn PageDriver, request: &ScrapeRequest) -> Result<ScrapeResult> {
        let timeout_ms = request.timeout_ms(self.default_timeout_ms);

        let snapshot = match &request.session {
            Some(name) => self.sessions.load(name).ok().flatten(),
            None => None,
        };

        if let Some(snapshot) = &snapshot
            && !snapshot.state.is_empty()
        {
            page.apply_state(&snapshot.state).await?;
        }

        if let Some(user_agent) = &request.user_agent {
            page.set_user_agent(user_agent).await?;
        }
        if let Some(headers) = &request.headers {
            page.set_extra_headers(headers).await?;
        }

        // Interactive pages stay up as long as the human needs them.
        let nav_timeout = if request.interactive {
            None
        } else {
            Some(Duration::from_millis(timeout_ms))
        };
        page.navigate(&request.url, nav_timeout).await?;

        if let Some(snapshot) = &snapshot
            && !snapshot.state.is_empty()
        {
            page.hydrate_origin_storage(&snapshot.state).await.ok();
        }

        if request.interactive {
            let captured = wait_for_window_close(page).await;
            if let (Some(name), Some(state)) = (&request.session, &captured) {
                self.sessions.save(name, state)?;
            }
            return Ok(ScrapeResult::success());
        }

        if let Some(selector) = &request.wait_for_selector {
            wait_for_selector(page, selector, Duration::from_millis(timeout_ms)).await?;
        }

        if let Some(extra_ms) = request.wait_for_timeout {
            tokio::time::sleep(Duration::from_millis(extra_ms)).await;
        }

        let mut result = ScrapeResult::success();

        if request.return_html {
            result.html = Some(page.content().await?);
        }

        if let Some(script) = &request.script {
            match page.evaluate(&wrap_extraction_script(script)).await {
                Ok(value) => result.data = Some(value),
                Err(e) => {
                    // Keep whatever was already extracted; the caller sees
                    // both the partial output and the failure.
                    result.ok = false;
                    result.error = Some(e.to_string());
                }
            }
        }

        Ok(result)
    }
}

async fn wait_for_selector(
    page: &dyn PageDriver,
    selector: &str,
    limit: Duration,
) -> Result<()> {
    let probe = async {
        loop {
            if page.selector_exists(selector).await.unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    };

    tokio::time::timeout(limit, probe)
        .await
        .map_err(|_| ScraperError::SelectorTimeout(selector.to_string()))
}
