pub mod page;

pub use page::{CdpPage, PageDriver};

use crate::timeouts::secs;
use crate::{Config, Result, ScraperError};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// What to do with the singleton browser for an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDecision {
    Reuse,
    Launch { headless: bool },
    Relaunch { headless: bool },
}

/// A headed browser can serve every request; a headless one cannot serve
/// interactive requests and has to be torn down and relaunched headed.
pub fn launch_decision(
    running_headless: Option<bool>,
    need_headed: bool,
    default_headless: bool,
) -> LaunchDecision {
    match running_headless {
        None => LaunchDecision::Launch {
            headless: !need_headed && default_headless,
        },
        Some(true) if need_headed => LaunchDecision::Relaunch { headless: false },
        Some(_) => LaunchDecision::Reuse,
    }
}

/// Chrome flags for a fresh launch. Sandbox flags are unconditional on Linux
/// where Chrome refuses to start as root without them.
pub fn launch_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec!["--disable-dev-shm-usage"];

    if cfg!(target_os = "linux") {
        args.push("--no-sandbox");
        args.push("--disable-setuid-sandbox");
    }

    if headless {
        args.push("--disable-gpu");
    }

    args
}

struct LiveBrowser {
    browser: Arc<RwLock<Browser>>,
    headless: bool,
    handler: tokio::task::JoinHandle<()>,
}

impl LiveBrowser {
    async fn is_alive(&self) -> bool {
        self.browser.read().await.version().await.is_ok()
    }

    async fn teardown(self) {
        {
            let mut browser = self.browser.write().await;
            browser.close().await.ok();
            browser.wait().await.ok();
        }
        self.handler.abort();
    }
}

/// Owner of the one browser process. All launching, reuse, headed/headless
/// switching, and shutdown go through here; everyone else holds a
/// [`BrowserHandle`].
pub struct BrowserSupervisor {
    config: Arc<Config>,
    slot: Mutex<Option<LiveBrowser>>,
}

impl BrowserSupervisor {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    /// Hand out the running browser, launching or relaunching it first when
    /// the request needs a window the current instance cannot show.
    pub async fn acquire(&self, need_headed: bool) -> Result<BrowserHandle> {
        let mut slot = self.slot.lock().await;

        let decision = launch_decision(
            slot.as_ref().map(|live| live.headless),
            need_headed,
            self.config.browser.effective_headless(),
        );

        match decision {
            LaunchDecision::Reuse => {
                // Chrome can die underneath us; a dead singleton is
                // replaced with the same mode it had.
                if let Some(live) = slot.as_ref()
                    && !live.is_alive().await
                {
                    tracing::warn!("browser connection lost, relaunching");
                    let headless = live.headless;
                    if let Some(dead) = slot.take() {
                        dead.teardown().await;
                    }
                    *slot = Some(self.launch(headless).await?);
                }
            }
            LaunchDecision::Launch { headless } => {
                *slot = Some(self.launch(headless).await?);
            }
            LaunchDecision::Relaunch { headless } => {
                if let Some(old) = slot.take() {
                    old.teardown().await;
                }
                *slot = Some(self.launch(headless).await?);
            }
        }

        let live = slot.as_ref().ok_or(ScraperError::ConnectionLost)?;
        Ok(BrowserHandle {
            browser: live.browser.clone(),
            headless: live.headless,
        })
    }

    async fn launch(&self, headless: bool) -> Result<LiveBrowser> {
        let chrome_path = match &self.config.browser.chrome_path {
            Some(path) => path.clone(),
            None => crate::utils::find_chrome_executable()?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .window_size(
                self.config.browser.window_width,
                self.config.browser.window_height,
            )
            .request_timeout(Duration::from_secs(secs::REQUEST))
            .args(launch_args(headless));

        if !headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(ScraperError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!(headless, "launched browser");

        Ok(LiveBrowser {
            browser: Arc::new(RwLock::new(browser)),
            headless,
            handler,
        })
    }

    /// Close the browser if one is running. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(live) = self.slot.lock().await.take() {
            live.teardown().await;
            tracing::info!("browser shut down");
        }
    }
}

/// Shared reference to the live browser, valid until the supervisor replaces
/// or shuts it down.
#[derive(Clone)]
pub struct BrowserHandle {
    browser: Arc<RwLock<Browser>>,
    headless: bool,
}

impl BrowserHandle {
    pub fn headless(&self) -> bool {
        self.headless
    }

    /// One page in a fresh incognito-style browser context. Disposing the
    /// context later wipes its cookies and storage in one call.
    pub async fn open_page_in_new_context(&self) -> Result<(Page, BrowserContextId)> {
        let browser = self.browser.read().await;

        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?
            .result
            .browser_context_id;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(ScraperError::General)?;

        let target_id = browser
            .execute(params)
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?
            .result
            .target_id;

        let page = browser
            .get_page(target_id)
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?;

        Ok((page, context))
    }

    pub async fn dispose_context(&self, context: BrowserContextId) -> Result<()> {
        self.browser
            .read()
            .await
            .execute(DisposeBrowserContextParams::new(context))
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?;
        Ok(())
    }
}
