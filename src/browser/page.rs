use super::BrowserHandle;
use crate::session::{Cookie, LocalStorageEntry, OriginStorage, StorageState};
use crate::timeouts::ms;
use crate::{Result, ScraperError};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieSameSite, GetCookiesParams, Headers, SetCookieParams, SetExtraHttpHeadersParams,
    TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::CloseTargetParams;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Everything the orchestrator and login flows need from one open page.
/// The production implementation talks CDP; tests swap in a scripted fake.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the DOM to be usable. `None` waits without a
    /// deadline, for pages a human is still interacting with.
    async fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<()>;

    async fn selector_exists(&self, selector: &str) -> Result<bool>;

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    async fn content(&self) -> Result<String>;

    /// `Err` means the target is gone, which is how a closed window reads
    /// over CDP.
    async fn current_url(&self) -> Result<Option<String>>;

    async fn set_user_agent(&self, user_agent: &str) -> Result<()>;

    async fn set_extra_headers(&self, headers: &HashMap<String, String>) -> Result<()>;

    async fn capture_state(&self) -> Result<StorageState>;

    /// Pre-navigation hydration: cookies only, since localStorage is bound
    /// to an origin the page is not on yet.
    async fn apply_state(&self, state: &StorageState) -> Result<()>;

    /// Post-navigation hydration for the origin the page landed on.
    async fn hydrate_origin_storage(&self, state: &StorageState) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Selectors starting with `//` or `(` are XPath, everything else CSS.
pub fn is_xpath(selector: &str) -> bool {
    selector.starts_with("//") || selector.starts_with('(')
}

/// One page in its own browser context. Closing the page always disposes the
/// context, so nothing from the request outlives it.
pub struct CdpPage {
    page: Page,
    handle: BrowserHandle,
    context: BrowserContextId,
    closed: AtomicBool,
}

impl CdpPage {
    pub async fn open(handle: &BrowserHandle) -> Result<Self> {
        let (page, context) = handle.open_page_in_new_context().await?;

        page.execute(SetIgnoreCertificateErrorsParams::new(true))
            .await
            .ok();

        Ok(Self {
            page,
            handle: handle.clone(),
            context,
            closed: AtomicBool::new(false),
        })
    }

    async fn eval_raw(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| ScraperError::EvaluationError(e.to_string()))?;

        // `undefined` has no value over the wire; read it as null.
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for_dom(&self) -> Result<()> {
        loop {
            let ready = self
                .eval_raw("document.readyState")
                .await?
                .as_str()
                .map(str::to_string)
                .unwrap_or_default();

            if ready == "interactive" || ready == "complete" {
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(ms::POLL_INTERVAL)).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocalSnapshot {
    origin: String,
    entries: Vec<LocalStorageEntry>,
}

const LOCAL_STORAGE_READ: &str = "(() => { try { \
    const entries = []; \
    for (let i = 0; i < localStorage.length; i++) { \
        const name = localStorage.key(i); \
        entries.push({ name, value: localStorage.getItem(name) }); \
    } \
    return { origin: location.origin, entries }; \
} catch (e) { return null; } })()";

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<()> {
        let go = async {
            let params = NavigateParams::builder()
                .url(url)
                .build()
                .map_err(ScraperError::General)?;

            let response = self
                .page
                .execute(params)
                .await
                .map_err(|e| ScraperError::NavigationFailed(e.to_string()))?;

            if let Some(ref error) = response.result.error_text {
                return Err(ScraperError::NavigationFailed(error.clone()));
            }

            self.wait_for_dom().await
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, go)
                .await
                .map_err(|_| ScraperError::NavigationTimeout(limit.as_millis() as u64))?,
            None => go.await,
        }
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let quoted = serde_json::to_string(selector)?;
        let expression = if is_xpath(selector) {
            format!(
                "document.evaluate({quoted}, document, null, \
                 XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue !== null"
            )
        } else {
            format!("document.querySelector({quoted}) !== null")
        };

        Ok(self.eval_raw(&expression).await?.as_bool().unwrap_or(false))
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        self.eval_raw(expression).await
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScraperError::General(e.to_string()))
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|_| ScraperError::ConnectionLost)
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?;
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &HashMap<String, String>) -> Result<()> {
        let headers = Headers::new(serde_json::to_value(headers)?);
        self.page
            .execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?;
        Ok(())
    }

    async fn capture_state(&self) -> Result<StorageState> {
        let cookies = self
            .page
            .execute(GetCookiesParams::default())
            .await
            .map_err(|e| ScraperError::General(e.to_string()))?
            .result
            .cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: c.expires,
                http_only: c.http_only,
                secure: c.secure,
                same_site: match c.same_site {
                    Some(CookieSameSite::Strict) => "Strict".to_string(),
                    Some(CookieSameSite::None) => "None".to_string(),
                    _ => "Lax".to_string(),
                },
            })
            .collect();

        let mut origins = Vec::new();
        if let Ok(value) = self.eval_raw(LOCAL_STORAGE_READ).await
            && let Ok(snapshot) = serde_json::from_value::<LocalSnapshot>(value)
            && !snapshot.entries.is_empty()
        {
            origins.push(OriginStorage {
                origin: snapshot.origin,
                local_storage: snapshot.entries,
            });
        }

        Ok(StorageState { cookies, origins })
    }

    async fn apply_state(&self, state: &StorageState) -> Result<()> {
        for cookie in &state.cookies {
            let mut builder = SetCookieParams::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only);

            if cookie.expires > 0.0 {
                builder = builder.expires(TimeSinceEpoch::new(cookie.expires));
            }

            builder = match cookie.same_site.as_str() {
                "Strict" => builder.same_site(CookieSameSite::Strict),
                "None" => builder.same_site(CookieSameSite::None),
                _ => builder.same_site(CookieSameSite::Lax),
            };

            let params = builder.build().map_err(ScraperError::General)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| ScraperError::General(e.to_string()))?;
        }

        Ok(())
    }

    async fn hydrate_origin_storage(&self, state: &StorageState) -> Result<()> {
        if state.origins.is_empty() {
            return Ok(());
        }

        let origin = self
            .eval_raw("location.origin")
            .await?
            .as_str()
            .map(str::to_string)
            .unwrap_or_default();

        let Some(storage) = state.origins.iter().find(|o| o.origin == origin) else {
            return Ok(());
        };

        for entry in &storage.local_storage {
            let expression = format!(
                "localStorage.setItem({}, {})",
                serde_json::to_string(&entry.name)?,
                serde_json::to_string(&entry.value)?
            );
            self.eval_raw(&expression).await?;
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.page
            .execute(CloseTargetParams::new(self.page.target_id().clone()))
            .await
            .ok();
        self.handle.dispose_context(self.context.clone()).await.ok();

        Ok(())
    }
}

/// Poll until the target disappears, keeping the freshest authentication
/// state seen while the window was still up. Capture has to happen while
/// polling since nothing can be read from a closed target.
pub async fn wait_for_window_close(page: &dyn PageDriver) -> Option<StorageState> {
    let mut last = None;

    loop {
        if page.current_url().await.is_err() {
            return last;
        }

        if let Ok(state) = page.capture_state().await
            && !state.is_empty()
        {
            last = Some(state);
        }

        tokio::time::sleep(Duration::from_millis(ms::WINDOW_CLOSE_POLL)).await;
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakePage;
    use super::*;
    use crate::session::Cookie;

    fn cookie_state() -> StorageState {
        StorageState {
            cookies: vec![Cookie {
                name: "sid".to_string(),
                value: "v".to_string(),
                domain: ".mock.social".to_string(),
                path: "/".to_string(),
                expires: 0.0,
                http_only: false,
                secure: true,
                same_site: "Lax".to_string(),
            }],
            origins: Vec::new(),
        }
    }

    #[test]
    fn test_is_xpath_detection() {
        assert!(is_xpath("//div[@class='x']"));
        assert!(is_xpath("(//a)[1]"));
        assert!(!is_xpath(".profile-card"));
        assert!(!is_xpath("#main"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_window_close_keeps_last_capture() {
        let page = FakePage::new()
            .with_urls(vec!["https://x.com/home", "https://x.com/home"], false)
            .with_state(cookie_state());

        let state = wait_for_window_close(&page).await;
        assert_eq!(state, Some(cookie_state()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_window_close_without_capture_is_none() {
        let page = FakePage::new().with_urls(vec!["https://x.com/home"], false);

        let state = wait_for_window_close(&page).await;
        assert!(state.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_window_close_already_closed() {
        let page = FakePage::new().with_urls(vec![], false).with_state(cookie_state());

        let state = wait_for_window_close(&page).await;
        assert!(state.is_none());
    }
}
