use crate::browser::page::wait_for_window_close;
use crate::browser::{BrowserSupervisor, CdpPage, PageDriver};
use crate::output::{self, OutputFormatter};
use crate::session::{SessionStore, StorageState};
use crate::timeouts::secs;
use crate::{Config, Result, ScraperError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A platform we know how to log into: where the login form lives and what a
/// logged-in URL looks like.
pub struct Platform {
    pub id: &'static str,
    pub name: &'static str,
    pub login_url: &'static str,
    success: Regex,
    /// URLs the success pattern also matches but that are not logged-in
    /// destinations (login forms, challenge pages).
    exclude: Option<Regex>,
}

impl Platform {
    pub fn matches_logged_in(&self, url: &str) -> bool {
        if let Some(exclude) = &self.exclude
            && exclude.is_match(url)
        {
            return false;
        }
        self.success.is_match(url)
    }
}

pub static PLATFORMS: Lazy<Vec<Platform>> = Lazy::new(|| {
    vec![
        Platform {
            id: "twitter",
            name: "Twitter / X",
            login_url: "https://twitter.com/i/flow/login",
            success: Regex::new(r"(?:twitter|x)\.com/(?:home|[^/]+/status|compose)")
                .expect("valid pattern"),
            exclude: None,
        },
        Platform {
            id: "instagram",
            name: "Instagram",
            login_url: "https://www.instagram.com/accounts/login/",
            success: Regex::new(r"instagram\.com/").expect("valid pattern"),
            exclude: Some(
                Regex::new(r"instagram\.com/(?:accounts/login|challenge)")
                    .expect("valid pattern"),
            ),
        },
        Platform {
            id: "linkedin",
            name: "LinkedIn",
            login_url: "https://www.linkedin.com/login",
            success: Regex::new(r"linkedin\.com/(?:feed|mynetwork|in/)").expect("valid pattern"),
            exclude: None,
        },
    ]
});

pub fn platform(id: &str) -> Option<&'static Platform> {
    PLATFORMS.iter().find(|p| p.id == id)
}

/// How to decide an interactive login is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginStrategy {
    /// The human closes the window when done; whatever state was captured
    /// last is what gets saved.
    WindowClose,
    /// Poll the URL until it matches the platform's logged-in pattern, up to
    /// a hard ceiling.
    #[default]
    UrlPoll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub ok: bool,
    pub message: String,
}

impl OutputFormatter for LoginOutcome {
    fn format_text(&self) -> String {
        use crate::output::text;
        if self.ok {
            text::success(&self.message)
        } else {
            text::error(&self.message)
        }
    }

    fn format_json(&self, pretty: bool) -> Result<String> {
        output::to_json(self, pretty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub id: String,
    pub name: String,
    pub logged_in: bool,
}

/// Interactive login flows: open the platform's login page headed, wait for
/// the human, snapshot the authenticated state.
pub struct AuthFlow {
    supervisor: Arc<BrowserSupervisor>,
    sessions: Arc<SessionStore>,
    poll_interval: Duration,
    ceiling: Duration,
}

impl AuthFlow {
    pub fn new(
        supervisor: Arc<BrowserSupervisor>,
        sessions: Arc<SessionStore>,
        config: &Config,
    ) -> Self {
        Self {
            supervisor,
            sessions,
            poll_interval: Duration::from_millis(config.scrape.login_poll_interval_ms),
            ceiling: Duration::from_secs(config.scrape.login_timeout_secs),
        }
    }

    pub fn sessions_status(&self) -> Vec<SessionStatus> {
        PLATFORMS
            .iter()
            .map(|p| SessionStatus {
                id: p.id.to_string(),
                name: p.name.to_string(),
                logged_in: self.sessions.has(p.id),
            })
            .collect()
    }

    /// Returns whether a saved session actually existed.
    pub fn logout(&self, platform_id: &str) -> Result<bool> {
        let platform = platform(platform_id)
            .ok_or_else(|| ScraperError::UnknownPlatform(platform_id.to_string()))?;
        self.sessions.delete(platform.id)
    }

    pub async fn start_login(
        &self,
        platform_id: &str,
        strategy: LoginStrategy,
    ) -> Result<LoginOutcome> {
        // Unknown platforms fail before any browser work.
        let platform = platform(platform_id)
            .ok_or_else(|| ScraperError::UnknownPlatform(platform_id.to_string()))?;

        let handle = self.supervisor.acquire(true).await?;
        let page = CdpPage::open(&handle).await?;

        let outcome = self.run_login(&page, platform, strategy).await;
        page.close().await.ok();
        outcome
    }

    pub(crate) async fn run_login(
        &self,
        page: &dyn PageDriver,
        platform: &Platform,
        strategy: LoginStrategy,
    ) -> Result<LoginOutcome> {
        page.navigate(
            platform.login_url,
            Some(Duration::from_secs(secs::LOGIN_NAVIGATION)),
        )
        .await?;

        tracing::info!(platform = platform.id, ?strategy, "waiting for login");

        let captured = match strategy {
            LoginStrategy::WindowClose => wait_for_window_close(page).await,
            LoginStrategy::UrlPoll => self.poll_until_login(page, platform).await,
        };

        match captured {
            Some(state) => {
                self.sessions.save(platform.id, &state)?;
                Ok(LoginOutcome {
                    ok: true,
                    message: "Session saved.".to_string(),
                })
            }
            None => Ok(LoginOutcome {
                ok: false,
                message: "Login timed out. Try again.".to_string(),
            }),
        }
    }

    /// Poll the page URL until it reads as logged in. `None` when the window
    /// goes away or the ceiling passes first.
    async fn poll_until_login(
        &self,
        page: &dyn PageDriver,
        platform: &Platform,
    ) -> Option<StorageState> {
        let started = tokio::time::Instant::now();

        loop {
            match page.current_url().await {
                // Window closed before the URL ever matched.
                Err(_) => return None,
                Ok(Some(url)) if platform.matches_logged_in(&url) => {
                    return page.capture_state().await.ok();
                }
                Ok(_) => {}
            }

            if started.elapsed() >= self.ceiling {
                tracing::warn!(platform = platform.id, "login ceiling reached");
                return None;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::page::fake::FakePage;
    use crate::session::Cookie;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn flow() -> (AuthFlow, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let supervisor = Arc::new(BrowserSupervisor::new(Arc::new(config.clone())));
        let sessions = Arc::new(SessionStore::new(temp.path()));
        (AuthFlow::new(supervisor, sessions, &config), temp)
    }

    fn cookie_state() -> StorageState {
        StorageState {
            cookies: vec![Cookie {
                name: "auth_token".to_string(),
                value: "tok".to_string(),
                domain: ".twitter.com".to_string(),
                path: "/".to_string(),
                expires: 0.0,
                http_only: true,
                secure: true,
                same_site: "Lax".to_string(),
            }],
            origins: Vec::new(),
        }
    }

    #[test]
    fn test_twitter_logged_in_urls() {
        let twitter = platform("twitter").unwrap();
        assert!(twitter.matches_logged_in("https://twitter.com/home"));
        assert!(twitter.matches_logged_in("https://x.com/home"));
        assert!(twitter.matches_logged_in("https://x.com/someone/status/123"));
        assert!(twitter.matches_logged_in("https://x.com/compose/post"));
        assert!(!twitter.matches_logged_in("https://twitter.com/i/flow/login"));
    }

    #[test]
    fn test_instagram_login_and_challenge_excluded() {
        let instagram = platform("instagram").unwrap();
        assert!(instagram.matches_logged_in("https://www.instagram.com/"));
        assert!(instagram.matches_logged_in("https://www.instagram.com/someuser/"));
        assert!(!instagram.matches_logged_in("https://www.instagram.com/accounts/login/"));
        assert!(!instagram.matches_logged_in("https://www.instagram.com/challenge/12345/"));
    }

    #[test]
    fn test_linkedin_logged_in_urls() {
        let linkedin = platform("linkedin").unwrap();
        assert!(linkedin.matches_logged_in("https://www.linkedin.com/feed/"));
        assert!(linkedin.matches_logged_in("https://www.linkedin.com/in/someone/"));
        assert!(!linkedin.matches_logged_in("https://www.linkedin.com/login"));
    }

    #[test]
    fn test_unknown_platform_lookup() {
        assert!(platform("myspace").is_none());
    }

    #[tokio::test]
    async fn test_logout_unknown_platform_is_error() {
        let (flow, _temp) = flow();
        assert!(matches!(
            flow.logout("myspace"),
            Err(ScraperError::UnknownPlatform(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_reports_presence() {
        let (flow, temp) = flow();
        assert!(!flow.logout("twitter").unwrap());

        SessionStore::new(temp.path())
            .save("twitter", &cookie_state())
            .unwrap();
        assert!(flow.logout("twitter").unwrap());
        assert!(!flow.logout("twitter").unwrap());
    }

    #[tokio::test]
    async fn test_sessions_status_tracks_snapshots() {
        let (flow, temp) = flow();
        SessionStore::new(temp.path())
            .save("instagram", &cookie_state())
            .unwrap();

        let status = flow.sessions_status();
        assert_eq!(status.len(), 3);

        let by_id = |id: &str| status.iter().find(|s| s.id == id).unwrap();
        assert!(by_id("instagram").logged_in);
        assert!(!by_id("twitter").logged_in);
        assert!(!by_id("linkedin").logged_in);
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_poll_login_succeeds_and_saves() {
        let (flow, temp) = flow();
        let page = FakePage::new()
            .with_urls(
                vec![
                    "https://twitter.com/i/flow/login",
                    "https://twitter.com/i/flow/login",
                    "https://x.com/home",
                ],
                true,
            )
            .with_state(cookie_state());

        let outcome = flow
            .run_login(&page, platform("twitter").unwrap(), LoginStrategy::UrlPoll)
            .await
            .unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.message, "Session saved.");

        let snapshot = SessionStore::new(temp.path())
            .load("twitter")
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.state, cookie_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_poll_runs_full_ceiling_before_giving_up() {
        let (flow, temp) = flow();
        // The URL never leaves the login page.
        let page = FakePage::new().with_urls(vec!["https://twitter.com/i/flow/login"], true);

        let started = tokio::time::Instant::now();
        let outcome = flow
            .run_login(&page, platform("twitter").unwrap(), LoginStrategy::UrlPoll)
            .await
            .unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.message, "Login timed out. Try again.");
        assert!(started.elapsed() >= Duration::from_secs(300));

        // 300s ceiling at a 1.5s poll interval means roughly 200 polls.
        let polls = page.url_polls.load(Ordering::SeqCst);
        assert!(polls >= 200, "only {polls} polls before the ceiling");

        assert!(SessionStore::new(temp.path()).list().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_poll_window_closed_is_timeout_message() {
        let (flow, temp) = flow();
        let page = FakePage::new().with_urls(vec!["https://twitter.com/i/flow/login"], false);

        let outcome = flow
            .run_login(&page, platform("twitter").unwrap(), LoginStrategy::UrlPoll)
            .await
            .unwrap();

        assert!(!outcome.ok);
        assert!(SessionStore::new(temp.path()).list().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_close_login_saves_last_capture() {
        let (flow, temp) = flow();
        let page = FakePage::new()
            .with_urls(
                vec!["https://twitter.com/i/flow/login", "https://x.com/home"],
                false,
            )
            .with_state(cookie_state());

        let outcome = flow
            .run_login(
                &page,
                platform("twitter").unwrap(),
                LoginStrategy::WindowClose,
            )
            .await
            .unwrap();

        assert!(outcome.ok);
        let snapshot = SessionStore::new(temp.path())
            .load("twitter")
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.state, cookie_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_close_with_nothing_captured_fails() {
        let (flow, _temp) = flow();
        let page = FakePage::new().with_urls(vec!["https://twitter.com/i/flow/login"], false);

        let outcome = flow
            .run_login(
                &page,
                platform("twitter").unwrap(),
                LoginStrategy::WindowClose,
            )
            .await
            .unwrap();

        assert!(!outcome.ok);
    }

    #[test]
    fn test_login_strategy_wire_names() {
        assert_eq!(
            serde_json::to_string(&LoginStrategy::WindowClose).unwrap(),
            r#""windowClose""#
        );
        assert_eq!(
            serde_json::from_str::<LoginStrategy>(r#""urlPoll""#).unwrap(),
            LoginStrategy::UrlPoll
        );
    }
}
