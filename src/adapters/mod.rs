use crate::scrape::ScrapeRequest;
use crate::utils::is_safe_key;
use crate::{Config, Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// How to reach and read a platform's follower/following lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionRules {
    pub followers_url_template: Option<String>,
    pub following_url_template: Option<String>,
    /// Extraction script for connection lists; yields an array of handles.
    pub list_script: Option<String>,
    pub list_selector: Option<String>,
}

/// A per-platform scraping recipe: where profiles live, what marks a loaded
/// page, and how to pull structured data out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    /// Registry key; must match the file stem it is stored under.
    pub platform: String,
    /// Human-readable platform name for listings.
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Login page for interactive window-close logins on platforms outside
    /// the built-in catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    /// Profile URL with a `{id}` placeholder for the handle.
    pub profile_url_template: String,
    pub profile_selector: Option<String>,
    /// Extraction script for the profile page; yields a JSON object.
    pub profile_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionRules>,
}

/// Literal placeholder substitution. `{id}` is the only placeholder; handles
/// are used verbatim, so no escaping.
pub fn substitute(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

impl AdapterConfig {
    /// Build the scrape request for one profile page. The session name is the
    /// platform key, so a saved login is picked up automatically.
    pub fn profile_request(&self, id: &str, default_timeout_ms: u64) -> ScrapeRequest {
        let mut req = ScrapeRequest::new(substitute(&self.profile_url_template, id));
        req.wait_for_selector = self.profile_selector.clone();
        req.script = self.profile_script.clone();
        req.timeout = Some(default_timeout_ms);
        req.session = Some(self.platform.clone());
        req
    }

    pub fn followers_request(&self, id: &str, default_timeout_ms: u64) -> Option<ScrapeRequest> {
        let rules = self.connections.as_ref()?;
        let template = rules.followers_url_template.as_ref()?;
        Some(self.connection_request(template, rules, id, default_timeout_ms))
    }

    pub fn following_request(&self, id: &str, default_timeout_ms: u64) -> Option<ScrapeRequest> {
        let rules = self.connections.as_ref()?;
        let template = rules.following_url_template.as_ref()?;
        Some(self.connection_request(template, rules, id, default_timeout_ms))
    }

    fn connection_request(
        &self,
        template: &str,
        rules: &ConnectionRules,
        id: &str,
        default_timeout_ms: u64,
    ) -> ScrapeRequest {
        let mut req = ScrapeRequest::new(substitute(template, id));
        req.wait_for_selector = rules.list_selector.clone();
        req.script = rules.list_script.clone();
        req.timeout = Some(default_timeout_ms);
        req.session = Some(self.platform.clone());
        req
    }

    pub fn validate(&self) -> Result<()> {
        if !is_safe_key(&self.platform) {
            return Err(ScraperError::InvalidAdapter(format!(
                "platform key {:?} is not a valid identifier",
                self.platform
            )));
        }
        if !self.profile_url_template.contains("{id}") {
            return Err(ScraperError::InvalidAdapter(format!(
                "profile URL template for {} has no {{id}} placeholder",
                self.platform
            )));
        }
        if url::Url::parse(&substitute(&self.profile_url_template, "probe")).is_err() {
            return Err(ScraperError::InvalidAdapter(format!(
                "profile URL template for {} is not a valid URL",
                self.platform
            )));
        }
        Ok(())
    }
}

/// Adapters live as JSON files under the adapters directory, one per
/// platform. Editing a file is the supported way to tweak a recipe.
pub struct AdapterRegistry {
    dir: PathBuf,
}

impl AdapterRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(config.storage.adapters_dir()?))
    }

    fn path_for(&self, platform: &str) -> Result<PathBuf> {
        if !is_safe_key(platform) {
            return Err(ScraperError::InvalidAdapter(platform.to_string()));
        }
        Ok(self.dir.join(format!("{platform}.json")))
    }

    pub fn get(&self, platform: &str) -> Result<Option<AdapterConfig>> {
        let path = self.path_for(platform)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<AdapterConfig>(&content) {
            Ok(adapter) => Ok(Some(adapter)),
            Err(e) => {
                tracing::warn!("ignoring unparsable adapter {}: {}", platform, e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, adapter: &AdapterConfig) -> Result<()> {
        adapter.validate()?;
        let path = self.path_for(&adapter.platform)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, serde_json::to_string_pretty(adapter)?)?;
        tracing::debug!("saved adapter {}", adapter.platform);
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<AdapterConfig>> {
        let mut adapters = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if let Some(adapter) = self.get(stem)? {
                    adapters.push(adapter);
                }
            }
        }

        adapters.sort_by(|a, b| a.platform.cmp(&b.platform));
        Ok(adapters)
    }

    pub fn delete(&self, platform: &str) -> Result<bool> {
        let path = self.path_for(platform)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}

/// Built-in recipe for the mock platform used by the test fixture server.
pub fn mock_adapter() -> AdapterConfig {
    AdapterConfig {
        platform: "mock".to_string(),
        name: Some("Mock Social".to_string()),
        base_url: Some("https://mock.social".to_string()),
        login_url: Some("https://mock.social/login".to_string()),
        profile_url_template: "https://mock.social/u/{id}".to_string(),
        profile_selector: Some(".profile-card".to_string()),
        profile_script: Some(
            "return { handle: document.querySelector('.handle').textContent, \
             bio: document.querySelector('.bio').textContent }"
                .to_string(),
        ),
        connections: Some(ConnectionRules {
            followers_url_template: Some("https://mock.social/u/{id}/followers".to_string()),
            following_url_template: Some("https://mock.social/u/{id}/following".to_string()),
            list_script: Some(
                "return Array.from(document.querySelectorAll('.user-row .handle'))\
                 .map(el => el.textContent)"
                    .to_string(),
            ),
            list_selector: Some(".user-row".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> (AdapterRegistry, TempDir) {
        let temp = TempDir::new().unwrap();
        (AdapterRegistry::new(temp.path()), temp)
    }

    #[test]
    fn test_substitute_replaces_placeholder() {
        assert_eq!(
            substitute("https://mock.social/u/{id}", "abc"),
            "https://mock.social/u/abc"
        );
    }

    #[test]
    fn test_substitute_without_placeholder_is_identity() {
        assert_eq!(
            substitute("https://mock.social/trending", "abc"),
            "https://mock.social/trending"
        );
    }

    #[test]
    fn test_profile_request_carries_session_and_selector() {
        let adapter = mock_adapter();
        let req = adapter.profile_request("abc", 30_000);

        assert_eq!(req.url, "https://mock.social/u/abc");
        assert_eq!(req.session.as_deref(), Some("mock"));
        assert_eq!(req.wait_for_selector.as_deref(), Some(".profile-card"));
        assert!(req.script.is_some());
        assert_eq!(req.timeout, Some(30_000));
    }

    #[test]
    fn test_connection_requests_use_list_rules() {
        let adapter = mock_adapter();

        let followers = adapter.followers_request("abc", 30_000).unwrap();
        assert_eq!(followers.url, "https://mock.social/u/abc/followers");
        assert_eq!(followers.wait_for_selector.as_deref(), Some(".user-row"));

        let following = adapter.following_request("abc", 30_000).unwrap();
        assert_eq!(following.url, "https://mock.social/u/abc/following");
    }

    #[test]
    fn test_connection_requests_absent_without_rules() {
        let mut adapter = mock_adapter();
        adapter.connections = None;

        assert!(adapter.followers_request("abc", 30_000).is_none());
        assert!(adapter.following_request("abc", 30_000).is_none());
    }

    #[test]
    fn test_save_then_get_round_trip() {
        let (registry, _temp) = registry();
        let adapter = mock_adapter();

        registry.save(&adapter).unwrap();
        let loaded = registry.get("mock").unwrap().unwrap();
        assert_eq!(loaded, adapter);
    }

    #[test]
    fn test_get_unknown_is_absent() {
        let (registry, _temp) = registry();
        assert!(registry.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_unparsable_adapter_is_skipped() {
        let (registry, temp) = registry();
        registry.save(&mock_adapter()).unwrap();
        std::fs::write(temp.path().join("broken.json"), "{oops").unwrap();

        let adapters = registry.list().unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].platform, "mock");
    }

    #[test]
    fn test_save_rejects_template_without_placeholder() {
        let (registry, _temp) = registry();
        let mut adapter = mock_adapter();
        adapter.profile_url_template = "https://mock.social/u/abc".to_string();

        assert!(matches!(
            registry.save(&adapter),
            Err(ScraperError::InvalidAdapter(_))
        ));
    }

    #[test]
    fn test_unsafe_platform_key_rejected() {
        let (registry, _temp) = registry();
        assert!(registry.get("../evil").is_err());

        let mut adapter = mock_adapter();
        adapter.platform = "a/b".to_string();
        assert!(registry.save(&adapter).is_err());
    }

    #[test]
    fn test_list_sorted_by_platform() {
        let (registry, _temp) = registry();

        let mut twitter = mock_adapter();
        twitter.platform = "twitter".to_string();
        twitter.profile_url_template = "https://x.com/{id}".to_string();

        registry.save(&twitter).unwrap();
        registry.save(&mock_adapter()).unwrap();

        let platforms: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.platform)
            .collect();
        assert_eq!(platforms, vec!["mock".to_string(), "twitter".to_string()]);
    }
}
