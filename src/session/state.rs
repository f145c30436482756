use serde::{Deserialize, Serialize};

/// Serialized authentication state for one logged-in session, in Playwright's
/// `storageState` layout. Snapshots written by earlier versions of the tool
/// (which drove Playwright directly) stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginStorage>,
}

impl StorageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginStorage {
    pub origin: String,
    pub local_storage: Vec<LocalStorageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStorageEntry {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_state_round_trip() {
        let state = StorageState {
            cookies: vec![Cookie {
                name: "auth_token".to_string(),
                value: "abc123".to_string(),
                domain: ".mock.social".to_string(),
                path: "/".to_string(),
                expires: 1234567890.0,
                http_only: true,
                secure: true,
                same_site: "Lax".to_string(),
            }],
            origins: vec![OriginStorage {
                origin: "https://mock.social".to_string(),
                local_storage: vec![LocalStorageEntry {
                    name: "user_id".to_string(),
                    value: "42".to_string(),
                }],
            }],
        };

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("httpOnly"));
        assert!(json.contains("localStorage"));

        let parsed: StorageState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_storage_state_accepts_missing_sections() {
        let parsed: StorageState = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }
}
