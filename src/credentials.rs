use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key under which static API keys live in [`CredentialRecord::extra`].
pub const API_KEY_FIELD: &str = "api_key";

/// Durable credential material for one provider.
///
/// One record per provider, keyed by provider name in the services document.
/// Device-flow providers fill the token fields; static-key providers only
/// carry `extra["api_key"]`. Some device flows mint per-session client
/// credentials (Real-Debrid does), which land in `client_id`/`client_secret`.
///
/// # Example
/// ```
/// use wizard_auth::CredentialRecord;
///
/// let mut record = CredentialRecord::default();
/// assert!(!record.is_connected());
/// record.access_token = Some("abc123".to_string());
/// assert!(record.is_connected());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub priority: Option<u32>,
    pub extra: BTreeMap<String, String>,
}

impl CredentialRecord {
    /// Whether this record represents a usable connection.
    ///
    /// A record with neither a token nor any extra material counts as absent.
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some() || !self.extra.is_empty()
    }

    /// The secret downstream consumers authenticate with: the access token,
    /// falling back to a static API key.
    pub fn bearer_secret(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .or_else(|| self.extra.get(API_KEY_FIELD).map(String::as_str))
    }

    /// Whether the token carries an expiry that has already passed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now(),
            None => false,
        }
    }
}
