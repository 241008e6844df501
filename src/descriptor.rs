//! Static provider table driving the device-flow poller.
//!
//! Adding a provider means adding a descriptor here. The poller and manager
//! contain no provider-name branches; encoding and pending-signal dispatch
//! is driven entirely by descriptor fields.

const REAL_DEBRID_CLIENT_ID: &str = "X245A4XAIBGVM";
const REAL_DEBRID_OAUTH_BASE: &str = "https://api.real-debrid.com/oauth/v2";
const REAL_DEBRID_DEVICE_URL: &str = "https://real-debrid.com/device";

const TRAKT_CLIENT_ID: &str =
    "0183a05ad97098d87287fe46da4ae286f434f32e8e951caad4cc147c947d79a3";
const TRAKT_API_BASE: &str = "https://api.trakt.tv";
const TRAKT_DEVICE_URL: &str = "https://trakt.tv/activate";

/// Body encoding for device-flow requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEncoding {
    FormUrlencoded,
    Json,
}

/// How a provider signals "authorization not yet completed" while polling.
///
/// Matched against the HTTP status and, when `body_marker` is set, the raw
/// response body. Distinct from a hard failure: a matching response keeps
/// the poll loop going without logging an error.
#[derive(Debug, Clone, Copy)]
pub struct PendingSignal {
    pub status: u16,
    pub body_marker: Option<&'static str>,
}

impl PendingSignal {
    pub fn matches(&self, status: u16, body: &str) -> bool {
        if status != self.status {
            return false;
        }
        match self.body_marker {
            Some(marker) => body.contains(marker),
            None => true,
        }
    }
}

/// Device-flow endpoints and wire quirks for one provider.
#[derive(Debug, Clone)]
pub struct DeviceFlowConfig {
    pub device_code_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    /// Sent verbatim when present; Trakt expects an empty secret for the
    /// public-client device grant.
    pub client_secret: Option<String>,
    pub request_encoding: RequestEncoding,
    pub pending_signal: PendingSignal,
    /// Some providers answer over-polling with a dedicated status (Trakt
    /// uses 429) instead of the RFC 8628 `slow_down` error body.
    pub slow_down_status: Option<u16>,
    /// Parameter name carrying the device code on token requests.
    pub code_param: &'static str,
    /// Grant-type marker, omitted when the provider does not expect one.
    pub grant_type: Option<&'static str>,
    pub extra_headers: Vec<(&'static str, &'static str)>,
    pub extra_code_params: Vec<(&'static str, &'static str)>,
    /// Shown to the user when the code response omits `verification_url`.
    pub default_verification_url: &'static str,
    /// Fallback lifetime when the token response omits `expires_in`.
    pub default_token_lifetime_secs: u64,
}

/// How credentials for a provider are obtained.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// OAuth 2.0 Device Authorization Grant.
    Device(DeviceFlowConfig),
    /// User-supplied static API key, no polling.
    ApiKey,
}

/// Static definition of one supported provider.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub method: AuthMethod,
    /// Source ranking hint for downstream consumers; stored with the
    /// credential record, unused by this crate beyond that.
    pub priority: u32,
}

impl ProviderDescriptor {
    pub fn with_device_code_endpoint(mut self, url: impl Into<String>) -> Self {
        if let AuthMethod::Device(config) = &mut self.method {
            config.device_code_endpoint = url.into();
        }
        self
    }

    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        if let AuthMethod::Device(config) = &mut self.method {
            config.token_endpoint = url.into();
        }
        self
    }

    pub fn device_config(&self) -> Option<&DeviceFlowConfig> {
        match &self.method {
            AuthMethod::Device(config) => Some(config),
            AuthMethod::ApiKey => None,
        }
    }
}

/// Real-Debrid: form-encoded public-client flow. Polling answers 403 until
/// the user approves, and approval mints per-device client credentials that
/// ride along in the token response.
pub fn real_debrid() -> ProviderDescriptor {
    ProviderDescriptor {
        name: "real_debrid",
        method: AuthMethod::Device(DeviceFlowConfig {
            device_code_endpoint: format!("{REAL_DEBRID_OAUTH_BASE}/device/code"),
            token_endpoint: format!("{REAL_DEBRID_OAUTH_BASE}/token"),
            client_id: REAL_DEBRID_CLIENT_ID.to_string(),
            client_secret: None,
            request_encoding: RequestEncoding::FormUrlencoded,
            pending_signal: PendingSignal {
                status: 403,
                body_marker: None,
            },
            slow_down_status: None,
            code_param: "code",
            grant_type: Some("http://oauth.net/grant_type/device/1.0"),
            extra_headers: Vec::new(),
            extra_code_params: vec![("new_credentials", "yes")],
            default_verification_url: REAL_DEBRID_DEVICE_URL,
            default_token_lifetime_secs: 604_800,
        }),
        priority: 90,
    }
}

/// Trakt: JSON-encoded flow behind versioned API headers. HTTP 400 means
/// pending, 429 means slow down.
pub fn trakt() -> ProviderDescriptor {
    ProviderDescriptor {
        name: "trakt",
        method: AuthMethod::Device(DeviceFlowConfig {
            device_code_endpoint: format!("{TRAKT_API_BASE}/oauth/device/code"),
            token_endpoint: format!("{TRAKT_API_BASE}/oauth/device/token"),
            client_id: TRAKT_CLIENT_ID.to_string(),
            client_secret: Some(String::new()),
            request_encoding: RequestEncoding::Json,
            pending_signal: PendingSignal {
                status: 400,
                body_marker: None,
            },
            slow_down_status: Some(429),
            code_param: "code",
            grant_type: None,
            extra_headers: vec![
                ("trakt-api-version", "2"),
                ("trakt-api-key", TRAKT_CLIENT_ID),
            ],
            extra_code_params: Vec::new(),
            default_verification_url: TRAKT_DEVICE_URL,
            default_token_lifetime_secs: 7_776_000,
        }),
        priority: 0,
    }
}

pub fn mdblist() -> ProviderDescriptor {
    ProviderDescriptor {
        name: "mdblist",
        method: AuthMethod::ApiKey,
        priority: 0,
    }
}

pub fn premiumize() -> ProviderDescriptor {
    ProviderDescriptor {
        name: "premiumize",
        method: AuthMethod::ApiKey,
        priority: 0,
    }
}

/// Lookup table of supported providers.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderDescriptor>) -> Self {
        Self { providers }
    }

    /// All providers this build knows about.
    pub fn builtin() -> Self {
        Self::new(vec![real_debrid(), trakt(), mdblist(), premiumize()])
    }

    pub fn lookup(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_all_providers() {
        let registry = ProviderRegistry::builtin();
        for name in ["real_debrid", "trakt", "mdblist", "premiumize"] {
            assert!(registry.lookup(name).is_some(), "missing {name}");
        }
        assert!(registry.lookup("nosuch").is_none());
    }

    #[test]
    fn device_providers_expose_flow_config() {
        assert!(real_debrid().device_config().is_some());
        assert!(trakt().device_config().is_some());
        assert!(mdblist().device_config().is_none());
    }

    #[test]
    fn endpoint_overrides_replace_urls() {
        let descriptor = trakt()
            .with_device_code_endpoint("http://localhost:9/code")
            .with_token_endpoint("http://localhost:9/token");
        let config = descriptor.device_config().unwrap();
        assert_eq!(config.device_code_endpoint, "http://localhost:9/code");
        assert_eq!(config.token_endpoint, "http://localhost:9/token");
    }

    #[test]
    fn endpoint_overrides_are_noops_for_api_key_providers() {
        let descriptor = mdblist().with_token_endpoint("http://localhost:9/token");
        assert!(descriptor.device_config().is_none());
    }

    #[test]
    fn pending_signal_requires_status_match() {
        let signal = PendingSignal {
            status: 400,
            body_marker: None,
        };
        assert!(signal.matches(400, ""));
        assert!(signal.matches(400, "anything"));
        assert!(!signal.matches(200, ""));
    }

    #[test]
    fn pending_signal_body_marker_narrows_match() {
        let signal = PendingSignal {
            status: 200,
            body_marker: Some("authorization_pending"),
        };
        assert!(signal.matches(200, r#"{"error":"authorization_pending"}"#));
        assert!(!signal.matches(200, r#"{"error":"access_denied"}"#));
    }

    #[test]
    fn real_debrid_carries_priority_for_downstream_ranking() {
        assert_eq!(real_debrid().priority, 90);
    }
}
