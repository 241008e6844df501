//! Provider-facing credential operations.
//!
//! [`CredentialManager`] ties the registry, the poller, and the store
//! together behind one typed surface: authorize, inspect, revoke, and
//! register static keys. It holds no UI; callers present user codes through
//! the `on_code_ready` callback and drive cancellation themselves.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::credentials::{CredentialRecord, API_KEY_FIELD};
use crate::descriptor::{AuthMethod, ProviderRegistry};
use crate::device_flow::DeviceFlowPoller;
use crate::error::AuthError;
use crate::store::CredentialStore;

/// Connection summary for one provider, for settings-screen style listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub name: &'static str,
    pub connected: bool,
    pub priority: u32,
}

/// One manager per process is the expected shape; it is cheap to clone the
/// pieces it holds and safe to share behind an `Arc`.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use wizard_auth::{CredentialManager, FileCredentialStore};
///
/// let store = Arc::new(FileCredentialStore::new_default());
/// let manager = CredentialManager::new(store);
/// assert!(manager.token("real_debrid").unwrap().is_none());
/// ```
pub struct CredentialManager {
    registry: ProviderRegistry,
    store: Arc<dyn CredentialStore>,
    poller: DeviceFlowPoller,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            registry: ProviderRegistry::builtin(),
            store,
            poller: DeviceFlowPoller::new(),
        }
    }

    /// Replace the built-in provider table, mainly to point endpoints at a
    /// local mock server.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_poller(mut self, poller: DeviceFlowPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Run the device-grant flow for `provider` and persist the resulting
    /// credential. Long-running; callers typically spawn this on its own
    /// task and trip `cancel` from the UI.
    ///
    /// Static-key providers are rejected with [`AuthError::Unsupported`];
    /// use [`CredentialManager::set_key`] for those.
    pub async fn authorize<F>(
        &self,
        provider: &str,
        on_code_ready: F,
        cancel: &CancellationToken,
    ) -> Result<(), AuthError>
    where
        F: FnOnce(&str, &str),
    {
        let descriptor = self
            .registry
            .lookup(provider)
            .ok_or_else(|| AuthError::UnknownProvider(provider.to_string()))?;
        let config = match &descriptor.method {
            AuthMethod::Device(config) => config,
            AuthMethod::ApiKey => {
                return Err(AuthError::Unsupported(format!(
                    "{provider} uses a static API key; call set_key instead"
                )))
            }
        };

        let mut record = self.poller.run(config, on_code_ready, cancel).await?;
        record.priority = Some(descriptor.priority);
        tracing::info!(provider, "authorization complete, saving credential");
        self.store.upsert(descriptor.name, record)
    }

    /// Whether a usable credential exists for `provider`. An expired token
    /// still counts as connected; expiry is visible through
    /// [`CredentialManager::credential`] for callers that care.
    pub fn status(&self, provider: &str) -> Result<bool, AuthError> {
        self.descriptor_name(provider)?;
        Ok(self
            .store
            .get(provider)
            .map(|record| record.is_connected())
            .unwrap_or(false))
    }

    /// Connection summaries for every registered provider, in registry
    /// order.
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.registry
            .iter()
            .map(|descriptor| ProviderStatus {
                name: descriptor.name,
                connected: self
                    .store
                    .get(descriptor.name)
                    .map(|record| record.is_connected())
                    .unwrap_or(false),
                priority: descriptor.priority,
            })
            .collect()
    }

    /// The full stored record, if any.
    pub fn credential(&self, provider: &str) -> Result<Option<CredentialRecord>, AuthError> {
        self.descriptor_name(provider)?;
        Ok(self.store.get(provider))
    }

    /// The secret downstream API calls authenticate with: the access token
    /// for device-flow providers, the stored key for static-key providers.
    pub fn token(&self, provider: &str) -> Result<Option<String>, AuthError> {
        self.descriptor_name(provider)?;
        Ok(self
            .store
            .get(provider)
            .and_then(|record| record.bearer_secret().map(str::to_string)))
    }

    /// Delete the stored credential. Returns whether one existed. Local
    /// only; the provider-side grant is not revoked.
    pub fn revoke(&self, provider: &str) -> Result<bool, AuthError> {
        let name = self.descriptor_name(provider)?;
        let existed = self.store.remove(name)?;
        if existed {
            tracing::info!(provider, "credential removed");
        }
        Ok(existed)
    }

    /// Store a user-supplied API key for `provider`. The key is trimmed
    /// first; an empty result is rejected without touching the store.
    /// Re-registering replaces the previous record whole.
    pub fn set_key(&self, provider: &str, key: &str) -> Result<(), AuthError> {
        let descriptor = self
            .registry
            .lookup(provider)
            .ok_or_else(|| AuthError::UnknownProvider(provider.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AuthError::InvalidKey);
        }
        let mut record = CredentialRecord {
            priority: Some(descriptor.priority),
            ..CredentialRecord::default()
        };
        record
            .extra
            .insert(API_KEY_FIELD.to_string(), key.to_string());
        tracing::info!(provider, "api key registered");
        self.store.upsert(descriptor.name, record)
    }

    fn descriptor_name(&self, provider: &str) -> Result<&'static str, AuthError> {
        self.registry
            .lookup(provider)
            .map(|descriptor| descriptor.name)
            .ok_or_else(|| AuthError::UnknownProvider(provider.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileCredentialStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_manager() -> (TempDir, CredentialManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().join("services.json")));
        (dir, CredentialManager::new(store))
    }

    #[test]
    fn unknown_provider_is_rejected_everywhere() {
        let (_dir, manager) = temp_manager();
        assert!(matches!(
            manager.status("nosuch"),
            Err(AuthError::UnknownProvider(_))
        ));
        assert!(matches!(
            manager.token("nosuch"),
            Err(AuthError::UnknownProvider(_))
        ));
        assert!(matches!(
            manager.revoke("nosuch"),
            Err(AuthError::UnknownProvider(_))
        ));
        assert!(matches!(
            manager.set_key("nosuch", "key"),
            Err(AuthError::UnknownProvider(_))
        ));
    }

    #[tokio::test]
    async fn authorize_rejects_static_key_providers() {
        let (_dir, manager) = temp_manager();
        let err = manager
            .authorize("mdblist", |_, _| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unsupported(_)));
    }

    #[test]
    fn set_key_trims_and_stores() {
        let (_dir, manager) = temp_manager();
        manager.set_key("mdblist", "  key-123  ").unwrap();
        assert!(manager.status("mdblist").unwrap());
        assert_eq!(manager.token("mdblist").unwrap().as_deref(), Some("key-123"));
    }

    #[test]
    fn set_key_rejects_blank_input() {
        let (_dir, manager) = temp_manager();
        assert!(matches!(
            manager.set_key("mdblist", "   "),
            Err(AuthError::InvalidKey)
        ));
        assert!(!manager.status("mdblist").unwrap());
    }

    #[test]
    fn set_key_replaces_previous_record() {
        let (_dir, manager) = temp_manager();
        manager.set_key("premiumize", "old-key").unwrap();
        manager.set_key("premiumize", "new-key").unwrap();
        assert_eq!(
            manager.token("premiumize").unwrap().as_deref(),
            Some("new-key")
        );
    }

    #[test]
    fn revoke_reports_whether_credential_existed() {
        let (_dir, manager) = temp_manager();
        manager.set_key("mdblist", "key-123").unwrap();
        assert!(manager.revoke("mdblist").unwrap());
        assert!(!manager.revoke("mdblist").unwrap());
        assert!(!manager.status("mdblist").unwrap());
    }

    #[test]
    fn statuses_cover_every_registered_provider() {
        let (_dir, manager) = temp_manager();
        manager.set_key("mdblist", "key-123").unwrap();
        let statuses = manager.statuses();
        assert_eq!(statuses.len(), 4);
        let mdblist = statuses.iter().find(|s| s.name == "mdblist").unwrap();
        assert!(mdblist.connected);
        let trakt = statuses.iter().find(|s| s.name == "trakt").unwrap();
        assert!(!trakt.connected);
        let real_debrid = statuses.iter().find(|s| s.name == "real_debrid").unwrap();
        assert_eq!(real_debrid.priority, 90);
    }

    #[test]
    fn device_provider_key_registration_is_permitted() {
        // An out-of-band key for a device provider is unusual but valid;
        // bearer_secret falls back to it when no token exists.
        let (_dir, manager) = temp_manager();
        manager.set_key("real_debrid", "manual-key").unwrap();
        assert_eq!(
            manager.token("real_debrid").unwrap().as_deref(),
            Some("manual-key")
        );
    }
}
