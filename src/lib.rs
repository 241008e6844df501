//! Credential acquisition for streaming service providers.
//!
//! Implements the OAuth 2.0 Device Authorization Grant for providers that
//! support it (Real-Debrid, Trakt) and static API key registration for the
//! rest (MDBList, Premiumize). Credentials persist in a single JSON
//! services document shared by all providers.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use wizard_auth::{CredentialManager, FileCredentialStore};
//!
//! # async fn example() -> Result<(), wizard_auth::AuthError> {
//! let store = Arc::new(FileCredentialStore::new_default());
//! let manager = CredentialManager::new(store);
//! manager
//!     .authorize(
//!         "trakt",
//!         |code, url| println!("visit {url} and enter {code}"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod descriptor;
pub mod device_flow;
pub mod error;
pub mod manager;
pub mod store;

pub use credentials::{CredentialRecord, API_KEY_FIELD};
pub use descriptor::{
    AuthMethod, DeviceFlowConfig, PendingSignal, ProviderDescriptor, ProviderRegistry,
    RequestEncoding,
};
pub use device_flow::{AuthorizationSession, DeviceFlowPoller, PollOutcome, SessionState};
pub use error::AuthError;
pub use manager::{CredentialManager, ProviderStatus};
pub use store::{CredentialStore, FileCredentialStore};
