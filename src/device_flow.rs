//! Two-phase OAuth device-grant execution.
//!
//! Phase one requests a device/user code pair; phase two polls the token
//! endpoint at the provider-suggested interval until the user approves, the
//! code expires, or the caller cancels. All provider differences (encoding,
//! pending signal, grant marker) come from the [`DeviceFlowConfig`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialRecord;
use crate::descriptor::{DeviceFlowConfig, RequestEncoding};
use crate::error::AuthError;

const DEFAULT_EXPIRES_IN_SECS: u64 = 600;
const DEFAULT_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one in-flight authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Requesting,
    AwaitingUser,
    Polling,
    Succeeded,
    Expired,
    Cancelled,
    Failed,
}

/// Ephemeral device-code session for one authorize call. Never persisted;
/// discarded on any terminal state.
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub expires_at: DateTime<Utc>,
    pub poll_interval: Duration,
    pub state: SessionState,
}

impl AuthorizationSession {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Outcome of a single poll attempt.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Pending,
    SlowDown,
    Authorized(CredentialRecord),
    Expired,
}

/// Executes the device-grant protocol for any descriptor-described provider.
///
/// Holds no UI dependency: the caller supplies an `on_code_ready` side
/// effect for presenting the user code, and a [`CancellationToken`] it can
/// trip at any time. Cancellation takes effect at the next loop checkpoint,
/// at worst one HTTP round trip away.
///
/// # Example
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use wizard_auth::descriptor::trakt;
/// use wizard_auth::DeviceFlowPoller;
///
/// # async fn example() -> Result<(), wizard_auth::AuthError> {
/// let poller = DeviceFlowPoller::new();
/// let config = trakt();
/// let record = poller
///     .run(
///         config.device_config().unwrap(),
///         |code, url| println!("visit {url} and enter {code}"),
///         &CancellationToken::new(),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceFlowPoller {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl DeviceFlowPoller {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Per-call HTTP timeout, independent of the overall device-code
    /// deadline. A timed-out poll is retried, not failed.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Drive the full flow: code request, code presentation, bounded poll
    /// loop. Returns the credential material on success or a typed terminal
    /// failure; never a partial record.
    pub async fn run<F>(
        &self,
        config: &DeviceFlowConfig,
        on_code_ready: F,
        cancel: &CancellationToken,
    ) -> Result<CredentialRecord, AuthError>
    where
        F: FnOnce(&str, &str),
    {
        let mut session = self.request_device_code(config).await?;
        session.state = SessionState::AwaitingUser;
        on_code_ready(&session.user_code, &session.verification_url);

        session.state = SessionState::Polling;
        loop {
            if session.is_expired() {
                session.state = SessionState::Expired;
                return Err(AuthError::Expired);
            }
            // Cap the sleep at the remaining deadline so a slow-down never
            // pushes termination past expires_at.
            let remaining = (session.expires_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            let sleep_for = session.poll_interval.min(remaining.max(Duration::from_millis(50)));
            tokio::select! {
                _ = cancel.cancelled() => {
                    session.state = SessionState::Cancelled;
                    return Err(AuthError::Cancelled);
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }
            if cancel.is_cancelled() {
                session.state = SessionState::Cancelled;
                return Err(AuthError::Cancelled);
            }
            if session.is_expired() {
                session.state = SessionState::Expired;
                return Err(AuthError::Expired);
            }
            match self.poll_once(config, &session).await {
                Ok(PollOutcome::Authorized(record)) => {
                    session.state = SessionState::Succeeded;
                    return Ok(record);
                }
                Ok(PollOutcome::Pending) => {}
                Ok(PollOutcome::SlowDown) => {
                    session.poll_interval += Duration::from_secs(SLOW_DOWN_INCREMENT_SECS);
                    tracing::debug!(
                        interval_secs = session.poll_interval.as_secs(),
                        "provider asked to slow down"
                    );
                }
                Ok(PollOutcome::Expired) => {
                    session.state = SessionState::Expired;
                    return Err(AuthError::Expired);
                }
                Err(AuthError::Network(reason)) => {
                    // Transient inside the loop; the deadline still bounds us.
                    tracing::warn!(error = %reason, "poll attempt failed, retrying");
                }
                Err(other) => {
                    session.state = SessionState::Failed;
                    return Err(other);
                }
            }
        }
    }

    /// Phase one: obtain the device/user code pair.
    pub async fn request_device_code(
        &self,
        config: &DeviceFlowConfig,
    ) -> Result<AuthorizationSession, AuthError> {
        let mut params: Vec<(&str, &str)> = vec![("client_id", config.client_id.as_str())];
        params.extend(config.extra_code_params.iter().copied());

        let response = self
            .send(config, &config.device_code_endpoint, &params)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Protocol(format!(
                "Device code request failed with status {status}"
            )));
        }
        let body = response.text().await?;
        let payload: DeviceCodeResponse = serde_json::from_str(&body)
            .map_err(|_| AuthError::Protocol("Device code response is not valid JSON".to_string()))?;
        let device_code = payload
            .device_code
            .ok_or_else(|| AuthError::Protocol("Device code response missing device_code".to_string()))?;
        let user_code = payload
            .user_code
            .ok_or_else(|| AuthError::Protocol("Device code response missing user_code".to_string()))?;
        let verification_url = payload
            .verification_url
            .or(payload.verification_uri)
            .unwrap_or_else(|| config.default_verification_url.to_string());
        let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let interval = payload.interval.unwrap_or(DEFAULT_INTERVAL_SECS);

        tracing::info!(
            user_code = %user_code,
            expires_in_secs = expires_in,
            "device code obtained"
        );
        Ok(AuthorizationSession {
            device_code,
            user_code,
            verification_url,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in as i64),
            poll_interval: Duration::from_secs(interval),
            state: SessionState::Requesting,
        })
    }

    /// Phase two, one step: ask the token endpoint whether the user has
    /// approved, and classify the answer.
    pub async fn poll_once(
        &self,
        config: &DeviceFlowConfig,
        session: &AuthorizationSession,
    ) -> Result<PollOutcome, AuthError> {
        let mut params: Vec<(&str, &str)> = vec![
            (config.code_param, session.device_code.as_str()),
            ("client_id", config.client_id.as_str()),
        ];
        if let Some(secret) = &config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        if let Some(grant_type) = config.grant_type {
            params.push(("grant_type", grant_type));
        }

        let response = self.send(config, &config.token_endpoint, &params).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let payload: TokenResponse = serde_json::from_str(&body).unwrap_or_default();

        if (200..300).contains(&status) {
            if payload.access_token.is_some() {
                return Ok(PollOutcome::Authorized(build_record(config, payload)));
            }
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => return Ok(PollOutcome::Pending),
            Some("slow_down") => return Ok(PollOutcome::SlowDown),
            Some("expired_token") => return Ok(PollOutcome::Expired),
            _ => {}
        }
        if config.slow_down_status == Some(status) {
            return Ok(PollOutcome::SlowDown);
        }
        if config.pending_signal.matches(status, &body) {
            return Ok(PollOutcome::Pending);
        }
        Err(AuthError::Protocol(format!(
            "Token endpoint returned status {status} with an unrecognized body"
        )))
    }

    async fn send(
        &self,
        config: &DeviceFlowConfig,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, AuthError> {
        let mut request = self.client.post(url).timeout(self.request_timeout);
        request = request.header("Accept", "application/json");
        for (name, value) in &config.extra_headers {
            request = request.header(*name, *value);
        }
        request = match config.request_encoding {
            RequestEncoding::FormUrlencoded => request.form(params),
            RequestEncoding::Json => {
                let map: HashMap<&str, &str> = params.iter().copied().collect();
                request.json(&map)
            }
        };
        Ok(request.send().await?)
    }
}

impl Default for DeviceFlowPoller {
    fn default() -> Self {
        Self::new()
    }
}

fn build_record(config: &DeviceFlowConfig, payload: TokenResponse) -> CredentialRecord {
    let now = Utc::now();
    let lifetime = payload
        .expires_in
        .unwrap_or(config.default_token_lifetime_secs);
    CredentialRecord {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token,
        client_id: payload.client_id,
        client_secret: payload.client_secret,
        issued_at: Some(now),
        expires_at: Some(now + chrono::Duration::seconds(lifetime as i64)),
        priority: None,
        extra: Default::default(),
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: Option<String>,
    user_code: Option<String>,
    verification_url: Option<String>,
    verification_uri: Option<String>,
    expires_in: Option<u64>,
    interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    client_id: Option<String>,
    client_secret: Option<String>,
    error: Option<String>,
}
