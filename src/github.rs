//! GitHub implementation of the device-flow transport.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::error::AuthError;
use crate::session::{DeviceSession, PollSignal};
use crate::transport::DeviceFlowTransport;

const DEFAULT_CLIENT_ID: &str = "Ov23li9bxz3kKfPOIsGm";
const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const DEFAULT_SCOPES: &str = "user:email repo";

/// GitHub device-code transport.
///
/// Talks to the two endpoints of the device authorization grant. Endpoint
/// and client-id overrides exist for tests and GitHub Enterprise hosts.
///
/// # Example
/// ```no_run
/// use kanri::github::GitHubDeviceFlow;
///
/// let transport = GitHubDeviceFlow::from_env();
/// ```
pub struct GitHubDeviceFlow {
    client: reqwest::Client,
    client_id: String,
    device_code_url: String,
    access_token_url: String,
    scopes: String,
}

impl GitHubDeviceFlow {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
        }
    }

    /// Build from the environment: `GITHUB_CLIENT_ID` overrides the built-in
    /// OAuth app id. Loads `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let client_id =
            std::env::var("GITHUB_CLIENT_ID").unwrap_or_else(|_| DEFAULT_CLIENT_ID.to_string());
        Self::new(client_id)
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }

    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }
}

#[async_trait]
impl DeviceFlowTransport for GitHubDeviceFlow {
    async fn start_device_flow(&self) -> Result<DeviceSession, AuthError> {
        let resp = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scopes.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Device code request failed with status {}",
                resp.status()
            )));
        }
        let body = resp.text().await?;
        let payload: GitHubDeviceCodeResponse = serde_json::from_str(&body)?;
        let expires_at = Utc::now() + Duration::seconds(payload.expires_in as i64);
        Ok(DeviceSession {
            verification_uri: payload.verification_uri,
            user_code: payload.user_code,
            device_code: payload.device_code,
            // RFC 8628 says a missing interval means 5; GitHub always sends
            // one, but never let a zero produce a busy poll loop.
            interval_secs: payload.interval.max(1),
            expires_at,
        })
    }

    async fn poll_device_flow(&self, session: &DeviceSession) -> Result<PollSignal, AuthError> {
        if Utc::now() >= session.expires_at {
            return Ok(PollSignal::Expired);
        }
        let resp = self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", session.device_code.as_str()),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            // A status-level failure is a transport failure, not a protocol
            // outcome. RFC 8628 servers may still carry an error token in the
            // body, so keep it in the message for the outcome table.
            let status = resp.status();
            let body = resp.text().await.unwrap_or_else(|_| String::new());
            return Err(AuthError::Network(format!(
                "Device token request failed with status {status}: {body}"
            )));
        }
        let body = resp.text().await?;
        let payload: GitHubDeviceTokenResponse = serde_json::from_str(&body)?;
        if payload.access_token.is_some() {
            return Ok(PollSignal::Authorized);
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Ok(PollSignal::Pending),
            Some("slow_down") => Ok(PollSignal::SlowDown),
            Some("access_denied") => Ok(PollSignal::Denied),
            Some("expired_token") => Ok(PollSignal::Expired),
            // The raw token is kept in the message so the outcome table can
            // still substring-match it.
            Some(other) => Err(AuthError::InvalidResponse(format!(
                "Device code error: {other}"
            ))),
            None => Err(AuthError::InvalidResponse(
                "Device code response missing token and error".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubDeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct GitHubDeviceTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}
