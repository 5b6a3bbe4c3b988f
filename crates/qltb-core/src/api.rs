//! HTTP client for the equipment-lending service.
//!
//! Every call resolves to either a parsed envelope or an [`ApiError`] that
//! says whether a response was received at all. Callers decide what the
//! status codes mean.

use std::time::Duration;

use anyhow::{Context, Result};
use qltb_types::wire::{
    ErrorBody, LoginEnvelope, LoginRequest, NotificationsEnvelope, RegisterEnvelope,
    RegisterRequest, SummaryEnvelope, UpcomingReturnsEnvelope,
};
use qltb_types::{BorrowingSummary, Credential, Notification, UpcomingReturn};
use serde::de::DeserializeOwned;

use crate::config::Config;

/// User-Agent header for all requests.
pub const USER_AGENT: &str = concat!("qltb/", env!("CARGO_PKG_VERSION"));

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const NOTIFICATIONS_PATH: &str = "/api/notifications";
pub const UPCOMING_RETURNS_PATH: &str = "/api/upcoming-returns";
pub const BORROWING_SUMMARY_PATH: &str = "/api/borrowing-summary";

/// Outcome of a request that did not yield the expected payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// A response arrived with a non-2xx status.
    #[error("HTTP {status}")]
    Status {
        status: u16,
        message: Option<String>,
        error: Option<String>,
    },
    /// No response was received (connection refused, DNS, timeout...).
    #[error("transport error: {0}")]
    Transport(String),
    /// A 2xx response whose body is not the expected JSON shape.
    #[error("failed to parse response: {0}")]
    Parse(String),
    /// A 2xx response that reported `success: false` or omitted its payload.
    #[error("request rejected: {}", .0.as_deref().unwrap_or("no data"))]
    Rejected(Option<String>),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided `message`, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } | ApiError::Rejected(message) => message.as_deref(),
            _ => None,
        }
    }
}

/// Client for the service's JSON API.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a client for `base_url` (no trailing slash).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Creates a client from the effective config values.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.effective_base_url()?, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /api/auth/login`.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn login(&self, request: &LoginRequest<'_>) -> Result<LoginEnvelope, ApiError> {
        let builder = self.http.post(self.url(LOGIN_PATH)).json(request);
        send_json(builder).await
    }

    /// `POST /api/auth/register`.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterEnvelope, ApiError> {
        let builder = self.http.post(self.url(REGISTER_PATH)).json(request);
        send_json(builder).await
    }

    /// `GET /api/notifications`.
    ///
    /// # Errors
    /// See [`ApiError`]; `success: false` or a missing `data` is `Rejected`.
    pub async fn notifications(&self, token: &Credential) -> Result<Vec<Notification>, ApiError> {
        let envelope: NotificationsEnvelope = self.get_authorized(NOTIFICATIONS_PATH, token).await?;
        match envelope.data {
            Some(data) if envelope.success => Ok(data),
            _ => Err(ApiError::Rejected(envelope.message)),
        }
    }

    /// `GET /api/upcoming-returns`.
    ///
    /// # Errors
    /// See [`ApiError`]; `success: false` or a missing list is `Rejected`.
    pub async fn upcoming_returns(
        &self,
        token: &Credential,
    ) -> Result<Vec<UpcomingReturn>, ApiError> {
        let envelope: UpcomingReturnsEnvelope =
            self.get_authorized(UPCOMING_RETURNS_PATH, token).await?;
        match envelope.upcoming_returns {
            Some(returns) if envelope.success => Ok(returns),
            _ => Err(ApiError::Rejected(envelope.message)),
        }
    }

    /// `GET /api/borrowing-summary`.
    ///
    /// # Errors
    /// See [`ApiError`]; `success: false` or a missing summary is `Rejected`.
    pub async fn borrowing_summary(&self, token: &Credential) -> Result<BorrowingSummary, ApiError> {
        let envelope: SummaryEnvelope = self.get_authorized(BORROWING_SUMMARY_PATH, token).await?;
        match envelope.summary {
            Some(summary) if envelope.success => Ok(summary),
            _ => Err(ApiError::Rejected(envelope.message)),
        }
    }

    async fn get_authorized<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &Credential,
    ) -> Result<T, ApiError> {
        let builder = self.http.get(self.url(path)).bearer_auth(token.expose());
        send_json(builder).await
    }
}

async fn send_json<T: DeserializeOwned>(builder: reqwest::RequestBuilder) -> Result<T, ApiError> {
    let response = builder
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    if !status.is_success() {
        let ErrorBody { message, error } = ErrorBody::parse(&body);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
            error,
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
}
