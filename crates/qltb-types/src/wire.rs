//! Request and response shapes of the remote identity/equipment service.
//!
//! These mirror what the service sends, with every field optional where the
//! service is inconsistent. Convert into the strict records before use.

use serde::{Deserialize, Serialize};

use crate::dashboard::{BorrowingSummary, Notification, UpcomingReturn};

/// User record as sent by the service, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub student_id: Option<String>,
    pub phone: Option<String>,
    pub faculty: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// `data` member of login and registration responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthPayload {
    pub user: Option<WireUser>,
    pub token: Option<String>,
}

impl AuthPayload {
    /// Returns the user and token when both are present.
    pub fn into_parts(self) -> Option<(WireUser, String)> {
        Some((self.user?, self.token?))
    }
}

/// `POST /api/auth/login` response: `{status, message, data}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginEnvelope {
    pub status: Option<String>,
    pub message: Option<String>,
    pub data: Option<AuthPayload>,
}

impl LoginEnvelope {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

/// `POST /api/auth/register` response: `{success, message, data}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterEnvelope {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<AuthPayload>,
}

/// `GET /api/notifications` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsEnvelope {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<Vec<Notification>>,
}

/// `GET /api/upcoming-returns` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingReturnsEnvelope {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub upcoming_returns: Option<Vec<UpcomingReturn>>,
}

/// `GET /api/borrowing-summary` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryEnvelope {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub summary: Option<BorrowingSummary>,
}

/// Error body of a non-2xx response. Rate-limit responses use `error`,
/// everything else uses `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,
    #[serde(rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}
