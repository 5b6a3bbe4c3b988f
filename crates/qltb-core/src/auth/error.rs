//! Authentication error taxonomy and classification of service failures.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use qltb_types::IdentityError;

use crate::api::ApiError;

/// Fixed cool-down after the service rate-limits a submit.
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

pub fn rate_limit_cooldown() -> Duration {
    Duration::from_secs(RATE_LIMIT_COOLDOWN_SECS)
}

const INVALID_CREDENTIALS_MESSAGE: &str = "Email or password is incorrect";
const PASSWORD_MISMATCH_MESSAGE: &str = "Password confirmation does not match";
const RATE_LIMITED_FALLBACK: &str =
    "Too many login attempts. Please wait one minute and try again.";
const LOGIN_FALLBACK: &str = "Login failed";
const AUTH_SERVICE_FALLBACK: &str = "Something went wrong while signing in";
const REGISTRATION_FALLBACK: &str = "Registration failed";

/// Form inputs an error can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    FullName,
    Email,
    Password,
    ConfirmPassword,
    StudentId,
    Phone,
    Faculty,
    ClassName,
}

impl FormField {
    pub fn name(self) -> &'static str {
        match self {
            FormField::FullName => "fullName",
            FormField::Email => "email",
            FormField::Password => "password",
            FormField::ConfirmPassword => "confirmPassword",
            FormField::StudentId => "studentId",
            FormField::Phone => "phone",
            FormField::Faculty => "faculty",
            FormField::ClassName => "class",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user-facing message attached to one form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every way a login or registration can fail.
///
/// Returned to the caller as a value; nothing here is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// HTTP 401. Presented on the password field only.
    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials { server_message: Option<String> },

    /// The service returned a user without a recognized role.
    #[error("{0}")]
    InvalidRole(IdentityError),

    /// Registration confirmation differs from the password.
    #[error("{}", PASSWORD_MISMATCH_MESSAGE)]
    PasswordMismatch,

    /// HTTP 429. Submitting stays disabled until `retry_after`.
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: DateTime<Utc>,
    },

    /// Any other unsuccessful login response.
    #[error("{message}")]
    AuthService { status: Option<u16>, message: String },

    /// No response was received.
    #[error("could not reach the service: {0}")]
    Transport(String),

    /// Any other unsuccessful registration response.
    #[error("{0}")]
    Registration(String),

    /// A successful response that does not convert into a valid session.
    #[error("unexpected response from the service: {0}")]
    MalformedResponse(String),

    /// A local form rule failed; the service was not contacted.
    #[error("{0}")]
    Validation(FieldError),

    /// A submit was attempted during the rate-limit cool-down.
    #[error("submitting is disabled until {retry_after}")]
    SubmitDisabled { retry_after: DateTime<Utc> },

    /// A login or registration was submitted over a signed-in session.
    #[error("already signed in; sign out first")]
    AlreadySignedIn,

    /// The session could not be written to durable storage.
    #[error("could not save the session: {0}")]
    Storage(String),
}

impl AuthError {
    /// Field-level presentation, when the error belongs on an input.
    ///
    /// Errors without one are shown as a global notice.
    pub fn field_error(&self) -> Option<FieldError> {
        match self {
            AuthError::InvalidCredentials { .. } => Some(FieldError::new(
                FormField::Password,
                INVALID_CREDENTIALS_MESSAGE,
            )),
            AuthError::PasswordMismatch => Some(FieldError::new(
                FormField::ConfirmPassword,
                PASSWORD_MISMATCH_MESSAGE,
            )),
            AuthError::Validation(field_error) => Some(field_error.clone()),
            _ => None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.field_error().is_none()
    }

    /// When submitting re-enables, for rate-limit related errors.
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        match self {
            AuthError::RateLimited { retry_after, .. }
            | AuthError::SubmitDisabled { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        if err.is_role_error() {
            AuthError::InvalidRole(err)
        } else {
            AuthError::MalformedResponse(err.to_string())
        }
    }
}

fn non_blank(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}

fn retry_after_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + TimeDelta::seconds(RATE_LIMIT_COOLDOWN_SECS as i64)
}

fn rate_limited(message: Option<String>, error: Option<String>, now: DateTime<Utc>) -> AuthError {
    AuthError::RateLimited {
        message: non_blank(error)
            .or_else(|| non_blank(message))
            .unwrap_or_else(|| RATE_LIMITED_FALLBACK.to_string()),
        retry_after: retry_after_from(now),
    }
}

/// Maps a failed login call onto the taxonomy.
pub(crate) fn classify_login_failure(err: ApiError, now: DateTime<Utc>) -> AuthError {
    match err {
        ApiError::Status {
            status: 401,
            message,
            ..
        } => AuthError::InvalidCredentials {
            server_message: non_blank(message),
        },
        ApiError::Status {
            status: 429,
            message,
            error,
        } => rate_limited(message, error, now),
        ApiError::Status {
            status, message, ..
        } => AuthError::AuthService {
            status: Some(status),
            message: non_blank(message).unwrap_or_else(|| AUTH_SERVICE_FALLBACK.to_string()),
        },
        ApiError::Transport(reason) => AuthError::Transport(reason),
        ApiError::Parse(reason) => AuthError::MalformedResponse(reason),
        ApiError::Rejected(message) => login_rejected(message),
    }
}

/// Maps a failed registration call onto the taxonomy.
pub(crate) fn classify_registration_failure(err: ApiError, now: DateTime<Utc>) -> AuthError {
    match err {
        ApiError::Status {
            status: 429,
            message,
            error,
        } => rate_limited(message, error, now),
        ApiError::Status { message, .. } | ApiError::Rejected(message) => {
            registration_rejected(message)
        }
        ApiError::Transport(reason) => AuthError::Transport(reason),
        ApiError::Parse(reason) => AuthError::MalformedResponse(reason),
    }
}

/// A 2xx login response that did not report success.
pub(crate) fn login_rejected(message: Option<String>) -> AuthError {
    AuthError::AuthService {
        status: None,
        message: non_blank(message).unwrap_or_else(|| LOGIN_FALLBACK.to_string()),
    }
}

/// A registration the service did not accept.
pub(crate) fn registration_rejected(message: Option<String>) -> AuthError {
    AuthError::Registration(
        non_blank(message).unwrap_or_else(|| REGISTRATION_FALLBACK.to_string()),
    )
}
