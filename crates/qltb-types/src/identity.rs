//! Authenticated user identity.
//!
//! An [`Identity`] can only be built from a [`WireUser`] through
//! [`Identity::try_from`], which rejects records without a recognized role.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::WireUser;

/// Role of an authenticated user. Exactly two are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }

    /// Landing page for this role after a successful login or registration.
    pub fn home(self) -> Redirect {
        match self {
            Role::Admin => Redirect::AdminHome,
            Role::Student => Redirect::StudentHome,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            "" => Err(IdentityError::MissingRole),
            other => Err(IdentityError::UnknownRole(other.to_string())),
        }
    }
}

/// Role-dependent redirect target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    AdminHome,
    StudentHome,
}

impl Redirect {
    pub fn path(self) -> &'static str {
        match self {
            Redirect::AdminHome => "/admin",
            Redirect::StudentHome => "/student/dashboard",
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Reasons a user record is rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("user record has no role")]
    MissingRole,
    #[error("user role '{0}' is not recognized")]
    UnknownRole(String),
    #[error("user record has no {0}")]
    MissingField(&'static str),
    #[error("malformed user record: {0}")]
    Malformed(String),
}

impl IdentityError {
    /// True when the record was rejected because of its role.
    pub fn is_role_error(&self) -> bool {
        matches!(self, IdentityError::MissingRole | IdentityError::UnknownRole(_))
    }
}

/// The authenticated user's profile and role.
///
/// Serializes in the same camelCase shape the identity service uses, so a
/// persisted identity is read back through the same validation as a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,
    #[serde(rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Parses and validates a JSON-encoded user record.
    ///
    /// # Errors
    /// Returns [`IdentityError::Malformed`] for unparsable JSON, or the
    /// validation error from [`Identity::try_from`].
    pub fn from_json(raw: &str) -> Result<Self, IdentityError> {
        let wire: WireUser =
            serde_json::from_str(raw).map_err(|e| IdentityError::Malformed(e.to_string()))?;
        Identity::try_from(wire)
    }

    /// Serializes the identity for durable storage.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TryFrom<WireUser> for Identity {
    type Error = IdentityError;

    fn try_from(wire: WireUser) -> Result<Self, Self::Error> {
        let role: Role = wire
            .role
            .as_deref()
            .ok_or(IdentityError::MissingRole)?
            .parse()?;

        Ok(Identity {
            id: required(wire.id, "id")?,
            full_name: required(wire.full_name, "fullName")?,
            email: required(wire.email, "email")?,
            role,
            student_id: non_blank(wire.student_id),
            phone: non_blank(wire.phone),
            faculty: non_blank(wire.faculty),
            class_name: non_blank(wire.class_name),
            is_active: wire.is_active.unwrap_or(true),
            created_at: wire.created_at.as_deref().and_then(parse_timestamp),
            updated_at: wire.updated_at.as_deref().and_then(parse_timestamp),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, IdentityError> {
    non_blank(value).ok_or(IdentityError::MissingField(field))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
