use qltb_types::{Credential, Identity};

use super::error::AuthError;

/// Coarse lifecycle stage of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Anonymous => "anonymous",
            SessionStatus::Authenticating => "authenticating",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Error => "error",
        }
    }
}

/// The client's view of who is signed in.
///
/// Identity and credential only exist together, in `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated {
        identity: Identity,
        credential: Credential,
    },
    /// The last attempt failed; no identity is held.
    Error(AuthError),
}

impl Session {
    pub fn authenticated(identity: Identity, credential: Credential) -> Self {
        Session::Authenticated {
            identity,
            credential,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Anonymous => SessionStatus::Anonymous,
            Session::Authenticating => SessionStatus::Authenticating,
            Session::Authenticated { .. } => SessionStatus::Authenticated,
            Session::Error(_) => SessionStatus::Error,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Authenticated { credential, .. } => Some(credential),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AuthError> {
        match self {
            Session::Error(err) => Some(err),
            _ => None,
        }
    }
}
