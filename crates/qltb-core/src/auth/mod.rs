//! Session lifecycle: login, registration, logout and restoration.
//!
//! [`SessionManager`] owns the current [`Session`] and publishes every
//! transition on a watch channel, so other components (the dashboard loop)
//! react to sign-in and sign-out without sharing mutable state.

pub mod error;
pub mod form;
pub mod manager;
pub mod session;
pub mod store;

pub use error::{AuthError, FieldError, FormField, RATE_LIMIT_COOLDOWN_SECS};
pub use form::RegistrationProfile;
pub use manager::{AuthSuccess, SessionManager};
pub use session::{Session, SessionStatus};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
