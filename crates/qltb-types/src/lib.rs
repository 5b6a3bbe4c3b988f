//! Shared records for the QLTB equipment-lending client.
//!
//! Everything the remote service sends is loosely shaped; the `wire` module
//! mirrors those shapes and the other modules hold the strict records the
//! rest of the client works with.

pub mod credential;
pub mod dashboard;
pub mod identity;
pub mod wire;

pub use credential::Credential;
pub use dashboard::{BorrowingSummary, Notification, NotificationKind, UpcomingReturn};
pub use identity::{Identity, IdentityError, Redirect, Role};
