//! Dashboard view model and the loop that keeps it fresh.

mod sync;
mod view;

pub use sync::{DashboardNotice, DashboardSync, RefreshOutcome, SyncError};
pub use view::DashboardViewModel;
