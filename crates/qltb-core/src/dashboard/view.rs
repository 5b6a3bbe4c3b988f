use chrono::{DateTime, Utc};
use qltb_types::dashboard::mark_overdue;
use qltb_types::{BorrowingSummary, Notification, UpcomingReturn};

use crate::api::ApiError;

/// What the dashboard shows. Only the sync loop writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardViewModel {
    pub notifications: Vec<Notification>,
    pub upcoming_returns: Vec<UpcomingReturn>,
    pub summary: Option<BorrowingSummary>,
    /// Time of the last committed refresh; `None` until one succeeds.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DashboardViewModel {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn overdue_count(&self) -> usize {
        self.upcoming_returns.iter().filter(|r| r.is_overdue).count()
    }

    pub fn is_empty(&self) -> bool {
        self.refreshed_at.is_none()
            && self.notifications.is_empty()
            && self.upcoming_returns.is_empty()
            && self.summary.is_none()
    }
}

/// The three endpoint results of one refresh cycle.
#[derive(Debug)]
pub(crate) struct CycleResults {
    pub notifications: Result<Vec<Notification>, ApiError>,
    pub upcoming_returns: Result<Vec<UpcomingReturn>, ApiError>,
    pub summary: Result<BorrowingSummary, ApiError>,
}

impl CycleResults {
    pub fn all_failed(&self) -> bool {
        self.notifications.is_err() && self.upcoming_returns.is_err() && self.summary.is_err()
    }

    /// Logs each failed endpoint.
    pub fn log_failures(&self) {
        if let Err(e) = &self.notifications {
            tracing::warn!(endpoint = "notifications", error = %e, "dashboard fetch failed");
        }
        if let Err(e) = &self.upcoming_returns {
            tracing::warn!(endpoint = "upcoming-returns", error = %e, "dashboard fetch failed");
        }
        if let Err(e) = &self.summary {
            tracing::warn!(endpoint = "borrowing-summary", error = %e, "dashboard fetch failed");
        }
    }
}

/// Builds the next view: sections that loaded replace the old ones, failed
/// sections keep their previous value, and overdue flags are recomputed.
pub(crate) fn merge(
    previous: &DashboardViewModel,
    results: CycleResults,
    now: DateTime<Utc>,
) -> DashboardViewModel {
    let mut next = previous.clone();
    if let Ok(notifications) = results.notifications {
        next.notifications = notifications;
    }
    if let Ok(upcoming_returns) = results.upcoming_returns {
        next.upcoming_returns = upcoming_returns;
    }
    if let Ok(summary) = results.summary {
        next.summary = Some(summary);
    }
    mark_overdue(&mut next.upcoming_returns, now);
    next.refreshed_at = Some(now);
    next
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use qltb_types::NotificationKind;

    use super::*;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn notification(id: &str, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::System,
            title: "title".to_string(),
            body: "body".to_string(),
            read,
            request_id: None,
            created_at: at(2024, 1, 1),
        }
    }

    fn upcoming(id: &str, due: DateTime<Utc>) -> UpcomingReturn {
        UpcomingReturn {
            id: id.to_string(),
            equipment_name: "Camera".to_string(),
            due_date: due,
            is_overdue: false,
        }
    }

    fn summary(total: u32) -> BorrowingSummary {
        BorrowingSummary {
            total,
            ..BorrowingSummary::default()
        }
    }

    fn failed() -> ApiError {
        ApiError::Status {
            status: 500,
            message: None,
            error: None,
        }
    }

    fn previous() -> DashboardViewModel {
        DashboardViewModel {
            notifications: vec![notification("old", false)],
            upcoming_returns: vec![upcoming("r-old", at(2024, 3, 1))],
            summary: Some(summary(1)),
            refreshed_at: Some(at(2024, 1, 15)),
        }
    }

    #[test]
    fn test_failed_section_keeps_previous_value() {
        let results = CycleResults {
            notifications: Ok(vec![notification("new", true)]),
            upcoming_returns: Err(failed()),
            summary: Ok(summary(7)),
        };
        assert!(!results.all_failed());

        let next = merge(&previous(), results, at(2024, 2, 1));
        assert_eq!(next.notifications[0].id, "new");
        assert_eq!(next.upcoming_returns[0].id, "r-old");
        assert_eq!(next.summary, Some(summary(7)));
        assert_eq!(next.refreshed_at, Some(at(2024, 2, 1)));
    }

    #[test]
    fn test_overdue_recomputed_even_for_stale_section() {
        let results = CycleResults {
            notifications: Err(failed()),
            upcoming_returns: Err(failed()),
            summary: Ok(summary(2)),
        };
        let next = merge(&previous(), results, at(2024, 4, 1));
        assert!(next.upcoming_returns[0].is_overdue);
    }

    #[test]
    fn test_overdue_against_now() {
        let results = || CycleResults {
            notifications: Ok(Vec::new()),
            upcoming_returns: Ok(vec![upcoming("r1", at(2024, 1, 1))]),
            summary: Ok(summary(1)),
        };

        let later = merge(&DashboardViewModel::default(), results(), at(2024, 2, 1));
        assert!(later.upcoming_returns[0].is_overdue);
        assert_eq!(later.overdue_count(), 1);

        let earlier = merge(&DashboardViewModel::default(), results(), at(2023, 12, 1));
        assert!(!earlier.upcoming_returns[0].is_overdue);
    }

    #[test]
    fn test_all_failed() {
        let results = CycleResults {
            notifications: Err(failed()),
            upcoming_returns: Err(ApiError::Transport("refused".to_string())),
            summary: Err(ApiError::Rejected(None)),
        };
        assert!(results.all_failed());
    }

    #[test]
    fn test_unread_count() {
        let view = DashboardViewModel {
            notifications: vec![
                notification("a", false),
                notification("b", true),
                notification("c", false),
            ],
            ..DashboardViewModel::default()
        };
        assert_eq!(view.unread_count(), 2);
        assert!(!view.is_empty());
        assert!(DashboardViewModel::default().is_empty());
    }
}
