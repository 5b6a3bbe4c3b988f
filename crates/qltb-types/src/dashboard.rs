//! Dashboard records: notifications, upcoming returns and the borrowing summary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Notification type tag. Unknown tags are read as [`NotificationKind::System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequestSubmitted,
    RequestApproved,
    RequestRejected,
    ReturnReminder,
    #[default]
    #[serde(other)]
    System,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::RequestSubmitted => "request_submitted",
            NotificationKind::RequestApproved => "request_approved",
            NotificationKind::RequestRejected => "request_rejected",
            NotificationKind::ReturnReminder => "return_reminder",
            NotificationKind::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A borrowed item that is due back.
///
/// `is_overdue` is derived: the service may send one, but the client
/// recomputes it with [`mark_overdue`] after every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingReturn {
    #[serde(alias = "_id")]
    pub id: String,
    pub equipment_name: String,
    #[serde(rename = "returnDate", deserialize_with = "due_date::deserialize")]
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub is_overdue: bool,
}

impl UpcomingReturn {
    /// True iff the due date is strictly before `now`.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now
    }
}

/// Recomputes every overdue flag against `now`.
pub fn mark_overdue(returns: &mut [UpcomingReturn], now: DateTime<Utc>) {
    for item in returns {
        item.is_overdue = item.is_overdue_at(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BorrowingSummary {
    pub pending: u32,
    pub active: u32,
    pub overdue: u32,
    pub total: u32,
}

mod due_date {
    //! Due dates arrive either as RFC 3339 timestamps or bare `YYYY-MM-DD` dates.

    use super::{DateTime, Deserialize, NaiveDate, Utc};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid due date: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
