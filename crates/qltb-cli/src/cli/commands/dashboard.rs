//! Dashboard command handlers.

use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, Local, Utc};
use qltb_core::api::ApiClient;
use qltb_core::dashboard::{DashboardSync, DashboardViewModel, RefreshOutcome};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::auth::session_manager;

const NOT_LOGGED_IN: &str = "Not logged in. Run `qltb login` first.";

fn local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn render(view: &DashboardViewModel) {
    match view.refreshed_at {
        Some(at) => println!("Dashboard (refreshed {})", local(at)),
        None => println!("Dashboard"),
    }

    if let Some(summary) = view.summary {
        println!(
            "Borrowing: {} pending, {} active, {} overdue, {} total",
            summary.pending, summary.active, summary.overdue, summary.total
        );
    }

    println!();
    println!("Notifications ({} unread)", view.unread_count());
    if view.notifications.is_empty() {
        println!("  (none)");
    }
    for notification in &view.notifications {
        let marker = if notification.read { " " } else { "*" };
        println!(
            "  {marker} [{}] {}: {}",
            notification.kind.as_str(),
            notification.title,
            notification.body
        );
    }

    println!();
    println!("Upcoming returns ({} overdue)", view.overdue_count());
    if view.upcoming_returns.is_empty() {
        println!("  (none)");
    }
    for item in &view.upcoming_returns {
        let status = if item.is_overdue { "  OVERDUE" } else { "" };
        println!(
            "  {}  due {}{status}",
            item.equipment_name,
            item.due_date.with_timezone(&Local).format("%Y-%m-%d")
        );
    }
}

/// One refresh cycle, printed.
pub async fn show(api: ApiClient) -> Result<()> {
    let manager = session_manager(api.clone());
    if !manager.session().is_authenticated() {
        bail!(NOT_LOGGED_IN);
    }

    let sync = DashboardSync::new(api, manager.subscribe(), Duration::from_secs(60));
    let mut notices = sync.subscribe_notices();
    match sync.refresh_now().await? {
        RefreshOutcome::Committed => {
            render(&sync.snapshot());
            Ok(())
        }
        RefreshOutcome::AllFailed => match notices.try_recv() {
            Ok(notice) => bail!("error: {}", notice.message()),
            Err(_) => bail!("error: Could not load dashboard data"),
        },
        RefreshOutcome::Discarded => bail!(NOT_LOGGED_IN),
    }
}

/// Refreshes on the interval until Ctrl-C.
pub async fn watch(api: ApiClient, interval: Duration) -> Result<()> {
    let manager = session_manager(api.clone());
    if !manager.session().is_authenticated() {
        bail!(NOT_LOGGED_IN);
    }

    let mut sync = DashboardSync::new(api, manager.subscribe(), interval);
    let mut view = sync.view();
    let mut notices = sync.subscribe_notices();
    let shutdown = CancellationToken::new();

    let follower = sync.follow(shutdown.clone());
    tokio::pin!(follower);

    loop {
        tokio::select! {
            () = &mut follower => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                if !snapshot.is_empty() {
                    println!();
                    render(&snapshot);
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => eprintln!("error: {}", notice.message()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "dropped dashboard notices");
                }
                Err(RecvError::Closed) => break,
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                }
                shutdown.cancel();
            }
        }
    }

    // Keep the session sender alive until the follower is done.
    drop(manager);
    Ok(())
}
