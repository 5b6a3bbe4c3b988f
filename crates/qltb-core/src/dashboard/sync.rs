//! Background refresh of the dashboard while a session is authenticated.
//!
//! One loop task per [`DashboardSync::start`]. Each tick spawns a refresh
//! cycle under the loop's `CancellationToken`; a tick that fires while the
//! previous cycle is still running is skipped. A monotonic generation counter
//! is bumped on every start and stop so that ticks and cycles belonging to an
//! older loop discard themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::view::{CycleResults, DashboardViewModel, merge};
use crate::api::ApiClient;
use crate::auth::Session;

const NOTICE_CAPACITY: usize = 16;
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Failures surfaced to the caller. Partial failures stay silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardNotice {
    /// Every endpoint failed in the same cycle.
    AllEndpointsFailed { at: DateTime<Utc> },
}

impl DashboardNotice {
    pub fn message(&self) -> &'static str {
        match self {
            DashboardNotice::AllEndpointsFailed { .. } => "Could not load dashboard data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("dashboard requires an authenticated session")]
    NotAuthenticated,
}

/// How one refresh cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// At least one section loaded and the view was replaced.
    Committed,
    /// Nothing loaded; a notice was raised and the view left as it was.
    AllFailed,
    /// The session or loop changed while the cycle ran.
    Discarded,
}

struct Shared {
    api: ApiClient,
    session: watch::Receiver<Session>,
    view: watch::Sender<DashboardViewModel>,
    notices: broadcast::Sender<DashboardNotice>,
    generation: AtomicU64,
}

impl Shared {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn clear_view(&self) {
        self.view.send_if_modified(|view| {
            if view.is_empty() {
                return false;
            }
            *view = DashboardViewModel::default();
            true
        });
    }

    async fn refresh_cycle(&self, generation: u64) -> RefreshOutcome {
        // Marks the current session as seen; any transition after this point
        // shows up in `has_changed`.
        let mut observer = self.session.clone();
        let snapshot = {
            let session = observer.borrow_and_update();
            session
                .credential()
                .cloned()
                .zip(session.identity().map(|identity| identity.id.clone()))
        };
        let Some((credential, owner)) = snapshot else {
            tracing::debug!("no authenticated session, skipping refresh");
            self.clear_view();
            return RefreshOutcome::Discarded;
        };

        let (notifications, upcoming_returns, summary) = tokio::join!(
            self.api.notifications(&credential),
            self.api.upcoming_returns(&credential),
            self.api.borrowing_summary(&credential),
        );
        let results = CycleResults {
            notifications,
            upcoming_returns,
            summary,
        };

        let transitioned = observer.has_changed().unwrap_or(false);
        let same_session = {
            let session = observer.borrow();
            session.credential() == Some(&credential)
                && session.identity().is_some_and(|identity| identity.id == owner)
        };
        if transitioned || !same_session {
            tracing::debug!("session changed during refresh, discarding results");
            self.clear_view();
            return RefreshOutcome::Discarded;
        }
        if self.current_generation() != generation {
            tracing::debug!(generation, "stale refresh cycle, discarding results");
            return RefreshOutcome::Discarded;
        }

        results.log_failures();
        if results.all_failed() {
            let notice = DashboardNotice::AllEndpointsFailed { at: Utc::now() };
            if self.notices.send(notice).is_err() {
                tracing::debug!("no notice subscribers");
            }
            return RefreshOutcome::AllFailed;
        }

        let next = merge(&self.view.borrow(), results, Utc::now());
        self.view.send_replace(next);
        RefreshOutcome::Committed
    }
}

struct Running {
    cancel: CancellationToken,
    owner: String,
}

/// Keeps a [`DashboardViewModel`] current for the signed-in user.
pub struct DashboardSync {
    shared: Arc<Shared>,
    interval: Duration,
    running: Option<Running>,
}

impl DashboardSync {
    pub fn new(api: ApiClient, session: watch::Receiver<Session>, interval: Duration) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                api,
                session,
                view: watch::Sender::new(DashboardViewModel::default()),
                notices,
                generation: AtomicU64::new(0),
            }),
            interval: interval.max(MIN_INTERVAL),
            running: None,
        }
    }

    /// Receiver for view updates.
    pub fn view(&self) -> watch::Receiver<DashboardViewModel> {
        self.shared.view.subscribe()
    }

    pub fn snapshot(&self) -> DashboardViewModel {
        self.shared.view.borrow().clone()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<DashboardNotice> {
        self.shared.notices.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Refreshes now, then every interval, until [`DashboardSync::stop`].
    ///
    /// Calling it again for the same user is a no-op. If a different user is
    /// now signed in the loop restarts with an empty view.
    ///
    /// # Errors
    /// [`SyncError::NotAuthenticated`] when nobody is signed in.
    pub fn start(&mut self) -> Result<(), SyncError> {
        let owner = self
            .shared
            .session
            .borrow()
            .identity()
            .map(|identity| identity.id.clone())
            .ok_or(SyncError::NotAuthenticated)?;

        if let Some(running) = &self.running {
            if running.owner == owner {
                return Ok(());
            }
            tracing::debug!("signed-in user changed, restarting dashboard sync");
            self.stop();
            self.shared.clear_view();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            self.interval,
            generation,
            cancel.clone(),
        ));
        tracing::debug!(generation, interval = ?self.interval, "dashboard sync started");

        self.running = Some(Running { cancel, owner });
        Ok(())
    }

    /// Cancels the timer and any in-flight cycle. The view is cleared when
    /// the session is no longer authenticated.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("dashboard sync stopped");
        }
        if !self.shared.session.borrow().is_authenticated() {
            self.shared.clear_view();
        }
    }

    /// Runs one cycle outside the timer.
    ///
    /// # Errors
    /// [`SyncError::NotAuthenticated`] when nobody is signed in.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, SyncError> {
        if !self.shared.session.borrow().is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }
        let generation = self.shared.current_generation();
        Ok(self.shared.refresh_cycle(generation).await)
    }

    /// Starts and stops with the session until `shutdown` fires.
    pub async fn follow(&mut self, shutdown: CancellationToken) {
        let mut session = self.shared.session.clone();
        loop {
            let authenticated = session.borrow_and_update().is_authenticated();
            if authenticated {
                if let Err(e) = self.start() {
                    tracing::debug!(error = %e, "session changed before sync could start");
                }
            } else {
                self.stop();
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.stop();
    }
}

impl Drop for DashboardSync {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
        }
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    period: Duration,
    generation: u64,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if shared.current_generation() != generation {
            tracing::debug!(generation, "stale dashboard tick");
            break;
        }
        if in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("previous refresh still running, skipping tick");
            continue;
        }

        let shared = Arc::clone(&shared);
        let in_flight = Arc::clone(&in_flight);
        let cancel = cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("refresh cycle cancelled");
                }
                outcome = shared.refresh_cycle(generation) => {
                    tracing::debug!(?outcome, "refresh cycle finished");
                }
            }
            in_flight.store(false, Ordering::SeqCst);
        });
    }
}
