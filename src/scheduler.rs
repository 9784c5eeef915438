//! Periodic refresh of the roster view

use crate::aggregate::AggregateViewBuilder;
use crate::errors::{MonitorError, Result};
use crate::fetcher::StatusFetcher;
use crate::poller::BatchPoller;
use crate::site::{Roster, SiteId};
use crate::store::{DashboardView, ViewStore};

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
    Stopped,
}

/// Drives one [`BatchPoller`] cycle per period and publishes the result.
///
/// The first cycle starts as soon as the scheduler is started; afterwards a
/// tick arriving while a cycle is still running is skipped, so at most one
/// cycle is ever in flight.
pub struct RefreshScheduler {
    fetcher: StatusFetcher,
    builder: AggregateViewBuilder,
    store: ViewStore,
    roster: Roster,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(
        fetcher: StatusFetcher,
        builder: AggregateViewBuilder,
        store: ViewStore,
        roster: Roster,
        period: Duration,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(MonitorError::Config("refresh period must be greater than 0".to_string()));
        }

        Ok(Self {
            fetcher,
            builder,
            store,
            roster,
            period,
        })
    }

    /// Spawn the timer task and return a handle controlling it.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            session_id: Uuid::new_v4().to_string(),
            poller: BatchPoller::new(self.fetcher.clone()),
            fetcher: self.fetcher,
            builder: self.builder,
            store: self.store,
            roster: RwLock::new(self.roster),
            state: RwLock::new(SchedulerState::Idle),
            cycles_started: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        });

        info!(
            "Starting refresh scheduler {} with period {}s",
            shared.session_id,
            self.period.as_secs()
        );

        let timer = tokio::spawn(Arc::clone(&shared).run_timer(self.period, stop_rx));

        SchedulerHandle {
            shared,
            stop: stop_tx,
            timer: Some(timer),
        }
    }
}

struct Shared {
    session_id: String,
    poller: BatchPoller,
    fetcher: StatusFetcher,
    builder: AggregateViewBuilder,
    store: ViewStore,
    roster: RwLock<Roster>,
    state: RwLock<SchedulerState>,
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    /// Set on shutdown or when the handle is dropped
    stopped: AtomicBool,
}

impl Shared {
    async fn run_timer(self: Arc<Self>, period: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(cycle) = self.begin_cycle().await {
                        tokio::spawn(Arc::clone(&self).run_cycle(cycle));
                    }
                }
                changed = stop.changed() => {
                    // a dropped handle counts as a stop request
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Refresh timer for {} stopped", self.session_id);
    }

    /// Move `Idle -> Polling` and allocate a cycle number.
    async fn begin_cycle(&self) -> Option<u64> {
        let mut state = self.state.write().await;
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        match *state {
            SchedulerState::Idle => {
                *state = SchedulerState::Polling;
                Some(self.cycles_started.fetch_add(1, Ordering::SeqCst) + 1)
            }
            SchedulerState::Polling => {
                debug!("Previous cycle still running, skipping tick");
                None
            }
            SchedulerState::Stopped => None,
        }
    }

    #[instrument(skip(self), fields(session = %self.session_id))]
    async fn run_cycle(self: Arc<Self>, cycle: u64) {
        let roster = self.roster.read().await.clone();

        let (snapshot, feeds) = tokio::join!(self.poller.poll(&roster, cycle), self.fetcher.fetch_feeds());

        let mut state = self.state.write().await;
        if *state == SchedulerState::Stopped || self.stopped.load(Ordering::SeqCst) {
            info!("Scheduler stopped during cycle {}, discarding result", cycle);
            return;
        }

        let previous = self.store.latest();
        let roster = snapshot.merged_with(previous.as_ref().map(|view| &view.roster));
        let aggregates = self.builder.build(&roster, &feeds);

        info!(
            "Cycle {} complete: {} down, {} recently checked, {} reported",
            cycle,
            aggregates.down_sites.len(),
            aggregates.recently_checked.len(),
            aggregates.last_reported.len()
        );

        self.store.publish(DashboardView {
            roster,
            feeds,
            aggregates,
            published_at: Utc::now(),
        });
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        *state = SchedulerState::Idle;
    }
}

/// Control surface of a running [`RefreshScheduler`].
///
/// Dropping the handle has the same effect as [`shutdown`](Self::shutdown).
pub struct SchedulerHandle {
    shared: Arc<Shared>,
    stop: watch::Sender<bool>,
    timer: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub async fn state(&self) -> SchedulerState {
        *self.shared.state.read().await
    }

    pub fn cycles_started(&self) -> u64 {
        self.shared.cycles_started.load(Ordering::SeqCst)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.shared.cycles_completed.load(Ordering::SeqCst)
    }

    /// Add a site to the roster. It is polled from the next cycle on.
    pub async fn add_site(&self, site: SiteId) -> bool {
        let added = self.shared.roster.write().await.add(site.clone());
        if added {
            info!("Added {} to the roster", site);
        }
        added
    }

    pub fn latest(&self) -> Option<Arc<DashboardView>> {
        self.shared.store.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DashboardView>>> {
        self.shared.store.subscribe()
    }

    /// Cancel the timer. A cycle already in flight runs to completion but
    /// its result is never published.
    pub async fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        *self.shared.state.write().await = SchedulerState::Stopped;
        self.stop.send_replace(true);
        info!("Refresh scheduler {} shut down", self.shared.session_id);
    }

    /// Wait for the timer task to exit after [`shutdown`](Self::shutdown).
    pub async fn join(mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        if let Err(e) = timer.await {
            debug!("Refresh timer task ended abnormally: {}", e);
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        // the state lock can't be awaited here; in-flight cycles check the flag
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.stop.send_replace(true);
    }
}
