//! Concurrent status polling across the roster

use crate::fetcher::StatusFetcher;
use crate::models::RosterSnapshot;
use crate::site::Roster;
use chrono::Utc;
use futures::future::join_all;
use std::time::Instant;
use tracing::{info, instrument};

/// Fans one status fetch out per roster site and waits for all of them.
///
/// Stateless between calls; the caller owns cycle numbering.
#[derive(Clone)]
pub struct BatchPoller {
    fetcher: StatusFetcher,
}

impl BatchPoller {
    pub fn new(fetcher: StatusFetcher) -> Self {
        Self { fetcher }
    }

    /// Poll every site in `roster` and return the settled snapshot.
    ///
    /// All requests are issued before any is awaited to completion, and the
    /// snapshot is only built once every outcome has settled. A failure
    /// fills its own slot and nothing else.
    #[instrument(skip(self, roster), fields(sites = roster.len()))]
    pub async fn poll(&self, roster: &Roster, cycle: u64) -> RosterSnapshot {
        let started_at = Utc::now();
        let start = Instant::now();

        let fetches = roster.iter().map(|site| async move {
            let outcome = self.fetcher.fetch(site).await;
            (site.clone(), outcome)
        });
        let outcomes = join_all(fetches).await;

        let snapshot = RosterSnapshot::new(cycle, started_at, Utc::now(), outcomes);

        info!(
            "Poll cycle {} settled: {} ok, {} failed in {}ms",
            cycle,
            snapshot.ok_count(),
            snapshot.failed_count(),
            start.elapsed().as_millis()
        );

        snapshot
    }
}
