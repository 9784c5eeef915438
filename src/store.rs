//! Process-wide publish/replace cell for the dashboard view

use crate::aggregate::DerivedAggregates;
use crate::errors::FetchError;
use crate::models::{AuxiliaryFeeds, FetchOutcome, RosterSnapshot, StatusSnapshot};
use crate::site::SiteId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Everything one completed poll cycle produced.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardView {
    pub roster: RosterSnapshot,
    pub feeds: AuxiliaryFeeds,
    pub aggregates: DerivedAggregates,
    pub published_at: DateTime<Utc>,
}

/// What a per-site card should show.
#[derive(Clone, Debug, PartialEq)]
pub enum SiteCard<'a> {
    /// No completed cycle has covered this site yet
    Loading,
    /// Latest known status; `stale` when carried over from an earlier cycle
    Loaded { snapshot: &'a StatusSnapshot, stale: bool },
    /// Fetched, but the status is unknown
    Unavailable(&'a FetchError),
}

impl DashboardView {
    pub fn card(&self, site: &SiteId) -> SiteCard<'_> {
        match self.roster.get(site) {
            None => SiteCard::Loading,
            Some(entry) => match &entry.outcome {
                FetchOutcome::Ok(snapshot) => SiteCard::Loaded {
                    snapshot,
                    stale: self.roster.is_stale(site),
                },
                FetchOutcome::Failed(err) => SiteCard::Unavailable(err),
            },
        }
    }
}

/// Readers always see a whole view; every update replaces it wholesale.
#[derive(Debug, Clone)]
pub struct ViewStore {
    sender: Arc<watch::Sender<Option<Arc<DashboardView>>>>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Replace the published view.
    pub fn publish(&self, view: DashboardView) -> Arc<DashboardView> {
        let view = Arc::new(view);
        debug!(
            "Publishing view for cycle {} ({} sites)",
            view.roster.cycle,
            view.roster.len()
        );
        self.sender.send_replace(Some(Arc::clone(&view)));
        view
    }

    /// The latest published view, `None` until the first cycle completes.
    pub fn latest(&self) -> Option<Arc<DashboardView>> {
        self.sender.borrow().clone()
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DashboardView>>> {
        self.sender.subscribe()
    }
}
