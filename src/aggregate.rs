//! Presentation aggregates derived from a roster snapshot and the auxiliary feeds

use crate::models::{AuxiliaryFeeds, LastDown, ReportedSite, RosterSnapshot};
use crate::site::SiteId;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

/// A site currently reported down.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DownSite {
    pub site: SiteId,
    pub last_checked: NaiveDateTime,
}

/// Summary line for the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Headline {
    /// No site has a known status yet
    NoData,
    /// Every site with a known status is up
    AllHealthy,
    /// This many sites are down
    SitesDown(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DerivedAggregates {
    /// Down sites, most recently checked first
    pub down_sites: Vec<DownSite>,
    /// Sites the backend checked most recently
    pub recently_checked: Vec<SiteId>,
    /// Sites users reported most recently
    pub last_reported: Vec<ReportedSite>,
    pub headline: Headline,
}

impl DerivedAggregates {
    pub fn is_empty(&self) -> bool {
        self.down_sites.is_empty() && self.recently_checked.is_empty() && self.last_reported.is_empty()
    }
}

/// Pure transform from a snapshot plus feeds to [`DerivedAggregates`].
#[derive(Debug, Clone, Copy)]
pub struct AggregateViewBuilder {
    recent_limit: usize,
    reported_limit: usize,
}

impl Default for AggregateViewBuilder {
    fn default() -> Self {
        Self::new(5, 5)
    }
}

impl AggregateViewBuilder {
    pub fn new(recent_limit: usize, reported_limit: usize) -> Self {
        Self {
            recent_limit,
            reported_limit,
        }
    }

    pub fn build(&self, roster: &RosterSnapshot, feeds: &AuxiliaryFeeds) -> DerivedAggregates {
        let down_sites = down_sites(roster);
        let known = roster.ok_count();

        let headline = if known == 0 {
            Headline::NoData
        } else if down_sites.is_empty() {
            Headline::AllHealthy
        } else {
            Headline::SitesDown(down_sites.len())
        };

        DerivedAggregates {
            down_sites,
            recently_checked: dedup_capped(feeds.latest_checked.iter().cloned(), |site| site.clone(), self.recent_limit),
            last_reported: dedup_capped(feeds.reported.iter().cloned(), |entry| entry.site.clone(), self.reported_limit),
            headline,
        }
    }
}

/// `Ok` entries with `is_down`, newest check first, ties by site name.
/// Failed entries have unknown status and are left out.
fn down_sites(roster: &RosterSnapshot) -> Vec<DownSite> {
    let mut down: Vec<DownSite> = roster
        .iter()
        .filter_map(|(site, entry)| {
            let snapshot = entry.outcome.snapshot().filter(|snapshot| snapshot.is_down)?;
            Some(DownSite {
                site: site.clone(),
                last_checked: snapshot.latest_check(),
            })
        })
        .collect();

    down.sort_by(|a, b| b.last_checked.cmp(&a.last_checked).then_with(|| a.site.cmp(&b.site)));
    down
}

fn dedup_capped<T>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> SiteId, cap: usize) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(key(item))).take(cap).collect()
}

/// Human-readable age of `then` relative to `now`.
pub fn time_ago(then: NaiveDateTime, now: NaiveDateTime) -> String {
    let seconds = (now - then).num_seconds().max(0);

    let (value, unit) = match seconds {
        s if s < 60 => return format!("{} seconds ago", s),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s => (s / 86_400, "day"),
    };

    let plural = if value > 1 { "s" } else { "" };
    format!("{} {}{} ago", value, unit, plural)
}

pub fn last_down_label(last_down: &LastDown, now: NaiveDateTime) -> String {
    match last_down {
        LastDown::Never => "Never went down".to_string(),
        LastDown::At(at) => time_ago(*at, now),
    }
}
