//! Wire types returned by the monitoring backend and the per-cycle roster snapshot

use crate::errors::{FetchError, FetchResult};
use crate::site::SiteId;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::collections::HashSet;
use tracing::debug;

/// Format used when writing timestamps back out.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Format of `last_down` as produced by the backend.
const LAST_DOWN_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Parse a backend timestamp.
///
/// The backend emits naive local date-times in several shapes depending on
/// the endpoint; anything carrying an explicit offset is converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 without offset
        "%Y-%m-%d %H:%M:%S%.f", // SQL timestamp
        "%Y-%m-%dT%H:%M",       // ISO minute precision
        "%Y-%m-%d %H:%M",       // outage bucket names
        LAST_DOWN_FORMAT,
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Serde adapter for backend timestamps.
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {}", raw)))
    }
}

/// One response-time measurement in a site's history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(with = "timestamp")]
    pub last_checked: NaiveDateTime,
    pub response_time: f64,
}

/// When the site was last seen down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LastDown {
    #[default]
    Never,
    At(NaiveDateTime),
}

impl Serialize for LastDown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LastDown::Never => serializer.serialize_str("Never"),
            LastDown::At(at) => serializer.serialize_str(&at.format(LAST_DOWN_FORMAT).to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for LastDown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some("Never") => Ok(LastDown::Never),
            Some(value) => parse_timestamp(value)
                .map(LastDown::At)
                .ok_or_else(|| serde::de::Error::custom(format!("unrecognized last_down: {}", value))),
        }
    }
}

/// Current status of one site as reported by `/monitor/status`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub url: String,
    /// HTTP status code the backend saw, or `"Error"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub is_down: bool,
    pub response_time: f64,
    #[serde(with = "timestamp")]
    pub last_checked: NaiveDateTime,
    #[serde(default)]
    pub last_down: LastDown,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl StatusSnapshot {
    /// Parse and validate a status payload.
    ///
    /// History is sorted oldest-to-newest here so nothing downstream has to
    /// re-check the order.
    pub fn from_json(body: &[u8]) -> FetchResult<Self> {
        let mut snapshot: StatusSnapshot = serde_json::from_slice(body)
            .map_err(|e| FetchError::Network(format!("malformed status payload: {}", e)))?;

        if !snapshot.response_time.is_finite() {
            return Err(FetchError::Network("malformed status payload: response_time".to_string()));
        }

        snapshot.history.sort_by_key(|entry| entry.last_checked);
        Ok(snapshot)
    }

    /// Timestamp of the most recent measurement.
    pub fn latest_check(&self) -> NaiveDateTime {
        self.history
            .last()
            .map(|entry| entry.last_checked)
            .unwrap_or(self.last_checked)
    }

    /// The last `count` history entries, for sparkline-sized charts.
    pub fn recent_history(&self, count: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    /// Lowest response time in the history window, used as a chart floor.
    pub fn min_response_time(&self) -> Option<f64> {
        self.history
            .iter()
            .map(|entry| entry.response_time)
            .reduce(f64::min)
    }
}

/// Report count for one 15 minute window.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutageBucket {
    #[serde(rename = "name", with = "timestamp")]
    pub bucket_start: NaiveDateTime,
    #[serde(rename = "reportCount")]
    pub report_count: u32,
}

/// User reports over the last 24 hours, oldest bucket first.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct OutageHistory {
    pub buckets: Vec<OutageBucket>,
}

impl OutageHistory {
    pub fn from_json(body: &[u8]) -> FetchResult<Self> {
        let mut history: OutageHistory = serde_json::from_slice(body)
            .map_err(|e| FetchError::Network(format!("malformed outage history: {}", e)))?;
        history.buckets.sort_by_key(|bucket| bucket.bucket_start);
        Ok(history)
    }

    pub fn total_reports(&self) -> u32 {
        self.buckets.iter().map(|bucket| bucket.report_count).sum()
    }

    /// Busiest bucket, earliest wins on ties.
    pub fn peak(&self) -> Option<&OutageBucket> {
        self.buckets
            .iter()
            .filter(|bucket| bucket.report_count > 0)
            .fold(None, |best: Option<&OutageBucket>, bucket| match best {
                Some(current) if current.report_count >= bucket.report_count => Some(current),
                _ => Some(bucket),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// A site named by one of the auxiliary feeds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportedSite {
    pub site: SiteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_down: Option<bool>,
}

/// Feed entries come either as bare URLs or as small records.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFeedEntry {
    Plain(String),
    Record {
        #[serde(alias = "url")]
        website: String,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        is_down: Option<bool>,
    },
}

/// Parse an auxiliary feed body.
///
/// Identifiers are normalized and deduplicated (first occurrence wins).
/// Only a body that isn't a JSON array fails; individual entries that are
/// malformed or don't name a valid host are skipped.
pub fn parse_feed(body: &[u8]) -> FetchResult<Vec<ReportedSite>> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| FetchError::Network(format!("malformed feed: {}", e)))?;

    let mut seen = HashSet::new();
    let mut sites = Vec::with_capacity(raw.len());

    for value in raw {
        let entry = match serde_json::from_value::<RawFeedEntry>(value) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping malformed feed entry: {}", e);
                continue;
            }
        };

        let (website, timestamp, is_down) = match entry {
            RawFeedEntry::Plain(website) => (website, None, None),
            RawFeedEntry::Record { website, timestamp, is_down } => (website, timestamp, is_down),
        };

        let site = match SiteId::parse(&website) {
            Ok(site) => site,
            Err(e) => {
                debug!("Skipping feed entry: {}", e);
                continue;
            }
        };

        if !seen.insert(site.clone()) {
            continue;
        }

        sites.push(ReportedSite {
            site,
            timestamp: timestamp.as_deref().and_then(parse_timestamp),
            is_down,
        });
    }

    Ok(sites)
}

/// Body of a successful report submission.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportReceipt {
    pub message: String,
}

/// Everything the detail view needs for one site.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteDetail {
    pub site: SiteId,
    pub status: StatusSnapshot,
    pub outages: OutageHistory,
}

/// The two auxiliary lists fetched alongside each poll cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuxiliaryFeeds {
    /// Sites the backend polled most recently, newest first
    pub latest_checked: Vec<SiteId>,
    /// Sites users reported most recently
    pub reported: Vec<ReportedSite>,
}

/// Result of one status fetch for one site.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Ok(StatusSnapshot),
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        match self {
            FetchOutcome::Ok(snapshot) => Some(snapshot),
            FetchOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Ok(_) => None,
            FetchOutcome::Failed(err) => Some(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FetchOutcome::Ok(_))
    }
}

impl From<FetchResult<StatusSnapshot>> for FetchOutcome {
    fn from(result: FetchResult<StatusSnapshot>) -> Self {
        match result {
            Ok(snapshot) => FetchOutcome::Ok(snapshot),
            Err(err) => FetchOutcome::Failed(err),
        }
    }
}

/// Slot in a roster snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteEntry {
    pub outcome: FetchOutcome,
    /// Cycle in which `outcome` was fetched
    pub refreshed_in: u64,
}

/// Outcomes of one completed poll cycle, one entry per roster site.
#[derive(Clone, Debug, PartialEq)]
pub struct RosterSnapshot {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    entries: BTreeMap<SiteId, SiteEntry>,
}

impl RosterSnapshot {
    pub fn new(
        cycle: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcomes: impl IntoIterator<Item = (SiteId, FetchOutcome)>,
    ) -> Self {
        let entries = outcomes
            .into_iter()
            .map(|(site, outcome)| {
                (
                    site,
                    SiteEntry {
                        outcome,
                        refreshed_in: cycle,
                    },
                )
            })
            .collect();

        Self {
            cycle,
            started_at,
            completed_at,
            entries,
        }
    }

    /// Fold the previously published snapshot into this one.
    ///
    /// A fresh failure never hides an earlier success: the slot keeps the
    /// last good outcome and its older `refreshed_in` marks it stale.
    pub fn merged_with(mut self, previous: Option<&RosterSnapshot>) -> Self {
        let Some(previous) = previous else {
            return self;
        };

        for (site, entry) in self.entries.iter_mut() {
            if entry.outcome.is_ok() {
                continue;
            }
            if let Some(old) = previous.entries.get(site) {
                if old.outcome.is_ok() {
                    *entry = old.clone();
                }
            }
        }

        self
    }

    pub fn get(&self, site: &SiteId) -> Option<&SiteEntry> {
        self.entries.get(site)
    }

    pub fn outcome(&self, site: &SiteId) -> Option<&FetchOutcome> {
        self.entries.get(site).map(|entry| &entry.outcome)
    }

    /// Whether the site's slot was carried over from an earlier cycle.
    pub fn is_stale(&self, site: &SiteId) -> bool {
        self.entries
            .get(site)
            .is_some_and(|entry| entry.refreshed_in < self.cycle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteId, &SiteEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ok_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.outcome.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.ok_count()
    }
}
