//! In-memory backend for engine tests

use crate::client::MonitorApi;
use crate::errors::{FetchError, FetchResult};
use crate::models::{HistoryEntry, LastDown, OutageHistory, ReportReceipt, ReportedSite, StatusSnapshot};
use crate::site::SiteId;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Minutes past 2024-11-05 10:00.
pub fn minute(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 11, 5)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(offset)
}

/// Snapshot whose history holds `(minute, response_time)` points.
pub fn sample_snapshot(site: &str, is_down: bool, history: &[(i64, f64)]) -> StatusSnapshot {
    let history: Vec<HistoryEntry> = history
        .iter()
        .map(|(offset, response_time)| HistoryEntry {
            last_checked: minute(*offset),
            response_time: *response_time,
        })
        .collect();

    StatusSnapshot {
        url: format!("https://{}/", site),
        status: Some(if is_down { "503" } else { "200" }.to_string()),
        is_down,
        response_time: history.last().map(|h| h.response_time).unwrap_or(0.0),
        last_checked: history.last().map(|h| h.last_checked).unwrap_or(minute(0)),
        last_down: LastDown::Never,
        history,
    }
}

/// Scripted [`MonitorApi`].
///
/// Sites without a scripted status fail with a network error. Delays are
/// applied with `tokio::time::sleep` so paused-clock tests stay deterministic.
pub struct FakeApi {
    statuses: Mutex<HashMap<SiteId, FetchResult<StatusSnapshot>>>,
    outages: Mutex<HashMap<SiteId, FetchResult<OutageHistory>>>,
    delays: Mutex<HashMap<SiteId, Duration>>,
    default_delay: Mutex<Duration>,
    reported: Mutex<FetchResult<Vec<ReportedSite>>>,
    latest: Mutex<FetchResult<Vec<SiteId>>>,
    report_result: Mutex<FetchResult<ReportReceipt>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    status_calls: AtomicUsize,
    report_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            outages: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            default_delay: Mutex::new(Duration::ZERO),
            reported: Mutex::new(Ok(Vec::new())),
            latest: Mutex::new(Ok(Vec::new())),
            report_result: Mutex::new(Ok(ReportReceipt {
                message: "Report submitted successfully.".to_string(),
            })),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            report_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, site: &SiteId, result: FetchResult<StatusSnapshot>) {
        self.statuses.lock().unwrap().insert(site.clone(), result);
    }

    pub fn set_outages(&self, site: &SiteId, result: FetchResult<OutageHistory>) {
        self.outages.lock().unwrap().insert(site.clone(), result);
    }

    pub fn set_delay(&self, site: &SiteId, delay: Duration) {
        self.delays.lock().unwrap().insert(site.clone(), delay);
    }

    pub fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.lock().unwrap() = delay;
    }

    pub fn set_reported(&self, result: FetchResult<Vec<ReportedSite>>) {
        *self.reported.lock().unwrap() = result;
    }

    pub fn set_latest_checked(&self, result: FetchResult<Vec<SiteId>>) {
        *self.latest.lock().unwrap() = result;
    }

    pub fn set_report_result(&self, result: FetchResult<ReportReceipt>) {
        *self.report_result.lock().unwrap() = result;
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    fn delay_for(&self, site: &SiteId) -> Duration {
        self.delays
            .lock()
            .unwrap()
            .get(site)
            .copied()
            .unwrap_or(*self.default_delay.lock().unwrap())
    }
}

#[async_trait]
impl MonitorApi for FakeApi {
    async fn status(&self, site: &SiteId) -> FetchResult<StatusSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay_for(site);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .get(site)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network("connection refused".to_string())))
    }

    async fn outage_history(&self, site: &SiteId) -> FetchResult<OutageHistory> {
        let delay = self.delay_for(site);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.outages
            .lock()
            .unwrap()
            .get(site)
            .cloned()
            .unwrap_or_else(|| Ok(OutageHistory::default()))
    }

    async fn reported_sites(&self) -> FetchResult<Vec<ReportedSite>> {
        self.reported.lock().unwrap().clone()
    }

    async fn latest_checked(&self) -> FetchResult<Vec<SiteId>> {
        self.latest.lock().unwrap().clone()
    }

    async fn submit_report(&self, site: &SiteId) -> FetchResult<ReportReceipt> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_for(site);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.report_result.lock().unwrap().clone()
    }
}
