//! HTTP client for the monitoring backend

use crate::config::{Config, ReportsFeed};
use crate::errors::{FetchError, FetchResult, MonitorError, Result};
use crate::models::{parse_feed, OutageHistory, ReportReceipt, ReportedSite, StatusSnapshot};
use crate::site::SiteId;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Read and write operations offered by the monitoring backend.
///
/// Every failure comes back as a [`FetchError`] value.
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// `GET /monitor/status/{site}`
    async fn status(&self, site: &SiteId) -> FetchResult<StatusSnapshot>;

    /// `GET /monitor/outage-history/{site}`
    async fn outage_history(&self, site: &SiteId) -> FetchResult<OutageHistory>;

    /// `GET /monitor/last-reported` or `/monitor/recent-reports`
    async fn reported_sites(&self) -> FetchResult<Vec<ReportedSite>>;

    /// `GET /monitor/latest-checked`
    async fn latest_checked(&self) -> FetchResult<Vec<SiteId>>;

    /// `POST /monitor/report/{site}`
    async fn submit_report(&self, site: &SiteId) -> FetchResult<ReportReceipt>;
}

/// reqwest-backed implementation of [`MonitorApi`]
#[derive(Debug, Clone)]
pub struct HttpMonitorApi {
    client: Client,
    base_url: Url,
    timeout: Duration,
    reports_feed: ReportsFeed,
}

impl HttpMonitorApi {
    /// Create a new client for the backend at `base_url`
    pub fn new(base_url: &str, http_timeout: Duration, reports_feed: ReportsFeed) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MonitorError::Config(format!("invalid base URL {}: {}", base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(MonitorError::Config(format!("base URL cannot carry a path: {}", base_url)));
        }

        let client = Client::builder()
            .timeout(http_timeout)
            .user_agent(format!("site_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            base_url,
            timeout: http_timeout,
            reports_feed,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.http_timeout, config.reports_feed)
    }

    /// Build an endpoint URL, percent-encoding every segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: Url) -> FetchResult<Response> {
        debug!("GET {}", url);

        timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Network("request timeout".to_string()))?
            .map_err(FetchError::from)
    }

    async fn read_body(response: Response) -> FetchResult<Vec<u8>> {
        let bytes = response.bytes().await.map_err(FetchError::from)?;
        Ok(bytes.to_vec())
    }

    async fn get_feed(&self, url: Url) -> FetchResult<Vec<ReportedSite>> {
        let response = self.get(url).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Network(describe_status(status, "feed")));
        }

        parse_feed(&Self::read_body(response).await?)
    }
}

#[async_trait]
impl MonitorApi for HttpMonitorApi {
    async fn status(&self, site: &SiteId) -> FetchResult<StatusSnapshot> {
        let url = self.endpoint(&["monitor", "status", site.as_str()]);
        let response = self.get(url).await?;
        let status = response.status();

        // Only a 4xx means "not tracked yet". A backend that fails the first
        // lookup of a new site with a 5xx is reported as a network failure.
        if status.is_client_error() {
            return Err(FetchError::NotMonitored);
        }

        if !status.is_success() {
            return Err(FetchError::Network(describe_status(status, "status")));
        }

        StatusSnapshot::from_json(&Self::read_body(response).await?)
    }

    async fn outage_history(&self, site: &SiteId) -> FetchResult<OutageHistory> {
        let url = self.endpoint(&["monitor", "outage-history", site.as_str()]);
        let response = self.get(url).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::NoData(describe_status(status, "outage history")));
        }

        OutageHistory::from_json(&Self::read_body(response).await?)
    }

    async fn reported_sites(&self) -> FetchResult<Vec<ReportedSite>> {
        let url = self.endpoint(&["monitor", self.reports_feed.path_segment()]);
        self.get_feed(url).await
    }

    async fn latest_checked(&self) -> FetchResult<Vec<SiteId>> {
        let url = self.endpoint(&["monitor", "latest-checked"]);
        let sites = self.get_feed(url).await?;
        Ok(sites.into_iter().map(|entry| entry.site).collect())
    }

    async fn submit_report(&self, site: &SiteId) -> FetchResult<ReportReceipt> {
        let url = self.endpoint(&["monitor", "report", site.as_str()]);
        debug!("POST {}", url);

        let response = timeout(self.timeout, self.client.post(url).send())
            .await
            .map_err(|_| FetchError::SubmissionFailed("request timeout".to_string()))?
            .map_err(|e| FetchError::SubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::SubmissionFailed(format!(
                "{}: {}",
                describe_status(status, "report"),
                body
            )));
        }

        response
            .json::<ReportReceipt>()
            .await
            .map_err(|e| FetchError::SubmissionFailed(format!("malformed receipt: {}", e)))
    }
}

fn describe_status(status: StatusCode, what: &str) -> String {
    match status.as_u16() {
        400 => format!("bad request for {}", what),
        404 => format!("{} not found", what),
        429 => format!("rate limited on {}", what),
        500..=599 => format!("backend error {} on {}", status, what),
        _ => format!("unexpected response {} on {}", status, what),
    }
}
