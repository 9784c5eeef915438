//! Per-site fetches with failures folded into typed outcomes

use crate::client::MonitorApi;
use crate::errors::FetchResult;
use crate::models::{AuxiliaryFeeds, FetchOutcome, ReportReceipt, SiteDetail};
use crate::site::SiteId;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Thin layer over a [`MonitorApi`] that never lets a failure escape as
/// anything but a value. No retries happen here.
#[derive(Clone)]
pub struct StatusFetcher {
    api: Arc<dyn MonitorApi>,
}

impl StatusFetcher {
    pub fn new(api: Arc<dyn MonitorApi>) -> Self {
        Self { api }
    }

    /// Fetch the current status of one site.
    #[instrument(skip(self), fields(site = %site))]
    pub async fn fetch(&self, site: &SiteId) -> FetchOutcome {
        let result = self.api.status(site).await;
        match &result {
            Ok(snapshot) => debug!("Fetched status: down={} response_time={}ms", snapshot.is_down, snapshot.response_time),
            Err(e) => warn!("Status fetch failed: {}", e),
        }
        result.into()
    }

    /// Fetch status and outage history for the detail view.
    ///
    /// Both requests are in flight at once; the result is an error if
    /// either fails, with the status failure taking precedence.
    #[instrument(skip(self), fields(site = %site))]
    pub async fn fetch_detail(&self, site: &SiteId) -> FetchResult<SiteDetail> {
        let (status, outages) = futures::join!(self.api.status(site), self.api.outage_history(site));

        let status = status.inspect_err(|e| warn!("Detail status fetch failed: {}", e))?;
        let outages = outages.inspect_err(|e| warn!("Outage history fetch failed: {}", e))?;

        debug!(
            "Fetched detail: {} history points, {} outage reports",
            status.history.len(),
            outages.total_reports()
        );

        Ok(SiteDetail {
            site: site.clone(),
            status,
            outages,
        })
    }

    /// Fetch both auxiliary feeds. A failed feed is treated as empty.
    pub async fn fetch_feeds(&self) -> AuxiliaryFeeds {
        let (latest, reported) = futures::join!(self.api.latest_checked(), self.api.reported_sites());

        let latest_checked = latest.unwrap_or_else(|e| {
            warn!("Latest-checked feed unavailable, treating as empty: {}", e);
            Vec::new()
        });

        let reported = reported.unwrap_or_else(|e| {
            warn!("Reported-sites feed unavailable, treating as empty: {}", e);
            Vec::new()
        });

        AuxiliaryFeeds {
            latest_checked,
            reported,
        }
    }

    /// Post an issue report for `site`.
    #[instrument(skip(self), fields(site = %site))]
    pub async fn submit_report(&self, site: &SiteId) -> FetchResult<ReportReceipt> {
        let result = self.api.submit_report(site).await;
        match &result {
            Ok(receipt) => debug!("Report accepted: {}", receipt.message),
            Err(e) => warn!("Report submission failed: {}", e),
        }
        result
    }
}
