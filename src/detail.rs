//! Single-site lookup and issue reporting

use crate::errors::{FetchError, FetchResult, Result};
use crate::fetcher::StatusFetcher;
use crate::models::{ReportReceipt, SiteDetail};
use crate::site::SiteId;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

#[derive(Clone, Debug, PartialEq)]
pub enum DetailState {
    Idle,
    Loading { site: SiteId },
    Loaded(SiteDetail),
    Error { site: SiteId, reason: String },
}

impl DetailState {
    /// Site the view is currently about, if any.
    pub fn site(&self) -> Option<&SiteId> {
        match self {
            DetailState::Idle => None,
            DetailState::Loading { site } | DetailState::Error { site, .. } => Some(site),
            DetailState::Loaded(detail) => Some(&detail.site),
        }
    }
}

/// Transient user-facing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

#[derive(Debug)]
struct Inner {
    state: DetailState,
    generation: u64,
    dialog_open: bool,
    notice: Option<Notice>,
}

/// Lookup workflow for one site at a time.
///
/// Every lookup takes a new generation number; a response arriving after a
/// newer lookup has started is dropped, so the state always reflects the
/// most recent request.
pub struct SiteDetailController {
    fetcher: StatusFetcher,
    inner: RwLock<Inner>,
}

impl SiteDetailController {
    pub fn new(fetcher: StatusFetcher) -> Self {
        Self {
            fetcher,
            inner: RwLock::new(Inner {
                state: DetailState::Idle,
                generation: 0,
                dialog_open: false,
                notice: None,
            }),
        }
    }

    pub async fn state(&self) -> DetailState {
        self.inner.read().await.state.clone()
    }

    pub async fn current_site(&self) -> Option<SiteId> {
        self.inner.read().await.state.site().cloned()
    }

    pub async fn notice(&self) -> Option<Notice> {
        self.inner.read().await.notice.clone()
    }

    pub async fn report_dialog_open(&self) -> bool {
        self.inner.read().await.dialog_open
    }

    /// Normalize raw user input and look it up.
    pub async fn lookup_input(&self, input: &str) -> Result<DetailState> {
        let site = SiteId::parse(input)?;
        Ok(self.lookup(site).await)
    }

    /// Fetch status and outage history for `site`.
    ///
    /// Returns the controller state once this lookup settles, which is the
    /// newer lookup's state if this one was superseded.
    #[instrument(skip(self), fields(site = %site))]
    pub async fn lookup(&self, site: SiteId) -> DetailState {
        let generation = {
            let mut inner = self.inner.write().await;
            inner.generation += 1;
            inner.state = DetailState::Loading { site: site.clone() };
            inner.dialog_open = false;
            inner.generation
        };

        let result = self.fetcher.fetch_detail(&site).await;

        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            debug!(
                "Discarding superseded lookup (generation {}, current {})",
                generation, inner.generation
            );
            return inner.state.clone();
        }

        inner.state = match result {
            Ok(detail) => {
                inner.notice = Some(Notice::Success("Website status retrieved successfully".to_string()));
                DetailState::Loaded(detail)
            }
            Err(e) => {
                let reason = e.user_message();
                inner.notice = Some(Notice::Error(reason.clone()));
                DetailState::Error { site, reason }
            }
        };
        inner.state.clone()
    }

    /// Run the lookup again for the site currently shown.
    pub async fn retry(&self) -> Option<DetailState> {
        let site = self.current_site().await?;
        Some(self.lookup(site).await)
    }

    pub async fn open_report_dialog(&self) {
        self.inner.write().await.dialog_open = true;
    }

    pub async fn close_report_dialog(&self) {
        self.inner.write().await.dialog_open = false;
    }

    /// Report an issue with the site currently shown.
    ///
    /// Success closes the report dialog; failure leaves it open. The lookup
    /// state is not touched either way. If another lookup started while the
    /// report was in flight, the dialog and notice belong to that lookup and
    /// are left alone.
    pub async fn submit_report(&self) -> FetchResult<ReportReceipt> {
        let (site, generation) = {
            let mut inner = self.inner.write().await;
            match inner.state.site().cloned() {
                Some(site) => (site, inner.generation),
                None => {
                    inner.notice = Some(Notice::Error("No website data available".to_string()));
                    return Err(FetchError::SubmissionFailed("No website data available".to_string()));
                }
            }
        };

        let result = self.fetcher.submit_report(&site).await;

        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            debug!("Report for {} settled after a newer lookup, leaving dialog as is", site);
            return result;
        }

        match &result {
            Ok(receipt) => {
                info!("Issue report for {} accepted", site);
                inner.dialog_open = false;
                inner.notice = Some(Notice::Success(receipt.message.clone()));
            }
            Err(e) => {
                inner.notice = Some(Notice::Error(e.user_message()));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutageBucket, OutageHistory};
    use crate::test_support::{minute, sample_snapshot, FakeApi};
    use std::sync::Arc;
    use std::time::Duration;

    fn site(name: &str) -> SiteId {
        SiteId::parse(name).unwrap()
    }

    fn controller(api: Arc<FakeApi>) -> Arc<SiteDetailController> {
        Arc::new(SiteDetailController::new(StatusFetcher::new(api)))
    }

    #[tokio::test]
    async fn test_lookup_loads_status_and_outages() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("x.com"), Ok(sample_snapshot("x.com", false, &[(1, 100.0), (2, 150.0)])));
        api.set_outages(
            &site("x.com"),
            Ok(OutageHistory {
                buckets: vec![OutageBucket {
                    bucket_start: minute(0),
                    report_count: 4,
                }],
            }),
        );

        let controller = controller(api);
        let state = controller.lookup_input("https://X.com/").await.unwrap();

        let DetailState::Loaded(detail) = state else {
            panic!("expected loaded state, got {:?}", state);
        };
        assert_eq!(detail.site, site("x.com"));
        assert_eq!(detail.status.history.len(), 2);
        assert_eq!(detail.outages.total_reports(), 4);
        assert_eq!(
            controller.notice().await,
            Some(Notice::Success("Website status retrieved successfully".to_string()))
        );
    }

    #[tokio::test]
    async fn test_lookup_rejects_bad_input() {
        let controller = controller(Arc::new(FakeApi::new()));
        tokio_test::assert_err!(controller.lookup_input("   ").await);
        assert_eq!(controller.state().await, DetailState::Idle);
    }

    #[tokio::test]
    async fn test_unmonitored_site_error() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("new.com"), Err(FetchError::NotMonitored));

        let controller = controller(api);
        let state = controller.lookup(site("new.com")).await;

        match state {
            DetailState::Error { site: failed, reason } => {
                assert_eq!(failed, site("new.com"));
                assert!(reason.starts_with("This website is not being monitored yet"));
            }
            other => panic!("expected error state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_outage_history_is_an_error() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("x.com"), Ok(sample_snapshot("x.com", false, &[(1, 100.0)])));
        api.set_outages(&site("x.com"), Err(FetchError::NoData("HTTP 404".into())));

        let controller = controller(api);
        assert_eq!(
            controller.lookup(site("x.com")).await,
            DetailState::Error {
                site: site("x.com"),
                reason: "Outage history not found".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_discarded() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("slow.com"), Ok(sample_snapshot("slow.com", true, &[(1, 0.0)])));
        api.set_status(&site("fast.com"), Ok(sample_snapshot("fast.com", false, &[(1, 80.0)])));
        api.set_delay(&site("slow.com"), Duration::from_secs(10));
        api.set_delay(&site("fast.com"), Duration::from_secs(1));

        let controller = controller(api);

        let slow = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.lookup(site("slow.com")).await }
        });
        tokio::task::yield_now().await;
        let fast = controller.lookup(site("fast.com")).await;
        let after_slow = slow.await.unwrap();

        assert_eq!(fast.site(), Some(&site("fast.com")));
        assert_eq!(after_slow.site(), Some(&site("fast.com")));
        assert_eq!(controller.current_site().await, Some(site("fast.com")));
        assert!(matches!(controller.state().await, DetailState::Loaded(_)));
    }

    #[tokio::test]
    async fn test_failed_report_keeps_dialog_open() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("x.com"), Ok(sample_snapshot("x.com", true, &[(1, 0.0)])));
        api.set_report_result(Err(FetchError::SubmissionFailed("HTTP 500".into())));

        let controller = controller(api.clone());
        let loaded = controller.lookup(site("x.com")).await;
        controller.open_report_dialog().await;

        assert!(controller.submit_report().await.is_err());
        assert!(controller.report_dialog_open().await);
        assert_eq!(controller.state().await, loaded);
        assert_eq!(
            controller.notice().await,
            Some(Notice::Error("Failed to submit report".to_string()))
        );
        assert_eq!(api.report_calls(), 1);

        controller.close_report_dialog().await;
        assert!(!controller.report_dialog_open().await);
    }

    #[tokio::test]
    async fn test_successful_report_closes_dialog() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("new.com"), Err(FetchError::NotMonitored));

        let controller = controller(api);
        let errored = controller.lookup(site("new.com")).await;
        controller.open_report_dialog().await;

        let receipt = tokio_test::assert_ok!(controller.submit_report().await);
        assert!(!controller.report_dialog_open().await);
        assert_eq!(controller.notice().await, Some(Notice::Success(receipt.message)));
        // reporting does not clear the lookup error
        assert_eq!(controller.state().await, errored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_settling_after_new_lookup_keeps_new_dialog() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("x.com"), Ok(sample_snapshot("x.com", true, &[(1, 0.0)])));
        api.set_status(&site("y.com"), Ok(sample_snapshot("y.com", false, &[(1, 70.0)])));

        let controller = controller(api.clone());
        controller.lookup(site("x.com")).await;
        controller.open_report_dialog().await;

        // only the report POST for x.com is slow from here on
        api.set_delay(&site("x.com"), Duration::from_secs(10));
        let report = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.submit_report().await }
        });
        tokio::task::yield_now().await;

        controller.lookup(site("y.com")).await;
        controller.open_report_dialog().await;

        tokio_test::assert_ok!(report.await.unwrap());
        assert!(controller.report_dialog_open().await);
        assert_eq!(controller.current_site().await, Some(site("y.com")));
        assert_eq!(
            controller.notice().await,
            Some(Notice::Success("Website status retrieved successfully".to_string()))
        );
        assert_eq!(api.report_calls(), 1);
    }

    #[tokio::test]
    async fn test_report_without_site() {
        let api = Arc::new(FakeApi::new());
        let controller = controller(api.clone());

        assert_eq!(
            controller.submit_report().await,
            Err(FetchError::SubmissionFailed("No website data available".to_string()))
        );
        assert_eq!(api.report_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_reruns_current_site() {
        let api = Arc::new(FakeApi::new());
        api.set_status(&site("new.com"), Err(FetchError::NotMonitored));

        let controller = controller(api.clone());
        assert!(controller.retry().await.is_none());

        controller.lookup(site("new.com")).await;
        api.set_status(&site("new.com"), Ok(sample_snapshot("new.com", false, &[(1, 90.0)])));

        let state = controller.retry().await.unwrap();
        assert!(matches!(state, DetailState::Loaded(_)));
        assert_eq!(api.status_calls(), 2);
    }
}
