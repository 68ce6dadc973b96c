//! Fetch cycle coordination.
//!
//! [`FetchCoordinator::run`] spawns one task per configured category. Each
//! task reports exactly one [`CategoryArrival`] over a channel, whether the
//! request succeeded, failed, timed out, or was cancelled. A
//! [`FetchBarrier`] counts arrivals and releases the accumulated reports
//! once every category has been counted; only then is the single details
//! request issued.
//!
//! Accumulated reports are ordered by configured category position, then
//! feed order, so the id list sent to the details endpoint does not depend
//! on which response arrived first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use road_reports_report_models::{RawReport, Report, ReportCategory};
use tokio::sync::mpsc;

use crate::config::FeedConfig;
use crate::progress::ProgressCallback;
use crate::{SourceError, details, feed};

/// Default per-request timeout when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport for the category and details requests.
#[async_trait]
pub trait ReportFeed: Send + Sync {
    /// Returns the raw (JSONP-wrapped) body of the feed for `category`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails.
    async fn fetch_category(&self, category: ReportCategory) -> Result<String, SourceError>;

    /// Returns the raw details blob for `ids`, requested in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails.
    async fn fetch_details(&self, ids: &[String]) -> Result<String, SourceError>;
}

/// Why a request contributed nothing to a cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// The request itself failed.
    #[error("request failed: {message}")]
    Transport {
        /// Error reported by the transport.
        message: String,
    },

    /// The request did not finish within its timeout.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The request was cancelled through a [`CancelHandle`].
    #[error("cancelled")]
    Cancelled,

    /// The request task ended without reporting (e.g. it panicked).
    #[error("request task ended without reporting")]
    Lost,
}

/// Identifies one in-flight request of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// The feed request for a category.
    Category(ReportCategory),
    /// The details request.
    Details,
}

/// Cancels in-flight requests of the current cycle independently.
///
/// Cloning yields a handle to the same set of requests.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    handles: Arc<Mutex<HashMap<RequestKind, AbortHandle>>>,
}

impl CancelHandle {
    fn register(&self, kind: RequestKind) -> AbortRegistration {
        let (handle, registration) = AbortHandle::new_pair();
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, handle);
        registration
    }

    /// Cancels the request identified by `kind`.
    ///
    /// Returns `false` if no such request was ever started.
    pub fn cancel(&self, kind: RequestKind) -> bool {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.get(&kind).is_some_and(|handle| {
            handle.abort();
            true
        })
    }

    /// Cancels every request of the cycle.
    pub fn cancel_all(&self) {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.values() {
            handle.abort();
        }
    }
}

/// Completion of one category request.
#[derive(Debug)]
pub struct CategoryArrival {
    /// Position of the category in the configured list.
    pub index: usize,
    /// The category.
    pub category: ReportCategory,
    /// Parsed reports, or why there are none.
    pub result: Result<Vec<RawReport>, FetchFailure>,
}

/// Accumulated output of a released [`FetchBarrier`].
#[derive(Debug, Default, PartialEq)]
pub struct BarrierRelease {
    /// Reports of every successful category, in configured order.
    pub raw_reports: Vec<RawReport>,
    /// Failed categories, in configured order.
    pub failures: Vec<(ReportCategory, FetchFailure)>,
}

/// Counting barrier over a fixed list of category requests.
///
/// Every arrival counts, failures included, so the barrier cannot stall
/// on a failed request. The release is handed out exactly once.
#[derive(Debug)]
pub struct FetchBarrier {
    categories: Vec<ReportCategory>,
    slots: Vec<Option<Result<Vec<RawReport>, FetchFailure>>>,
    arrived: usize,
    released: bool,
}

impl FetchBarrier {
    /// Creates a barrier expecting one arrival per entry of `categories`.
    #[must_use]
    pub fn new(categories: Vec<ReportCategory>) -> Self {
        let slots = categories.iter().map(|_| None).collect();
        Self {
            categories,
            slots,
            arrived: 0,
            released: false,
        }
    }

    /// Number of arrivals needed to release.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.slots.len()
    }

    /// Number of arrivals counted so far.
    #[must_use]
    pub const fn arrived(&self) -> usize {
        self.arrived
    }

    /// Whether the release has been taken.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Counts an arrival. Returns `false` if it was ignored because its
    /// slot was already filled, its index is out of range, or the barrier
    /// was already released.
    pub fn arrive(&mut self, arrival: CategoryArrival) -> bool {
        let CategoryArrival {
            index,
            category,
            result,
        } = arrival;

        if self.released {
            log::warn!("{category}: arrived after the barrier released, ignoring");
            return false;
        }
        let Some(slot) = self.slots.get_mut(index) else {
            log::warn!("{category}: arrival index {index} out of range, ignoring");
            return false;
        };
        if slot.is_some() {
            log::warn!("{category}: duplicate arrival, ignoring");
            return false;
        }

        match &result {
            Ok(reports) => log::info!("{category}: {} reports", reports.len()),
            Err(failure) => log::error!("{category}: {failure}"),
        }
        *slot = Some(result);
        self.arrived += 1;
        true
    }

    /// Marks every category that has not arrived as [`FetchFailure::Lost`].
    pub fn abandon_pending(&mut self) {
        for (slot, category) in self.slots.iter_mut().zip(&self.categories) {
            if slot.is_none() {
                log::error!("{category}: {}", FetchFailure::Lost);
                *slot = Some(Err(FetchFailure::Lost));
                self.arrived += 1;
            }
        }
    }

    /// Returns the accumulated reports once every category has arrived.
    ///
    /// Returns `Some` exactly once per barrier.
    pub fn take_release(&mut self) -> Option<BarrierRelease> {
        if self.released || self.arrived < self.expected() {
            return None;
        }
        self.released = true;

        let mut release = BarrierRelease::default();
        for (slot, category) in self.slots.iter_mut().zip(&self.categories) {
            match slot.take() {
                Some(Ok(reports)) => release.raw_reports.extend(reports),
                Some(Err(failure)) => release.failures.push((*category, failure)),
                None => {}
            }
        }
        Some(release)
    }
}

/// Outcome of one fetch cycle.
#[derive(Debug, Default, PartialEq)]
pub struct FetchCycle {
    /// Merged reports with geometry, in accumulator order.
    pub reports: Vec<Report>,
    /// Categories that contributed nothing, and why.
    pub failed_categories: Vec<(ReportCategory, FetchFailure)>,
    /// Why the details request contributed nothing, if it did not.
    pub details_failure: Option<FetchFailure>,
    /// Ids sent to the details endpoint, in request order.
    pub requested_ids: Vec<String>,
    /// Number of fragments found in the details response.
    pub fragment_count: usize,
    /// Raw reports dropped for lacking geometry.
    pub dropped_without_geometry: usize,
    /// Reports that received no detail fragment.
    pub missing_detail: usize,
}

impl FetchCycle {
    /// `true` if every request of the cycle succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_categories.is_empty() && self.details_failure.is_none()
    }
}

/// Runs fetch cycles against a [`ReportFeed`].
pub struct FetchCoordinator {
    feed: Arc<dyn ReportFeed>,
    categories: Vec<ReportCategory>,
    category_timeout: Duration,
    details_timeout: Duration,
    cancel: CancelHandle,
}

impl FetchCoordinator {
    /// Creates a coordinator requesting `categories` from `feed`, with the
    /// default timeouts.
    #[must_use]
    pub fn new(feed: Arc<dyn ReportFeed>, categories: Vec<ReportCategory>) -> Self {
        Self {
            feed,
            categories,
            category_timeout: DEFAULT_TIMEOUT,
            details_timeout: DEFAULT_TIMEOUT,
            cancel: CancelHandle::default(),
        }
    }

    /// Creates a coordinator with the categories and timeouts of `config`.
    #[must_use]
    pub fn from_config(feed: Arc<dyn ReportFeed>, config: &FeedConfig) -> Self {
        Self::new(feed, config.categories.clone())
            .with_timeouts(config.category_timeout(), config.details_timeout())
    }

    /// Overrides the per-category and details timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, category: Duration, details: Duration) -> Self {
        self.category_timeout = category;
        self.details_timeout = details;
        self
    }

    /// Categories requested each cycle.
    #[must_use]
    pub fn categories(&self) -> &[ReportCategory] {
        &self.categories
    }

    /// Returns a handle that cancels requests of the running cycle.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs one fetch cycle.
    ///
    /// Never fails: request failures are recorded in the returned
    /// [`FetchCycle`] and the affected reports or details are left out.
    pub async fn run(&self, progress: Arc<dyn ProgressCallback>) -> FetchCycle {
        let expected = self.categories.len();
        log::info!("Requesting {expected} category feeds...");
        progress.set_total(expected as u64);
        progress.set_message("Fetching category feeds".to_string());

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (index, &category) in self.categories.iter().enumerate() {
            let feed = Arc::clone(&self.feed);
            let tx = tx.clone();
            let registration = self.cancel.register(RequestKind::Category(category));
            let timeout = self.category_timeout;
            tokio::spawn(async move {
                let result = guarded(timeout, registration, feed.fetch_category(category))
                    .await
                    .map(|body| feed::parse_feed(&body, category));
                let arrival = CategoryArrival {
                    index,
                    category,
                    result,
                };
                if tx.send(arrival).is_err() {
                    log::debug!("{category}: coordinator gone, dropping arrival");
                }
            });
        }
        drop(tx);

        let mut barrier = FetchBarrier::new(self.categories.clone());
        let release = loop {
            if let Some(release) = barrier.take_release() {
                break release;
            }
            match rx.recv().await {
                Some(arrival) => {
                    if barrier.arrive(arrival) {
                        progress.inc(1);
                    }
                }
                None => barrier.abandon_pending(),
            }
        };

        let requested_ids: Vec<String> = release.raw_reports.iter().map(|r| r.id.clone()).collect();
        log::info!(
            "All {expected} category feeds counted ({} failed); requesting details for {} reports",
            release.failures.len(),
            requested_ids.len(),
        );
        progress.set_message("Fetching report details".to_string());

        let registration = self.cancel.register(RequestKind::Details);
        let details = guarded(
            self.details_timeout,
            registration,
            self.feed.fetch_details(&requested_ids),
        )
        .await;

        let (fragments, details_failure) = match details {
            Ok(blob) => (details::extract_fragments(&blob), None),
            Err(failure) => {
                log::error!("details: {failure}");
                (Vec::new(), Some(failure))
            }
        };
        let fragment_count = fragments.len();
        let merged = details::merge(release.raw_reports, fragments);

        progress.finish(format!("{} reports", merged.reports.len()));
        log::info!(
            "Fetch cycle complete: {} reports, {} fragments",
            merged.reports.len(),
            fragment_count
        );

        FetchCycle {
            reports: merged.reports,
            failed_categories: release.failures,
            details_failure,
            requested_ids,
            fragment_count,
            dropped_without_geometry: merged.dropped_without_geometry,
            missing_detail: merged.missing_detail,
        }
    }
}

/// Runs `fut` under a timeout and an abort registration.
async fn guarded<T, F>(
    timeout: Duration,
    registration: AbortRegistration,
    fut: F,
) -> Result<T, FetchFailure>
where
    F: Future<Output = Result<T, SourceError>>,
{
    match tokio::time::timeout(timeout, Abortable::new(fut, registration)).await {
        Err(_) => Err(FetchFailure::TimedOut(timeout)),
        Ok(Err(_)) => Err(FetchFailure::Cancelled),
        Ok(Ok(Err(e))) => Err(FetchFailure::Transport {
            message: e.to_string(),
        }),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}
