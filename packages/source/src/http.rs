//! `reqwest`-backed [`ReportFeed`].

use std::time::Duration;

use async_trait::async_trait;
use road_reports_report_models::ReportCategory;

use crate::config::FeedConfig;
use crate::coordinator::ReportFeed;
use crate::{SourceError, retry};

/// Fetches category feeds and details over HTTP using the endpoints of a
/// [`FeedConfig`].
pub struct HttpFeed {
    client: reqwest::Client,
    config: FeedConfig,
}

impl HttpFeed {
    /// Builds a feed client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: FeedConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the configuration this feed requests from.
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }
}

#[async_trait]
impl ReportFeed for HttpFeed {
    async fn fetch_category(&self, category: ReportCategory) -> Result<String, SourceError> {
        let url = self.config.category_url(category);
        log::debug!("{category}: GET {url}");
        retry::send_text(|| self.client.get(&url)).await
    }

    async fn fetch_details(&self, ids: &[String]) -> Result<String, SourceError> {
        let url = self.config.details_request_url(ids);
        log::debug!("details: GET {url}");
        retry::send_text(|| self.client.get(&url)).await
    }
}
