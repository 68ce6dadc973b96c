//! Feed endpoint configuration.
//!
//! The default configuration is embedded at compile time from
//! `feeds/virginia.toml`. A replacement file with the same schema can be
//! loaded at runtime with [`FeedConfig::from_path`].

use std::path::Path;
use std::time::Duration;

use road_reports_report_models::ReportCategory;
use serde::Deserialize;

use crate::SourceError;

/// Embedded default feed definition.
const DEFAULT_FEED_TOML: &str = include_str!("../feeds/virginia.toml");

/// Placeholder replaced by the category name in
/// [`FeedConfig::category_url_template`].
pub const CATEGORY_PLACEHOLDER: &str = "{category}";

/// Percent-encoded comma joining ids in the details request.
pub const ID_SEPARATOR: &str = "%2C";

/// Endpoints and limits for one publisher's report feeds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Unique identifier (e.g., `"va_511"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Region label stored in settings and shown in prompts.
    pub region: String,
    /// Key of the persisted settings record.
    pub settings_key: String,
    /// Category feed URL with a `{category}` placeholder.
    pub category_url_template: String,
    /// Details endpoint, without query string.
    pub details_url: String,
    /// Query parameter carrying the joined id list.
    #[serde(default = "default_details_param")]
    pub details_param: String,
    /// Base URL of the category marker icons.
    #[serde(default)]
    pub image_base_url: Option<String>,
    /// Categories requested each cycle, in accumulation order.
    pub categories: Vec<ReportCategory>,
    /// Per-category request timeout.
    #[serde(default = "default_timeout_secs")]
    pub category_timeout_secs: u64,
    /// Details request timeout.
    #[serde(default = "default_timeout_secs")]
    pub details_timeout_secs: u64,
}

fn default_details_param() -> String {
    "idents".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl FeedConfig {
    /// Returns the embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. It is a compile-time
    /// constant covered by tests.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml(DEFAULT_FEED_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded feed config: {e}"))
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the text is not a valid config.
    pub fn from_toml(text: &str) -> Result<Self, SourceError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded feed config '{}' from {}", config.id, path.display());
        Ok(config)
    }

    /// URL of the feed for `category`.
    #[must_use]
    pub fn category_url(&self, category: ReportCategory) -> String {
        self.category_url_template
            .replace(CATEGORY_PLACEHOLDER, category.as_ref())
    }

    /// URL of the details request for `ids`, in the given order.
    #[must_use]
    pub fn details_request_url(&self, ids: &[String]) -> String {
        format!(
            "{}?{}={}",
            self.details_url,
            self.details_param,
            ids.join(ID_SEPARATOR)
        )
    }

    /// URL of the marker icon for `category`, if icons are configured.
    #[must_use]
    pub fn icon_url(&self, category: ReportCategory) -> Option<String> {
        self.image_base_url
            .as_ref()
            .map(|base| format!("{base}{}.png", category.icon_name()))
    }

    /// Per-category request timeout as a [`Duration`].
    #[must_use]
    pub const fn category_timeout(&self) -> Duration {
        Duration::from_secs(self.category_timeout_secs)
    }

    /// Details request timeout as a [`Duration`].
    #[must_use]
    pub const fn details_timeout(&self) -> Duration {
        Duration::from_secs(self.details_timeout_secs)
    }
}
