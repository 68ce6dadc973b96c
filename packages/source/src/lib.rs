#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road report category feeds, detail correlation, and the fetch coordinator.
//!
//! A fetch cycle requests every configured category feed concurrently,
//! waits on a counting barrier until each request has completed (or failed,
//! or timed out), then issues a single details request for the accumulated
//! ids and correlates the returned fragments back onto the reports by
//! position. See [`coordinator::FetchCoordinator`].

pub mod config;
pub mod coordinator;
pub mod details;
pub mod feed;
pub mod http;
pub mod progress;
pub mod retry;

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP response had a non-success status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code returned by the server.
        status: reqwest::StatusCode,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Feed configuration could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error (config file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
