//! Render/fetch adapters.
//!
//! A [`SourceProvider`] gets a market page into a state the extractors can
//! read: the REST API returns structured events directly, the browser
//! provider waits for client-side hydration before taking a snapshot.

pub mod api;
pub mod browser;
pub mod hydration;
pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;

use crate::extract::Source;
use crate::market::target::Target;

/// Why a source could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Kalshi returned HTTP {status} for {path}: {body}")]
    Http {
        status: u16,
        path: String,
        body: String,
    },

    #[error("Network error calling {path}: {message}")]
    Network { path: String, message: String },

    #[error("Request to {path} timed out")]
    Timeout { path: String },

    #[error("Invalid JSON from {path}: {message}")]
    InvalidJson { path: String, message: String },

    #[error("Timed out after {}s waiting for {what} to render", .waited.as_secs())]
    HydrationTimeout { what: String, waited: Duration },

    #[error("Browser driver unavailable: {0}")]
    Driver(String),

    #[error("WebDriver {error}: {message}")]
    WebDriver { error: String, message: String },

    #[error("Could not extract event ticker from URL: {0}")]
    InvalidTarget(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(path: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                path: path.to_string(),
            }
        } else {
            Self::Network {
                path: path.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Obtains a [`Source`] for listing or single-market extraction.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Source for a browse/category page. `max_results` lets API providers
    /// size their request; it does not cap the source itself.
    async fn obtain_listing(&self, target: &Target, max_results: usize) -> Result<Source, FetchError>;

    /// Source for a single market/event.
    async fn obtain_market(&self, target: &Target) -> Result<Source, FetchError>;

    /// Human-readable name of this provider.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hydration_timeout_message() {
        let err = FetchError::HydrationTimeout {
            what: "market page".to_string(),
            waited: Duration::from_secs(20),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 20s waiting for market page to render"
        );
    }

    #[test]
    fn test_http_error_message() {
        let err = FetchError::Http {
            status: 404,
            path: "/events/NOPE".to_string(),
            body: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Kalshi returned HTTP 404 for /events/NOPE: not found"
        );
    }
}
