//! Wires target resolution, a [`SourceProvider`] and the extractors into the
//! two user-facing operations: browse and market.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, SourceKind};
use crate::extract::{extract_listing, extract_outcomes, extract_title};
use crate::fetch::api::ApiProvider;
use crate::fetch::browser::BrowserProvider;
use crate::fetch::{FetchError, SourceProvider};
use crate::market::models::{MarketListing, MarketResult};
use crate::market::target::Target;

pub struct MarketService {
    provider: Box<dyn SourceProvider>,
}

impl MarketService {
    pub fn new(provider: Box<dyn SourceProvider>) -> Self {
        Self { provider }
    }

    /// Build the provider selected by `kind`.
    pub fn from_config(config: &AppConfig, kind: SourceKind) -> Result<Self> {
        let provider: Box<dyn SourceProvider> = match kind {
            SourceKind::Api => Box::new(ApiProvider::new(config)?),
            SourceKind::Browser => Box::new(BrowserProvider::new(config)?),
        };
        Ok(Self::new(provider))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Up to `max_results` distinct market listings for a browse/category URL.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn browse(&self, input: &str, max_results: usize) -> Result<Vec<MarketListing>, FetchError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let target = Target::parse(input);
        let source = self.provider.obtain_listing(&target, max_results).await?;
        let listings = extract_listing(&source, max_results);
        info!(count = listings.len(), %target, "Listings extracted");
        Ok(listings)
    }

    /// Outcomes and prices for one market. Never fails: problems are reported
    /// in the returned envelope.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn market(&self, input: &str) -> MarketResult {
        let target = Target::parse(input);
        if target.event_ticker().is_none() {
            warn!("Input does not name a market");
            return MarketResult::build_error(FetchError::InvalidTarget(input.trim().to_string()).to_string());
        }

        let source = match self.provider.obtain_market(&target).await {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Failed to obtain market");
                return MarketResult::build_error(e.to_string());
            }
        };

        let result = MarketResult::build(extract_title(&source), extract_outcomes(&source));
        info!(
            status = %result.status(),
            outcomes = result.outcomes().len(),
            "Market extracted"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use url::Url;

    use crate::extract::{RenderedPage, Source};
    use crate::market::models::MarketStatus;

    /// Serves a fixed HTML snapshot, or a fixed error.
    struct StaticProvider {
        html: Option<&'static str>,
    }

    #[async_trait]
    impl SourceProvider for StaticProvider {
        async fn obtain_listing(&self, _target: &Target, _max: usize) -> Result<Source, FetchError> {
            self.page("https://kalshi.com/browse")
        }

        async fn obtain_market(&self, target: &Target) -> Result<Source, FetchError> {
            self.page(&target.page_url(&Url::parse("https://kalshi.com").unwrap()).to_string())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    impl StaticProvider {
        fn page(&self, url: &str) -> Result<Source, FetchError> {
            match self.html {
                Some(html) => Ok(Source::Rendered(RenderedPage::new(Url::parse(url).unwrap(), html))),
                None => Err(FetchError::HydrationTimeout {
                    what: "market page".to_string(),
                    waited: std::time::Duration::from_secs(20),
                }),
            }
        }
    }

    fn service(html: Option<&'static str>) -> MarketService {
        MarketService::new(Box::new(StaticProvider { html }))
    }

    #[tokio::test]
    async fn test_market_ok() {
        let html = r#"<h1>Fed decision in March</h1>
            <div><span>Hold</span><span>91%</span></div>
            <div><span>Cut 25bps</span><span>8%</span></div>"#;
        let result = service(Some(html)).market("KXFED-26MAR").await;

        assert_eq!(result.status(), MarketStatus::Ok);
        assert_eq!(result.title(), Some("Fed decision in March"));
        assert_eq!(result.outcomes().len(), 2);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_market_without_outcomes() {
        let result = service(Some("<h1>Empty market page</h1>")).market("KXFED-26MAR").await;
        assert_eq!(result.status(), MarketStatus::NoOutcomesFound);
        assert!(result.error().is_none());
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_market_provider_error() {
        let result = service(None).market("KXFED-26MAR").await;
        assert_eq!(result.status(), MarketStatus::Error);
        assert_eq!(
            result.error(),
            Some("Timed out after 20s waiting for market page to render")
        );
        assert!(result.outcomes().is_empty());
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_market_rejects_non_market_input() {
        let result = service(Some("")).market("https://kalshi.com/category/politics").await;
        assert_eq!(result.status(), MarketStatus::Error);
        assert_eq!(
            result.error(),
            Some("Could not extract event ticker from URL: https://kalshi.com/category/politics")
        );
    }

    #[tokio::test]
    async fn test_browse_caps_results() {
        let html = r#"
            <a href="/markets/a/one">Market one</a>
            <a href="/markets/b/two">Market two</a>
            <a href="/markets/c/three">Market three</a>"#;
        let listings = service(Some(html)).browse("https://kalshi.com", 2).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].url, "https://kalshi.com/markets/a/one");
    }

    #[tokio::test]
    async fn test_browse_propagates_provider_error() {
        let result = service(None).browse("https://kalshi.com", 5).await;
        assert!(matches!(result, Err(FetchError::HydrationTimeout { .. })));
    }

    #[tokio::test]
    async fn test_browse_zero_max_skips_fetch() {
        let listings = service(None).browse("https://kalshi.com", 0).await.unwrap();
        assert!(listings.is_empty());
    }
}
