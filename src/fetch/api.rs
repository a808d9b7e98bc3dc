//! Kalshi public REST API provider.
//!
//! One HTTP request per logical call. Failures surface as [`FetchError`] and
//! are never retried here; retry policy belongs to whoever calls the CLI.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};
use url::Url;

use crate::config::AppConfig;
use crate::extract::{ApiPayload, Source};
use crate::fetch::{FetchError, SourceProvider};
use crate::market::kalshi::{EventsResponse, KalshiEvent, KalshiMarket};
use crate::market::target::{category_name, Target};

/// Longest slice of an error body kept in a [`FetchError::Http`].
const MAX_ERROR_BODY: usize = 200;

pub struct ApiProvider {
    http: reqwest::Client,
    api_base_url: String,
    web_base: Url,
    category_fetch_floor: usize,
}

impl ApiProvider {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.kalshi.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        let web_base = Url::parse(&config.kalshi.web_base_url)
            .with_context(|| format!("Invalid web_base_url: {}", config.kalshi.web_base_url))?;

        Ok(Self {
            http,
            api_base_url: config.kalshi.api_base_url.trim_end_matches('/').to_string(),
            web_base,
            category_fetch_floor: config.browse.category_fetch_floor,
        })
    }

    /// Open events, optionally filtered to one category, at most `limit` of them.
    #[instrument(skip(self))]
    pub async fn fetch_events(
        &self,
        category_slug: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KalshiEvent>, FetchError> {
        // Category filtering happens client-side, so ask for a wider page when
        // matching events may be sparse.
        let api_limit = match category_slug {
            Some(_) => limit.max(self.category_fetch_floor),
            None => limit,
        };

        let response: EventsResponse = self
            .get_json(
                "/events",
                &[
                    ("with_nested_markets", "true".to_string()),
                    ("status", "open".to_string()),
                    ("limit", api_limit.to_string()),
                ],
            )
            .await?;

        let mut events = response.events;
        if let Some(slug) = category_slug {
            let category = category_name(slug);
            events.retain(|event| event.in_category(&category));
        }
        events.truncate(limit);

        info!(count = events.len(), category = ?category_slug, "Events fetched from Kalshi API");
        Ok(events)
    }

    /// A single event with its markets.
    #[instrument(skip(self))]
    pub async fn fetch_event(&self, event_ticker: &str) -> Result<KalshiEvent, FetchError> {
        let path = format!("/events/{}", urlencoding::encode(event_ticker));
        let body: serde_json::Value = self
            .get_json(&path, &[("with_nested_markets", "true".to_string())])
            .await?;

        let event = decode_event(&path, body)?;
        info!(markets = event.markets.len(), "Event fetched from Kalshi API");
        Ok(event)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.api_base_url, path);

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(path, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(path, e))?;

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                path: path.to_string(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::InvalidJson {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// `GET /events/{ticker}` wraps the event as `{"event": {...}}` and, depending
/// on the API version, nests markets inside it or returns them alongside.
fn decode_event(path: &str, mut body: serde_json::Value) -> Result<KalshiEvent, FetchError> {
    let invalid = |e: serde_json::Error| FetchError::InvalidJson {
        path: path.to_string(),
        message: e.to_string(),
    };

    let Some(event_value) = body.get_mut("event").map(serde_json::Value::take) else {
        return serde_json::from_value(body).map_err(invalid);
    };

    let mut event: KalshiEvent = serde_json::from_value(event_value).map_err(invalid)?;
    if event.markets.is_empty() {
        let sibling_markets = body
            .get_mut("markets")
            .map(serde_json::Value::take)
            .filter(|markets| !markets.is_null());
        if let Some(markets) = sibling_markets {
            event.markets = serde_json::from_value::<Vec<KalshiMarket>>(markets).map_err(invalid)?;
        }
    }
    Ok(event)
}

#[async_trait]
impl SourceProvider for ApiProvider {
    async fn obtain_listing(&self, target: &Target, max_results: usize) -> Result<Source, FetchError> {
        let events = self.fetch_events(target.category_slug(), max_results).await?;
        Ok(Source::Api(ApiPayload::new(self.web_base.clone(), events)))
    }

    async fn obtain_market(&self, target: &Target) -> Result<Source, FetchError> {
        let Some(ticker) = target.event_ticker() else {
            return Err(FetchError::InvalidTarget(target.to_string()));
        };
        let event = self.fetch_event(ticker).await?;
        Ok(Source::Api(ApiPayload::single(self.web_base.clone(), event)))
    }

    fn name(&self) -> &str {
        "kalshi-api"
    }
}
