use scraper::Html;
use url::Url;

use crate::market::kalshi::KalshiEvent;

/// A representation of a market page from which outcomes and listings can be
/// extracted, regardless of how it was obtained.
#[derive(Debug, Clone)]
pub enum Source {
    /// Markup snapshot of a fully hydrated page.
    Rendered(RenderedPage),
    /// Structured events from the REST API.
    Api(ApiPayload),
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    url: Url,
    html: String,
}

impl RenderedPage {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// The page URL, used to resolve relative links.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[derive(Debug, Clone)]
pub struct ApiPayload {
    web_base: Url,
    events: Vec<KalshiEvent>,
}

impl ApiPayload {
    /// `web_base` is the public site root that listing URLs are built against.
    pub fn new(web_base: Url, events: Vec<KalshiEvent>) -> Self {
        Self { web_base, events }
    }

    pub fn single(web_base: Url, event: KalshiEvent) -> Self {
        Self::new(web_base, vec![event])
    }

    pub fn web_base(&self) -> &Url {
        &self.web_base
    }

    pub fn events(&self) -> &[KalshiEvent] {
        &self.events
    }
}
