//! Market listing extraction from browse pages and event feeds.

use std::collections::HashSet;

use lazy_static::lazy_static;
use scraper::{ElementRef, Selector};
use url::Url;

use crate::extract::dom::{text_lines, PRICE_LINE};
use crate::extract::source::{ApiPayload, RenderedPage, Source};
use crate::market::models::MarketListing;
use crate::market::target::event_page_url;

lazy_static! {
    static ref MARKET_LINK: Selector = Selector::parse(
        r#"a[href*="/markets/"]"#
    ).expect("market link selector is valid");
}

/// Card titles shorter than this are icons or badges, not market names.
const MIN_TITLE_LEN: usize = 5;
/// `/markets` alone is navigation; real markets sit at least one level deeper.
const MIN_MARKET_PATH_SEGMENTS: usize = 2;

/// Extract up to `max_results` listings in source order, each url at most once.
pub fn extract_listing(source: &Source, max_results: usize) -> Vec<MarketListing> {
    match source {
        Source::Rendered(page) => listings_from_page(page, max_results),
        Source::Api(payload) => listings_from_api(payload, max_results),
    }
}

fn listings_from_page(page: &RenderedPage, max_results: usize) -> Vec<MarketListing> {
    let document = page.document();
    let candidates = document
        .select(&MARKET_LINK)
        .filter_map(|link| market_link(page.url(), link));
    collect_unique(candidates, max_results)
}

fn market_link(base: &Url, link: ElementRef<'_>) -> Option<MarketListing> {
    let href = link.value().attr("href")?.trim();
    let url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let segments = url.path_segments()?.filter(|s| !s.is_empty()).count();
    if segments < MIN_MARKET_PATH_SEGMENTS {
        return None;
    }

    let title = card_title(link)?;
    Some(MarketListing {
        title,
        url: url.to_string(),
    })
}

/// Card text up to the first price snippet ("Title\n8%" → "Title"), falling
/// back to the link's accessible name.
fn card_title(link: ElementRef<'_>) -> Option<String> {
    let text = text_lines(link)
        .into_iter()
        .take_while(|line| !PRICE_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join(" ");

    let title = if text.is_empty() {
        link.value()
            .attr("aria-label")
            .or_else(|| link.value().attr("title"))
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    } else {
        text
    };

    (title.chars().count() >= MIN_TITLE_LEN).then_some(title)
}

fn listings_from_api(payload: &ApiPayload, max_results: usize) -> Vec<MarketListing> {
    let candidates = payload.events().iter().filter_map(|event| {
        let title = event.title()?;
        let ticker = event.event_ticker()?;
        let series = event.series_ticker().unwrap_or(ticker);
        Some(MarketListing {
            title: title.to_string(),
            url: event_page_url(payload.web_base(), series, title, ticker).to_string(),
        })
    });
    collect_unique(candidates, max_results)
}

/// Drop untitled or relative entries, keep the first of each url, and stop at
/// `max_results` distinct entries. Duplicates never count against the cap.
fn collect_unique(
    candidates: impl IntoIterator<Item = MarketListing>,
    max_results: usize,
) -> Vec<MarketListing> {
    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for candidate in candidates {
        if listings.len() >= max_results {
            break;
        }

        let title = candidate.title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() || Url::parse(&candidate.url).is_err() {
            continue;
        }
        if !seen.insert(candidate.url.clone()) {
            continue;
        }

        listings.push(MarketListing {
            title,
            url: candidate.url,
        });
    }

    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::kalshi::KalshiEvent;

    fn page(html: &str) -> Source {
        Source::Rendered(RenderedPage::new(
            Url::parse("https://kalshi.com/browse").unwrap(),
            html,
        ))
    }

    fn listing(title: &str, url: &str) -> MarketListing {
        MarketListing {
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    const BROWSE: &str = r#"
        <nav><a href="/markets/">Markets</a><a href="/category/politics">Politics</a></nav>
        <a href="/markets/kxfed/fed-decision"><span>Fed decision in March</span><span>8%</span></a>
        <a href="https://kalshi.com/markets/kxgov/shutdown"><div>Government shutdown</div><div>&lt;1%</div></a>
        <a href="/markets/kxfed/fed-decision"><span>Fed decision in March</span></a>
        <a href="/markets/kxnba/finals"><img src="x.png"></a>
        <a href="/markets/kxnba/finals">NBA Finals champion</a>
        <a href="/markets/kxbtc/bitcoin-price">Bitcoin price today</a>
        <a href="/markets/kxcpi/cpi">CPI in May</a>
    "#;

    #[test]
    fn test_rendered_listing_in_document_order() {
        assert_eq!(
            extract_listing(&page(BROWSE), 20),
            vec![
                listing("Fed decision in March", "https://kalshi.com/markets/kxfed/fed-decision"),
                listing("Government shutdown", "https://kalshi.com/markets/kxgov/shutdown"),
                listing("NBA Finals champion", "https://kalshi.com/markets/kxnba/finals"),
                listing("Bitcoin price today", "https://kalshi.com/markets/kxbtc/bitcoin-price"),
                listing("CPI in May", "https://kalshi.com/markets/kxcpi/cpi"),
            ]
        );
    }

    #[test]
    fn test_duplicates_do_not_consume_budget() {
        let listings = extract_listing(&page(BROWSE), 3);
        assert_eq!(
            listings.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(),
            vec![
                "https://kalshi.com/markets/kxfed/fed-decision",
                "https://kalshi.com/markets/kxgov/shutdown",
                "https://kalshi.com/markets/kxnba/finals",
            ]
        );
    }

    #[test]
    fn test_cap_is_respected_for_every_k() {
        for k in 0..8 {
            let listings = extract_listing(&page(BROWSE), k);
            assert_eq!(listings.len(), k.min(5), "k = {k}");
        }
    }

    #[test]
    fn test_accessible_name_fallback() {
        let listings = extract_listing(
            &page(r#"<a href="/markets/kxnba/finals" aria-label="NBA Finals champion"><img></a>"#),
            5,
        );
        assert_eq!(listings[0].title, "NBA Finals champion");
    }

    #[test]
    fn test_page_without_links() {
        assert!(extract_listing(&page("<div id=root></div>"), 20).is_empty());
    }

    #[test]
    fn test_api_listing() {
        let events: Vec<KalshiEvent> = serde_json::from_value(serde_json::json!([
            {"event_ticker": "KXFED-26MAR", "series_ticker": "KXFED", "title": "Fed decision in March"},
            {"event_ticker": "KXGOV-26", "title": ""},
            {"title": "No ticker"},
            {"event_ticker": "KXFED-26MAR", "series_ticker": "KXFED", "title": "Fed decision in March"},
            {"event_ticker": "KXCPI-26MAY", "title": "CPI in May"}
        ]))
        .unwrap();
        let source = Source::Api(ApiPayload::new(Url::parse("https://kalshi.com").unwrap(), events));

        assert_eq!(
            extract_listing(&source, 20),
            vec![
                listing(
                    "Fed decision in March",
                    "https://kalshi.com/markets/kxfed/fed-decision-in-march/kxfed-26mar"
                ),
                listing("CPI in May", "https://kalshi.com/markets/kxcpi/cpi-in-may/kxcpi-26may"),
            ]
        );
    }

    #[test]
    fn test_collect_unique_first_wins() {
        let listings = collect_unique(
            vec![
                listing("First", "https://kalshi.com/markets/a/b"),
                listing("Second", "https://kalshi.com/markets/a/b"),
                listing("  ", "https://kalshi.com/markets/c/d"),
                listing("Relative", "/markets/e/f"),
            ],
            10,
        );
        assert_eq!(listings, vec![listing("First", "https://kalshi.com/markets/a/b")]);
    }
}
