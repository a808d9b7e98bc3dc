//! Kalshi REST API payload types.
//!
//! The trade API is loose about which fields are present, so everything is
//! optional or defaulted and decoding never fails on a missing field.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::market::price::{self, PriceToken};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<KalshiEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KalshiEvent {
    pub event_ticker: Option<String>,
    pub series_ticker: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub mutually_exclusive: bool,
    #[serde(default)]
    pub markets: Vec<KalshiMarket>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KalshiMarket {
    pub ticker: Option<String>,
    pub title: Option<String>,
    pub yes_sub_title: Option<String>,
    /// Integer cents.
    pub last_price: Option<serde_json::Number>,
    pub yes_ask: Option<serde_json::Number>,
    pub yes_bid: Option<serde_json::Number>,
    /// Fixed-point dollar strings, e.g. "0.4700".
    pub last_price_dollars: Option<String>,
    pub yes_ask_dollars: Option<String>,
    pub yes_bid_dollars: Option<String>,
}

impl KalshiEvent {
    pub fn title(&self) -> Option<&str> {
        non_empty(self.title.as_deref())
    }

    pub fn event_ticker(&self) -> Option<&str> {
        non_empty(self.event_ticker.as_deref())
    }

    /// Series ticker, falling back to the event ticker's prefix.
    pub fn series_ticker(&self) -> Option<&str> {
        non_empty(self.series_ticker.as_deref())
            .or_else(|| self.event_ticker().and_then(|t| t.split('-').next()))
    }

    /// A lone market in a non-exclusive event is a Yes/No contract.
    pub fn is_binary(&self) -> bool {
        self.markets.len() == 1 && !self.mutually_exclusive
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category))
    }
}

impl KalshiMarket {
    /// Display label of this market's outcome row.
    pub fn label(&self) -> Option<&str> {
        non_empty(self.yes_sub_title.as_deref())
            .or_else(|| non_empty(self.title.as_deref()))
            .or_else(|| non_empty(self.ticker.as_deref()))
    }

    /// Yes price: last trade, then ask, then bid; integer cents fields before
    /// the dollar string fields.
    pub fn yes_price(&self) -> Option<PriceToken> {
        let cents_fields = [&self.last_price, &self.yes_ask, &self.yes_bid];
        let dollar_fields = [
            &self.last_price_dollars,
            &self.yes_ask_dollars,
            &self.yes_bid_dollars,
        ];

        cents_fields
            .into_iter()
            .flatten()
            .next()
            .map(|number| {
                let raw = number.to_string();
                let cents = Decimal::from_str(&raw)
                    .ok()
                    .and_then(price::cents_from_decimal);
                PriceToken { raw, cents }
            })
            .or_else(|| {
                dollar_fields.into_iter().flatten().next().map(|dollars| PriceToken {
                    raw: dollars.clone(),
                    cents: Decimal::from_str(dollars.trim())
                        .ok()
                        .and_then(price::cents_from_dollars),
                })
            })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
