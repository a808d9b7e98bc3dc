use serde::{Deserialize, Serialize};

use crate::market::price;

/// One market link from a browse page or event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListing {
    pub title: String,
    pub url: String,
}

/// One priced option within a market: "Yes", a candidate, a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub label: String,
    /// `None` only when `raw` could not be read as a price.
    pub price_cents: Option<u8>,
    /// The price token exactly as the source showed it.
    pub raw: String,
}

impl Outcome {
    /// Build an outcome from a raw price token, normalizing it on the way in.
    pub fn from_raw(label: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::from_token(label, price::PriceToken::parse(raw))
    }

    pub fn from_token(label: impl Into<String>, token: price::PriceToken) -> Self {
        Self {
            label: label.into(),
            price_cents: token.cents,
            raw: token.raw,
        }
    }

    pub fn new(label: impl Into<String>, price_cents: Option<u8>, raw: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            price_cents,
            raw: raw.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Ok,
    NoOutcomesFound,
    Error,
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::NoOutcomesFound => write!(f, "no_outcomes_found"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Canonical result for a single market lookup.
///
/// Only constructed through [`MarketResult::build`] and
/// [`MarketResult::build_error`], which keep status, outcomes and error
/// consistent with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketResult {
    pub(super) title: Option<String>,
    pub(super) outcomes: Vec<Outcome>,
    pub(super) status: MarketStatus,
    pub(super) error: Option<String>,
}

impl MarketResult {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn status(&self) -> MarketStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the caller should treat this as a successful lookup (exit 0).
    pub fn is_success(&self) -> bool {
        self.status != MarketStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_raw_keeps_token() {
        let outcome = Outcome::from_raw("Yes", "47¢");
        assert_eq!(outcome.price_cents, Some(47));
        assert_eq!(outcome.raw, "47¢");
    }

    #[test]
    fn test_outcome_from_unparseable_raw() {
        let outcome = Outcome::from_raw("Judy Shelton", "<1%");
        assert_eq!(outcome.price_cents, None);
        assert_eq!(outcome.raw, "<1%");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&MarketStatus::NoOutcomesFound).unwrap();
        assert_eq!(json, "\"no_outcomes_found\"");
        assert_eq!(MarketStatus::Ok.to_string(), "ok");
    }

    #[test]
    fn test_outcome_serializes_null_price() {
        let value = serde_json::to_value(Outcome::from_raw("No", "n/a")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"label": "No", "price_cents": null, "raw": "n/a"})
        );
    }
}
