//! Result envelope construction.
//!
//! Pure mapping from extractor output to [`MarketResult`]; this is the only
//! place a `MarketResult` is created, so the status invariants hold everywhere.

use crate::market::models::{MarketResult, MarketStatus, Outcome};

impl MarketResult {
    /// Wrap extracted outcomes. An empty outcome list is the degraded
    /// `no_outcomes_found` signal, not an error.
    pub fn build(title: Option<String>, outcomes: Vec<Outcome>) -> Self {
        let status = if outcomes.is_empty() {
            MarketStatus::NoOutcomesFound
        } else {
            MarketStatus::Ok
        };

        Self {
            title: clean_title(title),
            outcomes,
            status,
            error: None,
        }
    }

    /// A failed lookup: no outcomes and a human-readable message.
    pub fn build_error(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };

        Self {
            title: None,
            outcomes: Vec::new(),
            status: MarketStatus::Error,
            error: Some(message),
        }
    }
}

fn clean_title(title: Option<String>) -> Option<String> {
    title
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ok() {
        let result = MarketResult::build(
            Some("Fed chair nominee".to_string()),
            vec![
                Outcome::from_raw("Kevin Warsh", "98%"),
                Outcome::from_raw("Judy Shelton", "2%"),
            ],
        );
        assert_eq!(result.status(), MarketStatus::Ok);
        assert_eq!(result.error(), None);
        assert_eq!(result.outcomes().len(), 2);
        assert_eq!(result.outcomes()[0].price_cents, Some(98));
        assert!(result.is_success());
    }

    #[test]
    fn test_build_empty_is_degraded_not_error() {
        let result = MarketResult::build(Some("Quiet market".to_string()), Vec::new());
        assert_eq!(result.status(), MarketStatus::NoOutcomesFound);
        assert_eq!(result.error(), None);
        assert!(result.outcomes().is_empty());
        assert!(result.is_success());
    }

    #[test]
    fn test_build_error() {
        let result = MarketResult::build_error("Timed out waiting for market page to render");
        assert_eq!(result.status(), MarketStatus::Error);
        assert!(result.outcomes().is_empty());
        assert_eq!(
            result.error(),
            Some("Timed out waiting for market page to render")
        );
        assert!(!result.is_success());
    }

    #[test]
    fn test_build_error_never_blank() {
        let result = MarketResult::build_error("   ");
        assert_eq!(result.error(), Some("Unknown error"));
    }

    #[test]
    fn test_title_whitespace_collapsed() {
        let result = MarketResult::build(Some("  Who will\n win?  ".to_string()), Vec::new());
        assert_eq!(result.title(), Some("Who will win?"));

        let result = MarketResult::build(Some("   ".to_string()), Vec::new());
        assert_eq!(result.title(), None);
    }

    #[test]
    fn test_json_shape() {
        let result = MarketResult::build(None, vec![Outcome::from_raw("Yes", "47¢")]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": null,
                "outcomes": [{"label": "Yes", "price_cents": 47, "raw": "47¢"}],
                "status": "ok",
                "error": null
            })
        );
    }
}
