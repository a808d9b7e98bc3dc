//! Outcome extraction for binary, multi-outcome and sports markets.
//!
//! Rendered pages show prices in two places: multi-outcome rows carry a
//! percentage next to the candidate name ("Kevin Warsh 98%"), and the order
//! panel carries cent prices next to Yes/No buttons ("Yes 15¢"). When both are
//! present the percentage rows are the outcomes and the cent prices belong to
//! whichever sub-market happens to be selected.

use std::collections::HashSet;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use scraper::{ElementRef, Selector};

use crate::extract::dom::{own_text, text_lines, DELTA, NON_CONTENT_TAGS, PRICE_FRAGMENT};
use crate::extract::source::{ApiPayload, RenderedPage, Source};
use crate::market::models::Outcome;
use crate::market::price;

lazy_static! {
    /// A Yes/No order button label, optionally prefixed with the action.
    static ref SIDE_LABEL: Regex = Regex::new(
        r"(?i)^(?:buy\s+|sell\s+)?(yes|no)$"
    ).expect("side label regex is valid");

    static ref TITLE_TAGS: [Selector; 2] = [
        Selector::parse("h1").expect("h1 selector is valid"),
        Selector::parse("h2").expect("h2 selector is valid"),
    ];

    static ref DOCUMENT_TITLE: Selector = Selector::parse("title").expect("title selector is valid");
}

/// SVG chart axis labels.
const CHART_TAGS: &[&str] = &["tspan", "text"];
/// Longest element text still considered a bare price cell.
const MAX_PRICE_TEXT_LEN: usize = 10;
/// How many ancestors to climb looking for a row label.
const LABEL_SEARCH_DEPTH: usize = 3;
/// How many ancestors to climb looking for the row a Yes/No price sits in.
const ROW_SEARCH_DEPTH: usize = 4;
const MAX_CENTS: Decimal = dec!(100);
const MIN_TITLE_LEN: usize = 6;
const MIN_LABEL_LEN: usize = 3;
const MAX_LABEL_LEN: usize = 59;

/// Extract outcomes in display order. Empty when the source has no outcome rows.
pub fn extract_outcomes(source: &Source) -> Vec<Outcome> {
    match source {
        Source::Rendered(page) => outcomes_from_page(page),
        Source::Api(payload) => outcomes_from_api(payload),
    }
}

/// Market title as displayed by the source.
pub fn extract_title(source: &Source) -> Option<String> {
    match source {
        Source::Rendered(page) => title_from_page(page),
        Source::Api(payload) => payload
            .events()
            .first()
            .and_then(|event| event.title())
            .map(str::to_string),
    }
}

// === Rendered pages ===

/// A price found on the page, with the row it sits in when its own label is
/// just a Yes/No side.
#[derive(Debug)]
struct PriceRow {
    outcome: Outcome,
    row: Option<String>,
}

impl PriceRow {
    fn is_side(&self) -> bool {
        self.outcome.label == "Yes" || self.outcome.label == "No"
    }

    /// `Kevin Warsh: Yes` for side rows inside a named row, the bare label otherwise.
    fn into_outcome(self) -> Outcome {
        let is_side = self.is_side();
        match self.row {
            Some(row) if is_side => Outcome {
                label: format!("{row}: {}", self.outcome.label),
                ..self.outcome
            },
            _ => self.outcome,
        }
    }
}

fn outcomes_from_page(page: &RenderedPage) -> Vec<Outcome> {
    let document = page.document();
    let mut rows = Vec::new();

    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        let tag = element.value().name();
        if CHART_TAGS.contains(&tag) || NON_CONTENT_TAGS.contains(&tag) {
            continue;
        }

        let text = own_text(element);
        if text.is_empty() || text.chars().count() > MAX_PRICE_TEXT_LEN || DELTA.is_match(&text) {
            continue;
        }
        let Some(token) = PRICE_FRAGMENT.find(&text) else {
            continue;
        };
        if is_out_of_range(token.as_str()) {
            // Percent changes and the like, not prices.
            continue;
        }

        if let Some(label) = find_label(element) {
            let outcome = Outcome::from_raw(label, token.as_str());
            let row = match outcome.label.as_str() {
                "Yes" | "No" => find_row_name(element),
                _ => None,
            };
            rows.push(PriceRow { outcome, row });
        }
    }

    let rows = prefer_percent_rows(dedupe(rows));
    if is_single_binary(&rows) {
        let yes = rows.iter().find(|r| r.outcome.label == "Yes").map(|r| r.outcome.clone());
        let no = rows.iter().find(|r| r.outcome.label == "No").map(|r| r.outcome.clone());
        return binary_pair(yes, no);
    }
    rows.into_iter().map(PriceRow::into_outcome).collect()
}

/// Non-empty text lines under `element` with price fragments stripped.
fn label_lines(element: ElementRef<'_>) -> Vec<String> {
    text_lines(element)
        .iter()
        .map(|line| PRICE_FRAGMENT.replace_all(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn is_label_sized(line: &str) -> bool {
    let len = line.chars().count();
    (MIN_LABEL_LEN..=MAX_LABEL_LEN).contains(&len) && !DELTA.is_match(line)
}

/// Walk from the price element up through its ancestors until a line of text
/// that can serve as the row label turns up.
fn find_label(price_element: ElementRef<'_>) -> Option<String> {
    let candidates = std::iter::successors(Some(price_element), |el| {
        el.parent().and_then(ElementRef::wrap)
    })
    .take(LABEL_SEARCH_DEPTH + 1);

    for element in candidates {
        let lines = label_lines(element);
        let Some(first) = lines.first() else {
            continue;
        };

        if let Some(side) = SIDE_LABEL.captures(first) {
            return Some(capitalize(&side[1]));
        }
        if is_label_sized(first) {
            return Some(first.clone());
        }
    }

    None
}

/// Name of the row a Yes/No price belongs to: the first non-side line of the
/// nearest ancestor that has one.
fn find_row_name(price_element: ElementRef<'_>) -> Option<String> {
    std::iter::successors(price_element.parent().and_then(ElementRef::wrap), |el| {
        el.parent().and_then(ElementRef::wrap)
    })
    .take(ROW_SEARCH_DEPTH)
    .find_map(|element| {
        label_lines(element)
            .into_iter()
            .find(|line| !SIDE_LABEL.is_match(line) && is_label_sized(line))
    })
}

fn is_out_of_range(token: &str) -> bool {
    let digits: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    Decimal::from_str(&digits).is_ok_and(|value| value > MAX_CENTS)
}

/// Keep the first row for each (row, label, raw) triple.
fn dedupe(rows: Vec<PriceRow>) -> Vec<PriceRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|r| {
            seen.insert((
                r.row.clone(),
                r.outcome.label.clone(),
                r.outcome.raw.clone(),
            ))
        })
        .collect()
}

fn prefer_percent_rows(rows: Vec<PriceRow>) -> Vec<PriceRow> {
    let has_percent = rows.iter().any(|r| r.outcome.raw.contains('%'));
    let has_cents = rows.iter().any(|r| r.outcome.raw.contains('¢'));
    if has_percent && has_cents {
        rows.into_iter().filter(|r| r.outcome.raw.contains('%')).collect()
    } else {
        rows
    }
}

/// Only Yes/No rows, showing at most one distinct price per side. Anything
/// more means several sub-markets are on the page.
fn is_single_binary(rows: &[PriceRow]) -> bool {
    let distinct = |side: &str| {
        rows.iter()
            .filter(|r| r.outcome.label == side)
            .map(|r| r.outcome.raw.as_str())
            .collect::<HashSet<_>>()
            .len()
    };
    !rows.is_empty() && rows.iter().all(PriceRow::is_side) && distinct("Yes") <= 1 && distinct("No") <= 1
}

fn title_from_page(page: &RenderedPage) -> Option<String> {
    let document = page.document();

    for selector in TITLE_TAGS.iter() {
        if let Some(heading) = document.select(selector).next() {
            let text = text_lines(heading).join(" ");
            if text.chars().count() >= MIN_TITLE_LEN {
                return Some(text);
            }
        }
    }

    document
        .select(&DOCUMENT_TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

// === API payloads ===

fn outcomes_from_api(payload: &ApiPayload) -> Vec<Outcome> {
    let Some(event) = payload.events().first() else {
        return Vec::new();
    };

    if event.is_binary() {
        let yes = match event.markets[0].yes_price() {
            Some(token) => Outcome::from_token("Yes", token),
            None => Outcome::new("Yes", None, ""),
        };
        return binary_pair(Some(yes), None);
    }

    event
        .markets
        .iter()
        .filter_map(|market| {
            let label = market.label()?;
            Some(match market.yes_price() {
                Some(token) => Outcome::from_token(label, token),
                None => Outcome::new(label, None, ""),
            })
        })
        .collect()
}

// === Shared ===

/// Exactly `[Yes, No]`, deriving a missing side as the complement of the other.
fn binary_pair(yes: Option<Outcome>, no: Option<Outcome>) -> Vec<Outcome> {
    match (yes, no) {
        (Some(yes), Some(no)) => vec![yes, no],
        (Some(yes), None) => {
            let no = complement_of("No", &yes);
            vec![yes, no]
        }
        (None, Some(no)) => {
            let yes = complement_of("Yes", &no);
            vec![yes, no]
        }
        (None, None) => Vec::new(),
    }
}

fn complement_of(label: &str, other: &Outcome) -> Outcome {
    let cents = other.price_cents.and_then(price::complement);
    let raw = match cents {
        Some(c) if other.raw.ends_with('¢') => format!("{c}¢"),
        Some(c) if other.raw.ends_with('%') => format!("{c}%"),
        Some(c) => c.to_string(),
        None => String::new(),
    };
    Outcome::new(label, cents, raw)
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
