//! Price token normalization.
//!
//! Kalshi shows the same quantity in several spellings: `47¢` on the order
//! panel, `47%` on multi-outcome rows, `$0.47` in some widgets, and the REST
//! API returns either integer cents or `"0.4700"` dollar strings. All of them
//! map to an integer number of cents on a $1 contract.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

lazy_static! {
    static ref PRICE_TOKEN: Regex = Regex::new(
        r"^(?P<dollar>\$)?(?P<num>\d+(?:\.\d+)?)(?P<unit>[¢%])?$"
    ).expect("price token regex is valid");
}

const MAX_CENTS: Decimal = dec!(100);

/// Normalize a raw price token into cents in `[0, 100]`.
///
/// Returns `None` for anything that is not a recognizable price, or that
/// parses to a value outside the contract range.
pub fn normalize(raw: &str) -> Option<u8> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = PRICE_TOKEN.captures(&compact)?;

    let number = &caps["num"];
    let value = Decimal::from_str(number).ok()?;
    let is_dollar = caps.name("dollar").is_some();
    let unit = caps.name("unit").map(|m| m.as_str());

    let cents = match (is_dollar, unit) {
        (true, None) => value * dec!(100),
        // "$47¢" and "$47%" are not prices
        (true, Some(_)) => return None,
        (false, Some(_)) => value,
        (false, None) if !number.contains('.') => value,
        (false, None) if value <= Decimal::ONE => value * dec!(100),
        (false, None) => return None,
    };

    cents_from_decimal(cents)
}

/// A price as the source spelled it, with its normalized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceToken {
    pub raw: String,
    pub cents: Option<u8>,
}

impl PriceToken {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            cents: normalize(&raw),
            raw,
        }
    }
}

/// Round a cents amount to the nearest whole cent, rejecting out-of-range values.
pub fn cents_from_decimal(cents: Decimal) -> Option<u8> {
    let rounded = cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() || rounded > MAX_CENTS {
        return None;
    }
    rounded.to_u8()
}

/// Convert a dollar amount (e.g. `0.47`) to cents.
pub fn cents_from_dollars(dollars: Decimal) -> Option<u8> {
    cents_from_decimal(dollars * dec!(100))
}

/// Complement of a binary price: the No side of a Yes price and vice versa.
pub fn complement(cents: u8) -> Option<u8> {
    100u8.checked_sub(cents)
}
