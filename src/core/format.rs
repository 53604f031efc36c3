//! Presentation rounding. Currency and percentages both round half away from
//! zero to two places.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `1234567.885` -> `"1,234,567.89"`.
pub fn format_currency(value: Decimal) -> String {
    let fixed = format!("{:.2}", round2(value));
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{fraction}")
}

/// `12.345` -> `"12.35"`.
pub fn format_percentage(value: Decimal) -> String {
    format!("{:.2}", round2(value))
}

/// `part / whole * 100`, or zero when `whole` is zero.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}

/// `total / count`, or zero when `count` is zero.
pub fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

/// Serializes a money or percentage value as a two-place string.
pub fn serialize_rounded<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}", round2(*value)))
}

/// Map counterpart of [`serialize_rounded`].
pub fn serialize_rounded_map<K, S>(
    values: &BTreeMap<K, Decimal>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    S: Serializer,
{
    serializer.collect_map(
        values
            .iter()
            .map(|(key, value)| (key, format!("{:.2}", round2(*value)))),
    )
}
