//! Cached ledger entries and their status classes.

use crate::core::rates::{RateTable, normalize_code};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_DECLINED: &str = "declined";
pub const STATUS_REVERSED: &str = "reversed";
pub const STATUS_PROCESSING_SWAP: &str = "processing_swap";

/// Reporting bucket for the open-ended upstream status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    Pending,
    Failed,
    Declined,
    Reversed,
    ProcessingSwap,
    Other,
}

impl StatusClass {
    pub const ALL: [StatusClass; 7] = [
        StatusClass::Success,
        StatusClass::Pending,
        StatusClass::Failed,
        StatusClass::Declined,
        StatusClass::Reversed,
        StatusClass::ProcessingSwap,
        StatusClass::Other,
    ];

    /// Exact match, the same comparison the store's status filter uses.
    pub fn of(status: Option<&str>) -> Self {
        match status {
            Some(STATUS_SUCCESS) => StatusClass::Success,
            Some(STATUS_PENDING) => StatusClass::Pending,
            Some(STATUS_FAILED) => StatusClass::Failed,
            Some(STATUS_DECLINED) => StatusClass::Declined,
            Some(STATUS_REVERSED) => StatusClass::Reversed,
            Some(STATUS_PROCESSING_SWAP) => StatusClass::ProcessingSwap,
            _ => StatusClass::Other,
        }
    }

    /// Failed, declined and reversed records make up the error class.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StatusClass::Failed | StatusClass::Declined | StatusClass::Reversed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Success => STATUS_SUCCESS,
            StatusClass::Pending => STATUS_PENDING,
            StatusClass::Failed => STATUS_FAILED,
            StatusClass::Declined => STATUS_DECLINED,
            StatusClass::Reversed => STATUS_REVERSED,
            StatusClass::ProcessingSwap => STATUS_PROCESSING_SWAP,
            StatusClass::Other => "other",
        }
    }
}

impl Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse recipient attributes. `rate` and `country` are typed, everything
/// else is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub rate: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipient {
    /// The embedded exchange rate, if present and numeric.
    pub fn rate_hint(&self) -> Option<Decimal> {
        self.rate.as_deref().and_then(parse_decimal)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parses plain or scientific decimal notation. Empty or malformed input
/// yields `None`.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

/// One mirrored ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTransaction {
    pub id: String,
    pub amount: i64,
    pub charge: Option<i64>,
    pub human_readable_amount: Option<Decimal>,
    pub human_readable_charge: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub decline_reason: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mode: Option<String>,
    pub description: Option<String>,
    pub external_id: Option<String>,
    pub from_wallet: Option<String>,
    pub to_wallet: Option<String>,
    pub debit_id: Option<String>,
    pub credit_id: Option<String>,
    pub rate: Option<Decimal>,
    pub recipient: Option<Recipient>,
    /// Upstream event time (UTC wall clock), the source of window membership.
    pub created_at: Option<NaiveDateTime>,
    pub cached_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CachedTransaction {
    /// Currency code with the USD default applied.
    pub fn currency_code(&self) -> String {
        normalize_code(self.currency.as_deref().unwrap_or_default())
    }

    pub fn status_class(&self) -> StatusClass {
        StatusClass::of(self.status.as_deref())
    }

    pub fn is_success(&self) -> bool {
        self.status_class() == StatusClass::Success
    }

    pub fn rate_hint(&self) -> Option<Decimal> {
        self.recipient.as_ref().and_then(Recipient::rate_hint)
    }

    /// Sending wallet, if present and non-empty.
    pub fn wallet(&self) -> Option<&str> {
        self.from_wallet.as_deref().filter(|w| !w.is_empty())
    }

    /// Recipient country, if present and non-empty.
    pub fn country(&self) -> Option<&str> {
        self.recipient
            .as_ref()
            .and_then(|r| r.country.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn amount_major(&self) -> Decimal {
        self.human_readable_amount.unwrap_or_default()
    }

    pub fn charge_major(&self) -> Decimal {
        self.human_readable_charge.unwrap_or_default()
    }

    pub fn amount_usd(&self, rates: &RateTable) -> Decimal {
        rates.to_usd(self.amount_major(), &self.currency_code(), self.rate_hint())
    }

    pub fn charge_usd(&self, rates: &RateTable) -> Decimal {
        rates.to_usd(self.charge_major(), &self.currency_code(), self.rate_hint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classes() {
        assert_eq!(StatusClass::of(Some("success")), StatusClass::Success);
        assert_eq!(
            StatusClass::of(Some("processing_swap")),
            StatusClass::ProcessingSwap
        );
        assert_eq!(StatusClass::of(Some("refunded")), StatusClass::Other);
        assert_eq!(StatusClass::of(Some("success ")), StatusClass::Other);
        assert_eq!(StatusClass::of(Some("Success")), StatusClass::Other);
        assert_eq!(StatusClass::of(None), StatusClass::Other);
        assert!(StatusClass::Failed.is_error());
        assert!(StatusClass::Declined.is_error());
        assert!(StatusClass::Reversed.is_error());
        assert!(!StatusClass::Pending.is_error());
        assert!(!StatusClass::Other.is_error());
    }

    #[test]
    fn test_recipient_keeps_unknown_keys() {
        let recipient: Recipient = serde_json::from_value(json!({
            "rate": "1433.62",
            "country": "NG",
            "account_name": "Ada",
            "bank": {"code": "044"}
        }))
        .unwrap();

        assert_eq!(recipient.rate.as_deref(), Some("1433.62"));
        assert_eq!(recipient.country.as_deref(), Some("NG"));
        assert_eq!(recipient.extra.get("account_name"), Some(&json!("Ada")));
        assert_eq!(recipient.extra.get("bank"), Some(&json!({"code": "044"})));
        assert_eq!(recipient.rate_hint(), Some("1433.62".parse().unwrap()));
    }

    #[test]
    fn test_recipient_rate_hint_variants() {
        let numeric: Recipient = serde_json::from_value(json!({"rate": 571.12})).unwrap();
        assert_eq!(numeric.rate_hint(), Some("571.12".parse().unwrap()));

        let malformed: Recipient = serde_json::from_value(json!({"rate": "n/a"})).unwrap();
        assert_eq!(malformed.rate_hint(), None);

        let empty: Recipient = serde_json::from_value(json!({"rate": ""})).unwrap();
        assert_eq!(empty.rate_hint(), None);

        let missing: Recipient = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.rate_hint(), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(" 12.5 "), Some("12.5".parse().unwrap()));
        assert_eq!(parse_decimal("1e3"), Some(Decimal::from(1000)));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }
}
