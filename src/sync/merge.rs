//! Idempotent merge of raw upstream records into the store.

use crate::core::cache::TransactionStore;
use crate::core::transaction::{CachedTransaction, Recipient, parse_decimal};
use crate::core::window::parse_datetime;
use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single upstream record was skipped.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no id")]
    MissingId,
    #[error("record {id} has no integer amount")]
    InvalidAmount { id: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Every record received, skipped ones included.
    pub total: usize,
}

/// Maps and upserts `records` keyed on `id`, then commits them as one batch.
///
/// New rows get `cached_at = now`; existing rows keep `cached_at` and a
/// known `created_at`, take every other field from the payload and get
/// `updated_at = now`. Malformed records are logged and skipped.
pub async fn merge_records(
    store: &dyn TransactionStore,
    records: &[Value],
    now: DateTime<Utc>,
) -> Result<MergeSummary> {
    let mut summary = MergeSummary {
        total: records.len(),
        ..Default::default()
    };
    let mut batch: Vec<CachedTransaction> = Vec::with_capacity(records.len());
    let mut staged: HashMap<String, usize> = HashMap::new();

    for raw in records {
        let mut record = match map_record(raw, now) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, id = ?raw.get("id"), "Skipping malformed record");
                continue;
            }
        };

        if let Some(&slot) = staged.get(&record.id) {
            preserve_first_seen(&mut record, &batch[slot]);
            batch[slot] = record;
            summary.updated += 1;
            continue;
        }

        match store.get(&record.id).await? {
            Some(existing) => {
                preserve_first_seen(&mut record, &existing);
                summary.updated += 1;
            }
            None => summary.inserted += 1,
        }
        staged.insert(record.id.clone(), batch.len());
        batch.push(record);
    }

    if !batch.is_empty() {
        store.upsert_batch(batch).await?;
    }

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        total = summary.total,
        "Merge complete"
    );
    Ok(summary)
}

fn preserve_first_seen(record: &mut CachedTransaction, existing: &CachedTransaction) {
    record.cached_at = existing.cached_at;
    if existing.created_at.is_some() {
        record.created_at = existing.created_at;
    }
}

/// Maps one upstream payload onto a cache row stamped with `now`.
pub fn map_record(raw: &Value, now: DateTime<Utc>) -> Result<CachedTransaction, RecordError> {
    let fields = raw.as_object().ok_or(RecordError::NotAnObject)?;
    let id = text(fields, "id").ok_or(RecordError::MissingId)?;
    let amount = integer(fields, "amount").ok_or_else(|| RecordError::InvalidAmount {
        id: id.clone(),
    })?;

    Ok(CachedTransaction {
        amount,
        charge: integer(fields, "charge"),
        human_readable_amount: decimal(fields, "human_readable_amount"),
        human_readable_charge: decimal(fields, "human_readable_charge"),
        currency: text(fields, "currency"),
        status: text(fields, "status"),
        decline_reason: text(fields, "decline_reason"),
        kind: text(fields, "type"),
        mode: text(fields, "mode"),
        description: text(fields, "description"),
        external_id: text(fields, "external_id"),
        from_wallet: text(fields, "from_wallet"),
        to_wallet: text(fields, "to_wallet"),
        debit_id: text(fields, "debit_id"),
        credit_id: text(fields, "credit_id"),
        rate: decimal(fields, "rate"),
        recipient: recipient(&id, fields.get("recipient")),
        created_at: text(fields, "created_at").and_then(|raw| parse_timestamp(&id, &raw)),
        cached_at: now,
        updated_at: now,
        id,
    })
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

fn integer(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(fields: &Map<String, Value>, key: &str) -> Option<Decimal> {
    match fields.get(key)? {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn recipient(id: &str, raw: Option<&Value>) -> Option<Recipient> {
    match raw? {
        value @ Value::Object(_) => match serde_json::from_value(value.clone()) {
            Ok(recipient) => Some(recipient),
            Err(e) => {
                warn!(id, error = %e, "Ignoring unreadable recipient");
                None
            }
        },
        Value::Null => None,
        other => {
            debug!(id, value = %other, "Ignoring non-object recipient");
            None
        }
    }
}

/// Upstream timestamps look like `2026-01-23T21:56:04.000000Z`. Offsets are
/// normalised to UTC; offset-less values are taken as UTC wall time.
fn parse_timestamp(id: &str, raw: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(parsed.naive_utc());
    }
    match parse_datetime(raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(id, created_at = raw, error = %e, "Failed to parse created_at");
            None
        }
    }
}
