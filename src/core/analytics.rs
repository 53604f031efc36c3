//! Windowed statistics over cached transactions, recomputed on every call.
//!
//! Only `success` records contribute to volume, revenue and averages. The
//! error class (failed, declined, reversed) drives the error rate. All money
//! is normalized to USD through the [`RateTable`].

use crate::core::cache::TransactionStore;
use crate::core::format::{average, percentage_of, serialize_rounded};
use crate::core::rates::RateTable;
use crate::core::transaction::{CachedTransaction, StatusClass};
use crate::core::window::{Interval, PeriodWindow};
use anyhow::Result;
use chrono::NaiveDateTime;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub period_name: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// Headline count; successful transactions only.
    pub total_transactions: u64,
    /// Every record in the window regardless of status.
    pub all_transactions: u64,
    pub error_count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_revenue_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_amount: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_revenue_per_transaction: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub error_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub total_transactions: u64,
    /// Every status class, zero-filled.
    pub statuses: BTreeMap<StatusClass, StatusCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyVolume {
    pub currency: String,
    pub transaction_count: u64,
    /// In the currency itself.
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    /// In the currency itself.
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub percentage_of_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusVolume {
    pub count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub revenue_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_transactions: u64,
    pub success_count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub success_rate: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_revenue_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size: Decimal,
    pub status_breakdown: BTreeMap<StatusClass, StatusVolume>,
}

/// Statistics for records whose `created_at` lies inside `window`.
pub fn period_stats(
    window: &PeriodWindow,
    records: &[CachedTransaction],
    rates: &RateTable,
) -> PeriodStats {
    let mut all = 0u64;
    let mut successes = 0u64;
    let mut errors = 0u64;
    let mut volume = Decimal::ZERO;
    let mut revenue = Decimal::ZERO;

    let in_window = records
        .iter()
        .filter(|r| r.created_at.is_some_and(|at| window.contains(at)));
    for record in in_window {
        all += 1;
        let class = record.status_class();
        if class.is_error() {
            errors += 1;
        }
        if class == StatusClass::Success {
            successes += 1;
            volume += record.amount_usd(rates);
            revenue += record.charge_usd(rates);
        }
    }

    PeriodStats {
        period_name: window.label.clone(),
        start_date: window.start,
        end_date: window.end,
        total_transactions: successes,
        all_transactions: all,
        error_count: errors,
        total_volume_usd: volume,
        total_revenue_usd: revenue,
        avg_transaction_amount: average(volume, successes),
        avg_revenue_per_transaction: average(revenue, successes),
        error_rate: percentage_of(Decimal::from(errors), Decimal::from(all)),
    }
}

/// Counts per status class; unknown statuses land in `other`.
pub fn status_breakdown(records: &[CachedTransaction]) -> StatusBreakdown {
    let total = records.len() as u64;
    let mut counts: BTreeMap<StatusClass, u64> =
        StatusClass::ALL.iter().map(|class| (*class, 0)).collect();
    for record in records {
        *counts.entry(record.status_class()).or_default() += 1;
    }

    let statuses = counts
        .into_iter()
        .map(|(class, count)| {
            let percentage = percentage_of(Decimal::from(count), Decimal::from(total));
            (class, StatusCount { count, percentage })
        })
        .collect();
    StatusBreakdown {
        total_transactions: total,
        statuses,
    }
}

/// Per-currency volume, largest USD volume first.
pub fn currency_breakdown(records: &[CachedTransaction], rates: &RateTable) -> Vec<CurrencyVolume> {
    let mut groups: HashMap<String, (u64, Decimal, Decimal)> = HashMap::new();
    for record in records {
        let entry = groups
            .entry(record.currency_code())
            .or_insert((0, Decimal::ZERO, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += record.amount_major();
        entry.2 += record.amount_usd(rates);
    }

    let total_usd: Decimal = groups.values().map(|(_, _, usd)| *usd).sum();
    let mut breakdown: Vec<CurrencyVolume> = groups
        .into_iter()
        .map(|(currency, (count, volume, volume_usd))| CurrencyVolume {
            currency,
            transaction_count: count,
            total_volume: volume,
            total_volume_usd: volume_usd,
            avg_transaction_size: average(volume, count),
            percentage_of_total: percentage_of(volume_usd, total_usd),
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.total_volume_usd
            .cmp(&a.total_volume_usd)
            .then_with(|| a.currency.cmp(&b.currency))
    });
    breakdown
}

/// Headline totals (success-only) plus volume and revenue for every status.
pub fn overview(records: &[CachedTransaction], rates: &RateTable) -> Overview {
    let total = records.len() as u64;
    let mut by_status: BTreeMap<StatusClass, (u64, Decimal, Decimal)> = StatusClass::ALL
        .iter()
        .map(|class| (*class, (0, Decimal::ZERO, Decimal::ZERO)))
        .collect();
    for record in records {
        let entry = by_status.entry(record.status_class()).or_default();
        entry.0 += 1;
        entry.1 += record.amount_usd(rates);
        entry.2 += record.charge_usd(rates);
    }

    let (success_count, volume, revenue) = by_status
        .get(&StatusClass::Success)
        .copied()
        .unwrap_or_default();
    let status_breakdown = by_status
        .into_iter()
        .map(|(class, (count, volume_usd, revenue_usd))| {
            let volume = StatusVolume {
                count,
                volume_usd,
                revenue_usd,
                percentage: percentage_of(Decimal::from(count), Decimal::from(total)),
            };
            (class, volume)
        })
        .collect();

    Overview {
        total_transactions: total,
        success_count,
        success_rate: percentage_of(Decimal::from(success_count), Decimal::from(total)),
        total_volume_usd: volume,
        total_revenue_usd: revenue,
        avg_transaction_size: average(volume, success_count),
        status_breakdown,
    }
}

/// Read-only analytics over the transaction store.
pub struct AggregationEngine {
    store: Arc<dyn TransactionStore>,
    rates: Arc<RateTable>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn TransactionStore>, rates: RateTable) -> Self {
        Self {
            store,
            rates: Arc::new(rates),
        }
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub(crate) async fn records_in(&self, window: &PeriodWindow) -> Result<Vec<CachedTransaction>> {
        let records = self.store.query_window(window).await?;
        debug!(window = %window.label, records = records.len(), "Loaded window");
        Ok(records)
    }

    pub(crate) async fn records_with_status(
        &self,
        window: &PeriodWindow,
        status: &str,
    ) -> Result<Vec<CachedTransaction>> {
        self.store
            .query_by_date_range(window.start, window.end, Some(status))
            .await
    }

    pub async fn period_stats(&self, window: &PeriodWindow) -> Result<PeriodStats> {
        let records = self.records_in(window).await?;
        Ok(period_stats(window, &records, &self.rates))
    }

    /// `None` covers all time.
    pub async fn status_breakdown(&self, window: Option<&PeriodWindow>) -> Result<StatusBreakdown> {
        let records = self.records_in(&window_or_all(window)).await?;
        Ok(status_breakdown(&records))
    }

    /// Breakdown of records with `status`, `success` by default.
    pub async fn currency_breakdown(
        &self,
        window: Option<&PeriodWindow>,
        status: Option<&str>,
    ) -> Result<Vec<CurrencyVolume>> {
        let status = status.unwrap_or(StatusClass::Success.as_str());
        let records = self
            .records_with_status(&window_or_all(window), status)
            .await?;
        Ok(currency_breakdown(&records, &self.rates))
    }

    pub async fn overview(&self, window: Option<&PeriodWindow>) -> Result<Overview> {
        let records = self.records_in(&window_or_all(window)).await?;
        Ok(overview(&records, &self.rates))
    }

    /// Period statistics for every canned interval relative to `now`.
    pub async fn live_view_at(&self, now: NaiveDateTime) -> Result<Vec<PeriodStats>> {
        let windows: Vec<PeriodWindow> = Interval::ALL.iter().map(|i| i.window_at(now)).collect();
        join_all(windows.iter().map(|window| self.period_stats(window)))
            .await
            .into_iter()
            .collect()
    }
}

pub(crate) fn window_or_all(window: Option<&PeriodWindow>) -> PeriodWindow {
    window.cloned().unwrap_or_else(PeriodWindow::all_time)
}
