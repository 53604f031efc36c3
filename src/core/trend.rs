//! Per-day trend over a window.
//!
//! Counts come from one pass over every record; USD sums come from a second
//! pass over successful records only, since only those need conversion.

use crate::core::analytics::AggregationEngine;
use crate::core::format::{average, percentage_of, serialize_rounded};
use crate::core::rates::RateTable;
use crate::core::transaction::{CachedTransaction, StatusClass};
use crate::core::window::PeriodWindow;
use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub transaction_count: u64,
    pub success_count: u64,
    /// Failed, declined and reversed.
    pub failed_count: u64,
    pub pending_count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_revenue_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub success_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub total_transactions: u64,
    pub total_success: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub overall_success_rate: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_revenue_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_daily_transactions: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_daily_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days with at least one record.
    pub total_days: u64,
    pub daily_data: Vec<DailyPoint>,
    pub summary: TrendSummary,
}

/// Builds the trend from all records in `window` and, separately, the
/// successful ones. Days are naive calendar dates of `created_at`.
pub fn daily_trend(
    window: &PeriodWindow,
    records: &[CachedTransaction],
    successes: &[CachedTransaction],
    rates: &RateTable,
) -> DailyTrend {
    let mut days: BTreeMap<NaiveDate, DailyPoint> = BTreeMap::new();

    for record in records {
        let Some(date) = record.created_at.map(|at| at.date()) else {
            continue;
        };
        let point = entry(&mut days, date);
        point.transaction_count += 1;
        match record.status_class() {
            StatusClass::Success => point.success_count += 1,
            StatusClass::Pending => point.pending_count += 1,
            class if class.is_error() => point.failed_count += 1,
            _ => {}
        }
    }

    for record in successes.iter().filter(|r| r.is_success()) {
        let Some(date) = record.created_at.map(|at| at.date()) else {
            continue;
        };
        let point = entry(&mut days, date);
        point.total_volume_usd += record.amount_usd(rates);
        point.total_revenue_usd += record.charge_usd(rates);
    }

    let mut total_transactions = 0u64;
    let mut total_success = 0u64;
    let mut total_volume = Decimal::ZERO;
    let mut total_revenue = Decimal::ZERO;
    let daily_data: Vec<DailyPoint> = days
        .into_values()
        .map(|mut point| {
            point.avg_transaction_size_usd = average(point.total_volume_usd, point.success_count);
            point.success_rate = percentage_of(
                Decimal::from(point.success_count),
                Decimal::from(point.transaction_count),
            );
            total_transactions += point.transaction_count;
            total_success += point.success_count;
            total_volume += point.total_volume_usd;
            total_revenue += point.total_revenue_usd;
            point
        })
        .collect();

    let total_days = daily_data.len() as u64;
    DailyTrend {
        start_date: window.start.date(),
        end_date: window.end.date(),
        total_days,
        summary: TrendSummary {
            total_transactions,
            total_success,
            overall_success_rate: percentage_of(
                Decimal::from(total_success),
                Decimal::from(total_transactions),
            ),
            total_volume_usd: total_volume,
            total_revenue_usd: total_revenue,
            avg_daily_transactions: average(Decimal::from(total_transactions), total_days),
            avg_daily_volume_usd: average(total_volume, total_days),
            avg_transaction_size_usd: average(total_volume, total_success),
        },
        daily_data,
    }
}

fn entry(days: &mut BTreeMap<NaiveDate, DailyPoint>, date: NaiveDate) -> &mut DailyPoint {
    days.entry(date).or_insert_with(|| DailyPoint {
        date,
        ..Default::default()
    })
}

impl AggregationEngine {
    pub async fn daily_trend(&self, window: &PeriodWindow) -> Result<DailyTrend> {
        let records = self.records_in(window).await?;
        let successes = self
            .records_with_status(window, StatusClass::Success.as_str())
            .await?;
        Ok(daily_trend(window, &records, &successes, self.rates()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analytics::tests::{at, dec, tx};
    use crate::core::cache::TransactionStore;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn january() -> PeriodWindow {
        PeriodWindow::new(at("2026-01-01 00:00:00"), at("2026-01-31 23:59:59"), "January")
    }

    fn sample() -> Vec<CachedTransaction> {
        vec![
            tx("a", "success", "100", "1", "USD", None, "2026-01-05 08:00:00"),
            tx("b", "success", "300", "3", "USD", None, "2026-01-05 20:00:00"),
            tx("c", "declined", "50", "0", "USD", None, "2026-01-05 21:00:00"),
            tx("d", "pending", "10", "0", "USD", None, "2026-01-05 22:00:00"),
            tx("e", "success", "1433.6190917516", "0", "NGN", None, "2026-01-07 09:00:00"),
            tx("f", "reversed", "10", "0", "USD", None, "2026-01-07 10:00:00"),
        ]
    }

    fn successes(records: &[CachedTransaction]) -> Vec<CachedTransaction> {
        records.iter().filter(|r| r.is_success()).cloned().collect()
    }

    #[test]
    fn test_daily_points() {
        let records = sample();
        let trend = daily_trend(&january(), &records, &successes(&records), &RateTable::builtin());

        assert_eq!(trend.total_days, 2);
        let first = &trend.daily_data[0];
        assert_eq!(first.date.to_string(), "2026-01-05");
        assert_eq!(first.transaction_count, 4);
        assert_eq!(first.success_count, 2);
        assert_eq!(first.failed_count, 1);
        assert_eq!(first.pending_count, 1);
        assert_eq!(first.total_volume_usd, dec("400"));
        assert_eq!(first.total_revenue_usd, dec("4"));
        assert_eq!(first.avg_transaction_size_usd, dec("200"));
        assert_eq!(first.success_rate, dec("50"));

        let second = &trend.daily_data[1];
        assert_eq!(second.failed_count, 1);
        assert_eq!(second.total_volume_usd, Decimal::ONE);
    }

    #[test]
    fn test_summary_totals_match_days() {
        let records = sample();
        let trend = daily_trend(&january(), &records, &successes(&records), &RateTable::builtin());

        let summed: Decimal = trend.daily_data.iter().map(|d| d.total_volume_usd).sum();
        assert_eq!(trend.summary.total_volume_usd, summed);
        assert_eq!(trend.summary.total_transactions, 6);
        assert_eq!(trend.summary.total_success, 3);
        assert_eq!(trend.summary.overall_success_rate, dec("50"));
        assert_eq!(trend.summary.avg_daily_transactions, dec("3"));
        assert_eq!(trend.summary.avg_daily_volume_usd, dec("200.5"));
        assert_eq!(trend.summary.avg_transaction_size_usd, dec("401") / dec("3"));
    }

    #[test]
    fn test_empty_trend() {
        let trend = daily_trend(&january(), &[], &[], &RateTable::builtin());
        assert_eq!(trend.total_days, 0);
        assert!(trend.daily_data.is_empty());
        assert_eq!(trend.summary.total_volume_usd, Decimal::ZERO);
        assert_eq!(trend.summary.avg_daily_volume_usd, Decimal::ZERO);
        assert_eq!(trend.start_date.to_string(), "2026-01-01");
        assert_eq!(trend.end_date.to_string(), "2026-01-31");
    }

    #[tokio::test]
    async fn test_padded_status_is_not_success_in_any_view() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_batch(vec![
                tx("a", "success ", "100", "1", "USD", None, "2026-01-05 08:00:00"),
                tx("b", "success", "40", "1", "USD", None, "2026-01-05 09:00:00"),
            ])
            .await
            .unwrap();
        let engine = AggregationEngine::new(store, RateTable::builtin());

        let stats = engine.period_stats(&january()).await.unwrap();
        let trend = engine.daily_trend(&january()).await.unwrap();
        let currencies = engine
            .currency_breakdown(Some(&january()), None)
            .await
            .unwrap();

        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.total_volume_usd, dec("40"));
        assert_eq!(trend.daily_data[0].success_count, 1);
        assert_eq!(trend.daily_data[0].total_volume_usd, dec("40"));
        assert_eq!(currencies.len(), 1);
        assert_eq!(currencies[0].transaction_count, 1);
        assert_eq!(currencies[0].total_volume_usd, dec("40"));
    }

    #[tokio::test]
    async fn test_engine_trend_partitions_consistently() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_batch(sample()).await.unwrap();
        let engine = AggregationEngine::new(store, RateTable::builtin());

        let whole = engine.daily_trend(&january()).await.unwrap();
        let first_half = engine
            .daily_trend(&PeriodWindow::new(
                at("2026-01-01 00:00:00"),
                at("2026-01-05 23:59:59"),
                "a",
            ))
            .await
            .unwrap();
        let second_half = engine
            .daily_trend(&PeriodWindow::new(
                at("2026-01-06 00:00:00"),
                at("2026-01-31 23:59:59"),
                "b",
            ))
            .await
            .unwrap();

        assert_eq!(
            whole.summary.total_volume_usd,
            first_half.summary.total_volume_usd + second_half.summary.total_volume_usd
        );
        assert_eq!(whole.total_days, first_half.total_days + second_half.total_days);
    }
}
