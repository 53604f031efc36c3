//! Weekly performance report with week-over-week deltas.

use crate::core::analytics::{AggregationEngine, CurrencyVolume, currency_breakdown};
use crate::core::format::{average, percentage_of, serialize_rounded, serialize_rounded_map};
use crate::core::rates::RateTable;
use crate::core::transaction::{CachedTransaction, StatusClass};
use crate::core::window::PeriodWindow;
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

const TOP_CURRENCIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub week_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekMetrics {
    /// All statuses.
    pub total_transactions: u64,
    pub status_counts: BTreeMap<StatusClass, u64>,
    #[serde(serialize_with = "serialize_rounded_map")]
    pub status_percentages: BTreeMap<StatusClass, Decimal>,
    #[serde(serialize_with = "serialize_rounded")]
    pub success_rate: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_revenue_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_fee_per_transaction_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub fees_to_value_ratio: Decimal,
    pub currency_breakdown: Vec<CurrencyVolume>,
}

impl WeekMetrics {
    pub fn count(&self, class: StatusClass) -> u64 {
        self.status_counts.get(&class).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekOverWeek {
    pub transaction_count_change: i64,
    #[serde(serialize_with = "serialize_rounded")]
    pub transaction_count_change_pct: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub revenue_change_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub revenue_change_pct: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size_change_pct: Decimal,
    /// Percentage points, not a ratio.
    #[serde(serialize_with = "serialize_rounded")]
    pub success_rate_change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub period: ReportPeriod,
    pub current_week: WeekMetrics,
    pub previous_week: WeekMetrics,
    pub week_over_week: WeekOverWeek,
}

/// Relative change in percent. A rise from zero counts as 100%.
pub fn pct_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        if current > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        }
    } else {
        (current - previous) / previous * Decimal::ONE_HUNDRED
    }
}

pub fn week_metrics(records: &[CachedTransaction], rates: &RateTable) -> WeekMetrics {
    let total = records.len() as u64;
    let mut status_counts: BTreeMap<StatusClass, u64> =
        StatusClass::ALL.iter().map(|class| (*class, 0)).collect();
    let mut successes = Vec::new();
    let mut volume = Decimal::ZERO;
    let mut revenue = Decimal::ZERO;

    for record in records {
        let class = record.status_class();
        *status_counts.entry(class).or_default() += 1;
        if class == StatusClass::Success {
            volume += record.amount_usd(rates);
            revenue += record.charge_usd(rates);
            successes.push(record.clone());
        }
    }

    let success_count = successes.len() as u64;
    let status_percentages = status_counts
        .iter()
        .map(|(class, count)| {
            (
                *class,
                percentage_of(Decimal::from(*count), Decimal::from(total)),
            )
        })
        .collect();
    let mut currencies = currency_breakdown(&successes, rates);
    currencies.truncate(TOP_CURRENCIES);

    WeekMetrics {
        total_transactions: total,
        status_counts,
        status_percentages,
        success_rate: percentage_of(Decimal::from(success_count), Decimal::from(total)),
        total_volume_usd: volume,
        total_revenue_usd: revenue,
        avg_transaction_size_usd: average(volume, success_count),
        avg_fee_per_transaction_usd: average(revenue, success_count),
        fees_to_value_ratio: percentage_of(revenue, volume),
        currency_breakdown: currencies,
    }
}

pub fn week_over_week(current: &WeekMetrics, previous: &WeekMetrics) -> WeekOverWeek {
    let current_count = Decimal::from(current.total_transactions);
    let previous_count = Decimal::from(previous.total_transactions);
    WeekOverWeek {
        transaction_count_change: current.total_transactions as i64
            - previous.total_transactions as i64,
        transaction_count_change_pct: pct_change(current_count, previous_count),
        revenue_change_usd: current.total_revenue_usd - previous.total_revenue_usd,
        revenue_change_pct: pct_change(current.total_revenue_usd, previous.total_revenue_usd),
        avg_transaction_size_change_pct: pct_change(
            current.avg_transaction_size_usd,
            previous.avg_transaction_size_usd,
        ),
        success_rate_change: current.success_rate - previous.success_rate,
    }
}

impl AggregationEngine {
    /// Report for the week starting at `week_start` (normally a Monday)
    /// against the seven days before it.
    pub async fn weekly_report(&self, week_start: NaiveDate) -> Result<WeeklyReport> {
        let current_window = PeriodWindow::week_starting(week_start)?;
        let previous_window = current_window.preceding_week()?;

        let current_records = self.records_in(&current_window).await?;
        let previous_records = self.records_in(&previous_window).await?;
        let current_week = week_metrics(&current_records, self.rates());
        let previous_week = week_metrics(&previous_records, self.rates());

        Ok(WeeklyReport {
            period: ReportPeriod {
                start_date: current_window.start.date(),
                end_date: current_window.end.date(),
                week_number: week_start.iso_week().week(),
            },
            week_over_week: week_over_week(&current_week, &previous_week),
            current_week,
            previous_week,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analytics::tests::{dec, tx};
    use crate::core::cache::TransactionStore;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(pct_change(dec("50"), Decimal::ZERO), dec("100"));
        assert_eq!(pct_change(dec("150"), dec("100")), dec("50"));
        assert_eq!(pct_change(dec("50"), dec("100")), dec("-50"));
    }

    #[test]
    fn test_week_metrics() {
        let rates = RateTable::builtin();
        let records = vec![
            tx("a", "success", "100", "2", "USD", None, "2026-01-19 08:00:00"),
            tx("b", "success", "300", "6", "USD", None, "2026-01-20 08:00:00"),
            tx("c", "failed", "10", "0", "USD", None, "2026-01-21 08:00:00"),
            tx("d", "processing_swap", "10", "0", "USD", None, "2026-01-21 08:00:00"),
            tx("e", "chargeback", "10", "0", "USD", None, "2026-01-21 08:00:00"),
        ];
        let metrics = week_metrics(&records, &rates);

        assert_eq!(metrics.total_transactions, 5);
        assert_eq!(metrics.count(StatusClass::Success), 2);
        assert_eq!(metrics.count(StatusClass::ProcessingSwap), 1);
        assert_eq!(metrics.count(StatusClass::Other), 1);
        assert_eq!(metrics.count(StatusClass::Declined), 0);
        assert_eq!(metrics.status_percentages[&StatusClass::Failed], dec("20"));
        assert_eq!(metrics.success_rate, dec("40"));
        assert_eq!(metrics.total_volume_usd, dec("400"));
        assert_eq!(metrics.avg_transaction_size_usd, dec("200"));
        assert_eq!(metrics.avg_fee_per_transaction_usd, dec("4"));
        assert_eq!(metrics.fees_to_value_ratio, dec("2"));
        assert_eq!(metrics.currency_breakdown.len(), 1);
    }

    #[test]
    fn test_week_metrics_json_rounds_status_percentages() {
        let records = vec![
            tx("a", "success", "100", "1", "USD", None, "2026-01-19 08:00:00"),
            tx("b", "failed", "100", "1", "USD", None, "2026-01-19 09:00:00"),
            tx("c", "pending", "100", "1", "USD", None, "2026-01-19 10:00:00"),
        ];
        let metrics = week_metrics(&records, &RateTable::builtin());
        let json = serde_json::to_value(&metrics).unwrap();

        assert_eq!(json["status_percentages"]["success"], "33.33");
        assert_eq!(json["status_percentages"]["declined"], "0.00");
        assert_eq!(json["status_percentages"]["processing_swap"], "0.00");
        assert_eq!(json["status_counts"]["failed"], 1);
        assert_eq!(json["success_rate"], "33.33");
    }

    #[test]
    fn test_week_metrics_empty() {
        let metrics = week_metrics(&[], &RateTable::builtin());
        assert_eq!(metrics.total_transactions, 0);
        assert_eq!(metrics.success_rate, Decimal::ZERO);
        assert_eq!(metrics.fees_to_value_ratio, Decimal::ZERO);
        assert!(metrics.currency_breakdown.is_empty());
    }

    #[test]
    fn test_top_currencies_are_capped() {
        let rates = RateTable::builtin();
        let records: Vec<_> = ["USD", "NGN", "KES", "EUR", "GBP", "CAD", "AED"]
            .iter()
            .enumerate()
            .map(|(i, currency)| {
                tx(&format!("t{i}"), "success", "100", "1", currency, None, "2026-01-19 08:00:00")
            })
            .collect();
        let metrics = week_metrics(&records, &rates);
        assert_eq!(metrics.currency_breakdown.len(), TOP_CURRENCIES);
    }

    #[tokio::test]
    async fn test_weekly_report_rejects_week_past_calendar_end() {
        let engine = AggregationEngine::new(Arc::new(MemoryStore::new()), RateTable::builtin());
        assert!(engine.weekly_report(NaiveDate::MAX).await.is_err());
    }

    #[tokio::test]
    async fn test_weekly_report_compares_adjacent_weeks() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_batch(vec![
                // Previous week: Mon 12th to Sun 18th
                tx("p1", "success", "100", "1", "USD", None, "2026-01-12 00:00:00"),
                tx("p2", "failed", "100", "1", "USD", None, "2026-01-18 23:59:59"),
                // Current week: Mon 19th to Sun 25th
                tx("c1", "success", "100", "2", "USD", None, "2026-01-19 00:00:00"),
                tx("c2", "success", "200", "2", "USD", None, "2026-01-22 12:00:00"),
                tx("c3", "success", "300", "2", "USD", None, "2026-01-25 23:59:59"),
                // Following week
                tx("n1", "success", "999", "9", "USD", None, "2026-01-26 00:00:00"),
            ])
            .await
            .unwrap();
        let engine = AggregationEngine::new(store, RateTable::builtin());

        let report = engine
            .weekly_report(NaiveDate::from_ymd_opt(2026, 1, 19).unwrap())
            .await
            .unwrap();

        assert_eq!(report.period.start_date.to_string(), "2026-01-19");
        assert_eq!(report.period.end_date.to_string(), "2026-01-25");
        assert_eq!(report.period.week_number, 4);
        assert_eq!(report.current_week.total_transactions, 3);
        assert_eq!(report.previous_week.total_transactions, 2);

        let wow = &report.week_over_week;
        assert_eq!(wow.transaction_count_change, 1);
        assert_eq!(wow.transaction_count_change_pct, dec("50"));
        assert_eq!(wow.revenue_change_usd, dec("5"));
        assert_eq!(wow.revenue_change_pct, dec("500"));
        assert_eq!(wow.avg_transaction_size_change_pct, dec("100"));
        assert_eq!(wow.success_rate_change, dec("50"));
    }
}
