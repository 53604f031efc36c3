//! Headline figures relative to a wall-clock instant: the transaction pulse,
//! net income and the all-time dashboard.
//!
//! Rolling marks (last minute, last hour) and calendar marks (midnight, Monday,
//! the 1st, January 1st) all close at `now`; records stamped later are ignored.

use crate::core::analytics::AggregationEngine;
use crate::core::format::{average, percentage_of, serialize_rounded};
use crate::core::rates::RateTable;
use crate::core::transaction::{CachedTransaction, StatusClass};
use crate::core::window::{PeriodWindow, week_monday};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Entries kept in each ranking.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionPulse {
    /// Records of any status in the last minute.
    pub transactions_per_minute: u64,
    /// Records of any status in the last hour.
    pub transactions_per_hour: u64,
    /// Successful records since midnight.
    pub transactions_per_day: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub transaction_volume_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_size_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub error_rate: Decimal,
    pub active_wallets_today: u64,
    pub active_wallets_week: u64,
    pub active_wallets_month: u64,
    /// Wallets active today with no earlier record.
    pub new_wallets_today: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVolume {
    pub name: String,
    pub transaction_count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub volume_usd: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetIncome {
    #[serde(serialize_with = "serialize_rounded")]
    pub income_per_minute: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub income_per_hour: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub income_per_day: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_value_moved_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_amount_sent_usd: Decimal,
    #[serde(serialize_with = "serialize_rounded")]
    pub error_rate: Decimal,
    /// Today's successful volume by recipient country.
    pub top_countries: Vec<RankedVolume>,
    /// Today's successful volume by currency.
    pub top_currencies: Vec<RankedVolume>,
    #[serde(serialize_with = "serialize_rounded")]
    pub accumulated_revenue_ytd: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Successful records only.
    pub total_transactions: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_volume_usd: Decimal,
    pub pending_count: u64,
    pub completed_count: u64,
    /// Failed, declined and reversed.
    pub failed_count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_transaction_amount_usd: Decimal,
}

struct Marks {
    now: NaiveDateTime,
    minute: NaiveDateTime,
    hour: NaiveDateTime,
    today: NaiveDateTime,
    week: NaiveDateTime,
    month: NaiveDateTime,
    year: NaiveDateTime,
}

impl Marks {
    fn at(now: NaiveDateTime) -> Self {
        let day = now.date();
        let month = day.with_day(1).unwrap_or(day);
        let year = NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(month);
        Self {
            now,
            minute: rolling(now, Duration::minutes(1)),
            hour: rolling(now, Duration::hours(1)),
            today: day.and_time(NaiveTime::MIN),
            week: week_monday(day).and_time(NaiveTime::MIN),
            month: month.and_time(NaiveTime::MIN),
            year: year.and_time(NaiveTime::MIN),
        }
    }

    /// Covers every mark, so one store read serves all figures.
    fn window(&self) -> PeriodWindow {
        let start = [self.hour, self.week, self.year]
            .into_iter()
            .min()
            .unwrap_or(self.today);
        PeriodWindow::new(start, self.now, "Pulse")
    }

    /// Creation time, unless the record is undated or stamped after `now`.
    fn stamp(&self, record: &CachedTransaction) -> Option<NaiveDateTime> {
        record.created_at.filter(|at| *at <= self.now)
    }
}

fn rolling(now: NaiveDateTime, span: Duration) -> NaiveDateTime {
    now.checked_sub_signed(span).unwrap_or(NaiveDateTime::MIN)
}

/// Pulse as of `now`. `seen_before_today` holds wallets with a record before
/// midnight.
pub fn transaction_pulse(
    now: NaiveDateTime,
    records: &[CachedTransaction],
    seen_before_today: &HashSet<&str>,
    rates: &RateTable,
) -> TransactionPulse {
    let marks = Marks::at(now);
    let mut pulse = TransactionPulse::default();
    let mut today_all = 0u64;
    let mut today_errors = 0u64;
    let mut today_wallets = HashSet::new();
    let mut week_wallets = HashSet::new();
    let mut month_wallets = HashSet::new();

    for record in records {
        let Some(at) = marks.stamp(record) else {
            continue;
        };
        if at >= marks.minute {
            pulse.transactions_per_minute += 1;
        }
        if at >= marks.hour {
            pulse.transactions_per_hour += 1;
        }
        if let Some(wallet) = record.wallet() {
            if at >= marks.month {
                month_wallets.insert(wallet);
            }
            if at >= marks.week {
                week_wallets.insert(wallet);
            }
            if at >= marks.today {
                today_wallets.insert(wallet);
            }
        }
        if at < marks.today {
            continue;
        }

        today_all += 1;
        let class = record.status_class();
        if class.is_error() {
            today_errors += 1;
        }
        if class == StatusClass::Success {
            pulse.transactions_per_day += 1;
            pulse.transaction_volume_usd += record.amount_usd(rates);
        }
    }

    pulse.avg_transaction_size_usd =
        average(pulse.transaction_volume_usd, pulse.transactions_per_day);
    pulse.error_rate = percentage_of(Decimal::from(today_errors), Decimal::from(today_all));
    pulse.active_wallets_today = today_wallets.len() as u64;
    pulse.active_wallets_week = week_wallets.len() as u64;
    pulse.active_wallets_month = month_wallets.len() as u64;
    pulse.new_wallets_today = today_wallets
        .iter()
        .filter(|wallet| !seen_before_today.contains(*wallet))
        .count() as u64;
    pulse
}

/// Income (charges) and value moved as of `now`, all in USD. Only successful
/// records earn income; the error rate covers every record since midnight.
pub fn net_income(now: NaiveDateTime, records: &[CachedTransaction], rates: &RateTable) -> NetIncome {
    let marks = Marks::at(now);
    let mut income = NetIncome::default();
    let mut today_all = 0u64;
    let mut today_errors = 0u64;
    let mut today_successes = 0u64;
    let mut countries: HashMap<String, (u64, Decimal)> = HashMap::new();
    let mut currencies: HashMap<String, (u64, Decimal)> = HashMap::new();

    for record in records {
        let Some(at) = marks.stamp(record) else {
            continue;
        };
        let class = record.status_class();
        if at >= marks.today {
            today_all += 1;
            if class.is_error() {
                today_errors += 1;
            }
        }
        if class != StatusClass::Success {
            continue;
        }

        let charge = record.charge_usd(rates);
        if at >= marks.minute {
            income.income_per_minute += charge;
        }
        if at >= marks.hour {
            income.income_per_hour += charge;
        }
        if at >= marks.year {
            income.accumulated_revenue_ytd += charge;
        }
        if at >= marks.today {
            let amount = record.amount_usd(rates);
            today_successes += 1;
            income.income_per_day += charge;
            income.total_value_moved_usd += amount;
            if let Some(country) = record.country() {
                tally(&mut countries, country.to_string(), amount);
            }
            tally(&mut currencies, record.currency_code(), amount);
        }
    }

    income.avg_amount_sent_usd = average(income.total_value_moved_usd, today_successes);
    income.error_rate = percentage_of(Decimal::from(today_errors), Decimal::from(today_all));
    income.top_countries = top_volumes(countries);
    income.top_currencies = top_volumes(currencies);
    income
}

fn tally(groups: &mut HashMap<String, (u64, Decimal)>, key: String, amount: Decimal) {
    let entry = groups.entry(key).or_default();
    entry.0 += 1;
    entry.1 += amount;
}

/// Largest USD volume first, ties by name; at most [`TOP_N`] entries.
fn top_volumes(groups: HashMap<String, (u64, Decimal)>) -> Vec<RankedVolume> {
    let mut ranked: Vec<RankedVolume> = groups
        .into_iter()
        .map(|(name, (transaction_count, volume_usd))| RankedVolume {
            name,
            transaction_count,
            volume_usd,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.volume_usd
            .cmp(&a.volume_usd)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(TOP_N);
    ranked
}

pub fn dashboard_stats(records: &[CachedTransaction], rates: &RateTable) -> DashboardStats {
    let mut stats = DashboardStats::default();
    for record in records {
        match record.status_class() {
            StatusClass::Success => {
                stats.completed_count += 1;
                stats.total_volume_usd += record.amount_usd(rates);
            }
            StatusClass::Pending => stats.pending_count += 1,
            class if class.is_error() => stats.failed_count += 1,
            _ => {}
        }
    }
    stats.total_transactions = stats.completed_count;
    stats.avg_transaction_amount_usd = average(stats.total_volume_usd, stats.completed_count);
    stats
}

impl AggregationEngine {
    pub async fn transaction_pulse_at(&self, now: NaiveDateTime) -> Result<TransactionPulse> {
        let marks = Marks::at(now);
        let records = self.records_in(&marks.window()).await?;
        let earlier = self
            .records_in(&PeriodWindow::new(
                PeriodWindow::all_time().start,
                marks.today,
                "Before Today",
            ))
            .await?;
        let seen_before_today: HashSet<&str> = earlier
            .iter()
            .filter(|r| r.created_at.is_some_and(|at| at < marks.today))
            .filter_map(CachedTransaction::wallet)
            .collect();
        Ok(transaction_pulse(now, &records, &seen_before_today, self.rates()))
    }

    pub async fn net_income_at(&self, now: NaiveDateTime) -> Result<NetIncome> {
        let records = self.records_in(&Marks::at(now).window()).await?;
        Ok(net_income(now, &records, self.rates()))
    }

    /// All-time headline counts.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let records = self.records_in(&PeriodWindow::all_time()).await?;
        Ok(dashboard_stats(&records, self.rates()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analytics::tests::{at, dec, tx};
    use crate::core::cache::TransactionStore;
    use crate::core::transaction::Recipient;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    // Thursday
    const NOW: &str = "2026-01-22 12:00:00";

    fn from(wallet: &str, mut record: CachedTransaction) -> CachedTransaction {
        record.from_wallet = Some(wallet.to_string());
        record
    }

    fn to(country: &str, mut record: CachedTransaction) -> CachedTransaction {
        let recipient = record.recipient.get_or_insert_with(Recipient::default);
        recipient.country = Some(country.to_string());
        record
    }

    fn pulse_sample() -> Vec<CachedTransaction> {
        vec![
            from("w1", tx("a", "success", "100", "1", "USD", None, "2026-01-22 11:59:30")),
            from("w2", tx("b", "success", "50", "1", "USD", None, "2026-01-22 11:30:00")),
            from("w1", tx("c", "failed", "10", "0", "USD", None, "2026-01-22 08:00:00")),
            tx("d", "pending", "10", "0", "USD", None, "2026-01-22 11:59:50"),
            from("w3", tx("e", "success", "20", "0", "USD", None, "2026-01-20 10:00:00")),
            from("w4", tx("f", "success", "5", "0", "USD", None, "2026-01-05 10:00:00")),
            from("w5", tx("g", "success", "999", "9", "USD", None, "2026-01-22 12:00:01")),
        ]
    }

    #[test]
    fn test_pulse_counts_by_mark() {
        let seen = HashSet::from(["w2"]);
        let pulse = transaction_pulse(at(NOW), &pulse_sample(), &seen, &RateTable::builtin());

        assert_eq!(pulse.transactions_per_minute, 2);
        assert_eq!(pulse.transactions_per_hour, 3);
        assert_eq!(pulse.transactions_per_day, 2);
        assert_eq!(pulse.transaction_volume_usd, dec("150"));
        assert_eq!(pulse.avg_transaction_size_usd, dec("75"));
        assert_eq!(pulse.error_rate, dec("25"));
        assert_eq!(pulse.active_wallets_today, 2);
        assert_eq!(pulse.active_wallets_week, 3);
        assert_eq!(pulse.active_wallets_month, 4);
        assert_eq!(pulse.new_wallets_today, 1);
    }

    #[test]
    fn test_pulse_week_reaches_into_previous_month() {
        // Monday 2026-01-26 to Sunday 2026-02-01
        let records = vec![
            from("w1", tx("a", "success", "1", "0", "USD", None, "2026-01-27 10:00:00")),
            from("w2", tx("b", "success", "1", "0", "USD", None, "2026-02-01 10:00:00")),
        ];
        let pulse = transaction_pulse(
            at("2026-02-01 12:00:00"),
            &records,
            &HashSet::new(),
            &RateTable::builtin(),
        );
        assert_eq!(pulse.active_wallets_week, 2);
        assert_eq!(pulse.active_wallets_month, 1);
        assert_eq!(Marks::at(at("2026-02-01 12:00:00")).window().start, at("2026-01-01 00:00:00"));
    }

    #[test]
    fn test_empty_pulse() {
        let pulse = transaction_pulse(at(NOW), &[], &HashSet::new(), &RateTable::builtin());
        assert_eq!(pulse, TransactionPulse::default());
    }

    fn income_sample() -> Vec<CachedTransaction> {
        vec![
            to("GH", tx("a", "success", "100", "2", "USD", None, "2026-01-22 11:59:30")),
            to("NG", tx("b", "success", "1433.6190917516", "0", "NGN", None, "2026-01-22 11:30:00")),
            to("NG", tx("c", "success", "300", "3", "USD", None, "2026-01-22 08:00:00")),
            tx("d", "failed", "40", "1", "USD", None, "2026-01-22 09:00:00"),
            tx("e", "success", "500", "5", "USD", None, "2026-01-10 10:00:00"),
            tx("f", "success", "70", "7", "USD", None, "2025-12-31 23:00:00"),
        ]
    }

    #[test]
    fn test_net_income_by_mark() {
        let income = net_income(at(NOW), &income_sample(), &RateTable::builtin());

        assert_eq!(income.income_per_minute, dec("2"));
        assert_eq!(income.income_per_hour, dec("2"));
        assert_eq!(income.income_per_day, dec("5"));
        assert_eq!(income.accumulated_revenue_ytd, dec("10"));
        assert_eq!(income.total_value_moved_usd, dec("401"));
        assert_eq!(income.avg_amount_sent_usd, dec("401") / dec("3"));
        assert_eq!(income.error_rate, dec("25"));
    }

    #[test]
    fn test_net_income_rankings() {
        let income = net_income(at(NOW), &income_sample(), &RateTable::builtin());

        let countries: Vec<(&str, u64, Decimal)> = income
            .top_countries
            .iter()
            .map(|r| (r.name.as_str(), r.transaction_count, r.volume_usd))
            .collect();
        assert_eq!(countries, vec![("NG", 2, dec("301")), ("GH", 1, dec("100"))]);

        let currencies: Vec<&str> = income.top_currencies.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(currencies, vec!["USD", "NGN"]);
        assert_eq!(income.top_currencies[0].volume_usd, dec("400"));
        assert_eq!(income.top_currencies[1].volume_usd, Decimal::ONE);
    }

    #[test]
    fn test_rankings_keep_top_five() {
        let records: Vec<CachedTransaction> = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG"]
            .into_iter()
            .enumerate()
            .map(|(i, code)| {
                let amount = (i + 1).to_string();
                to(code, tx(code, "success", &amount, "0", "USD", None, "2026-01-22 09:00:00"))
            })
            .collect();
        let income = net_income(at(NOW), &records, &RateTable::builtin());

        let names: Vec<&str> = income.top_countries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GGG", "FFF", "EEE", "DDD", "CCC"]);
        assert_eq!(income.top_currencies.len(), 1);
        assert_eq!(income.top_currencies[0].transaction_count, 7);
    }

    #[test]
    fn test_dashboard_counts() {
        let records = vec![
            tx("a", "success", "100", "1", "USD", None, "2026-01-22 08:00:00"),
            tx("b", "success", "500", "5", "NGN", Some("1433.62"), "2026-01-22 08:00:00"),
            tx("c", "pending", "10", "0", "USD", None, "2026-01-22 08:00:00"),
            tx("d", "declined", "10", "0", "USD", None, "2026-01-22 08:00:00"),
            tx("e", "reversed", "10", "0", "USD", None, "2026-01-22 08:00:00"),
            tx("f", "refunded", "10", "0", "USD", None, "2026-01-22 08:00:00"),
        ];
        let stats = dashboard_stats(&records, &RateTable::builtin());

        let volume = dec("100") + dec("500") / dec("1433.62");
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.completed_count, 2);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.failed_count, 2);
        assert_eq!(stats.total_volume_usd, volume);
        assert_eq!(stats.avg_transaction_amount_usd, volume / dec("2"));
    }

    #[test]
    fn test_net_income_json_is_rounded() {
        let income = net_income(at(NOW), &income_sample(), &RateTable::builtin());
        let json = serde_json::to_value(&income).unwrap();
        assert_eq!(json["avg_amount_sent_usd"], "133.67");
        assert_eq!(json["top_countries"][0]["volume_usd"], "301.00");
    }

    #[tokio::test]
    async fn test_engine_reads_marks_through_store() {
        let store = Arc::new(MemoryStore::new());
        let mut records = pulse_sample();
        records.push(from(
            "w2",
            tx("h", "success", "1", "0", "USD", None, "2025-12-20 10:00:00"),
        ));
        store.upsert_batch(records).await.unwrap();
        let engine = AggregationEngine::new(store, RateTable::builtin());

        let pulse = engine.transaction_pulse_at(at(NOW)).await.unwrap();
        assert_eq!(pulse.transactions_per_hour, 3);
        assert_eq!(pulse.active_wallets_month, 4);
        // w2 traded in December, w1 is new
        assert_eq!(pulse.new_wallets_today, 1);

        let income = engine.net_income_at(at(NOW)).await.unwrap();
        assert_eq!(income.income_per_day, dec("2"));
        assert_eq!(income.accumulated_revenue_ytd, dec("2"));

        let dashboard = engine.dashboard_stats().await.unwrap();
        assert_eq!(dashboard.completed_count, 6);
        assert_eq!(dashboard.failed_count, 1);
        assert_eq!(dashboard.pending_count, 1);
    }
}
