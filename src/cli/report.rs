use super::ui;
use crate::core::format::{format_currency, format_percentage};
use crate::core::report::{WeekMetrics, WeeklyReport};
use crate::core::transaction::StatusClass;
use crate::core::trend::DailyTrend;
use crate::core::window::{Interval, week_monday};
use crate::{OutputFormat, RangeArgs, Services};
use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use comfy_table::Cell;

impl DailyTrend {
    pub fn display_as_table(&self) -> String {
        let mut output = format!(
            "Daily trend: {}\n\n",
            ui::style_text(
                &format!("{} to {}", self.start_date, self.end_date),
                ui::StyleType::Title
            )
        );

        if self.daily_data.is_empty() {
            output.push_str(&ui::style_text(
                "No transactions in range.",
                ui::StyleType::Subtle,
            ));
            return output;
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Date"),
            ui::header_cell("Count"),
            ui::header_cell("Success"),
            ui::header_cell("Failed"),
            ui::header_cell("Pending"),
            ui::header_cell("Volume (USD)"),
            ui::header_cell("Revenue (USD)"),
            ui::header_cell("Success Rate"),
        ]);
        for day in &self.daily_data {
            table.add_row(vec![
                Cell::new(day.date),
                ui::number_cell(day.transaction_count),
                ui::number_cell(day.success_count),
                ui::number_cell(day.failed_count),
                ui::number_cell(day.pending_count),
                ui::money_cell(day.total_volume_usd),
                ui::money_cell(day.total_revenue_usd),
                ui::percent_cell(day.success_rate),
            ]);
        }
        output.push_str(&table.to_string());

        let summary = &self.summary;
        output.push_str(&format!(
            "\n\n{} {} over {} days, {} successful ({}%). Volume {}, revenue {}.",
            ui::style_text("Total:", ui::StyleType::TotalLabel),
            summary.total_transactions,
            self.total_days,
            summary.total_success,
            format_percentage(summary.overall_success_rate),
            ui::style_text(
                &format!(
                    "${}",
                    format_currency(summary.total_volume_usd)
                ),
                ui::StyleType::TotalValue
            ),
            ui::style_text(
                &format!(
                    "${}",
                    format_currency(summary.total_revenue_usd)
                ),
                ui::StyleType::TotalValue
            ),
        ));
        output
    }
}

fn metrics_column(metrics: &WeekMetrics) -> Vec<Cell> {
    vec![
        ui::number_cell(metrics.total_transactions),
        ui::number_cell(metrics.count(StatusClass::Success)),
        ui::percent_cell(metrics.success_rate),
        ui::money_cell(metrics.total_volume_usd),
        ui::money_cell(metrics.total_revenue_usd),
        ui::money_cell(metrics.avg_transaction_size_usd),
        ui::money_cell(metrics.avg_fee_per_transaction_usd),
        ui::percent_cell(metrics.fees_to_value_ratio),
    ]
}

impl WeeklyReport {
    pub fn display_as_table(&self) -> String {
        let labels = [
            "Transactions",
            "Successful",
            "Success rate",
            "Volume (USD)",
            "Revenue (USD)",
            "Avg size (USD)",
            "Avg fee (USD)",
            "Fees / value",
        ];
        let wow = &self.week_over_week;
        let changes = vec![
            ui::change_cell(wow.transaction_count_change_pct, "%"),
            ui::na_cell(),
            ui::change_cell(wow.success_rate_change, " pp"),
            ui::na_cell(),
            ui::change_cell(wow.revenue_change_pct, "%"),
            ui::change_cell(wow.avg_transaction_size_change_pct, "%"),
            ui::na_cell(),
            ui::na_cell(),
        ];

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Metric"),
            ui::header_cell("This week"),
            ui::header_cell("Previous week"),
            ui::header_cell("Change"),
        ]);
        let rows = labels
            .into_iter()
            .zip(metrics_column(&self.current_week))
            .zip(metrics_column(&self.previous_week))
            .zip(changes);
        for (((label, current), previous), change) in rows {
            table.add_row(vec![ui::label_cell(label), current, previous, change]);
        }

        let mut output = format!(
            "Week {}: {}\n\n{}",
            self.period.week_number,
            ui::style_text(
                &format!("{} to {}", self.period.start_date, self.period.end_date),
                ui::StyleType::Title
            ),
            table
        );

        if !self.current_week.currency_breakdown.is_empty() {
            let mut currencies = ui::new_styled_table();
            currencies.set_header(vec![
                ui::header_cell("Top currencies"),
                ui::header_cell("Count"),
                ui::header_cell("Volume (USD)"),
                ui::header_cell("Share"),
            ]);
            for volume in &self.current_week.currency_breakdown {
                currencies.add_row(vec![
                    Cell::new(&volume.currency),
                    ui::number_cell(volume.transaction_count),
                    ui::money_cell(volume.total_volume_usd),
                    ui::percent_cell(volume.percentage_of_total),
                ]);
            }
            output.push_str(&format!("\n\n{currencies}"));
        }

        output
    }
}

/// Daily trend for the given range, the current month by default.
pub async fn run_trend(services: &Services, range: &RangeArgs, format: OutputFormat) -> Result<()> {
    let window = match range.window()? {
        Some(window) => window,
        None => Interval::CurrentMonth.window(),
    };
    let trend = services.engine.daily_trend(&window).await?;

    match format {
        OutputFormat::Json => ui::print_json(&trend),
        OutputFormat::Table => {
            println!("{}", trend.display_as_table());
            Ok(())
        }
    }
}

/// Monday of the week before the one containing `today`.
fn previous_week_start(today: NaiveDate) -> NaiveDate {
    week_monday(today) - Duration::days(7)
}

/// Weekly report, for last week by default.
pub async fn run_weekly(
    services: &Services,
    week_start: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<()> {
    let week_start = week_start.unwrap_or_else(|| previous_week_start(Local::now().date_naive()));
    let report = services.engine.weekly_report(week_start).await?;

    match format {
        OutputFormat::Json => ui::print_json(&report),
        OutputFormat::Table => {
            println!("{}", report.display_as_table());
            Ok(())
        }
    }
}
