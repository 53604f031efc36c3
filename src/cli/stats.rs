use super::ui;
use crate::core::analytics::{CurrencyVolume, Overview, PeriodStats, StatusBreakdown};
use crate::core::format::format_currency;
use crate::core::listing::TransactionFilter;
use crate::core::transaction::CachedTransaction;
use crate::{OutputFormat, RangeArgs, Services};
use anyhow::Result;
use chrono::Local;
use comfy_table::Cell;

impl PeriodStats {
    fn table_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.period_name),
            Cell::new(format!(
                "{} - {}",
                self.start_date.format("%Y-%m-%d"),
                self.end_date.format("%Y-%m-%d")
            )),
            ui::number_cell(self.total_transactions),
            ui::number_cell(self.all_transactions),
            ui::money_cell(self.total_volume_usd),
            ui::money_cell(self.total_revenue_usd),
            ui::money_cell(self.avg_transaction_amount),
            ui::percent_cell(self.error_rate),
        ]
    }
}

fn period_table(stats: &[PeriodStats]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Period"),
        ui::header_cell("Range"),
        ui::header_cell("Successful"),
        ui::header_cell("All"),
        ui::header_cell("Volume (USD)"),
        ui::header_cell("Revenue (USD)"),
        ui::header_cell("Avg Size (USD)"),
        ui::header_cell("Error Rate"),
    ]);
    for period in stats {
        table.add_row(period.table_row());
    }
    table.to_string()
}

impl StatusBreakdown {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Status"),
            ui::header_cell("Count"),
            ui::header_cell("Share"),
        ]);
        for (status, entry) in &self.statuses {
            table.add_row(vec![
                Cell::new(status),
                ui::number_cell(entry.count),
                ui::percent_cell(entry.percentage),
            ]);
        }

        format!(
            "{}\n\n{}: {}",
            table,
            ui::style_text("Total transactions", ui::StyleType::TotalLabel),
            ui::style_text(
                &self.total_transactions.to_string(),
                ui::StyleType::TotalValue
            )
        )
    }
}

fn currency_table(volumes: &[CurrencyVolume]) -> String {
    if volumes.is_empty() {
        return ui::style_text("No transactions in range.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Count"),
        ui::header_cell("Volume"),
        ui::header_cell("Volume (USD)"),
        ui::header_cell("Avg Size"),
        ui::header_cell("Share"),
    ]);
    for volume in volumes {
        table.add_row(vec![
            Cell::new(&volume.currency),
            ui::number_cell(volume.transaction_count),
            ui::number_cell(format_currency(volume.total_volume)),
            ui::money_cell(volume.total_volume_usd),
            ui::number_cell(format_currency(volume.avg_transaction_size)),
            ui::percent_cell(volume.percentage_of_total),
        ]);
    }
    table.to_string()
}

impl Overview {
    pub fn display_as_table(&self) -> String {
        let mut summary = ui::new_styled_table();
        summary.set_header(vec![ui::header_cell("Overview"), ui::header_cell("")]);
        summary.add_row(vec![
            ui::label_cell("Transactions"),
            ui::number_cell(self.total_transactions),
        ]);
        summary.add_row(vec![
            ui::label_cell("Successful"),
            ui::number_cell(self.success_count),
        ]);
        summary.add_row(vec![
            ui::label_cell("Success rate"),
            ui::percent_cell(self.success_rate),
        ]);
        summary.add_row(vec![
            ui::label_cell("Volume (USD)"),
            ui::money_cell(self.total_volume_usd),
        ]);
        summary.add_row(vec![
            ui::label_cell("Revenue (USD)"),
            ui::money_cell(self.total_revenue_usd),
        ]);
        summary.add_row(vec![
            ui::label_cell("Avg size (USD)"),
            ui::money_cell(self.avg_transaction_size),
        ]);

        let mut statuses = ui::new_styled_table();
        statuses.set_header(vec![
            ui::header_cell("Status"),
            ui::header_cell("Count"),
            ui::header_cell("Volume (USD)"),
            ui::header_cell("Revenue (USD)"),
            ui::header_cell("Share"),
        ]);
        for (status, entry) in &self.status_breakdown {
            statuses.add_row(vec![
                Cell::new(status),
                ui::number_cell(entry.count),
                ui::money_cell(entry.volume_usd),
                ui::money_cell(entry.revenue_usd),
                ui::percent_cell(entry.percentage),
            ]);
        }

        format!("{summary}\n\n{statuses}")
    }
}

impl CachedTransaction {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);

        let optional = |value: Option<String>| value.map_or_else(ui::na_cell, Cell::new);
        table.add_row(vec![ui::label_cell("ID"), Cell::new(&self.id)]);
        table.add_row(vec![
            ui::label_cell("Status"),
            optional(self.status.clone()),
        ]);
        table.add_row(vec![
            ui::label_cell("Amount"),
            ui::number_cell(format!(
                "{} {}",
                format_currency(self.amount_major()),
                self.currency_code()
            )),
        ]);
        table.add_row(vec![
            ui::label_cell("Charge"),
            ui::number_cell(format!(
                "{} {}",
                format_currency(self.charge_major()),
                self.currency_code()
            )),
        ]);
        table.add_row(vec![ui::label_cell("Type"), optional(self.kind.clone())]);
        table.add_row(vec![ui::label_cell("Mode"), optional(self.mode.clone())]);
        table.add_row(vec![
            ui::label_cell("Description"),
            optional(self.description.clone()),
        ]);
        table.add_row(vec![
            ui::label_cell("Decline reason"),
            optional(self.decline_reason.clone()),
        ]);
        table.add_row(vec![
            ui::label_cell("External ID"),
            optional(self.external_id.clone()),
        ]);
        table.add_row(vec![
            ui::label_cell("Recipient rate"),
            optional(self.rate_hint().map(|r| r.to_string())),
        ]);
        table.add_row(vec![
            ui::label_cell("Created"),
            optional(
                self.created_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ),
        ]);
        table.add_row(vec![
            ui::label_cell("First cached"),
            Cell::new(self.cached_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);
        table.add_row(vec![
            ui::label_cell("Last updated"),
            Cell::new(self.updated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);

        table.to_string()
    }
}

fn transaction_list_table(records: &[CachedTransaction]) -> String {
    if records.is_empty() {
        return ui::style_text("No transactions matched.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Created"),
        ui::header_cell("Status"),
        ui::header_cell("Amount"),
        ui::header_cell("Charge"),
        ui::header_cell("Currency"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.id),
            record.created_at.map_or_else(ui::na_cell, |at| {
                Cell::new(at.format("%Y-%m-%d %H:%M:%S"))
            }),
            record.status.as_deref().map_or_else(ui::na_cell, Cell::new),
            ui::number_cell(format_currency(record.amount_major())),
            ui::number_cell(format_currency(record.charge_major())),
            Cell::new(record.currency_code()),
        ]);
    }
    table.to_string()
}

/// Period statistics for the given range, or every canned interval.
pub async fn run_stats(services: &Services, range: &RangeArgs, format: OutputFormat) -> Result<()> {
    match range.window()? {
        Some(window) => {
            let stats = services.engine.period_stats(&window).await?;
            match format {
                OutputFormat::Json => ui::print_json(&stats),
                OutputFormat::Table => {
                    println!("{}", period_table(std::slice::from_ref(&stats)));
                    Ok(())
                }
            }
        }
        None => {
            let live = services
                .engine
                .live_view_at(Local::now().naive_local())
                .await?;
            match format {
                OutputFormat::Json => ui::print_json(&live),
                OutputFormat::Table => {
                    println!("{}", period_table(&live));
                    Ok(())
                }
            }
        }
    }
}

pub async fn run_status(services: &Services, range: &RangeArgs, format: OutputFormat) -> Result<()> {
    let window = range.window()?;
    let breakdown = services.engine.status_breakdown(window.as_ref()).await?;

    match format {
        OutputFormat::Json => ui::print_json(&breakdown),
        OutputFormat::Table => {
            println!("{}", breakdown.display_as_table());
            Ok(())
        }
    }
}

pub async fn run_currencies(
    services: &Services,
    range: &RangeArgs,
    status: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let window = range.window()?;
    let volumes = services
        .engine
        .currency_breakdown(window.as_ref(), status)
        .await?;

    match format {
        OutputFormat::Json => ui::print_json(&volumes),
        OutputFormat::Table => {
            println!("{}", currency_table(&volumes));
            Ok(())
        }
    }
}

pub async fn run_overview(
    services: &Services,
    range: &RangeArgs,
    format: OutputFormat,
) -> Result<()> {
    let window = range.window()?;
    let overview = services.engine.overview(window.as_ref()).await?;

    match format {
        OutputFormat::Json => ui::print_json(&overview),
        OutputFormat::Table => {
            println!("{}", overview.display_as_table());
            Ok(())
        }
    }
}

/// One page of cached records, newest first.
pub async fn run_list(
    services: &Services,
    range: &RangeArgs,
    status: Option<String>,
    skip: usize,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let filter = TransactionFilter {
        status,
        window: range.window()?,
        skip,
        limit,
    };
    let records = services.engine.list_transactions(&filter).await?;

    match format {
        OutputFormat::Json => ui::print_json(&records),
        OutputFormat::Table => {
            println!("{}", transaction_list_table(&records));
            Ok(())
        }
    }
}

/// Prints one cached record.
pub async fn run_show(services: &Services, id: &str, format: OutputFormat) -> Result<()> {
    let Some(record) = services.store.get(id).await? else {
        anyhow::bail!("Transaction {id} not found in the cache");
    };

    match format {
        OutputFormat::Json => ui::print_json(&record),
        OutputFormat::Table => {
            println!("{}", record.display_as_table());
            Ok(())
        }
    }
}
