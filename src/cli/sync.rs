use super::ui;
use crate::sync::SyncResult;
use crate::sync::scheduler::SchedulerStatus;
use crate::{OutputFormat, Services};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::Cell;
use tracing::info;

impl SyncResult {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Sync"), ui::header_cell("")]);

        table.add_row(vec![ui::label_cell("Type"), Cell::new(self.sync_type)]);
        if let Some(date) = self.date {
            table.add_row(vec![ui::label_cell("Day"), Cell::new(date)]);
        }
        table.add_row(vec![
            ui::label_cell("Started"),
            Cell::new(self.started_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);
        table.add_row(vec![
            ui::label_cell("Elapsed"),
            ui::number_cell(format!("{:.2}s", self.elapsed_seconds)),
        ]);
        table.add_row(vec![ui::label_cell("Fetched"), ui::number_cell(self.total)]);
        table.add_row(vec![ui::label_cell("New"), ui::number_cell(self.inserted)]);
        table.add_row(vec![ui::label_cell("Updated"), ui::number_cell(self.updated)]);

        table.to_string()
    }
}

impl SchedulerStatus {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Scheduler"), ui::header_cell("")]);
        table.add_row(vec![
            ui::label_cell("Running"),
            Cell::new(if self.running { "yes" } else { "no" }),
        ]);
        table.add_row(vec![
            ui::label_cell("Interval"),
            ui::number_cell(format!("{}s", self.interval_seconds)),
        ]);
        table.add_row(vec![
            ui::label_cell("Misfire grace"),
            ui::number_cell(format!("{}s", self.misfire_grace_seconds)),
        ]);
        match &self.last_run {
            Some(run) => table.add_row(vec![
                ui::label_cell("Last run"),
                Cell::new(format!(
                    "{} ({})",
                    run.at.format("%Y-%m-%d %H:%M:%S UTC"),
                    run.outcome
                )),
            ]),
            None => table.add_row(vec![ui::label_cell("Last run"), ui::na_cell()]),
        };
        table.to_string()
    }
}

fn render(result: &SyncResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => ui::print_json(result),
        OutputFormat::Table => {
            println!("{}", result.display_as_table());
            Ok(())
        }
    }
}

/// Mirrors the whole upstream ledger into the cache.
pub async fn run_full(services: &Services, format: OutputFormat) -> Result<()> {
    let pb = ui::new_spinner("Fetching all transactions...");
    let result = services.coordinator.full_sync().await;
    pb.finish_and_clear();

    let result = result.context("Full sync failed")?;
    render(&result, format)
}

/// Mirrors one upstream day, today when `date` is not given.
pub async fn run_daily(
    services: &Services,
    date: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<()> {
    let pb = ui::new_spinner("Fetching transactions for the day...");
    let result = services.coordinator.daily_sync(date).await;
    pb.finish_and_clear();

    let result = result.context("Daily sync failed")?;
    render(&result, format)
}

/// Runs the periodic daily sync until interrupted.
pub async fn serve(services: &Services) -> Result<()> {
    services.scheduler.start().await;
    println!("{}", services.scheduler.status().await.display_as_table());
    println!(
        "{}",
        ui::style_text("Press Ctrl-C to stop.", ui::StyleType::Subtle)
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    services.scheduler.stop().await;
    Ok(())
}
