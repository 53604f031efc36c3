use super::ui;
use crate::core::pulse::{DashboardStats, NetIncome, RankedVolume, TransactionPulse};
use crate::{OutputFormat, Services};
use anyhow::Result;
use chrono::Local;
use comfy_table::Cell;

impl TransactionPulse {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Pulse"), ui::header_cell("")]);
        let rows = [
            ("Last minute", ui::number_cell(self.transactions_per_minute)),
            ("Last hour", ui::number_cell(self.transactions_per_hour)),
            ("Successful today", ui::number_cell(self.transactions_per_day)),
            ("Volume today (USD)", ui::money_cell(self.transaction_volume_usd)),
            ("Avg size (USD)", ui::money_cell(self.avg_transaction_size_usd)),
            ("Error rate", ui::percent_cell(self.error_rate)),
            ("Active wallets today", ui::number_cell(self.active_wallets_today)),
            ("Active wallets this week", ui::number_cell(self.active_wallets_week)),
            ("Active wallets this month", ui::number_cell(self.active_wallets_month)),
            ("New wallets today", ui::number_cell(self.new_wallets_today)),
        ];
        for (label, value) in rows {
            table.add_row(vec![ui::label_cell(label), value]);
        }
        table.to_string()
    }
}

fn ranking_table(title: &str, ranked: &[RankedVolume]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(title),
        ui::header_cell("Count"),
        ui::header_cell("Volume (USD)"),
    ]);
    for entry in ranked {
        table.add_row(vec![
            Cell::new(&entry.name),
            ui::number_cell(entry.transaction_count),
            ui::money_cell(entry.volume_usd),
        ]);
    }
    table.to_string()
}

impl NetIncome {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Net income"), ui::header_cell("USD")]);
        let rows = [
            ("Last minute", ui::money_cell(self.income_per_minute)),
            ("Last hour", ui::money_cell(self.income_per_hour)),
            ("Today", ui::money_cell(self.income_per_day)),
            ("Year to date", ui::money_cell(self.accumulated_revenue_ytd)),
            ("Value moved today", ui::money_cell(self.total_value_moved_usd)),
            ("Avg amount sent", ui::money_cell(self.avg_amount_sent_usd)),
            ("Error rate", ui::percent_cell(self.error_rate)),
        ];
        for (label, value) in rows {
            table.add_row(vec![ui::label_cell(label), value]);
        }

        let mut output = table.to_string();
        if self.top_countries.is_empty() && self.top_currencies.is_empty() {
            output.push_str(&format!(
                "\n\n{}",
                ui::style_text("No successful transactions today.", ui::StyleType::Subtle)
            ));
            return output;
        }
        if !self.top_countries.is_empty() {
            output.push_str(&format!(
                "\n\n{}",
                ranking_table("Top countries", &self.top_countries)
            ));
        }
        output.push_str(&format!(
            "\n\n{}",
            ranking_table("Top currencies", &self.top_currencies)
        ));
        output
    }
}

impl DashboardStats {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Dashboard"), ui::header_cell("")]);
        table.add_row(vec![
            ui::label_cell("Completed"),
            ui::number_cell(self.completed_count),
        ]);
        table.add_row(vec![
            ui::label_cell("Pending"),
            ui::number_cell(self.pending_count),
        ]);
        table.add_row(vec![
            ui::label_cell("Failed"),
            ui::number_cell(self.failed_count),
        ]);
        table.add_row(vec![
            ui::label_cell("Volume (USD)"),
            ui::money_cell(self.total_volume_usd),
        ]);
        table.add_row(vec![
            ui::label_cell("Avg amount (USD)"),
            ui::money_cell(self.avg_transaction_amount_usd),
        ]);
        table.to_string()
    }
}

pub async fn run_pulse(services: &Services, format: OutputFormat) -> Result<()> {
    let pulse = services
        .engine
        .transaction_pulse_at(Local::now().naive_local())
        .await?;

    match format {
        OutputFormat::Json => ui::print_json(&pulse),
        OutputFormat::Table => {
            println!("{}", pulse.display_as_table());
            Ok(())
        }
    }
}

pub async fn run_net_income(services: &Services, format: OutputFormat) -> Result<()> {
    let income = services
        .engine
        .net_income_at(Local::now().naive_local())
        .await?;

    match format {
        OutputFormat::Json => ui::print_json(&income),
        OutputFormat::Table => {
            println!("{}", income.display_as_table());
            Ok(())
        }
    }
}

pub async fn run_dashboard(services: &Services, format: OutputFormat) -> Result<()> {
    let stats = services.engine.dashboard_stats().await?;

    match format {
        OutputFormat::Json => ui::print_json(&stats),
        OutputFormat::Table => {
            println!("{}", stats.display_as_table());
            Ok(())
        }
    }
}
