pub mod cli;
pub mod core;
pub mod store;
pub mod sync;

use crate::core::config::AppConfig;
use crate::core::window::{Interval, PeriodWindow, resolve_window};
use crate::core::{AggregationEngine, RateTable, TransactionStore};
use crate::sync::SyncCoordinator;
use crate::sync::client::{SyncClient, TransactionSource};
use crate::sync::scheduler::{SchedulerSettings, SyncScheduler};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Range arguments shared by the analytics commands.
#[derive(Debug, Clone, Default)]
pub struct RangeArgs {
    pub interval: Option<Interval>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeArgs {
    /// `None` when no range was given.
    pub fn window(&self) -> Result<Option<PeriodWindow>> {
        resolve_window(
            self.interval,
            self.start.as_deref(),
            self.end.as_deref(),
            Local::now().naive_local(),
        )
    }
}

pub enum AppCommand {
    SyncFull,
    SyncDaily { date: Option<NaiveDate> },
    Serve,
    Stats(RangeArgs),
    Status(RangeArgs),
    Currencies { range: RangeArgs, status: Option<String> },
    Overview(RangeArgs),
    Trend(RangeArgs),
    Weekly { week_start: Option<NaiveDate> },
    Pulse,
    NetIncome,
    Dashboard,
    List {
        range: RangeArgs,
        status: Option<String>,
        skip: usize,
        limit: usize,
    },
    Show { id: String },
}

/// Service objects built once at startup and shared by every command.
pub struct Services {
    pub store: Arc<dyn TransactionStore>,
    pub coordinator: Arc<SyncCoordinator>,
    pub scheduler: SyncScheduler,
    pub engine: AggregationEngine,
}

impl Services {
    pub fn build(config: &AppConfig) -> Result<Self> {
        let store = store::open_store(config)?;
        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                "No upstream API key configured; set {} or upstream.api_key",
                crate::core::config::API_KEY_ENV
            );
        }
        let client = SyncClient::new(
            &config.upstream.base_url,
            api_key,
            std::time::Duration::from_secs(config.upstream.timeout_secs),
        )?;
        Ok(Self::with_parts(config, store, Arc::new(client)))
    }

    pub fn with_parts(
        config: &AppConfig,
        store: Arc<dyn TransactionStore>,
        source: Arc<dyn TransactionSource>,
    ) -> Self {
        let rates = RateTable::builtin().with_overrides(config.rates.clone());
        let coordinator = Arc::new(SyncCoordinator::new(source, Arc::clone(&store)));
        let scheduler = SyncScheduler::new(
            Arc::clone(&coordinator),
            SchedulerSettings::from(&config.scheduler),
        );
        let engine = AggregationEngine::new(Arc::clone(&store), rates);

        Self {
            store,
            coordinator,
            scheduler,
            engine,
        }
    }

    pub async fn run(&self, command: AppCommand, format: OutputFormat) -> Result<()> {
        match command {
            AppCommand::SyncFull => cli::sync::run_full(self, format).await,
            AppCommand::SyncDaily { date } => cli::sync::run_daily(self, date, format).await,
            AppCommand::Serve => cli::sync::serve(self).await,
            AppCommand::Stats(range) => cli::stats::run_stats(self, &range, format).await,
            AppCommand::Status(range) => cli::stats::run_status(self, &range, format).await,
            AppCommand::Currencies { range, status } => {
                cli::stats::run_currencies(self, &range, status.as_deref(), format).await
            }
            AppCommand::Overview(range) => cli::stats::run_overview(self, &range, format).await,
            AppCommand::Trend(range) => cli::report::run_trend(self, &range, format).await,
            AppCommand::Weekly { week_start } => {
                cli::report::run_weekly(self, week_start, format).await
            }
            AppCommand::Pulse => cli::pulse::run_pulse(self, format).await,
            AppCommand::NetIncome => cli::pulse::run_net_income(self, format).await,
            AppCommand::Dashboard => cli::pulse::run_dashboard(self, format).await,
            AppCommand::List {
                range,
                status,
                skip,
                limit,
            } => cli::stats::run_list(self, &range, status, skip, limit, format).await,
            AppCommand::Show { id } => cli::stats::run_show(self, &id, format).await,
        }
    }
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    info!("txpulse starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.upstream.base_url,
        persist = config.storage.persist,
        "Loaded config"
    );

    let services = Services::build(&config)?;
    services.run(command, format).await
}
