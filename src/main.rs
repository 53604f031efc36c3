use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use txpulse::core::listing::DEFAULT_PAGE_SIZE;
use txpulse::core::log::init_logging;
use txpulse::core::window::Interval;
use txpulse::{AppCommand, OutputFormat, RangeArgs};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Range {
    /// Canned period: today, previous-day, current-week, previous-week,
    /// current-month, previous-month or year-to-date
    #[arg(short, long)]
    interval: Option<Interval>,

    /// Range start (YYYY-MM-DD, optionally with time); overrides --interval
    #[arg(long)]
    start: Option<String>,

    /// Range end, inclusive; a bare date covers the whole day
    #[arg(long)]
    end: Option<String>,
}

impl From<Range> for RangeArgs {
    fn from(range: Range) -> Self {
        RangeArgs {
            interval: range.interval,
            start: range.start,
            end: range.end,
        }
    }
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Fetch every page of the upstream ledger
    Full,
    /// Fetch one day, today by default
    Daily {
        /// Day to fetch (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Synchronize the local cache with the upstream ledger
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Run the periodic daily sync until interrupted
    Serve,
    /// Period statistics; every canned interval when no range is given
    Stats(Range),
    /// Transaction counts per status
    Status(Range),
    /// Volume per currency
    Currencies {
        #[command(flatten)]
        range: Range,
        /// Status to include
        #[arg(long, default_value = "success")]
        status: String,
    },
    /// Headline figures with a per-status breakdown
    Overview(Range),
    /// Per-day trend, the current month by default
    Trend(Range),
    /// Week-over-week report, last week by default
    Weekly {
        /// Monday the report week starts on (YYYY-MM-DD)
        #[arg(long)]
        week_start: Option<NaiveDate>,
    },
    /// Live counts, volume and active wallets for today
    Pulse,
    /// Fee income per minute, hour, day and year to date
    NetIncome,
    /// All-time completed, pending and failed counts
    Dashboard,
    /// Cached transactions, newest first
    List {
        #[command(flatten)]
        range: Range,
        /// Exact status to match
        #[arg(long)]
        status: Option<String>,
        /// Records to skip
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Page size, 1 to 100
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
    },
    /// Show one cached transaction
    Show {
        /// Transaction id
        id: String,
    },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Sync {
                command: SyncCommands::Full,
            } => AppCommand::SyncFull,
            Commands::Sync {
                command: SyncCommands::Daily { date },
            } => AppCommand::SyncDaily { date },
            Commands::Serve => AppCommand::Serve,
            Commands::Stats(range) => AppCommand::Stats(range.into()),
            Commands::Status(range) => AppCommand::Status(range.into()),
            Commands::Currencies { range, status } => AppCommand::Currencies {
                range: range.into(),
                status: Some(status),
            },
            Commands::Overview(range) => AppCommand::Overview(range.into()),
            Commands::Trend(range) => AppCommand::Trend(range.into()),
            Commands::Weekly { week_start } => AppCommand::Weekly { week_start },
            Commands::Pulse => AppCommand::Pulse,
            Commands::NetIncome => AppCommand::NetIncome,
            Commands::Dashboard => AppCommand::Dashboard,
            Commands::List {
                range,
                status,
                skip,
                limit,
            } => AppCommand::List {
                range: range.into(),
                status,
                skip,
                limit,
            },
            Commands::Show { id } => AppCommand::Show { id },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => txpulse::cli::setup::setup_at_path(path),
            None => txpulse::cli::setup::setup(),
        },
        Some(cmd) => txpulse::run_command(cmd.into(), cli.config_path.as_deref(), format).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
