//! pairstreak CLI
//!
//! Offline evaluation of the streak engine: feed it an exported completion
//! log and it runs the full read path (in-memory stores) and prints the
//! resulting streak state.
//!
//! ```text
//! pairstreak compute --logs logs.json --user-a alice --user-b bob --today 2024-01-03
//! pairstreak config --config engine.yaml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pairstreak::adapters::{
    InMemoryCompletionLog, InMemoryPartnershipDirectory, InMemoryStreakRecordStore,
    LoggingEventPublisher,
};
use pairstreak::domain::{Clock, FixedClock, Partnership, SystemClock};
use pairstreak::{EngineConfig, HabitId, PartnershipId, StreakCacheManager};

// =============================================================================
// CLI Arguments
// =============================================================================

/// pairstreak - streak engine for partner habits
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Engine configuration file (YAML)
    #[arg(long, env = "PAIRSTREAK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the streak for an exported completion log
    Compute {
        /// JSON array of completion records
        #[arg(long)]
        logs: PathBuf,

        /// First partner
        #[arg(long)]
        user_a: String,

        /// Second partner
        #[arg(long)]
        user_b: String,

        /// Evaluate as of this day (defaults to today, UTC)
        #[arg(long, value_parser = parse_day)]
        today: Option<NaiveDate>,

        /// Habit identifier to report under
        #[arg(long, default_value = "habit")]
        habit: String,
    },

    /// Print the effective engine configuration
    Config,
}

fn parse_day(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    debug!(?config, "Engine configuration");

    match args.command {
        Command::Compute {
            logs,
            user_a,
            user_b,
            today,
            habit,
        } => compute(config, logs, user_a, user_b, today, habit).await,
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config.to_file())?);
            Ok(())
        }
    }
}

async fn compute(
    config: EngineConfig,
    logs: PathBuf,
    user_a: String,
    user_b: String,
    today: Option<NaiveDate>,
    habit: String,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&logs)
        .with_context(|| format!("reading {}", logs.display()))?;

    let habit_id = HabitId::new(habit);
    let partnership_id = PartnershipId::new("cli");

    let partnerships = Arc::new(InMemoryPartnershipDirectory::new());
    partnerships.insert(Partnership::new(partnership_id.clone(), user_a, user_b));

    let completions = Arc::new(InMemoryCompletionLog::new());
    let count = completions
        .load_json(&habit_id, &raw)
        .with_context(|| format!("parsing {}", logs.display()))?;
    info!(records = count, habit_id = %habit_id, "Loaded completion log");

    let clock: Arc<dyn Clock> = match today {
        Some(day) => Arc::new(FixedClock::new(day)),
        None => Arc::new(SystemClock),
    };

    let manager = StreakCacheManager::with_config(
        config,
        partnerships,
        completions,
        Arc::new(InMemoryStreakRecordStore::new()),
    )
    .with_clock(clock)
    .with_event_publisher(Arc::new(LoggingEventPublisher::debug_level()));

    let state = manager.get_streak(&habit_id, &partnership_id).await?;
    let stats = manager.stats();
    debug!(
        derivations = stats.metrics.derivations(),
        memory_hit_ratio = stats.metrics.memory_hit_ratio,
        ?stats,
        "Cache statistics"
    );

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries command output; logs go to stderr.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
