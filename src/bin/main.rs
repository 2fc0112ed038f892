//! Cardinal CLI - estimate row counts and distinct counts for a plan
//!
//! Usage:
//!   cardinal estimate <plan.json> [--stats <stats.toml>] [--config <cfg.toml>]
//!                     [--columns 0,1] [--all]
//!   cardinal config [--config <cfg.toml>]
//!
//! Examples:
//!   cardinal estimate plan.json --stats stats.toml
//!   cardinal estimate plan.json --columns 0,2 --all
//!   RUST_LOG=cardinal=debug cardinal estimate plan.json

use cardinal::config::{Settings, SettingsError};
use cardinal::metadata::{DisabledStatistics, InMemoryStatistics, StatisticsProvider};
use cardinal::planner::cost::CardinalityEstimator;
use cardinal::planner::logical::{ColumnSet, NodeId, PlanArena, PlanNode};
use cardinal::planner::PlanningSession;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cardinal")]
#[command(about = "Cardinal - cardinality estimation for cost-based query planning")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate row counts (and optionally distinct counts) for a JSON plan
    Estimate {
        /// Path to the plan: a JSON array of nodes in arena order
        plan: PathBuf,

        /// Statistics file (overrides the configured path)
        #[arg(short, long)]
        stats: Option<PathBuf>,

        /// Configuration file (defaults to the usual search path)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output ordinals to estimate distinct counts for, e.g. 0,2
        #[arg(long, value_delimiter = ',')]
        columns: Vec<usize>,

        /// Estimate every node instead of only the root
        #[arg(short, long)]
        all: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (defaults to the usual search path)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            plan,
            stats,
            config,
            columns,
            all,
        } => cmd_estimate(plan, stats, config, columns, all),
        Commands::Config { config } => cmd_config(config),
    }
}

fn load_settings(config: Option<&PathBuf>) -> Result<Settings, SettingsError> {
    match config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn cmd_estimate(
    plan: PathBuf,
    stats: Option<PathBuf>,
    config: Option<PathBuf>,
    columns: Vec<usize>,
    all: bool,
) -> ExitCode {
    let settings = match load_settings(config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Read the plan
    let source = match fs::read_to_string(&plan) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", plan.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let nodes: Vec<PlanNode> = match serde_json::from_str(&source) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Error parsing plan '{}': {}", plan.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let arena = match PlanArena::from_nodes(nodes) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Pick the statistics source
    let stats_path = match stats {
        Some(path) => Some(path),
        None if settings.statistics.enabled => match settings.statistics.resolved_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };
    let provider: Box<dyn StatisticsProvider> = match stats_path {
        Some(path) => match InMemoryStatistics::from_file(&path) {
            Ok(s) => Box::new(s),
            Err(e) => {
                eprintln!("Error loading statistics '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(DisabledStatistics),
    };

    let session = PlanningSession::new(settings.estimation);
    let estimator = CardinalityEstimator::new(&arena, &session, provider.as_ref());
    let columns: ColumnSet = columns.into_iter().collect();

    let targets: Vec<NodeId> = if all {
        arena.nodes().iter().map(|n| n.id).collect()
    } else {
        arena.root().into_iter().collect()
    };
    if targets.is_empty() {
        eprintln!("Plan '{}' has no nodes", plan.display());
        return ExitCode::FAILURE;
    }

    for id in targets {
        let kind = match arena.node(id) {
            Ok(node) => node.kind.name(),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let rows = match estimator.row_count(id) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Estimation error at {}: {}", id, e);
                return ExitCode::FAILURE;
            }
        };
        if columns.is_empty() {
            println!("{:<6} {:<14} rows={:.2}", id.to_string(), kind, rows);
            continue;
        }
        match estimator.distinct_count(id, &columns, None) {
            Ok(Some(ndv)) => println!(
                "{:<6} {:<14} rows={:.2} distinct{}={:.2}",
                id.to_string(),
                kind,
                rows,
                columns,
                ndv
            ),
            Ok(None) => println!(
                "{:<6} {:<14} rows={:.2} distinct{}=unknown",
                id.to_string(),
                kind,
                rows,
                columns
            ),
            Err(e) => {
                eprintln!("Estimation error at {}: {}", id, e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn cmd_config(config: Option<PathBuf>) -> ExitCode {
    let settings = match load_settings(config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match settings.to_toml_string() {
        Ok(toml) => {
            print!("{}", toml);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
