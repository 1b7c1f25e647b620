pub mod daemon_path;
pub mod heatmap;
pub mod process;
pub mod stats;

use std::{env, path::PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use heatmap::{process_heatmap_command, process_streak_command, HeatmapCommand, StreakCommand};
use process::{kill_previous_servers, restart_server};
use stats::{process_stats_command, StatsCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    engine::{args::DaemonArgs, counter::Language, start_engine, EngineOptions, SNAPSHOT_FILE},
    query::corpus_total,
    storage::{
        record_store::{dedup_all, JsonRecordStore},
        snapshot,
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

use daemon_path::to_daemon_path;

#[derive(Parser, Debug)]
#[command(name = "Wordwatch", version, long_about = None)]
#[command(about = "Tracks your daily writing activity", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

/// Daemon placement options shared by `init` and `serve`.
#[derive(Parser, Debug)]
struct ServeParams {
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    /// Directory whose documents are watched for writing activity.
    #[arg(long)]
    watch: PathBuf,
    /// Scripts the word counter tokenizes. Defaults to latin.
    #[arg(long, value_delimiter = ',')]
    languages: Vec<Language>,
    /// Daily word goal recorded into exported snapshots.
    #[arg(long)]
    goal: Option<i64>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {
        #[command(flatten)]
        params: ServeParams,
    },
    #[command(
        about = "Run the daemon directly in the current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[command(flatten)]
        params: ServeParams,
    },
    #[command(about = "Stop the currently running daemon.")]
    Stop {},
    #[command(about = "Sum written words or characters over a date range")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Show current and longest daily-goal streaks")]
    Streak {
        #[command(flatten)]
        command: StreakCommand,
    },
    #[command(about = "Draw an intensity heatmap of recent days")]
    Heatmap {
        #[command(flatten)]
        command: HeatmapCommand,
    },
    #[command(
        about = "Run a query block: a filter expression followed by option lines, read from a file or stdin"
    )]
    Query {
        #[arg(help = "File holding the query block. Reads stdin when omitted")]
        file: Option<PathBuf>,
    },
    #[command(about = "Total words and characters across the whole corpus")]
    Total {},
    #[command(about = "Collapse duplicate records left by interrupted writes")]
    Dedup {},
    #[command(about = "Export every record into a snapshot file")]
    Export {
        #[arg(long)]
        out: PathBuf,
        /// Daily word goal used to mark completed dates in the snapshot.
        #[arg(long)]
        goal: Option<i64>,
    },
    #[command(about = "Replace all records with the contents of a snapshot file")]
    Restore {
        #[arg(long)]
        snapshot: PathBuf,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Init { params } => restart_server(&daemon_args(params)),
        Commands::Stop {} => {
            let process_name = to_daemon_path(env::current_exe()?);
            kill_previous_servers(&process_name);
            Ok(())
        }
        Commands::Serve { params } => {
            let dir = params
                .dir
                .clone()
                .map_or_else(create_application_default_path, Ok)?;
            start_engine(dir, engine_options(params)).await
        }
        Commands::Stats { command } => process_stats_command(command).await,
        Commands::Streak { command } => process_streak_command(command).await,
        Commands::Heatmap { command } => process_heatmap_command(command).await,
        Commands::Query { file } => stats::process_query_command(file).await,
        Commands::Total {} => process_total_command().await,
        Commands::Dedup {} => process_dedup_command().await,
        Commands::Export { out, goal } => process_export_command(out, goal).await,
        Commands::Restore { snapshot } => process_restore_command(snapshot).await,
    }
}

fn daemon_args(params: ServeParams) -> DaemonArgs {
    DaemonArgs {
        force: false,
        dir: params.dir,
        watch: params.watch,
        languages: params.languages,
        goal: params.goal,
        log_console: false,
        log: None,
    }
}

fn engine_options(params: ServeParams) -> EngineOptions {
    let languages = if params.languages.is_empty() {
        Language::default_set()
    } else {
        params.languages.into_iter().collect()
    };
    EngineOptions {
        watch_dir: params.watch,
        languages,
        goal_words: params.goal,
    }
}

async fn process_total_command() -> Result<()> {
    let app_dir = create_application_default_path()?;
    let store = JsonRecordStore::new(app_dir.join("records"))?;

    // A snapshot left by the daemon carries the cached corpus baseline;
    // without one the whole store is replayed.
    let cache = snapshot::load_snapshot(&app_dir.join(SNAPSHOT_FILE))
        .await
        .ok()
        .and_then(|s| s.stats.corpus_baseline);

    let totals = corpus_total(&store, cache, Local::now().date_naive()).await?;
    println!("words\t{}", totals.words);
    println!("chars\t{}", totals.chars);
    Ok(())
}

async fn process_dedup_command() -> Result<()> {
    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;
    let removed = dedup_all(&store).await?;
    println!("Removed {removed} duplicate records");
    Ok(())
}

async fn process_export_command(out: PathBuf, goal: Option<i64>) -> Result<()> {
    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;
    let exported = snapshot::export(&store, goal).await?;
    snapshot::save_snapshot(&out, &exported).await?;
    println!(
        "Exported {} records to {}",
        exported.stats.daily_activity.len(),
        out.display()
    );
    Ok(())
}

async fn process_restore_command(path: PathBuf) -> Result<()> {
    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;
    let loaded = snapshot::load_snapshot(&path).await?;
    let restored = loaded.stats.daily_activity.len();
    snapshot::restore(&store, loaded).await?;
    println!("Restored {restored} records from {}", path.display());
    Ok(())
}
