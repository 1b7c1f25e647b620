use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::counter::Language;

#[derive(Parser)]
pub struct DaemonArgs {
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Directory whose documents are watched for writing activity.
    #[arg(long)]
    pub watch: PathBuf,
    /// Scripts the word counter tokenizes. Defaults to latin.
    #[arg(long, value_delimiter = ',')]
    pub languages: Vec<Language>,
    /// Daily word goal recorded into exported snapshots.
    #[arg(long)]
    pub goal: Option<i64>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
