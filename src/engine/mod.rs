use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use anyhow::Result;
use counter::{Language, WordCounter};
use events::DocumentEvent;
use reader::FsContentReader;
use source::{DocumentEventSource, FsPollingSource};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracker::{ActivityTracker, TrackerConfig};
use watch::WatchModule;

use crate::{
    storage::{
        record_store::{JsonRecordStore, RecordStore},
        snapshot,
    },
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod counter;
pub mod events;
pub mod reader;
pub mod shutdown;
pub mod source;
pub mod tracker;
pub mod watch;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const SNAPSHOT_FILE: &str = "snapshot.json";

pub struct EngineOptions {
    pub watch_dir: PathBuf,
    pub languages: BTreeSet<Language>,
    pub goal_words: Option<i64>,
}

/// Represents the starting point for the daemon.
pub async fn start_engine(dir: PathBuf, options: EngineOptions) -> Result<()> {
    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<DocumentEvent>(10);
    let source = FsPollingSource::new(options.watch_dir.clone());

    let shutdown_token = CancellationToken::new();

    let watcher = create_watcher(sender, source, &shutdown_token, DefaultClock);

    let store = JsonRecordStore::new(dir.join("records"))?;
    let snapshot_path = dir.join(SNAPSHOT_FILE);
    rehydrate_if_empty(&store, &snapshot_path).await;

    let tracker = create_tracker(
        store,
        receiver,
        &options,
        Some(snapshot_path),
        &shutdown_token,
        DefaultClock,
    );

    let (_, watch_result, tracker_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        watcher.run(),
        tracker.run(),
    );

    if let Err(watch_result) = watch_result {
        error!("Watch module got an error {:?}", watch_result);
    }

    if let Err(tracker_result) = tracker_result {
        error!("Tracker module got an error {:?}", tracker_result);
    }

    Ok(())
}

fn create_watcher(
    sender: mpsc::Sender<DocumentEvent>,
    source: impl DocumentEventSource + 'static,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> WatchModule {
    WatchModule::new(
        sender,
        Box::new(source),
        shutdown_token.clone(),
        DEFAULT_POLL_INTERVAL,
        Box::new(clock),
    )
}

fn create_tracker<S: RecordStore>(
    store: S,
    receiver: mpsc::Receiver<DocumentEvent>,
    options: &EngineOptions,
    snapshot_path: Option<PathBuf>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> ActivityTracker<S, FsContentReader> {
    ActivityTracker::new(
        receiver,
        store,
        FsContentReader,
        TrackerConfig {
            counter: WordCounter::new(&options.languages),
            snapshot_path,
            goal_words: options.goal_words,
        },
        Box::new(clock),
        shutdown_token.clone(),
    )
}

/// Makes a snapshot left by a previous install (or another device) the
/// source of truth, but only when the store holds nothing yet. Load errors
/// are not fatal: tracking starts from scratch.
async fn rehydrate_if_empty(store: &impl RecordStore, snapshot_path: &std::path::Path) {
    match store.dates().await {
        Ok(dates) if dates.is_empty() => {}
        _ => return,
    }
    match snapshot::load_snapshot(snapshot_path).await {
        Ok(loaded) => {
            info!("Rehydrating store from snapshot {snapshot_path:?}");
            if let Err(e) = snapshot::restore(store, loaded).await {
                error!("Failed to restore snapshot: {e:?}");
            }
        }
        Err(e) if e.downcast_ref::<std::io::Error>()
            .map(|io| io.kind() == std::io::ErrorKind::NotFound)
            .unwrap_or(false) => {}
        Err(e) => error!("Failed to load snapshot {snapshot_path:?}: {e:?}"),
    }
}
