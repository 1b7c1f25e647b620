use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    storage::{
        entities::{DailyRecord, TimeKey, Unit},
        record_store::RecordStore,
        snapshot,
    },
    utils::clock::Clock,
};

use super::{
    counter::WordCounter,
    events::{is_tracked_document, DocumentEvent},
    reader::ContentReader,
};

/// Window after the last edit before the current record is flushed. Bursts
/// of edits collapse into a single store write.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Window after a successful flush before the snapshot file is rewritten.
const SNAPSHOT_SYNC_WINDOW: Duration = Duration::from_secs(30);

/// The tracker's in-memory view. Owned exclusively by [ActivityTracker];
/// while dirty, this is authoritative over whatever the store holds.
struct ActivityState {
    current: Option<DailyRecord>,
    today: NaiveDate,
    dirty: bool,
}

/// Tracker options that aren't collaborators.
pub struct TrackerConfig {
    pub counter: WordCounter,
    /// When set, the store is exported here on a debounced schedule after
    /// flushes and once more on shutdown.
    pub snapshot_path: Option<PathBuf>,
    /// Daily word goal recorded into exported snapshots as completed dates.
    pub goal_words: Option<i64>,
}

/// Converts a stream of document events into per-day, per-document records
/// with 5-minute bucketed deltas, debouncing persistence.
pub struct ActivityTracker<S: RecordStore, R: ContentReader> {
    receiver: mpsc::Receiver<DocumentEvent>,
    store: S,
    reader: R,
    config: TrackerConfig,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
    state: ActivityState,
    /// Single-slot debounce: rearming overwrites the previous deadline.
    flush_deadline: Option<Instant>,
    snapshot_deadline: Option<Instant>,
}

enum Step {
    Event(Option<DocumentEvent>),
    Flush,
    SnapshotSync,
    Shutdown,
}

impl<S: RecordStore, R: ContentReader> ActivityTracker<S, R> {
    pub fn new(
        receiver: mpsc::Receiver<DocumentEvent>,
        store: S,
        reader: R,
        config: TrackerConfig,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        let today = clock.today();
        Self {
            receiver,
            store,
            reader,
            config,
            clock,
            shutdown,
            state: ActivityState {
                current: None,
                today,
                dirty: false,
            },
            flush_deadline: None,
            snapshot_deadline: None,
        }
    }

    /// Executes the tracker event loop until the channel closes or shutdown
    /// is requested, then drains buffered state.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let step = {
                let flush_at = self.flush_deadline;
                let snapshot_at = self.snapshot_deadline;
                let fallback = self.clock.instant();
                let Self {
                    receiver,
                    clock,
                    shutdown,
                    ..
                } = &mut self;
                tokio::select! {
                    event = receiver.recv() => Step::Event(event),
                    _ = clock.sleep_until(flush_at.unwrap_or(fallback)), if flush_at.is_some() => Step::Flush,
                    _ = clock.sleep_until(snapshot_at.unwrap_or(fallback)), if snapshot_at.is_some() => Step::SnapshotSync,
                    _ = shutdown.cancelled() => Step::Shutdown,
                }
            };

            match step {
                Step::Event(Some(event)) => {
                    debug!("Processing event {:?}", event);
                    if let Err(e) = self.handle(&event).await {
                        // In-memory state stays authoritative; the next
                        // trigger retries naturally.
                        error!("Error processing event {:?}: {e:?}", event);
                    }
                }
                Step::Event(None) => break,
                Step::Flush => {
                    if let Err(e) = self.flush_current().await {
                        error!("Error flushing current record: {e:?}");
                    }
                }
                Step::SnapshotSync => {
                    self.snapshot_deadline = None;
                    if let Err(e) = self.write_snapshot().await {
                        error!("Error writing snapshot: {e:?}");
                    }
                }
                Step::Shutdown => break,
            }
        }

        if let Err(e) = self.flush_current().await {
            error!("Error flushing on shutdown: {e:?}");
        }
        if let Err(e) = self.write_snapshot().await {
            error!("Error writing snapshot on shutdown: {e:?}");
        }
        self.receiver.close();
        info!("Tracker stopped");
        Ok(())
    }

    async fn handle(&mut self, event: &DocumentEvent) -> Result<()> {
        match event {
            DocumentEvent::Opened { path } => {
                if is_tracked_document(path) {
                    self.observe(path, None).await?;
                }
            }
            DocumentEvent::Edited { path, content } => {
                if is_tracked_document(path) {
                    self.on_edit(path, content).await?;
                }
            }
            DocumentEvent::Deleted { path } => {
                if is_tracked_document(path) {
                    self.on_delete(path).await?;
                }
            }
            DocumentEvent::Renamed { old_path, new_path } => {
                self.on_rename(old_path, new_path).await?;
            }
        }
        Ok(())
    }

    /// Makes `(today, path)` the tracked record, looking it up or creating it
    /// with freshly counted baselines. No-op when it already is tracked.
    /// Passing `content` skips the disk read when a baseline is needed.
    async fn observe(&mut self, path: &Arc<str>, content: Option<&str>) -> Result<()> {
        let today = self.clock.today();
        if self.state.today != today {
            self.flush_current().await?;
            self.state.current = None;
            self.state.today = today;
        }

        if matches!(&self.state.current, Some(r) if r.file_path == *path) {
            return Ok(());
        }

        // Switching documents drains the pending debounce first.
        self.flush_current().await?;

        let record = match self.store.get(today, path).await? {
            Some(record) => record,
            None => {
                let counts = match content {
                    Some(content) => self.config.counter.count(content),
                    None => {
                        let text = self.reader.read(path).await?;
                        self.config.counter.count(&text)
                    }
                };
                let record = DailyRecord::new(today, path.clone(), counts.words, counts.chars);
                self.store.upsert(record.clone()).await?;
                record
            }
        };

        debug!(
            "Now tracking {} (baseline {} words)",
            record.file_path, record.word_count_baseline
        );
        self.state.current = Some(record);
        self.state.dirty = false;
        Ok(())
    }

    async fn on_edit(&mut self, path: &Arc<str>, content: &str) -> Result<()> {
        // Recovers from missed focus events: an edit for an untracked path is
        // an implicit open, its current content anchoring the baseline.
        self.observe(path, Some(content)).await?;

        let counts = self.config.counter.count(content);
        let key = TimeKey::from_time(self.clock.time().time());
        if let Some(record) = &mut self.state.current {
            recount_bucket(record, key, counts.words, counts.chars);
            self.state.dirty = true;
            self.arm_flush();
        }
        Ok(())
    }

    async fn on_delete(&mut self, path: &Arc<str>) -> Result<()> {
        let key = TimeKey::from_time(self.clock.time().time());

        // Removing the document takes its corpus contribution to zero, so
        // the closing entry is computed exactly like an edit to empty text.
        if matches!(&self.state.current, Some(r) if r.file_path == *path) {
            if let Some(record) = &mut self.state.current {
                recount_bucket(record, key, 0, 0);
            }
            self.state.dirty = true;
            let result = self.flush_current().await;
            self.state.current = None;
            return result;
        }

        let today = self.clock.today();
        let Some(mut record) = self.store.get(today, path).await? else {
            return Ok(());
        };
        recount_bucket(&mut record, key, 0, 0);
        self.store.upsert(record).await
    }

    async fn on_rename(&mut self, old_path: &str, new_path: &Arc<str>) -> Result<()> {
        info!("Relabeling records from {old_path} to {new_path}");
        self.store.rename(old_path, new_path).await?;
        if let Some(record) = &mut self.state.current {
            if record.file_path.as_ref() == old_path {
                record.file_path = new_path.clone();
            }
        }
        Ok(())
    }

    fn arm_flush(&mut self) {
        self.flush_deadline = Some(self.clock.instant() + DEBOUNCE_WINDOW);
    }

    /// Flushes a snapshot of the current record. Entries overwritten after
    /// the snapshot re-arm the debounce and ride the next cycle.
    async fn flush_current(&mut self) -> Result<()> {
        self.flush_deadline = None;
        if !self.state.dirty {
            return Ok(());
        }
        let Some(record) = self.state.current.clone() else {
            return Ok(());
        };
        debug!(
            "Flushing {} changes for {}",
            record.changes.len(),
            record.file_path
        );
        self.store.upsert(record).await?;
        self.state.dirty = false;
        if self.config.snapshot_path.is_some() {
            self.snapshot_deadline = Some(self.clock.instant() + SNAPSHOT_SYNC_WINDOW);
        }
        Ok(())
    }

    async fn write_snapshot(&mut self) -> Result<()> {
        let Some(path) = &self.config.snapshot_path else {
            return Ok(());
        };
        let snapshot = snapshot::export(&self.store, self.config.goal_words).await?;
        if let Err(e) = snapshot::save_snapshot(path, &snapshot).await {
            warn!("Failed to write snapshot to {path:?}: {e}");
        }
        Ok(())
    }
}

/// Overwrites the bucket at `key` so that replaying the whole record yields
/// `words`/`chars`. Recomputing the same bucket twice is idempotent instead
/// of additive.
fn recount_bucket(record: &mut DailyRecord, key: TimeKey, words: i64, chars: i64) {
    let bucket = record.entry(key).copied();
    let prior_words =
        record.replayed_total(Unit::Words) - bucket.map(|e| e.words_delta).unwrap_or(0);
    let prior_chars =
        record.replayed_total(Unit::Chars) - bucket.map(|e| e.chars_delta).unwrap_or(0);
    let words_delta = words - prior_words;
    let chars_delta = chars - prior_chars;
    // an edit that changed nothing must not grow the record
    if bucket.is_none() && words_delta == 0 && chars_delta == 0 {
        return;
    }
    record.set_entry(key, words_delta, chars_delta);
}
