use std::{
    collections::BTreeMap,
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::{date_to_record_name, record_name_to_date};

use super::{
    entities::DailyRecord,
    merge::{dedup_records, merge_records},
};

/// Interface for abstracting storage of daily records.
/// Data is stored per calendar day to keep reads for a date range cheap;
/// each day holds at most one record per document path.
pub trait RecordStore {
    /// Retrieves the record for one (date, path) key.
    fn get(
        &self,
        date: NaiveDate,
        path: &str,
    ) -> impl Future<Output = Result<Option<DailyRecord>>> + Send;

    /// Retrieves all records for a day.
    fn get_day(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<DailyRecord>>> + Send;

    /// Writes a record back, merging its changes with whatever is stored
    /// under the same key. In-memory entries win on a shared time key.
    fn upsert(&self, record: DailyRecord) -> impl Future<Output = Result<()>> + Send;

    /// Removes the record for one (date, path) key.
    fn delete(&self, date: NaiveDate, path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Relabels every stored record from `old_path` to `new_path`.
    fn rename(&self, old_path: &str, new_path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Days that have at least one record on disk, ascending.
    fn dates(&self) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send;

    /// Drops every stored record. Used before making a snapshot the source
    /// of truth.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// Bulk at-least-once import. Records landing on an occupied key are
    /// reconciled additively through the dedup merge.
    fn import(&self, records: Vec<DailyRecord>) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref + Sync> RecordStore for T
where
    T::Target: RecordStore + Sync,
{
    fn get(
        &self,
        date: NaiveDate,
        path: &str,
    ) -> impl Future<Output = Result<Option<DailyRecord>>> + Send {
        self.deref().get(date, path)
    }

    fn get_day(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<DailyRecord>>> + Send {
        self.deref().get_day(date)
    }

    fn upsert(&self, record: DailyRecord) -> impl Future<Output = Result<()>> + Send {
        self.deref().upsert(record)
    }

    fn delete(&self, date: NaiveDate, path: &str) -> impl Future<Output = Result<()>> + Send {
        self.deref().delete(date, path)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> impl Future<Output = Result<()>> + Send {
        self.deref().rename(old_path, new_path)
    }

    fn dates(&self) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send {
        self.deref().dates()
    }

    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        self.deref().clear()
    }

    fn import(&self, records: Vec<DailyRecord>) -> impl Future<Output = Result<()>> + Send {
        self.deref().import(records)
    }
}

/// The main realization of [RecordStore]. One file per day named
/// `YYYY-MM-DD`, one json record per line.
pub struct JsonRecordStore {
    record_dir: PathBuf,
}

impl JsonRecordStore {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_record_name(date))
    }

    async fn read_day(&self, path: &Path) -> Result<Vec<DailyRecord>> {
        async fn extract(path: &Path) -> std::result::Result<Vec<DailyRecord>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut records = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                match serde_json::from_str::<DailyRecord>(&v) {
                    Ok(v) => records.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(records)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }

    async fn write_day(&self, date: NaiveDate, records: &[DailyRecord]) -> Result<()> {
        let path = self.day_path(date);
        if records.is_empty() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        file.lock_exclusive()?;
        let result = Self::overwrite(file, records).await;
        if let Err(e) = &result {
            warn!("Failed to write day file {path:?}: {e}");
        }
        result
    }

    async fn overwrite(mut file: File, records: &[DailyRecord]) -> Result<()> {
        let mut buffer = Vec::<u8>::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }
        file.set_len(0).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        file.unlock_async().await?;
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    async fn get(&self, date: NaiveDate, path: &str) -> Result<Option<DailyRecord>> {
        let records = self.read_day(&self.day_path(date)).await?;
        Ok(records.into_iter().find(|r| r.file_path.as_ref() == path))
    }

    async fn get_day(&self, date: NaiveDate) -> Result<Vec<DailyRecord>> {
        self.read_day(&self.day_path(date)).await
    }

    async fn upsert(&self, record: DailyRecord) -> Result<()> {
        let date = record.date;
        let mut records = self.read_day(&self.day_path(date)).await?;

        let stored = records
            .iter()
            .position(|r| r.file_path == record.file_path)
            .map(|i| records.remove(i));
        records.push(merge_records(stored, record));

        self.write_day(date, &records).await
    }

    async fn delete(&self, date: NaiveDate, path: &str) -> Result<()> {
        let mut records = self.read_day(&self.day_path(date)).await?;
        records.retain(|r| r.file_path.as_ref() != path);
        self.write_day(date, &records).await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let new_path: Arc<str> = new_path.into();
        for date in self.dates().await? {
            let mut records = self.read_day(&self.day_path(date)).await?;
            let mut touched = false;
            for record in &mut records {
                if record.file_path.as_ref() == old_path {
                    record.file_path = new_path.clone();
                    touched = true;
                }
            }
            if touched {
                self.write_day(date, &records).await?;
            }
        }
        Ok(())
    }

    async fn dates(&self) -> Result<Vec<NaiveDate>> {
        let mut read_dir = tokio::fs::read_dir(&self.record_dir).await?;
        let mut dates = vec![];
        while let Some(entry) = read_dir.next_entry().await? {
            if let Some(date) = entry
                .file_name()
                .to_str()
                .and_then(record_name_to_date)
            {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    async fn clear(&self) -> Result<()> {
        for date in self.dates().await? {
            tokio::fs::remove_file(self.day_path(date)).await?;
        }
        Ok(())
    }

    async fn import(&self, records: Vec<DailyRecord>) -> Result<()> {
        let mut by_date: BTreeMap<NaiveDate, Vec<DailyRecord>> = BTreeMap::new();
        for record in records {
            by_date.entry(record.date).or_default().push(record);
        }

        for (date, incoming) in by_date {
            let mut day = self.read_day(&self.day_path(date)).await?;
            day.extend(incoming);
            let day = dedup_day(day);
            self.write_day(date, &day).await?;
        }
        Ok(())
    }
}

/// Collapses duplicate (date, path) records inside one day into single
/// canonical records. Ordering of distinct paths follows first appearance.
pub fn dedup_day(records: Vec<DailyRecord>) -> Vec<DailyRecord> {
    let mut order: Vec<Arc<str>> = vec![];
    let mut groups: BTreeMap<Arc<str>, Vec<DailyRecord>> = BTreeMap::new();
    for record in records {
        let group = groups.entry(record.file_path.clone()).or_default();
        if group.is_empty() {
            order.push(record.file_path.clone());
        }
        group.push(record);
    }

    order
        .into_iter()
        .filter_map(|path| dedup_records(groups.remove(&path)?))
        .collect()
}

/// Maintenance pass over the whole store: every day gets its duplicates
/// collapsed. Returns the number of records removed. Safe to run while
/// tracking is active since each day is reconciled read-modify-write.
pub async fn dedup_all(store: &impl RecordStore) -> Result<usize> {
    let mut removed = 0;
    for date in store.dates().await? {
        let day = store.get_day(date).await?;
        let deduped = dedup_day(day.clone());
        if deduped.len() != day.len() {
            removed += day.len() - deduped.len();
            for record in &day {
                store.delete(date, &record.file_path).await?;
            }
            store.import(deduped).await?;
        }
    }
    Ok(removed)
}
