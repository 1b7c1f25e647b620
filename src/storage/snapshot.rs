//! Versioned snapshot document. A snapshot is the portable form of the whole
//! store: it can be exported for backup, moved between devices, and made the
//! source of truth again through [restore].

use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    entities::{DailyRecord, Unit},
    record_store::RecordStore,
};

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    /// Host presentation settings, carried through opaquely.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    pub stats: SnapshotStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    #[serde(default)]
    pub daily_activity: Vec<DailyRecord>,
    #[serde(default)]
    pub streak_dates: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_baseline: Option<CorpusBaseline>,
}

/// Cached corpus-wide inclusive totals. Recomputing these means replaying the
/// whole store, so queries reuse the cache until it goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusBaseline {
    pub words: i64,
    pub chars: i64,
    /// Most recent day that had any recorded activity when the cache was
    /// computed.
    pub last_activity: NaiveDate,
}

/// Parses a snapshot document, routing older schema versions through
/// migration instead of failing.
pub fn parse_snapshot(raw: &str) -> Result<Snapshot> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let version = value
        .get("schemaVersion")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as u32;

    match version {
        SCHEMA_VERSION => Ok(serde_json::from_value(value)?),
        1 => {
            // v1 predates character tracking. The char fields default to 0
            // on deserialization, so migration is a version bump.
            info!("Migrating snapshot from schema version 1");
            let mut snapshot: Snapshot = serde_json::from_value(value)?;
            snapshot.schema_version = SCHEMA_VERSION;
            Ok(snapshot)
        }
        v => Err(anyhow!(
            "Snapshot schema version {v} is newer than supported {SCHEMA_VERSION}"
        )),
    }
}

pub async fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_snapshot(&raw)
}

pub async fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let raw = serde_json::to_string(snapshot)?;
    tokio::fs::write(path, raw).await?;
    Ok(())
}

/// Makes `snapshot` the source of truth: the store is cleared and rebuilt
/// from the snapshot's records.
pub async fn restore(store: &impl RecordStore, snapshot: Snapshot) -> Result<()> {
    store.clear().await?;
    store.import(snapshot.stats.daily_activity).await?;
    Ok(())
}

/// Serializes the whole store. When a word goal is given the completed dates
/// are recorded alongside so streaks survive the round trip.
pub async fn export(store: &impl RecordStore, goal_words: Option<i64>) -> Result<Snapshot> {
    let mut daily_activity = vec![];
    let mut streak_dates = vec![];
    let mut words = 0;
    let mut chars = 0;
    let mut last_activity = None;

    for date in store.dates().await? {
        let day = store.get_day(date).await?;
        if day.is_empty() {
            continue;
        }
        last_activity = Some(date);
        let day_words: i64 = day.iter().map(|r| r.total_delta(Unit::Words)).sum();
        if matches!(goal_words, Some(goal) if day_words >= goal) {
            streak_dates.push(date);
        }
        for record in &day {
            words += record.replayed_total(Unit::Words);
            chars += record.replayed_total(Unit::Chars);
        }
        daily_activity.extend(day);
    }

    Ok(Snapshot {
        schema_version: SCHEMA_VERSION,
        settings: Default::default(),
        stats: SnapshotStats {
            daily_activity,
            streak_dates,
            corpus_baseline: last_activity.map(|last_activity| CorpusBaseline {
                words,
                chars,
                last_activity,
            }),
        },
    })
}
