//! Two reconciliation policies live here and they are intentionally
//! different. `merge_changes` overlays buffered entries onto stored ones
//! (in-memory wins) because both sides describe the same recomputed window.
//! `dedup_records` sums colliding windows because duplicates come from
//! independent writers whose deltas are both real.

use std::collections::BTreeMap;

use tracing::debug;

use super::entities::{DailyRecord, TimeEntry, TimeKey};

/// Overlays `incoming` onto `stored`, incoming entries winning on a shared
/// time key. Result is sorted ascending. Flushing the same logical state
/// twice is a no-op on the output.
pub fn merge_changes(stored: &[TimeEntry], incoming: &[TimeEntry]) -> Vec<TimeEntry> {
    let mut by_key: BTreeMap<TimeKey, TimeEntry> =
        stored.iter().map(|e| (e.time_key, *e)).collect();
    for entry in incoming {
        by_key.insert(entry.time_key, *entry);
    }
    by_key.into_values().collect()
}

/// Reconciles an in-memory record with what's on disk for the same
/// (date, path) key. Stored baselines win: the baseline is anchored at first
/// observation of the day and never moves afterwards.
pub fn merge_records(stored: Option<DailyRecord>, incoming: DailyRecord) -> DailyRecord {
    match stored {
        None => incoming,
        Some(stored) => {
            debug!(
                "Merging {} changes into {} stored for {} {}",
                incoming.changes.len(),
                stored.changes.len(),
                incoming.date,
                incoming.file_path
            );
            DailyRecord {
                changes: merge_changes(&stored.changes, &incoming.changes),
                ..stored
            }
        }
    }
}

/// Collapses duplicate records for one (date, path) key into a single
/// canonical record. Colliding time keys are summed. The smallest baseline
/// survives since it is the earliest observation of pre-existing content.
pub fn dedup_records(mut group: Vec<DailyRecord>) -> Option<DailyRecord> {
    let first = group.pop()?;
    let mut survivor = group.into_iter().fold(first, |mut survivor, record| {
        if record.word_count_baseline < survivor.word_count_baseline {
            survivor.word_count_baseline = record.word_count_baseline;
            survivor.char_count_baseline = record.char_count_baseline;
        }
        let mut by_key: BTreeMap<TimeKey, TimeEntry> = survivor
            .changes
            .iter()
            .map(|e| (e.time_key, *e))
            .collect();
        for entry in record.changes {
            by_key
                .entry(entry.time_key)
                .and_modify(|existing| {
                    existing.words_delta += entry.words_delta;
                    existing.chars_delta += entry.chars_delta;
                })
                .or_insert(entry);
        }
        survivor.changes = by_key.into_values().collect();
        survivor
    });
    survivor.changes.sort_by_key(|e| e.time_key);
    Some(survivor)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::storage::entities::{DailyRecord, TimeEntry, TimeKey};

    use super::{dedup_records, merge_changes, merge_records};

    fn entry(key: &str, words: i64) -> TimeEntry {
        TimeEntry {
            time_key: key.parse::<TimeKey>().unwrap(),
            words_delta: words,
            chars_delta: words * 5,
        }
    }

    fn record(path: &str, baseline: i64, changes: Vec<TimeEntry>) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            file_path: path.into(),
            word_count_baseline: baseline,
            char_count_baseline: baseline * 5,
            changes,
        }
    }

    #[test]
    fn incoming_wins_on_shared_key() {
        let stored = vec![entry("10:00", 50), entry("10:05", 7)];
        let incoming = vec![entry("10:00", 30)];
        let merged = merge_changes(&stored, &incoming);
        assert_eq!(merged, vec![entry("10:00", 30), entry("10:05", 7)]);
    }

    #[test]
    fn merge_is_commutative_for_disjoint_keys() {
        let a = vec![entry("09:00", 1), entry("11:00", 3)];
        let b = vec![entry("10:00", 2)];
        assert_eq!(merge_changes(&a, &b), merge_changes(&b, &a));
    }

    #[test]
    fn repeated_merge_is_a_no_op() {
        let stored = vec![entry("10:00", 50)];
        let incoming = vec![entry("10:00", 30), entry("10:10", 4)];
        let once = merge_changes(&stored, &incoming);
        let twice = merge_changes(&once, &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_records_keeps_stored_baseline() {
        let stored = record("a.md", 100, vec![entry("09:00", 5)]);
        let incoming = record("a.md", 105, vec![entry("10:00", 2)]);
        let merged = merge_records(Some(stored), incoming);
        assert_eq!(merged.word_count_baseline, 100);
        assert_eq!(merged.changes.len(), 2);
    }

    #[test]
    fn dedup_sums_colliding_keys() {
        let a = record("a.md", 100, vec![entry("10:00", 5)]);
        let b = record("a.md", 100, vec![entry("10:00", 3), entry("11:00", 2)]);
        let survivor = dedup_records(vec![a, b]).unwrap();
        assert_eq!(survivor.changes.len(), 2);
        assert_eq!(survivor.entry("10:00".parse().unwrap()).unwrap().words_delta, 8);
        assert_eq!(survivor.entry("11:00".parse().unwrap()).unwrap().words_delta, 2);
    }

    #[test]
    fn dedup_merges_disjoint_writers() {
        let a = record("a.md", 100, vec![entry("09:00", 5)]);
        let b = record("a.md", 100, vec![entry("10:00", 3)]);
        let survivor = dedup_records(vec![a, b]).unwrap();
        let keys: Vec<String> = survivor.changes.iter().map(|c| c.time_key.to_string()).collect();
        assert_eq!(keys, vec!["09:00", "10:00"]);
    }

    #[test]
    fn dedup_of_empty_group_is_none() {
        assert!(dedup_records(vec![]).is_none());
    }
}
