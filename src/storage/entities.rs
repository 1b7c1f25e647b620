use std::{fmt::Display, str::FromStr, sync::Arc};

use anyhow::anyhow;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Width of one accumulation window. Edits landing inside the same window
/// collapse into a single [TimeEntry].
pub const BUCKET_MINUTES: u32 = 5;

/// A 5-minute aligned clock label in the form "HH:MM". Lexicographic order of
/// the label matches chronological order, so records keep their `changes`
/// sorted by this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey {
    hour: u8,
    minute: u8,
}

impl TimeKey {
    /// Floors a wall-clock time down to its bucket boundary.
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: (time.minute() - time.minute() % BUCKET_MINUTES) as u8,
        }
    }

    /// Start of the bucket as a time of day. Used when entries have to be
    /// placed on a timeline, e.g. trailing-window sums.
    pub fn to_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0)
            .expect("TimeKey is validated on construction")
    }
}

impl Display for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Time key {s} is missing ':'"))?;
        let hour: u8 = hour.parse()?;
        let minute: u8 = minute.parse()?;
        if hour > 23 || minute > 59 {
            return Err(anyhow!("Time key {s} is out of range"));
        }
        Ok(Self {
            hour,
            minute: minute - minute % BUCKET_MINUTES as u8,
        })
    }
}

impl Serialize for TimeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether a query talks about words or characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Words,
    Chars,
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Words => write!(f, "words"),
            Unit::Chars => write!(f, "chars"),
        }
    }
}

/// Net change in word/char count accumulated during one 5-minute window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub time_key: TimeKey,
    pub words_delta: i64,
    #[serde(default)]
    pub chars_delta: i64,
}

impl TimeEntry {
    pub fn delta(&self, unit: Unit) -> i64 {
        match unit {
            Unit::Words => self.words_delta,
            Unit::Chars => self.chars_delta,
        }
    }
}

/// One day of activity for one document. The struct doubles as the on-disk
/// format: day files hold one of these per line, snapshots hold them in bulk.
/// Field names stay camelCase so external snapshots remain portable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub file_path: Arc<str>,
    /// Word count of the document when it was first observed that day.
    /// Anchors delta computation; excluded from "written" totals.
    pub word_count_baseline: i64,
    #[serde(default)]
    pub char_count_baseline: i64,
    pub changes: Vec<TimeEntry>,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, file_path: Arc<str>, words: i64, chars: i64) -> Self {
        Self {
            date,
            file_path,
            word_count_baseline: words,
            char_count_baseline: chars,
            changes: vec![],
        }
    }

    pub fn baseline(&self, unit: Unit) -> i64 {
        match unit {
            Unit::Words => self.word_count_baseline,
            Unit::Chars => self.char_count_baseline,
        }
    }

    /// Net amount written this day, baseline excluded.
    pub fn total_delta(&self, unit: Unit) -> i64 {
        self.changes.iter().map(|c| c.delta(unit)).sum()
    }

    /// Reconstructed document count after replaying every change on top of
    /// the baseline. This is the state machine's view of "count so far".
    pub fn replayed_total(&self, unit: Unit) -> i64 {
        self.baseline(unit) + self.total_delta(unit)
    }

    pub fn entry(&self, key: TimeKey) -> Option<&TimeEntry> {
        self.changes.iter().find(|c| c.time_key == key)
    }

    /// Overwrites the entry for `key` with fresh deltas, or inserts one
    /// keeping `changes` sorted. Overwriting (not adding) is what makes
    /// repeated recomputation inside one window idempotent.
    pub fn set_entry(&mut self, key: TimeKey, words_delta: i64, chars_delta: i64) {
        let entry = TimeEntry {
            time_key: key,
            words_delta,
            chars_delta,
        };
        match self.changes.binary_search_by_key(&key, |c| c.time_key) {
            Ok(i) => self.changes[i] = entry,
            Err(i) => self.changes.insert(i, entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{DailyRecord, TimeEntry, TimeKey, Unit};

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    #[test]
    fn time_key_floors_to_bucket() {
        let key = TimeKey::from_time(NaiveTime::from_hms_opt(10, 2, 48).unwrap());
        assert_eq!(key.to_string(), "10:00");
        let key = TimeKey::from_time(NaiveTime::from_hms_opt(10, 4, 59).unwrap());
        assert_eq!(key.to_string(), "10:00");
        let key = TimeKey::from_time(NaiveTime::from_hms_opt(10, 5, 0).unwrap());
        assert_eq!(key.to_string(), "10:05");
    }

    #[test]
    fn time_key_order_matches_clock_order() {
        assert!(key("09:55") < key("10:00"));
        assert!(key("10:00") < key("10:05"));
        assert!(key("02:30") < key("10:00"));
    }

    #[test]
    fn time_key_serializes_as_label() {
        let serialized = serde_json::to_string(&key("07:05")).unwrap();
        assert_eq!(serialized, "\"07:05\"");
        let parsed: TimeKey = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, key("07:05"));
    }

    #[test]
    fn set_entry_overwrites_same_bucket() {
        let mut record = DailyRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "a.md".into(),
            100,
            500,
        );
        record.set_entry(key("10:00"), 50, 200);
        record.set_entry(key("10:00"), 30, 120);
        assert_eq!(
            record.changes,
            vec![TimeEntry {
                time_key: key("10:00"),
                words_delta: 30,
                chars_delta: 120,
            }]
        );
        assert_eq!(record.total_delta(Unit::Words), 30);
        assert_eq!(record.replayed_total(Unit::Words), 130);
    }

    #[test]
    fn set_entry_keeps_changes_sorted() {
        let mut record = DailyRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "a.md".into(),
            0,
            0,
        );
        record.set_entry(key("12:30"), 1, 1);
        record.set_entry(key("09:00"), 2, 2);
        record.set_entry(key("10:15"), 3, 3);
        let keys: Vec<String> = record.changes.iter().map(|c| c.time_key.to_string()).collect();
        assert_eq!(keys, vec!["09:00", "10:15", "12:30"]);
    }

    #[test]
    fn missing_char_fields_default_on_deserialize() {
        let raw = r#"{"date":"2024-01-01","filePath":"a.md","wordCountBaseline":7,"changes":[{"timeKey":"10:00","wordsDelta":3}]}"#;
        let record: DailyRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.char_count_baseline, 0);
        assert_eq!(record.changes[0].chars_delta, 0);
    }
}
