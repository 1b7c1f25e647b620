//! Read-side aggregation over stored records: range sums, trailing-hour
//! sums, and the cached corpus total.

pub mod block;
pub mod intensity;
pub mod streak;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use futures::{future, pin_mut, stream, Stream, StreamExt};
use tracing::error;

use crate::{
    filter::Predicate,
    storage::{
        entities::{DailyRecord, Unit},
        record_store::RecordStore,
        snapshot::CorpusBaseline,
    },
    utils::time::days_between,
};

/// The corpus cache is trusted for this many days after its last recorded
/// activity. Older caches force a full replay.
pub const CORPUS_CACHE_STALENESS_DAYS: i64 = 7;

/// Streams every record between two dates, inclusive. Day files are fetched
/// concurrently but yielded in date order.
pub fn records_between(
    store: impl RecordStore + Send + Sync,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Stream<Item = Result<DailyRecord>> {
    let store = Arc::new(store);

    stream::iter(days_between(start, end))
        .map(move |day| {
            let store = store.clone();
            async move { (day, store.get_day(day).await) }
        })
        .buffered(4)
        .flat_map(|(day, data)| match data {
            Ok(data) => stream::iter(data).map(Ok).boxed(),
            Err(e) => {
                error!("Failed to read records for {day}: {e}");
                stream::once(future::ready(Err(e))).boxed()
            }
        })
}

/// Sums per-day deltas over a date range, counting only records the filter
/// keeps.
pub async fn sum_in_range(
    store: impl RecordStore + Send + Sync,
    start: NaiveDate,
    end: NaiveDate,
    unit: Unit,
    filter: &Predicate,
) -> Result<i64> {
    let records = records_between(store, start, end);
    pin_mut!(records);

    let mut total = 0;
    while let Some(record) = records.next().await {
        let record = record?;
        if filter.matches(&record) {
            total += record.total_delta(unit);
        }
    }
    Ok(total)
}

/// Sums deltas from buckets whose wall-clock position falls within the last
/// `hours` hours before `now`. Buckets are five minutes wide, so the window
/// edge lands on whole buckets.
pub fn sum_last_n_hours(
    records: &[DailyRecord],
    unit: Unit,
    hours: i64,
    now: DateTime<Local>,
) -> i64 {
    let cutoff = now - Duration::hours(hours);

    records
        .iter()
        .flat_map(|record| {
            record.changes.iter().filter_map(move |entry| {
                let at = Local
                    .from_local_datetime(&record.date.and_time(entry.time_key.to_time()))
                    .earliest()?;
                (at > cutoff && at <= now).then(|| entry.delta(unit))
            })
        })
        .sum()
}

/// Inclusive corpus totals. A fresh enough cache is extended with only the
/// days recorded after it; otherwise the whole store is replayed.
pub async fn corpus_total(
    store: &impl RecordStore,
    cache: Option<CorpusBaseline>,
    today: NaiveDate,
) -> Result<CorpusBaseline> {
    let (mut totals, scan_after) = match cache {
        Some(cache) if today - cache.last_activity <= Duration::days(CORPUS_CACHE_STALENESS_DAYS) => {
            (cache, Some(cache.last_activity))
        }
        _ => (
            CorpusBaseline {
                words: 0,
                chars: 0,
                last_activity: today,
            },
            None,
        ),
    };

    for date in store.dates().await? {
        if matches!(scan_after, Some(after) if date <= after) {
            continue;
        }
        let day = store.get_day(date).await?;
        if day.is_empty() {
            continue;
        }
        totals.last_activity = totals.last_activity.max(date);
        for record in &day {
            totals.words += record.replayed_total(Unit::Words);
            totals.chars += record.replayed_total(Unit::Chars);
        }
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};
    use tempfile::tempdir;

    use crate::{
        filter::{compile, Predicate},
        storage::{
            entities::{DailyRecord, TimeEntry, TimeKey, Unit},
            record_store::{JsonRecordStore, RecordStore},
            snapshot::CorpusBaseline,
        },
    };

    use super::{corpus_total, records_between, sum_in_range, sum_last_n_hours};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, path: &str, entries: &[(&str, i64)]) -> DailyRecord {
        DailyRecord {
            date,
            file_path: path.into(),
            word_count_baseline: 0,
            char_count_baseline: 0,
            changes: entries
                .iter()
                .map(|(key, words)| TimeEntry {
                    time_key: key.parse::<TimeKey>().unwrap(),
                    words_delta: *words,
                    chars_delta: *words * 5,
                })
                .collect(),
        }
    }

    async fn seeded_store(dir: &std::path::Path) -> Result<JsonRecordStore> {
        let store = JsonRecordStore::new(dir.to_owned())?;
        store
            .upsert(record(date(2024, 3, 5), "drafts/a.md", &[("09:00", 40)]))
            .await?;
        store
            .upsert(record(date(2024, 3, 6), "drafts/a.md", &[("10:00", 60)]))
            .await?;
        store
            .upsert(record(date(2024, 3, 6), "notes/b.md", &[("11:00", 25)]))
            .await?;
        Ok(store)
    }

    #[tokio::test]
    async fn records_stream_in_date_order() -> Result<()> {
        use futures::StreamExt;

        let dir = tempdir()?;
        let store = seeded_store(dir.path()).await?;

        let records: Vec<_> = records_between(store, date(2024, 3, 5), date(2024, 3, 6))
            .collect()
            .await;
        let dates: Vec<_> = records
            .into_iter()
            .map(|r| r.map(|r| r.date))
            .collect::<Result<_>>()?;
        assert_eq!(
            dates,
            vec![date(2024, 3, 5), date(2024, 3, 6), date(2024, 3, 6)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn range_sum_respects_bounds_and_filter() -> Result<()> {
        let dir = tempdir()?;
        let store = seeded_store(dir.path()).await?;

        let all = sum_in_range(
            &store,
            date(2024, 3, 5),
            date(2024, 3, 6),
            Unit::Words,
            &Predicate::match_all(),
        )
        .await?;
        assert_eq!(all, 125);

        let one_day = sum_in_range(
            &store,
            date(2024, 3, 6),
            date(2024, 3, 6),
            Unit::Words,
            &Predicate::match_all(),
        )
        .await?;
        assert_eq!(one_day, 85);

        let drafts_only = sum_in_range(
            &store,
            date(2024, 3, 5),
            date(2024, 3, 6),
            Unit::Words,
            &compile("filePath contains drafts")?,
        )
        .await?;
        assert_eq!(drafts_only, 100);
        Ok(())
    }

    #[test]
    fn trailing_hours_window_is_half_open() {
        let now = chrono::Local
            .from_local_datetime(
                &NaiveDateTime::new(
                    date(2024, 3, 6),
                    chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                ),
            )
            .unwrap();
        let records = vec![
            record(date(2024, 3, 5), "a.md", &[("23:55", 7)]),
            record(
                date(2024, 3, 6),
                "a.md",
                &[("09:55", 3), ("10:00", 11), ("12:00", 5)],
            ),
        ];

        // 2 hours back from 12:00: (10:00, 12:00]. The 10:00 bucket sits on
        // the cutoff itself and is excluded.
        assert_eq!(sum_last_n_hours(&records, Unit::Words, 2, now), 5);
        // 24 hours covers yesterday's late bucket too
        assert_eq!(sum_last_n_hours(&records, Unit::Words, 24, now), 7 + 3 + 11 + 5);
    }

    #[tokio::test]
    async fn corpus_total_extends_a_fresh_cache() -> Result<()> {
        let dir = tempdir()?;
        let store = seeded_store(dir.path()).await?;

        let cache = CorpusBaseline {
            words: 1000,
            chars: 5000,
            last_activity: date(2024, 3, 5),
        };
        let totals = corpus_total(&store, Some(cache), date(2024, 3, 7)).await?;
        // only the day after last_activity is replayed on top of the cache
        assert_eq!(totals.words, 1000 + 60 + 25);
        assert_eq!(totals.last_activity, date(2024, 3, 6));
        Ok(())
    }

    #[tokio::test]
    async fn corpus_total_replays_everything_when_cache_is_stale() -> Result<()> {
        let dir = tempdir()?;
        let store = seeded_store(dir.path()).await?;

        let cache = CorpusBaseline {
            words: 1000,
            chars: 5000,
            last_activity: date(2024, 2, 1),
        };
        let totals = corpus_total(&store, Some(cache), date(2024, 3, 7)).await?;
        assert_eq!(totals.words, 125);
        assert_eq!(totals.chars, 625);
        assert_eq!(totals.last_activity, date(2024, 3, 6));
        Ok(())
    }
}
