use std::fmt::Display;

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use futures::{pin_mut, StreamExt};
use tracing::warn;

use crate::{
    filter::{compile, Predicate},
    query::{records_between, sum_in_range, sum_last_n_hours},
    storage::{
        entities::Unit,
        record_store::{JsonRecordStore, RecordStore},
    },
    utils::time::days_between,
};

use super::{create_application_default_path, Args};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

const DEFAULT_PRINTED_DAYS: i64 = 10;

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, short, help = "Filter expression, e.g. \"filePath contains drafts && words > 100\"")]
    filter: Option<String>,
    #[arg(long, short, value_enum, default_value_t = Unit::Words)]
    unit: Unit,
    #[arg(
        long,
        help = "Sum the trailing N hours instead of a date range",
        conflicts_with_all = ["start_date", "end_date"]
    )]
    hours: Option<i64>,
    #[arg(long, help = "Print a per-day breakdown")]
    daily: bool,
}

pub async fn process_stats_command(
    StatsCommand {
        start_date,
        end_date,
        date_style,
        filter,
        unit,
        hours,
        daily,
    }: StatsCommand,
) -> Result<()> {
    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;
    let filter = compile_or_match_all(filter.as_deref());

    if let Some(hours) = hours {
        let now = Local::now();
        let window_start = (now - Duration::hours(hours)).date_naive();
        let mut records = vec![];
        for date in days_between(window_start, now.date_naive()) {
            records.extend(store.get_day(date).await?);
        }
        records.retain(|r| filter.matches(r));
        println!("{}", sum_last_n_hours(&records, unit, hours, now));
        return Ok(());
    }

    let (start, end) = parse_values(start_date, end_date, date_style)?;

    if daily {
        print_daily_breakdown(store, start, end, unit, &filter).await
    } else {
        println!("{}", sum_in_range(store, start, end, unit, &filter).await?);
        Ok(())
    }
}

/// Also provides sensible defaults for the `stats` command.
fn parse_values(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
) -> Result<(NaiveDate, NaiveDate)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();
    let start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local).date_naive(),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None => (now - Duration::days(DEFAULT_PRINTED_DAYS)).date_naive(),
    };
    let end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local).date_naive(),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now.date_naive(),
    };
    if start > end {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start date {start} is after end date {end}"),
            )
            .into());
    }
    Ok((start, end))
}

pub fn compile_or_match_all(filter: Option<&str>) -> Predicate {
    match filter {
        None => Predicate::match_all(),
        Some(text) => match compile(text) {
            Ok(predicate) => predicate,
            Err(e) => {
                warn!("Invalid filter expression '{text}', matching everything: {e}");
                Predicate::match_all()
            }
        },
    }
}

async fn print_daily_breakdown(
    store: JsonRecordStore,
    start: NaiveDate,
    end: NaiveDate,
    unit: Unit,
    filter: &Predicate,
) -> Result<()> {
    let records = records_between(store, start, end);
    pin_mut!(records);

    let mut current: Option<(NaiveDate, i64)> = None;
    let mut total = 0;
    while let Some(record) = records.next().await {
        let record = record?;
        if !filter.matches(&record) {
            continue;
        }
        let delta = record.total_delta(unit);
        total += delta;
        current = match current {
            Some((date, sum)) if date == record.date => Some((date, sum + delta)),
            other => {
                if let Some((date, sum)) = other {
                    println!("{date}\t{sum}");
                }
                Some((record.date, delta))
            }
        };
    }
    if let Some((date, sum)) = current {
        println!("{date}\t{sum}");
    }
    println!("total\t{total}");
    Ok(())
}

const DEFAULT_QUERY_DAYS: i64 = 30;

/// Runs a query block: the leading filter expression selects records, option
/// lines adjust the rendering. Recognized options are `DAYS n`, `UNIT
/// words|chars` and `STREAK goal=n`; unknown options are ignored.
pub async fn process_query_command(file: Option<std::path::PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            use std::io::Read;
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let block = crate::query::block::parse_block(&text);

    let unit = match block.options.get("unit").map(String::as_str) {
        Some("chars") => Unit::Chars,
        _ => Unit::Words,
    };
    let days = block
        .options
        .get("days")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_QUERY_DAYS);

    let now = Local::now();
    let start = (now - Duration::days(days - 1)).date_naive();
    let end = now.date_naive();

    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;

    if let Some(streak_args) = block.options.get("streak") {
        let goal = block
            .options
            .get("goal")
            .or(Some(streak_args))
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let mut completed = vec![];
        for date in days_between(start, end) {
            let day_total: i64 = store
                .get_day(date)
                .await?
                .iter()
                .filter(|r| block.filter.matches(r))
                .map(|r| r.total_delta(unit))
                .sum();
            if day_total >= goal {
                completed.push(date);
            }
        }
        let streaks = crate::query::streak::compute_streaks(completed, end);
        println!("Current streak: {} days", streaks.current);
        println!("Longest streak: {} days", streaks.longest);
        return Ok(());
    }

    print_daily_breakdown(store, start, end, unit, &block.filter).await
}
