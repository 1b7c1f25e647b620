use anyhow::Result;
use ansi_term::Colour;
use chrono::{Duration, Local};
use clap::Parser;

use crate::{
    query::{
        intensity::{classify, ColorMode, Intensity, IntensityConfig},
        streak::compute_streaks,
    },
    storage::{
        entities::Unit,
        record_store::{JsonRecordStore, RecordStore},
    },
    utils::time::days_between,
};

use super::create_application_default_path;

#[derive(Debug, Parser)]
pub struct HeatmapCommand {
    #[arg(long, default_value_t = 30, help = "Number of trailing days to draw")]
    days: u32,
    #[arg(long, default_value_t = 100)]
    low: i64,
    #[arg(long, default_value_t = 500)]
    medium: i64,
    #[arg(long, default_value_t = 1000)]
    high: i64,
    #[arg(long, value_enum, default_value_t = ColorMode::Stops)]
    mode: ColorMode,
    #[arg(long, short, value_enum, default_value_t = Unit::Words)]
    unit: Unit,
}

#[derive(Debug, Parser)]
pub struct StreakCommand {
    #[arg(long, help = "Words per day that complete the day")]
    goal: i64,
    #[arg(long, short, value_enum, default_value_t = Unit::Words)]
    unit: Unit,
}

pub async fn process_heatmap_command(
    HeatmapCommand {
        days,
        low,
        medium,
        high,
        mode,
        unit,
    }: HeatmapCommand,
) -> Result<()> {
    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;
    let config = IntensityConfig {
        low,
        medium,
        high,
        mode,
    };

    let today = Local::now().date_naive();
    let start = today - Duration::days(days.saturating_sub(1) as i64);

    let mut cells = vec![];
    for date in days_between(start, today) {
        let count: i64 = store
            .get_day(date)
            .await?
            .iter()
            .map(|r| r.total_delta(unit))
            .sum();
        cells.push((date, count));
    }

    println!("{start} .. {today}");
    for week in cells.chunks(7) {
        let mut line = String::new();
        for (_, count) in week {
            line += &cell_colour(classify(*count, &config), mode)
                .paint("\u{25a0} ")
                .to_string();
        }
        let Some((label, _)) = week.first() else {
            continue;
        };
        println!("{line} {label}");
    }
    Ok(())
}

/// GitHub-style green ramp on the 256-color cube, dark grey for empty days.
/// Solid is binary, so its on-level takes the brightest cell.
fn cell_colour(intensity: Intensity, mode: ColorMode) -> Colour {
    let level = match (mode, intensity) {
        (ColorMode::Solid, Intensity::Level(level)) => {
            if level > 0 {
                4
            } else {
                0
            }
        }
        (_, Intensity::Level(level)) => level,
        (_, Intensity::Percent(0)) => 0,
        (_, Intensity::Percent(p)) => 1 + (p.min(100) - 1) / 25,
    };
    match level {
        0 => Colour::Fixed(238),
        1 => Colour::Fixed(22),
        2 => Colour::Fixed(28),
        3 => Colour::Fixed(34),
        _ => Colour::Fixed(40),
    }
}

pub async fn process_streak_command(StreakCommand { goal, unit }: StreakCommand) -> Result<()> {
    let store = JsonRecordStore::new(create_application_default_path()?.join("records"))?;

    let mut completed = vec![];
    for date in store.dates().await? {
        let day_total: i64 = store
            .get_day(date)
            .await?
            .iter()
            .map(|r| r.total_delta(unit))
            .sum();
        if day_total >= goal {
            completed.push(date);
        }
    }

    let streaks = compute_streaks(completed, Local::now().date_naive());
    println!("Current streak: {} days", streaks.current);
    println!("Longest streak: {} days", streaks.longest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use ansi_term::Colour;

    use crate::query::intensity::{ColorMode, Intensity};

    use super::cell_colour;

    #[test]
    fn percent_maps_onto_the_level_ramp() {
        let mode = ColorMode::Gradual;
        assert_eq!(cell_colour(Intensity::Percent(0), mode), Colour::Fixed(238));
        assert_eq!(cell_colour(Intensity::Percent(1), mode), Colour::Fixed(22));
        assert_eq!(cell_colour(Intensity::Percent(25), mode), Colour::Fixed(22));
        assert_eq!(cell_colour(Intensity::Percent(26), mode), Colour::Fixed(28));
        assert_eq!(cell_colour(Intensity::Percent(100), mode), Colour::Fixed(40));
    }

    #[test]
    fn solid_on_level_uses_the_brightest_cell() {
        assert_eq!(
            cell_colour(Intensity::Level(1), ColorMode::Solid),
            Colour::Fixed(40)
        );
        assert_eq!(
            cell_colour(Intensity::Level(0), ColorMode::Solid),
            Colour::Fixed(238)
        );
    }
}
