//! Maps a day's count onto a display intensity, either as discrete levels or
//! as a percentage of the high threshold.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Five discrete levels.
    Stops,
    /// On/off against the low threshold.
    Solid,
    /// Percentage of the high threshold; at or below low pins to zero.
    Gradual,
    /// Same scale as gradual. Kept distinct so hosts can render it as a
    /// fill instead of a tint.
    Liquid,
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorMode::Stops => write!(f, "stops"),
            ColorMode::Solid => write!(f, "solid"),
            ColorMode::Gradual => write!(f, "gradual"),
            ColorMode::Liquid => write!(f, "liquid"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntensityConfig {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub mode: ColorMode,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        IntensityConfig {
            low: 100,
            medium: 500,
            high: 1000,
            mode: ColorMode::Stops,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    /// Discrete level, 0 through 4.
    Level(u8),
    /// Percentage of the high threshold, 0 through 100.
    Percent(u8),
}

/// Classifies a count. Thresholds are inclusive on the low side of each
/// level: a count exactly at `low` is still level zero.
pub fn classify(count: i64, config: &IntensityConfig) -> Intensity {
    match config.mode {
        ColorMode::Stops => Intensity::Level(match count {
            c if c <= config.low => 0,
            c if c <= config.medium => 1,
            c if c <= config.high => 2,
            c if c <= config.high * 2 => 3,
            _ => 4,
        }),
        ColorMode::Solid => Intensity::Level(if count > config.low { 1 } else { 0 }),
        // both proportional modes pin anything at or below low to zero
        ColorMode::Gradual | ColorMode::Liquid => Intensity::Percent(if count <= config.low {
            0
        } else {
            percent_of_high(count, config)
        }),
    }
}

fn percent_of_high(count: i64, config: &IntensityConfig) -> u8 {
    if config.high <= 0 {
        return 0;
    }
    (count.max(0) * 100 / config.high).clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::{classify, ColorMode, Intensity, IntensityConfig};

    fn config(mode: ColorMode) -> IntensityConfig {
        IntensityConfig {
            low: 100,
            medium: 500,
            high: 1000,
            mode,
        }
    }

    #[test]
    fn stops_boundaries_are_inclusive_below() {
        let c = config(ColorMode::Stops);
        assert_eq!(classify(0, &c), Intensity::Level(0));
        assert_eq!(classify(100, &c), Intensity::Level(0));
        assert_eq!(classify(101, &c), Intensity::Level(1));
        assert_eq!(classify(500, &c), Intensity::Level(1));
        assert_eq!(classify(501, &c), Intensity::Level(2));
        assert_eq!(classify(1000, &c), Intensity::Level(2));
        assert_eq!(classify(1001, &c), Intensity::Level(3));
        assert_eq!(classify(2000, &c), Intensity::Level(3));
        assert_eq!(classify(2001, &c), Intensity::Level(4));
    }

    #[test]
    fn solid_is_binary_on_low() {
        let c = config(ColorMode::Solid);
        assert_eq!(classify(100, &c), Intensity::Level(0));
        assert_eq!(classify(101, &c), Intensity::Level(1));
    }

    #[test]
    fn gradual_scales_against_high() {
        let c = config(ColorMode::Gradual);
        assert_eq!(classify(0, &c), Intensity::Percent(0));
        // the low threshold itself is still pinned to zero
        assert_eq!(classify(100, &c), Intensity::Percent(0));
        assert_eq!(classify(101, &c), Intensity::Percent(10));
        assert_eq!(classify(500, &c), Intensity::Percent(50));
        assert_eq!(classify(1000, &c), Intensity::Percent(100));
        assert_eq!(classify(5000, &c), Intensity::Percent(100));
    }

    #[test]
    fn liquid_pins_low_counts_to_zero() {
        let c = config(ColorMode::Liquid);
        assert_eq!(classify(100, &c), Intensity::Percent(0));
        assert_eq!(classify(101, &c), Intensity::Percent(10));
    }

    #[test]
    fn negative_counts_stay_at_zero() {
        assert_eq!(
            classify(-50, &config(ColorMode::Gradual)),
            Intensity::Percent(0)
        );
        assert_eq!(
            classify(-50, &config(ColorMode::Stops)),
            Intensity::Level(0)
        );
    }
}
