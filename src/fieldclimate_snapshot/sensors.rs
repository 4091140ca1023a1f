// fieldclimate_snapshot - Weather snapshot generator for FieldClimate stations
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Derive display statistics from raw station samples.
//!
//! Raw data from the API is a set of sensor streams, each holding one or more series
//! of samples keyed by statistic (`avg`, `min`, `max`, ...). Every series is aligned
//! with the shared list of station-local timestamps in `RawData::dates`.

use crate::client::{RawData, SensorStream, Station};
use crate::season::rain_so_far;
use chrono::{Duration, NaiveDateTime, ParseError};
use std::fmt;

/// Hours covered by the trailing window used for extremes.
pub const WINDOW_HOURS: i64 = 24;

/// Number of samples in an hour at the finest (15 minute) sampling interval.
pub const SAMPLES_PER_HOUR: usize = 4;

/// Days in the daily rainfall series.
pub const DAILY_RAIN_DAYS: usize = 7;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MS_TO_KMH: f64 = 3.6;

/// Statistic kinds a sensor may report for each sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Avg,
    Min,
    Max,
    Last,
    Sum,
    Raw,
}

impl StatKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Last => "last",
            Self::Sum => "sum",
            Self::Raw => "raw",
        }
    }
}

impl SensorStream {
    /// Samples for the given statistic, `None` if the sensor doesn't report it or
    /// reported no samples.
    pub fn series(&self, kind: StatKind) -> Option<&[Option<f64>]> {
        self.values
            .get(kind.key())
            .map(Vec::as_slice)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCategory {
    Temperature,
    WindSpeed,
    WindDirection,
    Precipitation,
}

impl SensorCategory {
    pub const ALL: [SensorCategory; 4] = [
        Self::Temperature,
        Self::WindSpeed,
        Self::WindDirection,
        Self::Precipitation,
    ];

    /// Lowercase keyword that must appear in the sensor name.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Temperature => "air temperature",
            Self::WindSpeed => "wind speed",
            Self::WindDirection => "wind dir",
            Self::Precipitation => "precipitation",
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.to_lowercase().contains(self.keyword())
    }
}

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The stream picked for each category, if any matched.
#[derive(Debug, Default)]
pub struct Sensors<'a> {
    pub temperature: Option<&'a SensorStream>,
    pub wind_speed: Option<&'a SensorStream>,
    pub wind_direction: Option<&'a SensorStream>,
    pub precipitation: Option<&'a SensorStream>,
}

impl<'a> Sensors<'a> {
    /// Assign each stream to the first category its name matches. When several
    /// streams match one category the first one is kept.
    pub fn find(streams: &'a [SensorStream]) -> Self {
        let mut sensors = Sensors::default();

        for stream in streams {
            if let Some(category) = SensorCategory::ALL
                .iter()
                .find(|c| c.matches(&stream.name_original))
            {
                let slot = sensors.slot_mut(*category);
                if slot.is_some() {
                    tracing::debug!(
                        message = "ignoring duplicate sensor",
                        category = %category,
                        sensor = %stream.name_original
                    );
                } else {
                    tracing::debug!(
                        message = "found sensor",
                        category = %category,
                        sensor = %stream.name_original,
                        unit = stream.unit.as_deref().unwrap_or("")
                    );
                    *slot = Some(stream);
                }
            }
        }

        for category in SensorCategory::ALL {
            if sensors.get(category).is_none() {
                tracing::debug!(message = "no sensor found for category", category = %category);
            }
        }

        sensors
    }

    pub fn get(&self, category: SensorCategory) -> Option<&'a SensorStream> {
        match category {
            SensorCategory::Temperature => self.temperature,
            SensorCategory::WindSpeed => self.wind_speed,
            SensorCategory::WindDirection => self.wind_direction,
            SensorCategory::Precipitation => self.precipitation,
        }
    }

    fn slot_mut(&mut self, category: SensorCategory) -> &mut Option<&'a SensorStream> {
        match category {
            SensorCategory::Temperature => &mut self.temperature,
            SensorCategory::WindSpeed => &mut self.wind_speed,
            SensorCategory::WindDirection => &mut self.wind_direction,
            SensorCategory::Precipitation => &mut self.precipitation,
        }
    }
}

/// Parsed sample timestamps, one result per entry of `RawData::dates`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    samples: Vec<Result<NaiveDateTime, ParseError>>,
}

impl Timeline {
    pub fn parse<S: AsRef<str>>(dates: &[S]) -> Self {
        Timeline {
            samples: dates
                .iter()
                .map(|d| NaiveDateTime::parse_from_str(d.as_ref(), TIMESTAMP_FORMAT))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of timestamps that could not be parsed.
    pub fn malformed(&self) -> usize {
        self.samples.iter().filter(|s| s.is_err()).count()
    }

    pub fn get(&self, index: usize) -> Option<NaiveDateTime> {
        self.samples.get(index).and_then(|s| s.as_ref().ok().copied())
    }

    /// Indexes of samples taken at or after `now - hours`. Samples with malformed
    /// timestamps are never part of a window.
    pub fn window(&self, now: NaiveDateTime, hours: i64) -> Vec<usize> {
        let cutoff = now - Duration::hours(hours);
        self.samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                Ok(t) if *t >= cutoff => Some(i),
                _ => None,
            })
            .collect()
    }
}

/// An extreme value and the time of the first sample that reached it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extreme {
    pub value: f64,
    pub at: NaiveDateTime,
}

impl Extreme {
    fn scale(self, factor: f64) -> Self {
        Extreme {
            value: self.value * factor,
            at: self.at,
        }
    }
}

pub fn windowed_max(series: &[Option<f64>], timeline: &Timeline, window: &[usize]) -> Option<Extreme> {
    windowed_extreme(series, timeline, window, |candidate, best| candidate > best)
}

pub fn windowed_min(series: &[Option<f64>], timeline: &Timeline, window: &[usize]) -> Option<Extreme> {
    windowed_extreme(series, timeline, window, |candidate, best| candidate < best)
}

fn windowed_extreme<F>(series: &[Option<f64>], timeline: &Timeline, window: &[usize], better: F) -> Option<Extreme>
where
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<Extreme> = None;

    for &i in window {
        let (Some(value), Some(at)) = (series.get(i).copied().flatten(), timeline.get(i)) else {
            continue;
        };

        // Strict comparison keeps the earliest sample on ties
        if best.map_or(true, |b| better(value, b.value)) {
            best = Some(Extreme { value, at });
        }
    }

    best
}

/// Most recent sample of a series, if it has one.
pub fn latest(series: Option<&[Option<f64>]>) -> Option<f64> {
    series.and_then(|s| s.last().copied().flatten())
}

/// Eight point compass direction, clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassPoint {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl CompassPoint {
    const ALL: [CompassPoint; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Each point covers 45 degrees centered on its bearing, so north is
    /// `[337.5, 22.5)`.
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }

        let index = ((degrees + 22.5) / 45.0).floor() as i64;
        Some(Self::ALL[index.rem_euclid(8) as usize])
    }

    /// Label written to the snapshot for the display layer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::North => "צפון",
            Self::NorthEast => "צ-מז",
            Self::East => "מזרח",
            Self::SouthEast => "ד-מז",
            Self::South => "דרום",
            Self::SouthWest => "ד-מע",
            Self::West => "מערב",
            Self::NorthWest => "צ-מע",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::North => "N",
            Self::NorthEast => "NE",
            Self::East => "E",
            Self::SouthEast => "SE",
            Self::South => "S",
            Self::SouthWest => "SW",
            Self::West => "W",
            Self::NorthWest => "NW",
        }
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Rain over the last hour: the sum of the final four samples of the precipitation
/// sensor. Zero when fewer than four samples exist.
pub fn rain_last_hour(precipitation: Option<&SensorStream>) -> f64 {
    let series = precipitation.and_then(|s| s.series(StatKind::Sum).or_else(|| s.series(StatKind::Raw)));

    match series {
        Some(s) if s.len() >= SAMPLES_PER_HOUR => s[s.len() - SAMPLES_PER_HOUR..].iter().flatten().sum(),
        _ => 0.0,
    }
}

/// Daily rain for the most recent seven days, oldest first. Missing leading days and
/// `null` entries are zero.
pub fn daily_rain(vals: &[Option<f64>]) -> [f64; DAILY_RAIN_DAYS] {
    let mut days = [0.0; DAILY_RAIN_DAYS];
    let recent = &vals[vals.len().saturating_sub(DAILY_RAIN_DAYS)..];
    let start = DAILY_RAIN_DAYS - recent.len();

    for (day, val) in days[start..].iter_mut().zip(recent) {
        *day = val.unwrap_or(0.0);
    }

    days
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureStats {
    pub current: Option<f64>,
    pub max: Option<Extreme>,
    pub min: Option<f64>,
    /// Absent when `min` came from the station's daily minimum.
    pub min_time: Option<NaiveDateTime>,
}

/// Wind speeds are in km/h.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindStats {
    pub speed: Option<f64>,
    pub direction: Option<CompassPoint>,
    pub max: Option<Extreme>,
}

/// Rain amounts are in mm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RainStats {
    pub today: f64,
    pub last_hour: f64,
    pub week: f64,
    pub daily: [f64; DAILY_RAIN_DAYS],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    pub temperature: TemperatureStats,
    pub wind: WindStats,
    pub rain: RainStats,
    pub malformed_timestamps: usize,
}

/// Compute every statistic the snapshot needs from station metadata and raw samples.
///
/// `now` is the current station-local time and bounds the trailing window used for
/// extremes. Missing sensors produce absent values rather than errors.
pub fn extract(station: &Station, raw: &RawData, now: NaiveDateTime) -> Readings {
    let timeline = Timeline::parse(&raw.dates);
    let malformed = timeline.malformed();
    if malformed > 0 {
        tracing::warn!(
            message = "excluding samples with malformed timestamps",
            malformed = malformed,
            total = timeline.len()
        );
    }

    let window = timeline.window(now, WINDOW_HOURS);
    tracing::debug!(message = "samples in trailing window", samples = window.len(), hours = WINDOW_HOURS);

    let sensors = Sensors::find(&raw.data);
    let meta = &station.meta;

    Readings {
        temperature: temperature_stats(
            sensors.temperature,
            &timeline,
            &window,
            meta.air_temperature_daily_minimum,
        ),
        wind: wind_stats(sensors.wind_speed, sensors.wind_direction, &timeline, &window),
        rain: RainStats {
            today: rain_so_far(meta.rain_current_day.as_ref().and_then(|r| r.sum).unwrap_or(0.0)),
            last_hour: rain_last_hour(sensors.precipitation),
            week: meta.rain_7d.as_ref().and_then(|r| r.sum).unwrap_or(0.0),
            daily: daily_rain(meta.rain_7d.as_ref().map(|r| r.vals.as_slice()).unwrap_or(&[])),
        },
        malformed_timestamps: malformed,
    }
}

fn temperature_stats(
    sensor: Option<&SensorStream>,
    timeline: &Timeline,
    window: &[usize],
    daily_minimum: Option<f64>,
) -> TemperatureStats {
    let Some(sensor) = sensor else {
        return TemperatureStats {
            min: daily_minimum,
            ..TemperatureStats::default()
        };
    };

    let min = sensor
        .series(StatKind::Min)
        .and_then(|s| windowed_min(s, timeline, window));

    TemperatureStats {
        current: latest(sensor.series(StatKind::Avg)),
        max: sensor
            .series(StatKind::Max)
            .and_then(|s| windowed_max(s, timeline, window)),
        min: min.map(|m| m.value).or(daily_minimum),
        min_time: min.map(|m| m.at),
    }
}

fn wind_stats(
    speed: Option<&SensorStream>,
    direction: Option<&SensorStream>,
    timeline: &Timeline,
    window: &[usize],
) -> WindStats {
    WindStats {
        speed: latest(speed.and_then(|s| s.series(StatKind::Avg))).map(|v| v * MS_TO_KMH),
        direction: latest(direction.and_then(|s| s.series(StatKind::Last).or_else(|| s.series(StatKind::Avg))))
            .and_then(CompassPoint::from_degrees),
        max: speed
            .and_then(|s| s.series(StatKind::Max))
            .and_then(|s| windowed_max(s, timeline, window))
            .map(|m| m.scale(MS_TO_KMH)),
    }
}
