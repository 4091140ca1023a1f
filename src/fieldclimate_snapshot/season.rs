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

//! Running total of rain since the start of the season.
//!
//! The API only reports rain for the current day so far, and that figure resets at
//! station-local midnight. To keep a season total the last value seen each day is
//! remembered in a `SeasonRecord` and folded into the total on the first run of the
//! following day. `season_rain` in the record therefore only ever covers completed
//! days; the rain for today is added on top when displaying the total.
//!
//! Runs are assumed to never overlap: the record is loaded, advanced, and saved
//! without any locking.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Month on the first day of which every season starts.
pub const SEASON_START_MONTH: u32 = 10;

/// Rain recorded by other stations during the current season before this station
/// was installed, in mm.
pub const PRE_STATION_RAIN_MM: f64 = 25.0;

/// First day of the season `today` belongs to.
pub fn season_start(today: NaiveDate) -> NaiveDate {
    let year = if today.month() >= SEASON_START_MONTH {
        today.year()
    } else {
        today.year() - 1
    };

    NaiveDate::from_ymd_opt(year, SEASON_START_MONTH, 1).expect("season start date out of range")
}

/// Rain so far today as the accumulator tracks it. Negative or NaN readings count
/// as zero.
pub fn rain_so_far(reading: f64) -> f64 {
    reading.max(0.0)
}

/// Season total for display: completed days, rain so far today, and rain from
/// before the station existed.
pub fn season_total(season_rain: f64, rain_today: f64, pre_station_rain: f64) -> f64 {
    season_rain + rain_so_far(rain_today) + pre_station_rain
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub season_start: NaiveDate,
    /// Rain for every completed day of the season, in mm.
    pub season_rain: f64,
    /// Day `last_daily_rain` was observed on.
    pub last_update: NaiveDate,
    /// Latest rain so far value seen on `last_update`, in mm.
    pub last_daily_rain: f64,
}

impl SeasonRecord {
    /// Record used when no state has been saved yet: the season total read off the
    /// FieldClimate site as of 2026-01-27.
    pub fn baseline() -> Self {
        SeasonRecord {
            season_start: NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid baseline date"),
            season_rain: 223.2,
            last_update: NaiveDate::from_ymd_opt(2026, 1, 27).expect("valid baseline date"),
            last_daily_rain: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new season began; the total was reset.
    SeasonRollover,
    /// Still the same day as the last run; only today's rain was refreshed.
    SameDay,
    /// First run of a new day; the previous day's rain was added to the total.
    NewDay,
}

/// Advance a record to `today` given the rain so far today.
pub fn advance(record: SeasonRecord, today: NaiveDate, rain_today: f64) -> (Transition, SeasonRecord) {
    let start = season_start(today);

    if record.season_start != start {
        return (
            Transition::SeasonRollover,
            SeasonRecord {
                season_start: start,
                season_rain: 0.0,
                last_update: today,
                last_daily_rain: rain_today,
            },
        );
    }

    if record.last_update == today {
        return (
            Transition::SameDay,
            SeasonRecord {
                last_daily_rain: rain_today,
                ..record
            },
        );
    }

    (
        Transition::NewDay,
        SeasonRecord {
            season_rain: record.season_rain + record.last_daily_rain,
            last_update: today,
            last_daily_rain: rain_today,
            ..record
        },
    )
}

/// Storage for the season record between runs.
pub trait SeasonStore {
    /// Load the saved record, `None` if nothing has been saved yet.
    fn load(&self) -> io::Result<Option<SeasonRecord>>;

    fn save(&mut self, record: &SeasonRecord) -> io::Result<()>;
}

/// Season record kept as pretty printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileSeasonStore {
    path: PathBuf,
}

impl FileSeasonStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileSeasonStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeasonStore for FileSeasonStore {
    fn load(&self) -> io::Result<Option<SeasonRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn save(&mut self, record: &SeasonRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json =
            serde_json::to_string_pretty(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)
    }
}

/// Season record kept in memory, used by tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySeasonStore {
    record: Option<SeasonRecord>,
    saves: usize,
}

impl MemorySeasonStore {
    pub fn new(record: Option<SeasonRecord>) -> Self {
        MemorySeasonStore { record, saves: 0 }
    }

    pub fn record(&self) -> Option<&SeasonRecord> {
        self.record.as_ref()
    }

    /// Number of times `save` has been called.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl SeasonStore for MemorySeasonStore {
    fn load(&self) -> io::Result<Option<SeasonRecord>> {
        Ok(self.record.clone())
    }

    fn save(&mut self, record: &SeasonRecord) -> io::Result<()> {
        self.record = Some(record.clone());
        self.saves += 1;
        Ok(())
    }
}

/// Result of a single accumulator update.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonUpdate {
    pub transition: Transition,
    pub record: SeasonRecord,
}

impl SeasonUpdate {
    /// Rain for completed days of the season, as of this update.
    pub fn season_rain(&self) -> f64 {
        self.record.season_rain
    }
}

#[derive(Debug)]
pub struct SeasonAccumulator<S> {
    store: S,
}

impl<S: SeasonStore> SeasonAccumulator<S> {
    pub fn new(store: S) -> Self {
        SeasonAccumulator { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Load the saved record (or the calibration baseline), advance it to `today`,
    /// and save it again.
    ///
    /// Negative or NaN readings for today's rain are treated as zero.
    pub fn update(&mut self, today: NaiveDate, rain_today: f64) -> io::Result<SeasonUpdate> {
        let rain_today = rain_so_far(rain_today);
        let stored = match self.store.load()? {
            Some(r) => r,
            None => {
                let baseline = SeasonRecord::baseline();
                tracing::info!(
                    message = "no saved season record, starting from baseline",
                    season_start = %baseline.season_start,
                    season_rain = baseline.season_rain
                );
                baseline
            }
        };

        if stored.last_update > today {
            tracing::warn!(
                message = "season record was updated after today",
                last_update = %stored.last_update,
                today = %today
            );
        }

        let previous_day_rain = stored.last_daily_rain;
        let (transition, record) = advance(stored, today, rain_today);
        self.store.save(&record)?;

        match transition {
            Transition::SeasonRollover => tracing::info!(
                message = "new season started",
                season_start = %record.season_start,
                rain_today = rain_today
            ),
            Transition::SameDay => tracing::info!(
                message = "updated rain for today",
                rain_today = rain_today,
                season_rain = record.season_rain
            ),
            Transition::NewDay => tracing::info!(
                message = "added previous day rain to season",
                previous_day_rain = previous_day_rain,
                season_rain = record.season_rain
            ),
        }

        Ok(SeasonUpdate { transition, record })
    }
}
