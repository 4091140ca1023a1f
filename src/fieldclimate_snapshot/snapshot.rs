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

use crate::client::Station;
use crate::season::{rain_so_far, season_total};
use crate::sensors::{Extreme, Readings, DAILY_RAIN_DAYS};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Name used when the station metadata doesn't include one.
pub const DEFAULT_STATION_NAME: &str = "כוכב השחר";

const TIME_FORMAT: &str = "%H:%M";

/// Everything the display layer shows, rewritten in full on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// When the snapshot was generated, RFC 3339 in UTC.
    pub last_update: String,
    pub station_name: String,
    pub temperature: TemperatureSnapshot,
    pub wind: WindSnapshot,
    pub rain: RainSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSnapshot {
    pub current: Option<f64>,
    pub max: Option<f64>,
    pub max_time: Option<String>,
    pub min: Option<f64>,
    pub min_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSnapshot {
    pub speed: Option<f64>,
    pub direction: Option<String>,
    pub max: Option<f64>,
    pub max_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainSnapshot {
    pub today: f64,
    #[serde(rename = "lastHour")]
    pub last_hour: f64,
    pub week: f64,
    pub season: f64,
    pub daily_7d: [f64; DAILY_RAIN_DAYS],
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Station-local time of day, `HH:MM`.
pub fn format_time(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Name to display for the station: the custom name if set, then the original.
pub fn station_name(station: &Station) -> String {
    [&station.name.custom, &station.name.original]
        .into_iter()
        .flatten()
        .map(|n| n.trim())
        .find(|n| !n.is_empty())
        .unwrap_or(DEFAULT_STATION_NAME)
        .to_owned()
}

/// Combine extracted readings with the season total into a snapshot.
///
/// `season_rain` covers completed days only; rain so far today and the
/// pre-installation offset are added here.
pub fn assemble(
    station: &Station,
    readings: &Readings,
    season_rain: f64,
    pre_station_rain: f64,
    generated_at: DateTime<Utc>,
) -> WeatherSnapshot {
    let temperature = &readings.temperature;
    let wind = &readings.wind;
    let rain = &readings.rain;

    WeatherSnapshot {
        last_update: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        station_name: station_name(station),
        temperature: TemperatureSnapshot {
            current: temperature.current.map(round1),
            max: extreme_value(temperature.max),
            max_time: extreme_time(temperature.max),
            min: temperature.min.map(round1),
            min_time: temperature.min_time.map(format_time),
        },
        wind: WindSnapshot {
            speed: wind.speed.map(round1),
            direction: wind.direction.map(|d| d.label().to_owned()),
            max: extreme_value(wind.max),
            max_time: extreme_time(wind.max),
        },
        rain: RainSnapshot {
            today: round1(rain_so_far(rain.today)),
            last_hour: round1(rain.last_hour),
            week: round1(rain.week),
            season: round1(season_total(season_rain, rain.today, pre_station_rain)),
            daily_7d: rain.daily.map(round1),
        },
    }
}

fn extreme_value(extreme: Option<Extreme>) -> Option<f64> {
    extreme.map(|e| round1(e.value))
}

fn extreme_time(extreme: Option<Extreme>) -> Option<String> {
    extreme.map(|e| format_time(e.at))
}

impl WeatherSnapshot {
    /// Overwrite `path` with this snapshot as pretty printed JSON.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}
