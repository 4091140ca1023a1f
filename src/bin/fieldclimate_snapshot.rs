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

use chrono::Utc;
use clap::Parser;
use fieldclimate_snapshot::client::{ClientError, Credentials, FieldClimateClient};
use fieldclimate_snapshot::clock::StationClock;
use fieldclimate_snapshot::season::{FileSeasonStore, SeasonAccumulator, PRE_STATION_RAIN_MM};
use fieldclimate_snapshot::sensors::{self, WINDOW_HOURS};
use fieldclimate_snapshot::snapshot;
use reqwest::Client;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_STATION: &str = "03114DE5";
const DEFAULT_TIMEOUT_MILLIS: u64 = 30000;
const DEFAULT_API_URL: &str = "https://api.fieldclimate.com/v2";
const DEFAULT_UTC_OFFSET_HOURS: i32 = 2;
const DEFAULT_SEASON_FILE: &str = "rain_season.json";
const DEFAULT_OUTPUT: &str = "weather-data.json";

#[derive(Debug, Parser)]
#[clap(name = "fieldclimate_snapshot", version = clap::crate_version!())]
struct FieldClimateSnapshotApplication {
    /// FieldClimate station ID to fetch weather data for
    #[clap(long, env = "STATION_ID", default_value_t = DEFAULT_STATION.into())]
    station: String,

    /// Public key (HMAC user ID) used to sign API requests
    #[clap(long, env = "PUBLIC_KEY", hide_env_values = true)]
    public_key: Option<String>,

    /// Private key used to sign API requests. Never sent to the API.
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Base URL for the FieldClimate API
    #[clap(long, default_value_t = DEFAULT_API_URL.into())]
    api_url: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for each request to the FieldClimate API, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Offset of station local time from UTC, in hours. Sample timestamps and the daily
    /// rain reset both use station local time.
    #[clap(long, default_value_t = DEFAULT_UTC_OFFSET_HOURS, allow_hyphen_values = true)]
    utc_offset_hours: i32,

    /// Rain recorded this season before the station was installed, in mm. Added to the
    /// season total on every run but never saved.
    #[clap(long, default_value_t = PRE_STATION_RAIN_MM)]
    pre_station_rain: f64,

    /// File the running season rain total is kept in between runs
    #[clap(long, default_value = DEFAULT_SEASON_FILE)]
    season_file: PathBuf,

    /// File to write the weather snapshot to. Overwritten on every successful run.
    #[clap(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = FieldClimateSnapshotApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let credentials = Credentials::new(opts.public_key.clone(), opts.private_key.clone());
    if !credentials.is_complete() {
        tracing::warn!(message = "PUBLIC_KEY or PRIVATE_KEY not set, API requests will fail");
    }

    let clock = StationClock::from_hours(opts.utc_offset_hours).unwrap_or_else(|| {
        tracing::error!(message = "invalid UTC offset", hours = opts.utc_offset_hours);
        process::exit(1)
    });

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = FieldClimateClient::new(http_client, &opts.api_url, credentials).unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize FieldClimate client", error = %e);
        process::exit(1)
    });

    tracing::info!(message = "fetching weather data", api_url = %opts.api_url, station = %opts.station);

    let station = match client.station(&opts.station).await {
        Ok(s) => s,
        Err(ClientError::InvalidStation(station)) => {
            tracing::error!(message = "invalid station provided", station = %station);
            process::exit(1)
        }
        Err(e) => {
            tracing::error!(message = "failed to fetch station information", error = %e);
            process::exit(1)
        }
    };

    let raw = client
        .raw_data(&opts.station, WINDOW_HOURS as u32)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(message = "failed to fetch raw sensor data", error = %e);
            process::exit(1)
        });

    tracing::debug!(
        message = "fetched raw sensor data",
        samples = raw.dates.len(),
        sensors = raw.data.len()
    );

    let now = clock.now();
    let readings = sensors::extract(&station, &raw, now);

    // The season record is saved before the snapshot is written so that it stays
    // consistent even if writing the snapshot fails.
    let mut accumulator = SeasonAccumulator::new(FileSeasonStore::new(&opts.season_file));
    let update = accumulator.update(now.date(), readings.rain.today).unwrap_or_else(|e| {
        tracing::error!(
            message = "unable to update season rain record",
            path = %opts.season_file.display(),
            error = %e
        );
        process::exit(1)
    });

    let snapshot = snapshot::assemble(&station, &readings, update.season_rain(), opts.pre_station_rain, Utc::now());
    if let Err(e) = snapshot.write(&opts.output) {
        tracing::error!(
            message = "unable to write weather snapshot",
            path = %opts.output.display(),
            error = %e
        );
        process::exit(1)
    }

    tracing::info!(
        message = "wrote weather snapshot",
        path = %opts.output.display(),
        station_name = %snapshot.station_name
    );
    tracing::info!(
        message = "temperature",
        current = ?snapshot.temperature.current,
        max = ?snapshot.temperature.max,
        max_time = ?snapshot.temperature.max_time,
        min = ?snapshot.temperature.min,
        min_time = ?snapshot.temperature.min_time
    );
    tracing::info!(
        message = "wind",
        speed = ?snapshot.wind.speed,
        direction = ?readings.wind.direction.map(|d| d.abbreviation()),
        max = ?snapshot.wind.max,
        max_time = ?snapshot.wind.max_time
    );
    tracing::info!(
        message = "rain",
        today = snapshot.rain.today,
        last_hour = snapshot.rain.last_hour,
        week = snapshot.rain.week,
        season = snapshot.rain.season,
        pre_station = opts.pre_station_rain
    );

    Ok(())
}
