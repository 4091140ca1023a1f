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

//! Weather snapshot generator for FieldClimate stations
//!
//! ## Features
//!
//! `fieldclimate_snapshot` fetches station metadata and the last 24 hours of raw sensor
//! samples for a single [FieldClimate] station, derives the values shown on a weather
//! dashboard, and writes them to a JSON snapshot file. It is meant to be run on a
//! schedule (cron, a systemd timer, a CI job) rather than as a long running process.
//!
//! The snapshot contains:
//!
//! * `temperature` - current temperature and the max/min over the last 24 hours, with the
//!   time each was first reached, in degrees celsius.
//! * `wind` - current and max wind speed over the last 24 hours in km/h, and the current
//!   direction as one of eight compass labels.
//! * `rain` - rain so far today, over the last hour, over the last 7 days (total and per
//!   day), and since the start of the season on October 1st, in mm.
//!
//! [FieldClimate]: https://api.fieldclimate.com/v2/docs/
//!
//! ## Season rain
//!
//! The API only reports rain for the current day, and that figure resets at local
//! midnight. The season total is kept in a small JSON file (`rain_season.json` by
//! default) that holds the total for all completed days plus the last value seen for
//! the current day. On the first run of each day the previous day's last value is
//! added to the total. This means the total can only be as accurate as the last run
//! of each day: run often enough that a run happens shortly before midnight.
//!
//! Only a single run should be active at once. Concurrent runs race when updating the
//! season file.
//!
//! ## Usage
//!
//! API keys are read from the `PUBLIC_KEY` and `PRIVATE_KEY` environment variables (or
//! the `--public-key` and `--private-key` flags).
//!
//! ```text
//! export PUBLIC_KEY=... PRIVATE_KEY=...
//! ./fieldclimate_snapshot --station 03114DE5 --output weather-data.json
//! ```
//!
//! If the station or raw data request fails, the program exits with a non-zero status
//! and the snapshot file is left untouched.

pub mod client;
pub mod clock;
pub mod season;
pub mod sensors;
pub mod snapshot;
