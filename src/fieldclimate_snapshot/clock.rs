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

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Civil time at the station: UTC shifted by a fixed offset, with no daylight saving.
///
/// Sample timestamps returned by the API are already in this time and the station
/// resets its "rain today" total at midnight in this time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationClock {
    offset: FixedOffset,
}

impl StationClock {
    /// Create a clock `hours` east of UTC, `None` if the offset is out of range.
    pub fn from_hours(hours: i32) -> Option<Self> {
        hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .map(|offset| StationClock { offset })
    }

    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.local(Utc::now())
    }
}
