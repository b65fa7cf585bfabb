/*
Copyright 2022 Jakub Lewandowski

This file is part of Surface Currents Merger (SCM).

Surface Currents Merger (SCM) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Surface Currents Merger (SCM) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Surface Currents Merger (SCM). If not, see https://www.gnu.org/licenses/.
*/

//! Module containing constants used by the merger.

use crate::Float;

/// Value given to target points outside the convex hull
/// of source samples and written in place of missing data.
pub const FILL_VALUE: Float = 0.0;

/// Number of seconds in one hour.
pub const SECONDS_IN_HOUR: Float = 3600.0;

/// Default name of the output file read by the currents map.
pub const DEFAULT_OUTPUT_PATH: &str = "ocean-data.js";

/// Default `strftime` format of the timestamp shown by the map.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%I:00 %p on %b %d, %Y";

/// Default averaging window length in hours.
///
/// Averaging over a day removes most of the tidal signal.
pub const DEFAULT_AVERAGING_HOURS: Float = 24.0;
