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

//! Module decoding time axes stored with
//! [CF conventions](https://cfconventions.org/) and resolving
//! averaging windows against them.
//!
//! Time in CF datasets is stored as numbers with units attribute
//! like `hours since 2012-04-18 00:00:00`. Requested dates are converted
//! into the same numbers and matched to the nearest available timestep.

use super::bisection;
use super::dataset::Strided;
use crate::constants::SECONDS_IN_HOUR;
use crate::errors::TimeError;
use crate::Float;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::debug;

/// Decoded time coordinate of a dataset.
#[derive(Clone, PartialEq, Debug)]
pub struct TimeAxis {
    reference: NaiveDateTime,
    unit_seconds: Float,
    values: Vec<Float>,
}

impl TimeAxis {
    /// Creates the axis from raw time values and
    /// `units` and `calendar` attributes of time variable.
    pub fn new(
        units: &str,
        calendar: Option<&str>,
        values: Vec<Float>,
    ) -> Result<Self, TimeError> {
        if let Some(calendar) = calendar {
            match calendar.trim().to_lowercase().as_str() {
                "standard" | "gregorian" | "proleptic_gregorian" => (),
                _ => return Err(TimeError::UnsupportedCalendar(calendar.to_string())),
            }
        }

        let (unit_seconds, reference) = parse_units(units)?;

        Ok(TimeAxis {
            reference,
            unit_seconds,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Datetime of the timestep at given index.
    pub fn datetime_at(&self, index: usize) -> Result<NaiveDateTime, TimeError> {
        let value = self.values.get(index).ok_or(TimeError::OutOfRange)?;

        offset_by_seconds(self.reference, value * self.unit_seconds)
    }

    /// Index of the timestep closest to given datetime.
    /// Datetimes outside the axis resolve to its first or last step.
    pub fn nearest_index(&self, datetime: NaiveDateTime) -> Result<usize, TimeError> {
        let since_reference = datetime - self.reference;
        let seconds = since_reference.num_milliseconds() as Float / 1000.0;

        let index = bisection::find_nearest(&self.values, seconds / self.unit_seconds)?;

        Ok(index)
    }
}

/// Range of timesteps to average, `start` inclusive and `stop` exclusive.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ResolvedWindow {
    pub start: usize,
    pub stop: usize,
    pub stride: usize,

    /// Midpoint of the window actually returned by the dataset,
    /// known only for windows matched by dates.
    pub midpoint: Option<NaiveDateTime>,
}

impl ResolvedWindow {
    /// Timesteps to read. An empty range
    /// falls back to the single step at `start`.
    pub fn steps(&self) -> Strided {
        if self.start >= self.stop {
            return Strided::new(self.start, self.start + 1, self.stride);
        }

        Strided::new(self.start, self.stop, self.stride)
    }
}

/// Resolves the window of `hours` length centred on `center`
/// to the nearest timesteps available in `axis`.
///
/// The stop is matched first and the start is measured back
/// from the matched stop, so when the dataset does not reach
/// the requested centre the latest full window is used instead.
pub fn resolve_centered(
    axis: &TimeAxis,
    center: NaiveDateTime,
    hours: Float,
    stride: usize,
) -> Result<ResolvedWindow, TimeError> {
    let half_window = hours * SECONDS_IN_HOUR / 2.0;

    let desired_stop = offset_by_seconds(center, half_window)?;
    let stop = axis.nearest_index(desired_stop)?;
    let actual_stop = axis.datetime_at(stop)?;

    let desired_start = offset_by_seconds(actual_stop, -hours * SECONDS_IN_HOUR)?;
    let start = axis.nearest_index(desired_start)?;
    let actual_start = axis.datetime_at(start)?;

    let midpoint = offset_by_seconds(actual_stop, -half_window)?;

    debug!("Requested mid-date: {}", center);
    debug!("Returned mid-date: {}", midpoint);
    debug!("Window start: {} (index {})", actual_start, start);
    debug!("Window stop: {} (index {})", actual_stop, stop);

    Ok(ResolvedWindow {
        start,
        stop,
        stride,
        midpoint: Some(midpoint),
    })
}

/// Creates the window from fixed indices, truncated
/// to the length of the time axis.
pub fn resolve_fixed(len: usize, start: usize, stop: usize, stride: usize) -> ResolvedWindow {
    let last = len.saturating_sub(1);

    ResolvedWindow {
        start: start.min(last),
        stop: stop.min(len),
        stride,
        midpoint: None,
    }
}

/// Shifts the datetime by (possibly fractional) number of seconds.
pub fn offset_by_seconds(
    datetime: NaiveDateTime,
    seconds: Float,
) -> Result<NaiveDateTime, TimeError> {
    if !seconds.is_finite() {
        return Err(TimeError::OutOfRange);
    }

    let offset = Duration::milliseconds((seconds * 1000.0).round() as i64);

    datetime
        .checked_add_signed(offset)
        .ok_or(TimeError::OutOfRange)
}

/// Parses CF units string into the length of unit in seconds
/// and the reference datetime.
fn parse_units(units: &str) -> Result<(Float, NaiveDateTime), TimeError> {
    let lowercase = units.to_lowercase();
    let (unit, reference) = lowercase
        .split_once(" since ")
        .ok_or_else(|| TimeError::IncorrectUnits(units.to_string()))?;

    let unit_seconds = match unit.trim() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => SECONDS_IN_HOUR,
        "days" | "day" | "d" => 24.0 * SECONDS_IN_HOUR,
        _ => return Err(TimeError::IncorrectUnits(units.to_string())),
    };

    let reference = parse_reference(reference)
        .ok_or_else(|| TimeError::IncorrectUnits(units.to_string()))?;

    Ok((unit_seconds, reference))
}

fn parse_reference(reference: &str) -> Option<NaiveDateTime> {
    let mut reference = reference.trim();

    for suffix in ["utc", "z", "+00:00", "+0000", "-00:00"] {
        if let Some(stripped) = reference.strip_suffix(suffix) {
            reference = stripped.trim_end();
        }
    }

    let reference = reference.replacen('t', " ", 1);

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(&reference, format) {
            return Some(datetime);
        }
    }

    NaiveDate::parse_from_str(&reference, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
