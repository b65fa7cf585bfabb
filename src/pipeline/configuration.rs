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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside `config.yaml` so you can check this documentation
//! for more details how to set the config file.
//!
//! A minimal configuration merging two models looks like this:
//!
//! ```yaml
//! grid:
//!   x0: -75.9
//!   y0: 35.1
//!   x1: -56.6
//!   y1: 46.0
//!   size:
//!     resolution: [0.05, 0.05]
//! sources:
//!   - name: espresso
//!     url: http://tds.marine.rutgers.edu/thredds/dodsC/roms/espresso/2009_da/his
//!     layout: roms
//!   - name: necofs
//!     url: http://www.smast.umassd.edu:8080/thredds/dodsC/FVCOM/NECOFS/Forecasts/NECOFS_GOM3_FORECAST.nc
//!     layout: unstructured
//!     variables: { lon: lonc, lat: latc }
//!     time_stride: 3
//! ```

use crate::constants::{DEFAULT_AVERAGING_HOURS, DEFAULT_OUTPUT_PATH, DEFAULT_TIMESTAMP_FORMAT};
use crate::errors::ConfigError;
use crate::Float;
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use float_cmp::approx_eq;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::{
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

/// Fields describing the uniform target grid
/// onto which all sources are interpolated.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Grid {
    /// Longitude (in degrees) of the first grid column.
    pub x0: Float,

    /// Latitude (in degrees) of the first grid row.
    pub y0: Float,

    /// Longitude (in degrees) of the last grid column.
    pub x1: Float,

    /// Latitude (in degrees) of the last grid row.
    pub y1: Float,

    /// Number of gridpoints or grid spacing.
    pub size: GridSize,
}

/// Grid dimensions can be given directly or computed
/// from the spacing between gridpoints.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSize {
    /// Number of gridpoints along longitude and latitude.
    Shape((usize, usize)),

    /// Spacing (in degrees) along longitude and latitude.
    /// The number of gridpoints is `(x1 - x0) / dx + 1` truncated.
    Resolution((Float, Float)),
}

impl Grid {
    /// Checks if grid specification follows conventions
    /// and limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !self.x0.is_finite()
            || !self.x1.is_finite()
            || !self.y0.is_finite()
            || !self.y1.is_finite()
        {
            return Err(ConfigError::OutOfBounds("Grid corners must be finite"));
        }

        if !(-90.0..=90.0).contains(&self.y0) || !(-90.0..=90.0).contains(&self.y1) {
            return Err(ConfigError::OutOfBounds(
                "Grid latitude is too low or too high",
            ));
        }

        if !(-360.0..=360.0).contains(&self.x0) || !(-360.0..=360.0).contains(&self.x1) {
            return Err(ConfigError::OutOfBounds(
                "Grid longitude is too low or too high",
            ));
        }

        if approx_eq!(Float, self.x0, self.x1) || approx_eq!(Float, self.y0, self.y1) {
            return Err(ConfigError::OutOfBounds("Grid corners cannot be equal"));
        }

        match self.size {
            GridSize::Shape((width, height)) => {
                if width < 1 || height < 1 {
                    return Err(ConfigError::OutOfBounds(
                        "Grid must have at least one gridpoint along each axis",
                    ));
                }
            }
            GridSize::Resolution((dx, dy)) => {
                if !(dx > 0.0) || !(dy > 0.0) {
                    return Err(ConfigError::OutOfBounds(
                        "Grid spacing must be positive",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Fields with information about the time
/// around which sources are averaged.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Default)]
pub struct DateTime {
    /// _(Optional)_ Centre (UTC) of the averaging window.
    ///
    /// Defaults to the current time.
    #[serde(default)]
    pub center: Option<NaiveDateTime>,
}

impl DateTime {
    pub fn center_or_now(&self) -> NaiveDateTime {
        self.center.unwrap_or_else(|| chrono::Utc::now().naive_utc())
    }
}

/// Where the timestamp shown on the map comes from.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Local time of the run.
    Now,

    /// Midpoint of the averaging window actually
    /// returned by the first source.
    SourceMidpoint,
}

impl Default for TimestampSource {
    fn default() -> Self {
        TimestampSource::Now
    }
}

/// _(Optional)_ Fields controlling the timestamp written to output.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Timestamp {
    #[serde(default)]
    pub source: TimestampSource,

    /// `strftime`-like format of the timestamp.
    ///
    /// Defaults to `%I:00 %p on %b %d, %Y`.
    #[serde(default = "Timestamp::default_format")]
    pub format: String,

    /// Offset (in hours) added to the source midpoint,
    /// eg. `-5` to show it in EST.
    #[serde(default)]
    pub utc_offset_hours: Float,
}

impl Timestamp {
    fn default_format() -> String {
        DEFAULT_TIMESTAMP_FORMAT.to_string()
    }

    /// Checks if the format contains only valid specifiers
    /// and, for source midpoints, no time zone specifiers.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if StrftimeItems::new(&self.format).any(|item| item == Item::Error) {
            return Err(ConfigError::OutOfBounds("Timestamp format is not valid"));
        }

        // source midpoints carry no time zone, so eg. %z cannot be rendered
        if self.source == TimestampSource::SourceMidpoint {
            let renders = NaiveDate::from_ymd_opt(2012, 4, 18)
                .and_then(|date| date.and_hms_opt(12, 0, 0))
                .map_or(false, |datetime| {
                    write!(String::new(), "{}", datetime.format(&self.format)).is_ok()
                });

            if !renders {
                return Err(ConfigError::OutOfBounds(
                    "Timestamp format of source midpoint cannot contain time zone",
                ));
            }
        }

        if !self.utc_offset_hours.is_finite() {
            return Err(ConfigError::OutOfBounds("UTC offset must be finite"));
        }

        Ok(())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp {
            source: TimestampSource::default(),
            format: Timestamp::default_format(),
            utc_offset_hours: 0.0,
        }
    }
}

/// _(Optional)_ Fields with information about output.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Output {
    /// Path of the written file. Defaults to `ocean-data.js`.
    #[serde(default = "Output::default_path")]
    pub path: PathBuf,
}

impl Output {
    fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_OUTPUT_PATH)
    }
}

impl Default for Output {
    fn default() -> Self {
        Output {
            path: Output::default_path(),
        }
    }
}

/// Rule deciding which cells of the merged field
/// can still be filled by lower-priority sources.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapRule {
    /// Only cells not covered by any previous source.
    Missing,

    /// Cells where the merged u component is exactly zero.
    ///
    /// This reproduces the behaviour of the legacy scripts,
    /// where genuinely still water is overwritten too.
    Zero,
}

impl Default for GapRule {
    fn default() -> Self {
        GapRule::Missing
    }
}

/// What to do when one source fails.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the whole run.
    Abort,

    /// Log the error and continue with the next source.
    Skip,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Abort
    }
}

/// _(Optional)_ Fields controlling how sources are merged.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Default)]
pub struct Merge {
    #[serde(default)]
    pub gap_rule: GapRule,

    #[serde(default)]
    pub on_source_error: ErrorPolicy,
}

/// Kind of the source grid.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Regular (1D coordinates) or curvilinear (2D coordinates) grid,
    /// recognised by the dimensionality of coordinates.
    /// Velocity variables are `(time, layer, row, column)`.
    Structured,

    /// Unstructured mesh with 1D coordinates of nodes or elements.
    /// Velocity variables are `(time, layer, node)`.
    Unstructured,

    /// ROMS Arakawa-C grid with velocities relative to the grid
    /// and staggered from rho points.
    Roms,
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Structured
    }
}

/// _(Optional)_ Names of variables in the source dataset.
/// Names which are not set default to values typical for the layout.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Default)]
pub struct Variables {
    pub u: Option<String>,
    pub v: Option<String>,
    pub lon: Option<String>,
    pub lat: Option<String>,
    pub time: Option<String>,

    /// Grid rotation angle, used only by ROMS layout.
    pub angle: Option<String>,

    /// Land mask at rho points, used only by ROMS layout.
    pub mask: Option<String>,
}

/// How the averaging window is selected.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Window length in hours, centred on the configured date
    /// and matched to the nearest available timesteps.
    Hours(Float),

    /// Fixed half-open range of time indices.
    Indices((usize, usize)),
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Hours(DEFAULT_AVERAGING_HOURS)
    }
}

/// Single remote dataset providing surface currents.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Source {
    /// Name used in logs.
    pub name: String,

    /// OPeNDAP URL (or local path) of the dataset.
    pub url: String,

    /// _(Optional)_ Disabled sources are not read. Defaults to `true`.
    #[serde(default = "Source::default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub layout: Layout,

    #[serde(default)]
    pub variables: Variables,

    /// _(Optional)_ Vertical layer index. Negative values count
    /// from the last layer. Defaults to `-1` for ROMS and `0` otherwise.
    #[serde(default)]
    pub layer: Option<i64>,

    /// _(Optional)_ Source longitudes are in `0..360` convention
    /// and have to be shifted by `-360`. Defaults to `false`.
    #[serde(default)]
    pub lon360: bool,

    /// _(Optional)_ Stride of read rows and columns. Defaults to `1`.
    #[serde(default = "Source::default_stride")]
    pub lonlat_stride: usize,

    /// _(Optional)_ Stride of averaged timesteps. Defaults to `1`.
    #[serde(default = "Source::default_stride")]
    pub time_stride: usize,

    /// _(Optional)_ Averaging window. Defaults to 24 hours.
    #[serde(default)]
    pub time_window: TimeWindow,
}

impl Source {
    fn default_enabled() -> bool {
        true
    }

    fn default_stride() -> usize {
        1
    }

    pub fn u_var(&self) -> &str {
        self.variables.u.as_deref().unwrap_or("u")
    }

    pub fn v_var(&self) -> &str {
        self.variables.v.as_deref().unwrap_or("v")
    }

    pub fn lon_var(&self) -> &str {
        self.variables.lon.as_deref().unwrap_or(match self.layout {
            Layout::Roms => "lon_rho",
            _ => "lon",
        })
    }

    pub fn lat_var(&self) -> &str {
        self.variables.lat.as_deref().unwrap_or(match self.layout {
            Layout::Roms => "lat_rho",
            _ => "lat",
        })
    }

    pub fn time_var(&self) -> &str {
        self.variables.time.as_deref().unwrap_or(match self.layout {
            Layout::Roms => "ocean_time",
            _ => "time",
        })
    }

    pub fn angle_var(&self) -> &str {
        self.variables.angle.as_deref().unwrap_or("angle")
    }

    pub fn mask_var(&self) -> &str {
        self.variables.mask.as_deref().unwrap_or("mask_rho")
    }

    pub fn layer(&self) -> i64 {
        self.layer.unwrap_or(match self.layout {
            Layout::Roms => -1,
            _ => 0,
        })
    }

    /// Checks if strides and time window are within limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.lonlat_stride < 1 || self.time_stride < 1 {
            return Err(ConfigError::OutOfBounds("Strides cannot be less than 1"));
        }

        match self.time_window {
            TimeWindow::Hours(hours) => {
                if !(hours >= 0.0) || !hours.is_finite() {
                    return Err(ConfigError::OutOfBounds(
                        "Averaging window cannot be negative",
                    ));
                }
            }
            TimeWindow::Indices((start, stop)) => {
                if start > stop {
                    return Err(ConfigError::OutOfBounds(
                        "Time window cannot start after it stops",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the merger.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Heap memory limit in MB.
    ///
    /// Cannot be less than `128`. Defaults to the whole address space.
    ///
    /// Subsets of high-resolution models read over OPeNDAP can
    /// exceed the memory of small machines. With the limit set the
    /// allocator aborts with an OOM error message instead of the
    /// system killing the process without any information.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if memory limit is above the minimum.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Config {
    pub grid: Grid,

    #[serde(default)]
    pub datetime: DateTime,

    #[serde(default)]
    pub timestamp: Timestamp,

    #[serde(default)]
    pub output: Output,

    #[serde(default)]
    pub merge: Merge,

    /// Sources in priority order: earlier sources
    /// are never overwritten by later ones.
    pub sources: Vec<Source>,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        Config::new_from_slice(data.as_slice())
    }

    pub fn new_from_slice(data: &[u8]) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_slice(data)?;

        config.grid.check_bounds()?;
        config.timestamp.check_bounds()?;
        config.resources.check_bounds()?;
        config.check_sources()?;

        Ok(config)
    }

    fn check_sources(&self) -> Result<(), ConfigError> {
        if !self.sources.iter().any(|source| source.enabled) {
            return Err(ConfigError::OutOfBounds(
                "At least one source must be enabled",
            ));
        }

        let mut names = FxHashSet::default();

        for source in &self.sources {
            source.check_bounds()?;

            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::OutOfBounds("Source names must be unique"));
            }
        }

        Ok(())
    }

    /// Enabled sources in priority order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|source| source.enabled)
    }
}
