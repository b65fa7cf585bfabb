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

//! Module containing the merger pipeline.
//!
//! The merger runs once per invocation and processes
//! sources one after another, in the order of `config.yaml`:
//!
//! 1. The target grid is built from the configured bounding box
//!    and either its shape or resolution.
//! 2. Each enabled source is opened by URL and its averaging window
//!    is matched to the dataset time axis (nearest timesteps,
//!    clamped to the available range).
//! 3. Velocities at the chosen layer are averaged over the window
//!    on the part of the source grid covering the target domain
//!    and, for ROMS grids, moved to rho points and rotated to east/north.
//! 4. The averaged samples are linearly interpolated onto the target grid
//!    over their Delaunay triangulation.
//! 5. The interpolated field fills the gaps left by previous sources.
//!
//! Finally the merged field is written to the output file
//! with gaps set to zero.

mod configuration;
mod grid;
mod interpolation;
mod merge;
mod output;
mod source;

#[cfg(test)]
mod super_tests;

use self::configuration::{Config, ErrorPolicy, Source, Timestamp, TimestampSource};
use self::grid::TargetGrid;
use self::interpolation::VelocityField;
use self::merge::MergedField;
use self::output::Header;
use self::source::dataset::{Dataset, NetCdfDataset};
use self::source::time::{offset_by_seconds, ResolvedWindow};
use crate::constants::{DEFAULT_TIMESTAMP_FORMAT, SECONDS_IN_HOUR};
use crate::errors::{InputError, MergeError, SourceError};
use crate::ALLOCATOR;
use chrono::{Local, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::{
    fmt::{Display, Write},
    path::Path,
};

/// Merged field together with the information
/// needed to describe it in the output.
#[derive(Debug)]
pub struct MergeOutcome {
    pub field: MergedField,

    /// Window midpoint of the first source
    /// that matched its window by dates.
    pub midpoint: Option<NaiveDateTime>,
}

/// Main merger function, responsible for all pipeline steps.
pub fn main() -> Result<(), MergeError> {
    info!("Preparing the merger");

    debug!("Reading configuration from config.yaml");
    let config = Config::new_from_file(Path::new("config.yaml"))?;

    debug!("Setting memory limit");
    ALLOCATOR
        .set_limit(config.resources.memory.saturating_mul(1024 * 1024))
        .map_err(|_| MergeError::MemoryLimit(config.resources.memory))?;

    let grid = TargetGrid::from_config(&config.grid)?;

    let outcome = merge_sources(&config, &grid, |source| {
        debug!("Opening {}", source.url);
        let dataset = NetCdfDataset::open(&source.url)?;
        Ok(Box::new(dataset) as Box<dyn Dataset>)
    })?;

    info!(
        "Merged field covers {} of {} gridpoints",
        outcome.field.coverage(),
        grid.width() * grid.height()
    );

    let timestamp = render_timestamp(&config.timestamp, outcome.midpoint);
    let header = Header::new(&grid, timestamp);

    info!("Writing output to {}", config.output.path.display());
    output::save(&config.output.path, &header, &outcome.field)?;

    Ok(())
}

/// Processes enabled sources in priority order and merges them.
///
/// Datasets are provided by `open` so the pipeline can
/// be run on any [`Dataset`] implementation.
fn merge_sources<F>(
    config: &Config,
    grid: &TargetGrid,
    mut open: F,
) -> Result<MergeOutcome, MergeError>
where
    F: FnMut(&Source) -> Result<Box<dyn Dataset>, InputError>,
{
    let center = config.datetime.center_or_now();

    let mut merged = MergedField::new(grid.shape(), config.merge.gap_rule);
    let mut midpoint = None;

    info!("Merging sources around {}", center);

    // set progress bar for processed sources
    let sources_bar = ProgressBar::new(config.enabled_sources().count() as u64);
    sources_bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    sources_bar.set_prefix("Merged sources");

    for source in config.enabled_sources() {
        sources_bar.set_message(source.name.clone());

        let result = open(source)
            .map_err(SourceError::from)
            .and_then(|dataset| process_source(dataset.as_ref(), source, grid, center));

        match result {
            Ok((field, window)) => {
                let filled = merged.fill_gaps(&field);
                info!("Source {} filled {} gridpoints", source.name, filled);

                if midpoint.is_none() {
                    midpoint = window.midpoint;
                }
            }
            Err(err) => match config.merge.on_source_error {
                ErrorPolicy::Abort => {
                    sources_bar.abandon();
                    return Err(MergeError::Source(source.name.clone(), err));
                }
                ErrorPolicy::Skip => {
                    error!("Source {} skipped due to an error: {}", source.name, err);
                    // this is neccessary to make sure that all error messages
                    // are fully written to stdout before the progress bar updates
                    println!();
                }
            },
        }

        sources_bar.inc(1);
    }

    sources_bar.finish_with_message("All sources processed");

    Ok(MergeOutcome {
        field: merged,
        midpoint,
    })
}

/// Samples the source and interpolates it onto the target grid.
fn process_source(
    dataset: &dyn Dataset,
    source: &Source,
    grid: &TargetGrid,
    center: NaiveDateTime,
) -> Result<(VelocityField, ResolvedWindow), SourceError> {
    debug!("Sampling source {}", source.name);
    let samples = source::sample(dataset, source, &grid.bounding_box(), center)?;

    debug!("Interpolating source {}", source.name);
    let field = interpolation::interpolate(&samples, grid)?;

    Ok((field, samples.window))
}

/// Formats the timestamp shown on the map.
///
/// When no source provided a window midpoint
/// the current time is used instead, and when the format
/// cannot be rendered the default one is used.
fn render_timestamp(timestamp: &Timestamp, midpoint: Option<NaiveDateTime>) -> String {
    let shifted = match timestamp.source {
        TimestampSource::Now => None,
        TimestampSource::SourceMidpoint => {
            match midpoint.map(|midpoint| {
                offset_by_seconds(midpoint, timestamp.utc_offset_hours * SECONDS_IN_HOUR)
            }) {
                Some(Ok(shifted)) => Some(shifted),
                Some(Err(err)) => {
                    warn!("Cannot shift window midpoint ({}), using current time", err);
                    None
                }
                None => {
                    warn!("No source provided window midpoint, using current time");
                    None
                }
            }
        }
    };

    let rendered = match shifted {
        Some(datetime) => render(datetime.format(&timestamp.format)),
        None => render(Local::now().format(&timestamp.format)),
    };

    rendered.unwrap_or_else(|| {
        warn!(
            "Timestamp format {} cannot be rendered, using the default format",
            timestamp.format
        );
        Local::now().format(DEFAULT_TIMESTAMP_FORMAT).to_string()
    })
}

/// Renders formatted datetime, `None` when some
/// of the format specifiers are not supported by it.
fn render<T: Display>(formatted: T) -> Option<String> {
    let mut rendered = String::new();
    write!(rendered, "{}", formatted).ok()?;

    Some(rendered)
}
