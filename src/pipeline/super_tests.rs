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

//! This is a module for integration tests of the merger,
//! but with access to private fields and methods.
//!
//! Remote datasets are replaced by in-memory datasets with known
//! analytic fields, so the whole pipeline from configuration
//! to the written text can be checked without a server.

use super::configuration::{Config, Source, Timestamp, TimestampSource};
use super::grid::TargetGrid;
use super::output::{write_field, Header};
use super::source::dataset::{memory::MemoryDataset, Dataset};
use super::{merge_sources, render_timestamp};
use crate::errors::{InputError, MergeError, SourceError};
use chrono::NaiveDate;
use ndarray::{array, Array1, Array4};

/// Hourly data on a one degree grid from (-1, -1) to (2, 2)
/// with velocities linear in longitude and latitude.
fn linear_dataset() -> MemoryDataset {
    let lons = array![-1.0, 0.0, 1.0, 2.0];
    let lats = array![-1.0, 0.0, 1.0, 2.0];

    let u = Array4::from_shape_fn((48, 1, 4, 4), |(_, _, j, i)| {
        0.1 + 0.2 * lons[i] + 0.3 * lats[j]
    });
    let v = Array4::from_shape_fn((48, 1, 4, 4), |(_, _, j, i)| {
        -0.5 + lons[i] - 0.25 * lats[j]
    });

    MemoryDataset::default()
        .with_variable("time", Array1::from_iter((0..48).map(f64::from)))
        .with_attribute("time", "units", "hours since 2012-04-18 00:00:00")
        .with_attribute("time", "calendar", "gregorian")
        .with_variable("lon", lons.clone())
        .with_variable("lat", lats.clone())
        .with_variable("u", u)
        .with_variable("v", v)
}

/// Constant velocity over the western half of the target domain.
fn western_dataset() -> MemoryDataset {
    MemoryDataset::default()
        .with_variable("time", Array1::from_iter((0..48).map(f64::from)))
        .with_attribute("time", "units", "hours since 2012-04-18 00:00:00")
        .with_variable("lon", array![0.0, 0.5])
        .with_variable("lat", array![0.0, 1.0])
        .with_variable("u", Array4::from_elem((48, 1, 2, 2), 1.0))
        .with_variable("v", Array4::from_elem((48, 1, 2, 2), 2.0))
}

fn open(source: &Source) -> Result<Box<dyn Dataset>, InputError> {
    match source.url.as_str() {
        "memory://linear" => Ok(Box::new(linear_dataset()) as Box<dyn Dataset>),
        "memory://western" => Ok(Box::new(western_dataset()) as Box<dyn Dataset>),
        _ => Err(InputError::MissingVariable(source.url.clone())),
    }
}

#[test]
fn single_source_output() {
    let config = Config::new_from_slice(
        "
grid: { x0: 0.0, y0: 0.0, x1: 1.0, y1: 1.0, size: { shape: [2, 2] } }
datetime: { center: 2012-04-18T12:00:00 }
timestamp: { source: source_midpoint, utc_offset_hours: -5 }
sources:
  - { name: linear, url: 'memory://linear' }
"
        .as_bytes(),
    )
    .unwrap();

    let grid = TargetGrid::from_config(&config.grid).unwrap();
    let outcome = merge_sources(&config, &grid, open).unwrap();

    let timestamp = render_timestamp(&config.timestamp, outcome.midpoint);
    assert_eq!(timestamp, "07:00 AM on Apr 18, 2012");

    let (u, v) = outcome.field.components();
    let mut buffer = Vec::new();
    write_field(&mut buffer, &Header::new(&grid, timestamp), &u, &v).unwrap();

    let expected = "var windData = {
timestamp: \"07:00 AM on Apr 18, 2012\",
x0:     0.000000,
y0:     0.000000,
x1:     1.000000,
y1:     1.000000,
gridWidth:    2.0,
gridHeight:    2.0,
field: [
0.100,-0.500,
0.400,-0.750,
0.300,0.500,
0.600,0.250
]
}
";

    assert_eq!(String::from_utf8(buffer).unwrap(), expected);
}

#[test]
fn priority_of_sources() {
    let config = Config::new_from_slice(
        "
grid: { x0: 0.0, y0: 0.0, x1: 1.0, y1: 1.0, size: { shape: [3, 2] } }
datetime: { center: 2012-04-18T12:00:00 }
sources:
  - { name: western, url: 'memory://western' }
  - { name: linear, url: 'memory://linear' }
"
        .as_bytes(),
    )
    .unwrap();

    let grid = TargetGrid::from_config(&config.grid).unwrap();
    let outcome = merge_sources(&config, &grid, open).unwrap();

    assert_eq!(outcome.field.coverage(), 6);

    let (u, v) = outcome.field.components();

    assert_eq!(u.slice(ndarray::s![.., ..2]), array![[1.0, 1.0], [1.0, 1.0]]);
    assert_eq!(v.slice(ndarray::s![.., ..2]), array![[2.0, 2.0], [2.0, 2.0]]);

    float_cmp::assert_approx_eq!(f64, u[[0, 2]], 0.3, epsilon = 1e-9);
    float_cmp::assert_approx_eq!(f64, u[[1, 2]], 0.6, epsilon = 1e-9);
    float_cmp::assert_approx_eq!(f64, v[[0, 2]], 0.5, epsilon = 1e-9);
    float_cmp::assert_approx_eq!(f64, v[[1, 2]], 0.25, epsilon = 1e-9);
}

#[test]
fn failing_source_policies() {
    let yaml = |policy: &str| {
        format!(
            "
grid: {{ x0: 0.0, y0: 0.0, x1: 1.0, y1: 1.0, size: {{ shape: [2, 2] }} }}
datetime: {{ center: 2012-04-18T12:00:00 }}
merge: {{ on_source_error: {} }}
sources:
  - {{ name: broken, url: 'memory://broken' }}
  - {{ name: linear, url: 'memory://linear' }}
  - {{ name: western, url: 'memory://western', enabled: false }}
",
            policy
        )
    };

    let config = Config::new_from_slice(yaml("skip").as_bytes()).unwrap();
    let grid = TargetGrid::from_config(&config.grid).unwrap();

    let outcome = merge_sources(&config, &grid, open).unwrap();
    assert_eq!(outcome.field.coverage(), 4);
    assert!(outcome.midpoint.is_some());

    let config = Config::new_from_slice(yaml("abort").as_bytes()).unwrap();
    let result = merge_sources(&config, &grid, open);

    assert!(matches!(
        result,
        Err(MergeError::Source(name, SourceError::Input(InputError::MissingVariable(_))))
            if name == "broken"
    ));
}

#[test]
fn disabled_sources_are_not_opened() {
    let config = Config::new_from_slice(
        "
grid: { x0: 0.0, y0: 0.0, x1: 1.0, y1: 1.0, size: { shape: [2, 2] } }
datetime: { center: 2012-04-18T12:00:00 }
sources:
  - { name: linear, url: 'memory://linear', enabled: false }
  - { name: western, url: 'memory://western' }
"
        .as_bytes(),
    )
    .unwrap();

    let grid = TargetGrid::from_config(&config.grid).unwrap();

    let mut opened = Vec::new();
    let outcome = merge_sources(&config, &grid, |source| {
        opened.push(source.name.clone());
        open(source)
    })
    .unwrap();

    assert_eq!(opened, vec!["western".to_string()]);

    // western column only
    assert_eq!(outcome.field.coverage(), 2);
}

#[test]
fn unrenderable_timestamp_format() {
    let timestamp = Timestamp {
        source: TimestampSource::SourceMidpoint,
        format: "%H:%M %z".to_string(),
        utc_offset_hours: 0.0,
    };
    let midpoint = NaiveDate::from_ymd_opt(2012, 4, 18)
        .and_then(|date| date.and_hms_opt(12, 0, 0));

    // falls back to the default format of the current time
    let rendered = render_timestamp(&timestamp, midpoint);

    assert!(rendered.contains(":00 "));
    assert!(rendered.contains(" on "));
}
