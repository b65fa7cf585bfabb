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

//! Module responsible for reading a single source
//! and reducing it to time-averaged velocity samples.
//!
//! Each source is read in the same steps: the averaging window
//! is matched to the dataset time axis, the part of the grid covering
//! the target domain is selected, velocities are averaged over the window
//! at chosen layer and (for grids not aligned with parallels)
//! rotated to east and north components.

pub(super) mod bisection;
pub(super) mod dataset;
mod rotation;
mod shrink;
mod subset;
pub(super) mod time;

use self::dataset::{Dataset, Window};
use self::subset::Coordinates;
use self::time::{resolve_centered, resolve_fixed, ResolvedWindow, TimeAxis};
use super::configuration::{Layout, Source, TimeWindow};
use super::grid::BoundingBox;
use crate::errors::{InputError, SourceError, SubsetError};
use crate::Float;
use chrono::NaiveDateTime;
use log::debug;
use ndarray::{s, Array1, Array2, ArrayD, Axis, Ix1, Ix2, Zip};

/// Time-averaged velocities of one source at scattered positions.
#[derive(Clone, PartialEq, Debug)]
pub struct Samples {
    pub lons: Vec<Float>,
    pub lats: Vec<Float>,
    pub u: Vec<Float>,
    pub v: Vec<Float>,
    pub window: ResolvedWindow,
}

impl Samples {
    fn from_arrays<D: ndarray::Dimension>(
        lons: &ndarray::Array<Float, D>,
        lats: &ndarray::Array<Float, D>,
        u: &ndarray::Array<Float, D>,
        v: &ndarray::Array<Float, D>,
        window: ResolvedWindow,
    ) -> Result<Self, SubsetError> {
        if lons.shape() != lats.shape() || lons.shape() != u.shape() || u.shape() != v.shape() {
            return Err(SubsetError::CoordinatesMismatch);
        }

        Ok(Samples {
            lons: lons.iter().copied().collect(),
            lats: lats.iter().copied().collect(),
            u: u.iter().copied().collect(),
            v: v.iter().copied().collect(),
            window,
        })
    }

    pub fn len(&self) -> usize {
        self.lons.len()
    }
}

/// Reads the source and computes averaged velocity samples
/// covering `bbox` around the `center` datetime.
pub fn sample(
    dataset: &dyn Dataset,
    source: &Source,
    bbox: &BoundingBox,
    center: NaiveDateTime,
) -> Result<Samples, SourceError> {
    let window = resolve_time_window(dataset, source, center)?;

    let samples = match source.layout {
        Layout::Structured => sample_structured(dataset, source, bbox, window)?,
        Layout::Unstructured => sample_unstructured(dataset, source, window)?,
        Layout::Roms => sample_roms(dataset, source, window)?,
    };

    debug!("Source {} provided {} samples", source.name, samples.len());

    Ok(samples)
}

/// Matches configured averaging window to the dataset.
fn resolve_time_window(
    dataset: &dyn Dataset,
    source: &Source,
    center: NaiveDateTime,
) -> Result<ResolvedWindow, SourceError> {
    match source.time_window {
        TimeWindow::Hours(hours) => {
            let time_var = source.time_var();

            let units = dataset
                .text_attribute(time_var, "units")?
                .ok_or_else(|| InputError::IncorrectAttribute(time_var.to_string(), "units"))?;
            let calendar = dataset.text_attribute(time_var, "calendar")?;
            let values = dataset.read(time_var)?.into_raw_vec();

            let axis = TimeAxis::new(&units, calendar.as_deref(), values)?;
            debug!("Time axis {} has {} steps", time_var, axis.len());

            Ok(resolve_centered(&axis, center, hours, source.time_stride)?)
        }
        TimeWindow::Indices((start, stop)) => {
            let steps = dataset
                .shape(source.u_var())?
                .first()
                .copied()
                .unwrap_or(0);

            Ok(resolve_fixed(steps, start, stop, source.time_stride))
        }
    }
}

/// Regular and curvilinear grids, subset to the target domain.
fn sample_structured(
    dataset: &dyn Dataset,
    source: &Source,
    bbox: &BoundingBox,
    window: ResolvedWindow,
) -> Result<Samples, SourceError> {
    let mut lons = dataset.read(source.lon_var())?;
    let lats = dataset.read(source.lat_var())?;

    if source.lon360 {
        lons.mapv_inplace(|lon| lon - 360.0);
    }

    let coords = Coordinates::new(lons, lats)?;
    let index_window = coords.find_window(bbox, source.lonlat_stride)?;

    debug!(
        "Source {} subset rows {:?} and columns {:?}",
        source.name, index_window.rows, index_window.cols
    );

    let (lons, lats) = coords.positions(&index_window);

    let u = average(
        dataset,
        source.u_var(),
        source.layer(),
        &window,
        Some(&index_window),
    )?;
    let v = average(
        dataset,
        source.v_var(),
        source.layer(),
        &window,
        Some(&index_window),
    )?;

    let u = into_2d(source.u_var(), u)?;
    let v = into_2d(source.v_var(), v)?;

    Ok(Samples::from_arrays(&lons, &lats, &u, &v, window)?)
}

/// Unstructured meshes, used whole.
fn sample_unstructured(
    dataset: &dyn Dataset,
    source: &Source,
    window: ResolvedWindow,
) -> Result<Samples, SourceError> {
    let mut lons = into_1d(source.lon_var(), dataset.read(source.lon_var())?)?;
    let lats = into_1d(source.lat_var(), dataset.read(source.lat_var())?)?;

    if source.lon360 {
        lons.mapv_inplace(|lon| lon - 360.0);
    }

    let u = average(dataset, source.u_var(), source.layer(), &window, None)?;
    let v = average(dataset, source.v_var(), source.layer(), &window, None)?;

    let u = into_1d(source.u_var(), u)?;
    let v = into_1d(source.v_var(), v)?;

    Ok(Samples::from_arrays(&lons, &lats, &u, &v, window)?)
}

/// ROMS grids: velocities staggered on cell faces are averaged
/// to interior rho points, rotated to east/north and masked on land.
fn sample_roms(
    dataset: &dyn Dataset,
    source: &Source,
    window: ResolvedWindow,
) -> Result<Samples, SourceError> {
    let lons = into_2d(source.lon_var(), dataset.read(source.lon_var())?)?;
    let lats = into_2d(source.lat_var(), dataset.read(source.lat_var())?)?;
    let angles = into_2d(source.angle_var(), dataset.read(source.angle_var())?)?;
    let mask = into_2d(source.mask_var(), dataset.read(source.mask_var())?)?;

    let (rho_rows, rho_cols) = lons.dim();

    if rho_rows < 3 || rho_cols < 3 {
        return Err(SubsetError::EmptySelection("interior rho point").into());
    }

    if lats.dim() != lons.dim() || angles.dim() != lons.dim() || mask.dim() != lons.dim() {
        return Err(SubsetError::CoordinatesMismatch.into());
    }

    let interior = [rho_rows - 2, rho_cols - 2];

    debug!("Reading {}", source.u_var());
    let u = average(dataset, source.u_var(), source.layer(), &window, None)?;
    debug!("Reading {}", source.v_var());
    let v = average(dataset, source.v_var(), source.layer(), &window, None)?;

    let u = shrink::shrink(&into_2d(source.u_var(), u)?, &interior)?;
    let v = shrink::shrink(&into_2d(source.v_var(), v)?, &interior)?;

    let interior_angles = angles.slice(s![1..-1, 1..-1]).to_owned();
    let (mut u, mut v) = rotation::rotate_field(&u, &v, &interior_angles);

    Zip::from(&mut u)
        .and(&mut v)
        .and(mask.slice(s![1..-1, 1..-1]))
        .for_each(|u, v, &mask| {
            if mask == 0.0 {
                *u = Float::NAN;
                *v = Float::NAN;
            }
        });

    let lons = lons.slice(s![1..-1, 1..-1]).to_owned();
    let lats = lats.slice(s![1..-1, 1..-1]).to_owned();

    Ok(Samples::from_arrays(&lons, &lats, &u, &v, window)?)
}

/// Arithmetic mean of the variable over timesteps of the window
/// at given layer, read in one block. Negative layers count
/// from the last one.
fn average(
    dataset: &dyn Dataset,
    name: &str,
    layer: i64,
    window: &ResolvedWindow,
    index_window: Option<&Window>,
) -> Result<ArrayD<Float>, InputError> {
    let shape = dataset.shape(name)?;

    if shape.len() < 3 {
        return Err(InputError::UnsupportedDimensionality(
            name.to_string(),
            shape.len(),
        ));
    }

    let layer_index = resolve_layer(layer, shape[1])
        .ok_or_else(|| InputError::LayerOutOfBounds(name.to_string(), layer))?;

    let block = dataset.read_block(name, &window.steps(), layer_index, index_window)?;

    block
        .mean_axis(Axis(0))
        .ok_or_else(|| InputError::WindowOutOfBounds(name.to_string()))
}

fn resolve_layer(layer: i64, layers: usize) -> Option<usize> {
    let layers = layers as i64;
    let index = if layer < 0 { layers + layer } else { layer };

    if (0..layers).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

fn into_1d(name: &str, array: ArrayD<Float>) -> Result<Array1<Float>, InputError> {
    let ndim = array.ndim();

    array
        .into_dimensionality::<Ix1>()
        .map_err(|_| InputError::UnsupportedDimensionality(name.to_string(), ndim))
}

fn into_2d(name: &str, array: ArrayD<Float>) -> Result<Array2<Float>, InputError> {
    let ndim = array.ndim();

    array
        .into_dimensionality::<Ix2>()
        .map_err(|_| InputError::UnsupportedDimensionality(name.to_string(), ndim))
}

#[cfg(test)]
mod tests {
    use super::dataset::memory::MemoryDataset;
    use super::{resolve_layer, sample};
    use crate::errors::{InputError, SourceError, SubsetError};
    use crate::pipeline::configuration::{Layout, Source, TimeWindow, Variables};
    use crate::pipeline::grid::BoundingBox;
    use chrono::NaiveDate;
    use float_cmp::assert_approx_eq;
    use ndarray::{array, Array, Array1, Array2, Array3, Array4};
    use std::f64::consts::FRAC_PI_2;

    fn source(layout: Layout) -> Source {
        Source {
            name: "test".to_string(),
            url: "memory".to_string(),
            enabled: true,
            layout,
            variables: Variables::default(),
            layer: None,
            lon360: false,
            lonlat_stride: 1,
            time_stride: 1,
            time_window: TimeWindow::Hours(24.0),
        }
    }

    fn center() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2012, 4, 18)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            west: -71.0,
            east: -69.0,
            south: 40.0,
            north: 42.0,
        }
    }

    /// Hourly time axis from 17th to 19th April.
    fn with_time(dataset: MemoryDataset, name: &str) -> MemoryDataset {
        dataset
            .with_variable(name, Array1::from_iter((0..48).map(f64::from)))
            .with_attribute(name, "units", "hours since 2012-04-17 00:00:00")
    }

    #[test]
    fn layers() {
        assert_eq!(resolve_layer(0, 3), Some(0));
        assert_eq!(resolve_layer(-1, 3), Some(2));
        assert_eq!(resolve_layer(-3, 3), Some(0));
        assert_eq!(resolve_layer(-4, 3), None);
        assert_eq!(resolve_layer(3, 3), None);
    }

    #[test]
    fn structured_time_mean_and_shift() {
        // velocity grows with time index, so the mean shows the window
        let u = Array4::from_shape_fn((48, 2, 3, 4), |(t, k, _, _)| {
            t as f64 + 100.0 * k as f64
        });
        let v = Array4::from_shape_fn((48, 2, 3, 4), |(_, _, j, i)| {
            (10 * j + i) as f64
        });

        let dataset = with_time(MemoryDataset::default(), "time")
            .with_variable("lon", array![289.0, 290.0, 291.0, 292.0])
            .with_variable("lat", array![40.0, 41.0, 42.0])
            .with_variable("u", u)
            .with_variable("v", v);

        let mut source = source(Layout::Structured);
        source.lon360 = true;
        source.layer = Some(-1);

        let samples = sample(&dataset, &source, &bbox(), center()).unwrap();

        // columns 289..291 (after shift -71..-69), all rows
        assert_eq!(samples.len(), 9);
        assert_eq!(samples.lons[..3], [-71.0, -70.0, -69.0]);
        assert_eq!(samples.lats[3], 41.0);

        // axis ends before the requested stop, so steps 23..47 of top layer
        assert_approx_eq!(f64, samples.u[0], 100.0 + 34.5, epsilon = 1e-9);
        assert_eq!(samples.v[4], 11.0);
        assert_eq!(samples.window.start, 23);
        assert_eq!(samples.window.stop, 47);
    }

    #[test]
    fn structured_stride() {
        let shape = (48, 1, 5, 5);

        let dataset = with_time(MemoryDataset::default(), "time")
            .with_variable("lon", Array::linspace(-72.0, -68.0, 5))
            .with_variable("lat", Array::linspace(39.0, 43.0, 5))
            .with_variable(
                "u",
                Array4::from_shape_fn(shape, |(_, _, j, i)| (10 * j + i) as f64),
            )
            .with_variable("v", Array4::<f64>::zeros(shape));

        let mut source = source(Layout::Structured);
        source.lonlat_stride = 2;

        let samples = sample(&dataset, &source, &bbox(), center()).unwrap();

        // columns 1..=3 and rows 1..=3 taken every second
        assert_eq!(samples.len(), 4);
        assert_eq!(samples.u, vec![11.0, 13.0, 31.0, 33.0]);
        assert_eq!(samples.lons, vec![-71.0, -69.0, -71.0, -69.0]);
    }

    #[test]
    fn structured_outside_domain() {
        let shape = (48, 1, 2, 2);

        let dataset = with_time(MemoryDataset::default(), "time")
            .with_variable("lon", array![10.0, 11.0])
            .with_variable("lat", array![40.0, 41.0])
            .with_variable("u", Array4::<f64>::zeros(shape))
            .with_variable("v", Array4::<f64>::zeros(shape));

        let result = sample(&dataset, &source(Layout::Structured), &bbox(), center());

        assert!(matches!(
            result,
            Err(SourceError::Subset(SubsetError::EmptySelection(_)))
        ));
    }

    #[test]
    fn unstructured_whole_mesh() {
        let dataset = with_time(MemoryDataset::default(), "time")
            .with_variable("lonc", array![-70.0, -69.5, -69.8, 10.0])
            .with_variable("latc", array![41.0, 41.2, 40.9, 0.0])
            .with_variable("u", Array3::from_elem((48, 3, 4), 0.5))
            .with_variable("v", Array3::from_elem((48, 3, 4), -0.25));

        let mut source = source(Layout::Unstructured);
        source.variables.lon = Some("lonc".to_string());
        source.variables.lat = Some("latc".to_string());
        source.time_stride = 3;

        let samples = sample(&dataset, &source, &bbox(), center()).unwrap();

        assert_eq!(samples.len(), 4);
        assert_eq!(samples.u, vec![0.5; 4]);
        assert_eq!(samples.v, vec![-0.25; 4]);
    }

    #[test]
    fn roms_rotated_and_masked() {
        let (rows, cols) = (5, 6);

        let mut mask = Array2::<f64>::ones((rows, cols));
        mask[[1, 2]] = 0.0;

        let dataset = with_time(MemoryDataset::default(), "ocean_time")
            .with_variable(
                "lon_rho",
                Array2::from_shape_fn((rows, cols), |(_, i)| -71.0 + 0.5 * i as f64),
            )
            .with_variable(
                "lat_rho",
                Array2::from_shape_fn((rows, cols), |(j, _)| 40.0 + 0.5 * j as f64),
            )
            .with_variable("angle", Array2::from_elem((rows, cols), FRAC_PI_2))
            .with_variable("mask_rho", mask)
            .with_variable("u", Array4::from_elem((48, 2, rows, cols - 1), 1.0))
            .with_variable("v", Array4::from_elem((48, 2, rows - 1, cols), 0.0));

        let mut source = source(Layout::Roms);
        source.time_window = TimeWindow::Indices((0, 24));
        source.time_stride = 3;

        let samples = sample(&dataset, &source, &bbox(), center()).unwrap();

        assert_eq!(samples.len(), 12);
        assert_eq!(samples.lons[0], -70.5);
        assert_eq!(samples.lats[0], 40.5);
        assert!(samples.window.midpoint.is_none());

        // rho point (1, 2) is the second interior cell of the first row
        assert!(samples.u[1].is_nan());
        assert!(samples.v[1].is_nan());

        for (n, (&u, &v)) in samples.u.iter().zip(&samples.v).enumerate() {
            if n != 1 {
                assert_approx_eq!(f64, u, 0.0, epsilon = 1e-12);
                assert_approx_eq!(f64, v, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn missing_time_units() {
        let dataset = MemoryDataset::default().with_variable("time", array![0.0, 1.0]);

        let result = sample(&dataset, &source(Layout::Structured), &bbox(), center());

        assert!(matches!(
            result,
            Err(SourceError::Input(InputError::IncorrectAttribute(_, "units")))
        ));
    }
}
