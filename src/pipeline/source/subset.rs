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

//! Module finding the part of source grid
//! that covers the target grid.

use super::dataset::{Strided, Window};
use crate::{errors::SubsetError, pipeline::grid::BoundingBox, Float};
use ndarray::{s, Array1, Array2, ArrayD, Axis, Ix1, Ix2};

/// Source grid coordinates, recognised by their dimensionality.
#[derive(Clone, PartialEq, Debug)]
pub enum Coordinates {
    /// Independent longitude and latitude axes.
    Rectilinear {
        lons: Array1<Float>,
        lats: Array1<Float>,
    },

    /// Longitude and latitude of every cell.
    Curvilinear {
        lons: Array2<Float>,
        lats: Array2<Float>,
    },
}

impl Coordinates {
    pub fn new(lons: ArrayD<Float>, lats: ArrayD<Float>) -> Result<Self, SubsetError> {
        if lons.ndim() != lats.ndim() {
            return Err(SubsetError::CoordinatesMismatch);
        }

        match lons.ndim() {
            1 => Ok(Coordinates::Rectilinear {
                lons: lons
                    .into_dimensionality::<Ix1>()
                    .map_err(|_| SubsetError::CoordinatesMismatch)?,
                lats: lats
                    .into_dimensionality::<Ix1>()
                    .map_err(|_| SubsetError::CoordinatesMismatch)?,
            }),
            2 => {
                if lons.shape() != lats.shape() {
                    return Err(SubsetError::CoordinatesMismatch);
                }

                Ok(Coordinates::Curvilinear {
                    lons: lons
                        .into_dimensionality::<Ix2>()
                        .map_err(|_| SubsetError::CoordinatesMismatch)?,
                    lats: lats
                        .into_dimensionality::<Ix2>()
                        .map_err(|_| SubsetError::CoordinatesMismatch)?,
                })
            }
            ndim => Err(SubsetError::UnsupportedDimensionality(ndim)),
        }
    }

    /// Finds rows and columns of the smallest index box
    /// containing all source points inside `bbox`,
    /// to be read with given stride.
    pub fn find_window(&self, bbox: &BoundingBox, stride: usize) -> Result<Window, SubsetError> {
        match self {
            Coordinates::Rectilinear { lons, lats } => {
                let cols = matching_range(lons, |lon| (bbox.west..=bbox.east).contains(&lon))
                    .ok_or(SubsetError::EmptySelection("longitude"))?;
                let rows = matching_range(lats, |lat| (bbox.south..=bbox.north).contains(&lat))
                    .ok_or(SubsetError::EmptySelection("latitude"))?;

                Ok(Window {
                    rows: Strided::new(rows.start, rows.end, stride),
                    cols: Strided::new(cols.start, cols.end, stride),
                })
            }
            Coordinates::Curvilinear { lons, lats } => {
                let mut rows = (usize::MAX, 0);
                let mut cols = (usize::MAX, 0);

                for ((j, i), &lon) in lons.indexed_iter() {
                    if bbox.contains(lon, lats[[j, i]]) {
                        rows = (rows.0.min(j), rows.1.max(j));
                        cols = (cols.0.min(i), cols.1.max(i));
                    }
                }

                if rows.0 == usize::MAX {
                    return Err(SubsetError::EmptySelection("cell"));
                }

                Ok(Window {
                    rows: Strided::new(rows.0, rows.1 + 1, stride),
                    cols: Strided::new(cols.0, cols.1 + 1, stride),
                })
            }
        }
    }

    /// Longitudes and latitudes of window cells, as 2D arrays.
    pub fn positions(&self, window: &Window) -> (Array2<Float>, Array2<Float>) {
        let rows = window.rows.slice();
        let cols = window.cols.slice();

        match self {
            Coordinates::Rectilinear { lons, lats } => {
                let lons = lons.slice_axis(Axis(0), cols);
                let lats = lats.slice_axis(Axis(0), rows);
                let shape = (lats.len(), lons.len());

                (
                    Array2::from_shape_fn(shape, |(_, i)| lons[i]),
                    Array2::from_shape_fn(shape, |(j, _)| lats[j]),
                )
            }
            Coordinates::Curvilinear { lons, lats } => (
                lons.slice(s![rows, cols]).to_owned(),
                lats.slice(s![rows, cols]).to_owned(),
            ),
        }
    }
}

/// Half-open range from the first to the last
/// index of values meeting the predicate.
fn matching_range<F>(values: &Array1<Float>, predicate: F) -> Option<std::ops::Range<usize>>
where
    F: Fn(Float) -> bool,
{
    let first = values.iter().position(|&v| predicate(v))?;
    let last = values.iter().rposition(|&v| predicate(v))?;

    Some(first..last + 1)
}

#[cfg(test)]
mod tests {
    use super::Coordinates;
    use crate::errors::SubsetError;
    use crate::pipeline::source::dataset::Strided;
    use crate::pipeline::grid::BoundingBox;
    use ndarray::{array, Array, Array2, IxDyn};

    fn bbox() -> BoundingBox {
        BoundingBox {
            west: -72.0,
            east: -70.0,
            south: 40.0,
            north: 41.0,
        }
    }

    #[test]
    fn rectilinear_window() {
        let lons = Array::linspace(-75.0, -65.0, 11).into_dyn();
        // descending latitudes are not unusual
        let lats = array![43.0, 42.0, 41.0, 40.5, 40.0, 39.0].into_dyn();

        let coords = Coordinates::new(lons, lats).unwrap();
        let window = coords.find_window(&bbox(), 2).unwrap();

        assert_eq!(window.rows, Strided::new(2, 5, 2));
        assert_eq!(window.cols, Strided::new(3, 6, 2));

        let (lons, lats) = coords.positions(&window);
        assert_eq!(lons, array![[-72.0, -70.0], [-72.0, -70.0]]);
        assert_eq!(lats, array![[41.0, 41.0], [40.0, 40.0]]);
    }

    #[test]
    fn curvilinear_window() {
        // grid rotated so that rows are not parallels
        let lons = Array2::from_shape_fn((6, 6), |(j, i)| -74.0 + i as f64 + 0.3 * j as f64);
        let lats = Array2::from_shape_fn((6, 6), |(j, i)| 38.5 + 0.5 * j as f64 - 0.1 * i as f64);

        let coords = Coordinates::new(lons.clone().into_dyn(), lats.clone().into_dyn()).unwrap();
        let window = coords.find_window(&bbox(), 1).unwrap();

        for ((j, i), &lon) in lons.indexed_iter() {
            if bbox().contains(lon, lats[[j, i]]) {
                assert!((window.rows.start..window.rows.stop).contains(&j));
                assert!((window.cols.start..window.cols.stop).contains(&i));
            }
        }

        let (sub_lons, _) = coords.positions(&window);
        assert_eq!(sub_lons.dim(), (window.rows.len(), window.cols.len()));
    }

    #[test]
    fn nothing_inside() {
        let coords = Coordinates::new(
            array![0.0, 1.0, 2.0].into_dyn(),
            array![0.0, 1.0].into_dyn(),
        )
        .unwrap();

        assert!(matches!(
            coords.find_window(&bbox(), 1),
            Err(SubsetError::EmptySelection(_))
        ));
    }

    #[test]
    fn three_dimensional_coordinates() {
        let lons = Array::zeros(IxDyn(&[2, 2, 2]));
        let lats = Array::zeros(IxDyn(&[2, 2, 2]));

        assert!(matches!(
            Coordinates::new(lons, lats),
            Err(SubsetError::UnsupportedDimensionality(3))
        ));
    }
}
