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

//! Module with access to source datasets.
//!
//! Sources are read through the [`Dataset`] trait so that
//! the sampling code does not depend on where the arrays come from.
//! In the merger it is always [`NetCdfDataset`], which opens local
//! files as well as OPeNDAP URLs through libnetcdf.
//!
//! Strides are passed down to the dataset, so a remote server
//! returns only the timesteps and gridpoints that are used.

use crate::{errors::InputError, Float};
use log::debug;
use ndarray::{ArrayD, IxDyn, Slice};
use netcdf::Extent;

/// Half-open index range taken with a stride.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Strided {
    pub start: usize,
    pub stop: usize,
    pub stride: usize,
}

impl Strided {
    pub fn new(start: usize, stop: usize, stride: usize) -> Self {
        Strided {
            start,
            stop,
            stride: stride.max(1),
        }
    }

    /// Number of indices in the range.
    pub fn len(&self) -> usize {
        if self.stop <= self.start {
            0
        } else {
            (self.stop - self.start - 1) / self.stride + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slice(&self) -> Slice {
        Slice::new(
            self.start as isize,
            Some(self.stop as isize),
            self.stride as isize,
        )
    }

    fn extent(&self) -> Extent {
        Extent::SliceEnd {
            start: self.start,
            end: self.stop,
            stride: self.stride as isize,
        }
    }
}

/// Rows and columns of a horizontal window.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Window {
    pub rows: Strided,
    pub cols: Strided,
}

/// Read-only access to named variables of a dataset.
///
/// All values are returned unpacked: missing values as `NaN`
/// and with scale factor and offset applied.
pub trait Dataset {
    /// Lengths of variable dimensions.
    fn shape(&self, name: &str) -> Result<Vec<usize>, InputError>;

    /// Reads the whole variable.
    fn read(&self, name: &str) -> Result<ArrayD<Float>, InputError>;

    /// Reads horizontal fields of a `(time, layer, ...)` variable
    /// at given timesteps and layer in a single request, optionally limited
    /// to a window of rows and columns (only for `(time, layer, row, column)`
    /// variables). The layer axis is dropped from the returned array.
    fn read_block(
        &self,
        name: &str,
        times: &Strided,
        layer: usize,
        window: Option<&Window>,
    ) -> Result<ArrayD<Float>, InputError>;

    /// Reads text attribute of a variable.
    fn text_attribute(&self, name: &str, attribute: &str) -> Result<Option<String>, InputError>;
}

/// Checks the block request against variable shape and
/// returns the shape of `(time, ...)` block that will be read.
fn block_shape(
    name: &str,
    shape: &[usize],
    times: &Strided,
    layer: usize,
    window: Option<&Window>,
) -> Result<Vec<usize>, InputError> {
    if shape.len() != 3 && shape.len() != 4 {
        return Err(InputError::UnsupportedDimensionality(
            name.to_string(),
            shape.len(),
        ));
    }

    if times.is_empty() || times.stop > shape[0] || layer >= shape[1] {
        return Err(InputError::WindowOutOfBounds(name.to_string()));
    }

    match window {
        None => {
            let mut block = vec![times.len()];
            block.extend_from_slice(&shape[2..]);

            Ok(block)
        }
        Some(Window { rows, cols }) => {
            if shape.len() != 4 {
                return Err(InputError::UnsupportedDimensionality(
                    name.to_string(),
                    shape.len(),
                ));
            }

            if rows.stop > shape[2]
                || cols.stop > shape[3]
                || rows.is_empty()
                || cols.is_empty()
            {
                return Err(InputError::WindowOutOfBounds(name.to_string()));
            }

            Ok(vec![times.len(), rows.len(), cols.len()])
        }
    }
}

/// Dataset opened with libnetcdf, from local file or OPeNDAP server.
pub struct NetCdfDataset {
    file: netcdf::File,
}

impl NetCdfDataset {
    pub fn open(url: &str) -> Result<Self, InputError> {
        debug!("Opening dataset {}", url);
        let file = netcdf::open(url)?;

        Ok(NetCdfDataset { file })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>, InputError> {
        self.file
            .variable(name)
            .ok_or_else(|| InputError::MissingVariable(name.to_string()))
    }
}

impl Dataset for NetCdfDataset {
    fn shape(&self, name: &str) -> Result<Vec<usize>, InputError> {
        let variable = self.variable(name)?;

        Ok(variable.dimensions().iter().map(|d| d.len()).collect())
    }

    fn read(&self, name: &str) -> Result<ArrayD<Float>, InputError> {
        let variable = self.variable(name)?;
        let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();

        let values = variable.get_values::<Float, _>(..)?;
        let values = unpack(&variable, values);

        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    fn read_block(
        &self,
        name: &str,
        times: &Strided,
        layer: usize,
        window: Option<&Window>,
    ) -> Result<ArrayD<Float>, InputError> {
        let variable = self.variable(name)?;
        let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();
        let block_shape = block_shape(name, &shape, times, layer, window)?;

        let mut extents = vec![times.extent(), Extent::Index(layer)];

        match window {
            Some(Window { rows, cols }) => {
                extents.push(rows.extent());
                extents.push(cols.extent());
            }
            None => extents.extend(shape[2..].iter().map(|_| Extent::from(..))),
        }

        debug!("Reading {} block of shape {:?}", name, block_shape);

        let values = variable.get_values::<Float, _>(extents)?;
        let values = unpack(&variable, values);

        Ok(ArrayD::from_shape_vec(IxDyn(&block_shape), values)?)
    }

    fn text_attribute(&self, name: &str, attribute: &str) -> Result<Option<String>, InputError> {
        let variable = self.variable(name)?;

        if !variable.attributes().any(|attr| attr.name() == attribute) {
            return Ok(None);
        }

        match variable.attribute_value(attribute) {
            Some(Ok(netcdf::AttributeValue::Str(value))) => Ok(Some(value)),
            Some(Err(err)) => Err(err.into()),
            _ => Err(InputError::IncorrectAttribute(
                name.to_string(),
                "text attribute",
            )),
        }
    }
}

/// Reads numeric attribute, `None` when missing or not numeric.
fn numeric_attribute(variable: &netcdf::Variable, name: &str) -> Option<Float> {
    if !variable.attributes().any(|attr| attr.name() == name) {
        return None;
    }

    let value = variable.attribute_value(name)?.ok()?;
    Float::try_from(value).ok()
}

/// Unpacks values with packing attributes of the variable.
fn unpack(variable: &netcdf::Variable, values: Vec<Float>) -> Vec<Float> {
    let fill_value = numeric_attribute(variable, "_FillValue")
        .or_else(|| numeric_attribute(variable, "missing_value"));
    let scale_factor = numeric_attribute(variable, "scale_factor").unwrap_or(1.0);
    let add_offset = numeric_attribute(variable, "add_offset").unwrap_or(0.0);

    unpack_values(values, fill_value, scale_factor, add_offset)
}

/// Replaces missing values with `NaN` and applies scale factor
/// and offset to the rest. Missing values are given in packed units.
fn unpack_values(
    mut values: Vec<Float>,
    fill_value: Option<Float>,
    scale_factor: Float,
    add_offset: Float,
) -> Vec<Float> {
    for value in values.iter_mut() {
        if fill_value.map_or(false, |fill| *value == fill) {
            *value = Float::NAN;
        } else {
            *value = *value * scale_factor + add_offset;
        }
    }

    values
}


#[cfg(test)]
mod tests {
    use super::{block_shape, memory::MemoryDataset, unpack_values, Dataset, Strided, Window};
    use crate::errors::InputError;
    use float_cmp::assert_approx_eq;
    use ndarray::Array;

    fn window(rows: (usize, usize), cols: (usize, usize), stride: usize) -> Window {
        Window {
            rows: Strided::new(rows.0, rows.1, stride),
            cols: Strided::new(cols.0, cols.1, stride),
        }
    }

    #[test]
    fn strided_lengths() {
        assert_eq!(Strided::new(0, 10, 3).len(), 4);
        assert_eq!(Strided::new(2, 4, 1).len(), 2);
        assert_eq!(Strided::new(5, 6, 8).len(), 1);
        assert!(Strided::new(3, 3, 1).is_empty());
        assert_eq!(Strided::new(0, 4, 0).stride, 1);
    }

    #[test]
    fn block_shapes() {
        let all = Strided::new(0, 4, 1);

        assert_eq!(
            block_shape("u", &[4, 2, 5, 6], &all, 1, None).unwrap(),
            vec![4, 5, 6]
        );
        let times = Strided::new(1, 4, 2);
        let strided_window = window((1, 4), (0, 6), 2);

        assert_eq!(
            block_shape("u", &[4, 2, 5, 6], &times, 0, Some(&strided_window)).unwrap(),
            vec![2, 2, 3]
        );
        assert_eq!(
            block_shape("u", &[4, 2, 100], &all, 0, None).unwrap(),
            vec![4, 100]
        );

        assert!(matches!(
            block_shape("u", &[4, 2, 5, 6], &Strided::new(0, 5, 1), 0, None),
            Err(InputError::WindowOutOfBounds(_))
        ));
        assert!(matches!(
            block_shape("u", &[4, 2, 5, 6], &Strided::new(2, 2, 1), 0, None),
            Err(InputError::WindowOutOfBounds(_))
        ));
        assert!(matches!(
            block_shape("u", &[4, 2, 5, 6], &all, 0, Some(&window((1, 6), (0, 1), 1))),
            Err(InputError::WindowOutOfBounds(_))
        ));
        assert!(matches!(
            block_shape("u", &[4, 5, 6], &all, 0, Some(&window((0, 1), (0, 1), 1))),
            Err(InputError::UnsupportedDimensionality(_, 3))
        ));
        assert!(matches!(
            block_shape("u", &[4, 6], &all, 0, None),
            Err(InputError::UnsupportedDimensionality(_, 2))
        ));
    }

    #[test]
    fn memory_strided_block() {
        let values = Array::from_shape_fn((5, 3, 4, 6), |(t, k, j, i)| {
            (1000 * t + 100 * k + 10 * j + i) as f64
        });
        let dataset = MemoryDataset::default().with_variable("u", values);

        let times = Strided::new(1, 5, 2);
        let block = dataset
            .read_block("u", &times, 2, Some(&window((1, 4), (1, 6), 2)))
            .unwrap();

        assert_eq!(block.shape(), &[2, 2, 3]);
        assert_eq!(block[[0, 0, 0]], 1211.0);
        assert_eq!(block[[0, 1, 2]], 1235.0);
        assert_eq!(block[[1, 0, 1]], 3213.0);
    }

    #[test]
    fn fill_value_becomes_nan() {
        let values = unpack_values(vec![1.0, -9999.0, 3.0], Some(-9999.0), 1.0, 0.0);

        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 3.0);
    }

    #[test]
    fn scale_before_offset() {
        let values = unpack_values(vec![0.0, 10.0, -4.0], None, 0.5, 2.0);

        assert_approx_eq!(f64, values[0], 2.0);
        assert_approx_eq!(f64, values[1], 7.0);
        assert_approx_eq!(f64, values[2], 0.0);
    }

    #[test]
    fn fill_compared_in_packed_units() {
        // packed -32767 is missing, while unpacked 1.0 is a valid value
        let values = unpack_values(vec![-32767.0, 1000.0], Some(-32767.0), 0.001, 0.0);

        assert!(values[0].is_nan());
        assert_approx_eq!(f64, values[1], 1.0);

        // a value that equals the fill only after unpacking is kept
        let values = unpack_values(vec![-16383.0], Some(-32767.0), 2.0, -1.0);
        assert_approx_eq!(f64, values[0], -32767.0);
    }
}
