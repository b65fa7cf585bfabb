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

//! Module matching shapes of fields from staggered grids.
//!
//! On Arakawa-C grids velocity components are stored on cell
//! faces, so `u`, `v` and rho-point coordinates have different shapes.
//! Fields are brought to the common shape by trimming both edges
//! or averaging adjacent cells along each axis.

use crate::{errors::ShrinkError, Float};
use ndarray::{Array, Axis, Dimension, Slice};

/// Shrinks the array to `target` shape.
///
/// Along each axis, while the array is too long, both edges
/// are trimmed if at least two cells have to be removed,
/// otherwise adjacent cells are averaged (removing one cell).
pub fn shrink<D: Dimension>(
    array: &Array<Float, D>,
    target: &[usize],
) -> Result<Array<Float, D>, ShrinkError> {
    if array.ndim() != target.len() {
        return Err(ShrinkError::DimensionMismatch(array.ndim(), target.len()));
    }

    for (&len, &target_len) in array.shape().iter().zip(target) {
        if target_len > len {
            return Err(ShrinkError::TargetTooLarge(len, target_len));
        }
    }

    let mut result = array.to_owned();

    for (axis, &target_len) in target.iter().enumerate() {
        let axis = Axis(axis);

        while result.len_of(axis) > target_len {
            let len = result.len_of(axis);

            result = if len - target_len >= 2 {
                result
                    .slice_axis(axis, Slice::from(1..len - 1))
                    .to_owned()
            } else {
                let lower = result.slice_axis(axis, Slice::from(..len - 1));
                let upper = result.slice_axis(axis, Slice::from(1..));

                (&lower + &upper) * 0.5
            };
        }
    }

    Ok(result)
}
