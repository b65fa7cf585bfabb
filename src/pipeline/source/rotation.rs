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

//! Module rotating velocities from grid-relative
//! to geographic (east, north) orientation.

use crate::Float;
use nalgebra::{Rotation2, Vector2};
use ndarray::{Array2, Zip};

/// Rotates the vector by `angle` (in radians, counter-clockwise).
pub fn rotate(u: Float, v: Float, angle: Float) -> (Float, Float) {
    let rotated = Rotation2::new(angle) * Vector2::new(u, v);

    (rotated.x, rotated.y)
}

/// Rotates every vector of the field by the angle
/// between grid x axis and east at that cell.
pub fn rotate_field(
    u: &Array2<Float>,
    v: &Array2<Float>,
    angles: &Array2<Float>,
) -> (Array2<Float>, Array2<Float>) {
    let mut east = Array2::zeros(u.raw_dim());
    let mut north = Array2::zeros(u.raw_dim());

    Zip::from(&mut east)
        .and(&mut north)
        .and(u)
        .and(v)
        .and(angles)
        .for_each(|east, north, &u, &v, &angle| {
            let (e, n) = rotate(u, v, angle);
            *east = e;
            *north = n;
        });

    (east, north)
}
