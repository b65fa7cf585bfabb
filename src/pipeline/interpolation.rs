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

//! Module with scattered linear interpolation of source samples
//! onto the target grid.

use super::grid::TargetGrid;
use super::source::Samples;
use crate::Float;
use log::debug;
use ndarray::Array2;
use spade::{
    DelaunayTriangulation, FloatTriangulation, HasPosition, InsertionError, Point2, Triangulation,
};

/// Velocity vector with east and north components.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
pub struct Velocity {
    pub u: Float,
    pub v: Float,
}

/// Target grid field where `None` marks cells
/// not covered by the source.
pub type VelocityField = Array2<Option<Velocity>>;

/// Triangulation vertex.
#[derive(Copy, Clone, Debug)]
struct Vertex {
    position: Point2<Float>,
    velocity: Velocity,
}

impl HasPosition for Vertex {
    type Scalar = Float;

    fn position(&self) -> Point2<Float> {
        self.position
    }
}

/// Interpolates samples to every cell of the target grid
/// using Delaunay triangulation and barycentric weights.
///
/// Samples with non-finite positions are skipped. Cells outside
/// the convex hull of the samples, or where the interpolated
/// velocity is `NaN`, are left uncovered.
pub fn interpolate(samples: &Samples, grid: &TargetGrid) -> Result<VelocityField, InsertionError> {
    let vertices: Vec<Vertex> = samples
        .lons
        .iter()
        .zip(&samples.lats)
        .zip(samples.u.iter().zip(&samples.v))
        .filter(|((lon, lat), _)| lon.is_finite() && lat.is_finite())
        .map(|((&lon, &lat), (&u, &v))| Vertex {
            position: Point2::new(lon, lat),
            velocity: Velocity { u, v },
        })
        .collect();

    debug!("Triangulating {} samples", vertices.len());

    let triangulation = DelaunayTriangulation::<Vertex>::bulk_load(vertices)?;
    let barycentric = triangulation.barycentric();

    let field = Array2::from_shape_fn(grid.shape(), |(j, i)| {
        let position = Point2::new(grid.lons[i], grid.lats[j]);

        let u = barycentric.interpolate(|vertex| vertex.data().velocity.u, position)?;
        let v = barycentric.interpolate(|vertex| vertex.data().velocity.v, position)?;

        if u.is_finite() && v.is_finite() {
            Some(Velocity { u, v })
        } else {
            None
        }
    });

    Ok(field)
}
