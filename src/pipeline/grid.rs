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

//! Module defining the uniform target grid.

use super::configuration::{self, GridSize};
use crate::{errors::ConfigError, Float};
use log::debug;
use ndarray::Array1;

/// Geographic extent in degrees.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
pub struct BoundingBox {
    pub west: Float,
    pub east: Float,
    pub south: Float,
    pub north: Float,
}

impl BoundingBox {
    pub fn contains(&self, lon: Float, lat: Float) -> bool {
        (self.west..=self.east).contains(&lon) && (self.south..=self.north).contains(&lat)
    }
}

/// Uniform longitude/latitude grid.
///
/// Row `j` lies at latitude `lats[j]` and column `i`
/// at longitude `lons[i]`, so gridded fields have
/// shape `(height, width)`.
#[derive(Clone, PartialEq, Debug)]
pub struct TargetGrid {
    pub x0: Float,
    pub y0: Float,
    pub x1: Float,
    pub y1: Float,
    pub lons: Array1<Float>,
    pub lats: Array1<Float>,
}

impl TargetGrid {
    pub fn new(x0: Float, y0: Float, x1: Float, y1: Float, width: usize, height: usize) -> Self {
        TargetGrid {
            x0,
            y0,
            x1,
            y1,
            lons: Array1::linspace(x0, x1, width),
            lats: Array1::linspace(y0, y1, height),
        }
    }

    /// Creates the grid from configuration, computing its
    /// dimensions from spacing when requested.
    pub fn from_config(grid: &configuration::Grid) -> Result<Self, ConfigError> {
        let (width, height) = match grid.size {
            GridSize::Shape(shape) => shape,
            GridSize::Resolution((dx, dy)) => (
                ((grid.x1 - grid.x0).abs() / dx + 1.0) as usize,
                ((grid.y1 - grid.y0).abs() / dy + 1.0) as usize,
            ),
        };

        if width < 1 || height < 1 {
            return Err(ConfigError::OutOfBounds(
                "Grid must have at least one gridpoint along each axis",
            ));
        }

        debug!("Target grid has {} x {} gridpoints", width, height);

        Ok(TargetGrid::new(
            grid.x0, grid.y0, grid.x1, grid.y1, width, height,
        ))
    }

    pub fn width(&self) -> usize {
        self.lons.len()
    }

    pub fn height(&self) -> usize {
        self.lats.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            west: self.x0.min(self.x1),
            east: self.x0.max(self.x1),
            south: self.y0.min(self.y1),
            north: self.y0.max(self.y1),
        }
    }
}
