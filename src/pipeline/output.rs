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

//! Module writing the merged field as a JavaScript
//! literal read by the map front end.

use super::grid::TargetGrid;
use super::merge::MergedField;
use crate::constants::FILL_VALUE;
use crate::Float;
use log::debug;
use ndarray::Array2;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

/// Values written before the field.
#[derive(Clone, PartialEq, Debug)]
pub struct Header {
    pub timestamp: String,
    pub x0: Float,
    pub y0: Float,
    pub x1: Float,
    pub y1: Float,
    pub width: usize,
    pub height: usize,
}

impl Header {
    pub fn new(grid: &TargetGrid, timestamp: String) -> Self {
        Header {
            timestamp,
            x0: grid.x0,
            y0: grid.y0,
            x1: grid.x1,
            y1: grid.y1,
            width: grid.width(),
            height: grid.height(),
        }
    }
}

/// Writes header and `u,v` pairs of the field.
///
/// Fields are stored with latitude as rows, so they are
/// written transposed to make latitude vary fastest.
pub fn write_field<W: Write>(
    writer: &mut W,
    header: &Header,
    u: &Array2<Float>,
    v: &Array2<Float>,
) -> io::Result<()> {
    writeln!(writer, "var windData = {{")?;
    writeln!(writer, "timestamp: \"{}\",", header.timestamp)?;
    writeln!(writer, "x0: {:12.6},", header.x0)?;
    writeln!(writer, "y0: {:12.6},", header.y0)?;
    writeln!(writer, "x1: {:12.6},", header.x1)?;
    writeln!(writer, "y1: {:12.6},", header.y1)?;
    writeln!(writer, "gridWidth: {:6.1},", header.width as Float)?;
    writeln!(writer, "gridHeight: {:6.1},", header.height as Float)?;
    writeln!(writer, "field: [")?;

    let count = u.len();

    for (n, (&u, &v)) in u.t().iter().zip(v.t().iter()).enumerate() {
        let separator = if n + 1 < count { "," } else { "" };
        writeln!(
            writer,
            "{:4.3},{:4.3}{}",
            finite_or_fill(u),
            finite_or_fill(v),
            separator
        )?;
    }

    writeln!(writer, "]")?;
    writeln!(writer, "}}")?;

    Ok(())
}

fn finite_or_fill(value: Float) -> Float {
    if value.is_finite() {
        value
    } else {
        FILL_VALUE
    }
}

/// Writes the merged field to the file, replacing it if exists.
pub fn save(path: &Path, header: &Header, field: &MergedField) -> io::Result<()> {
    debug!("Writing {} gridpoints to {}", header.width * header.height, path.display());

    let (u, v) = field.components();

    let mut writer = BufWriter::new(File::create(path)?);
    write_field(&mut writer, header, &u, &v)?;
    writer.flush()?;

    Ok(())
}
