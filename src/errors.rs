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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Error while reading config.yaml: {0}")]
    Config(#[from] ConfigError),

    #[error("Source {0} failed: {1}")]
    Source(String, SourceError),

    #[error("Cannot set memory limit of {0} MB")]
    MemoryLimit(usize),

    #[error("Error while writing output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open config.yaml: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize config.yaml: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Error while reading input data: {0}")]
    Input(#[from] InputError),

    #[error("Error while resolving time window: {0}")]
    Time(#[from] TimeError),

    #[error("Error while subsetting source grid: {0}")]
    Subset(#[from] SubsetError),

    #[error("Error while matching staggered grids: {0}")]
    Shrink(#[from] ShrinkError),

    #[error("Error while triangulating samples: {0}")]
    Interpolation(#[from] spade::InsertionError),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Error from netCDF library: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Variable {0} not found in dataset")]
    MissingVariable(String),

    #[error("Attribute {1} of variable {0} is missing or has incorrect type")]
    IncorrectAttribute(String, &'static str),

    #[error("Variable {0} has {1} dimensions, which is not supported here")]
    UnsupportedDimensionality(String, usize),

    #[error("Layer {1} does not exist in variable {0}")]
    LayerOutOfBounds(String, i64),

    #[error("Index window exceeds the extent of variable {0}")]
    WindowOutOfBounds(String),

    #[error("Data has unexpected shape: {0}")]
    IncorrectShape(#[from] ndarray::ShapeError),
}

#[derive(Error, Debug)]
pub enum TimeError {
    #[error("Cannot parse time units: {0}")]
    IncorrectUnits(String),

    #[error("Calendar {0} is not supported")]
    UnsupportedCalendar(String),

    #[error("Time value cannot be represented as datetime")]
    OutOfRange,

    #[error("Error while searching time axis: {0}")]
    Search(#[from] SearchError),
}

#[derive(Error, Debug)]
pub enum SubsetError {
    #[error("Coordinates have {0} dimensions, only 1D and 2D coordinates are supported")]
    UnsupportedDimensionality(usize),

    #[error("Longitude and latitude arrays have different shapes")]
    CoordinatesMismatch,

    #[error("No {0} of the source grid falls inside the target grid")]
    EmptySelection(&'static str),
}

#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("Array has {0} dimensions but target shape has {1}")]
    DimensionMismatch(usize, usize),

    #[error("Target length {1} is larger than array length {0}")]
    TargetTooLarge(usize, usize),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Searched array is empty")]
    EmptyArray,

    #[error("Searched value is out of array bounds")]
    OutOfBounds,
}
