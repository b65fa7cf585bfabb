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

//! Surface Currents Merger (SCM) collects surface current forecasts
//! from several regional ocean models served over OPeNDAP,
//! averages them over a time window centred on the requested date
//! and merges them onto a single uniform longitude/latitude grid.
//!
//! The merged field is written as a JavaScript literal (`ocean-data.js`)
//! ready to be loaded by the animated currents map.
//!
//! All sources, the target grid and the output are set in `config.yaml`.

mod constants;
mod errors;
mod pipeline;

use cap::Cap;
use env_logger::Env;
use log::{error, info};
use std::alloc;

type Float = f64;

/// Global allocator used by the merger.
///
/// Remote subsets of high-resolution models can be large, so capping
/// the heap to the limit set in configuration file turns a silent kill
/// by the system into a readable [OOM error](https://en.wikipedia.org/wiki/Out_of_memory).
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`pipeline::main`].
///
/// The logger is initiated before anything else so that errors
/// from reading the configuration are reported too.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("SURFACE_CURRENTS_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("SURFACE_CURRENTS_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match pipeline::main() {
        Ok(_) => info!("Merging finished. Check the output file and log."),
        Err(err) => {
            error!("Merging failed with error: {}", err);
            std::process::exit(1);
        }
    }
}
