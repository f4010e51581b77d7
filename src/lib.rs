// src/lib.rs

//! Line-of-code census and popularity-tier statistics for a corpus of
//! projects, plus edit distances between before/after source snapshots.

pub mod cli;
pub mod distance;
pub mod edit_distance;
pub mod error;
pub mod grouping;
pub mod join;
pub mod line_counter;
pub mod model;
pub mod renderer;
pub mod report;
pub mod snapshot;
pub mod stats;
pub mod subtypes;
pub mod table;

pub use error::{CensusError, Result};
