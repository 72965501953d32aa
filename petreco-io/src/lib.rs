//! petreco-io: File input and output for petreco.
//!
//! This crate loads pipeline configuration, detector geometry and time
//! calibration from JSON, streams edges from JSON-lines files and writes
//! classified events as CSV.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{load_calibration, load_config, load_geometry, EdgeRecord, EdgeStreamReader};
pub use writer::{write_edge_lines, EventCsvWriter};
