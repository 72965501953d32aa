//! Readers for configuration files and edge streams.
//!
//! Configuration, geometry and calibration are single JSON documents.
//! Edges come as JSON lines, one object per edge:
//!
//! ```text
//! {"window": 0, "channel": 4, "threshold": 1, "kind": "leading", "time_ps": -498000}
//! ```
//!
//! Edges of one window are expected to be contiguous in the stream.

use crate::{Error, Result};
use petreco_core::{
    BarrelGeometry, CalibrationEntry, ChannelId, Edge, EdgeKind, PipelineConfig, Threshold,
    TimeCalibration,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Loads and validates a pipeline configuration.
///
/// Missing sections and keys take their defaults.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid JSON, or
/// holds an invalid setting.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let config: PipelineConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates a barrel geometry.
///
/// # Errors
/// Returns an error if the file cannot be read or describes an invalid
/// geometry.
pub fn load_geometry<P: AsRef<Path>>(path: P) -> Result<BarrelGeometry> {
    let geometry: BarrelGeometry = read_json(path)?;
    geometry.validate()?;
    Ok(geometry)
}

/// Loads a time calibration stored as a JSON array of entries.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a list of
/// calibration entries.
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<TimeCalibration> {
    let entries: Vec<CalibrationEntry> = read_json(path)?;
    log::debug!("loaded {} calibration constants", entries.len());
    Ok(entries.into_iter().collect())
}

/// One line of an edge stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Time window the edge belongs to.
    pub window: u64,
    /// Channel (photomultiplier).
    pub channel: ChannelId,
    /// Threshold level, 1 to 4.
    pub threshold: u8,
    /// Leading or trailing crossing.
    pub kind: EdgeKind,
    /// Timestamp (ps).
    pub time_ps: i64,
}

impl EdgeRecord {
    /// Record for an edge of a window.
    #[must_use]
    pub fn new(window: u64, edge: &Edge) -> Self {
        Self {
            window,
            channel: edge.channel,
            threshold: edge.threshold.level(),
            kind: edge.kind,
            time_ps: edge.time_ps,
        }
    }

    /// Converts the record into a window index and an edge.
    ///
    /// # Errors
    /// Returns an error if the threshold level is out of range.
    pub fn into_edge(self) -> Result<(u64, Edge)> {
        let threshold = Threshold::new(self.threshold)?;
        Ok((
            self.window,
            Edge {
                channel: self.channel,
                threshold,
                kind: self.kind,
                time_ps: self.time_ps,
            },
        ))
    }
}

/// Iterator over the edges of a JSON-lines stream.
///
/// Blank lines are skipped. A malformed line ends the stream with an
/// error naming its line number.
pub struct EdgeStreamReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl EdgeStreamReader<BufReader<File>> {
    /// Opens an edge stream file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EdgeStreamReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    fn parse(&self, line: &str) -> Result<(u64, Edge)> {
        let record: EdgeRecord = serde_json::from_str(line).map_err(|err| {
            Error::InvalidFormat(format!("line {}: {err}", self.line_number))
        })?;
        record.into_edge().map_err(|err| {
            Error::InvalidFormat(format!("line {}: {err}", self.line_number))
        })
    }
}

impl<R: BufRead> Iterator for EdgeStreamReader<R> {
    type Item = Result<(u64, Edge)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(self.parse(trimmed));
        }
    }
}
