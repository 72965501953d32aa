//! Writers for reconstructed events and edge streams.

use crate::reader::EdgeRecord;
use crate::Result;
use petreco_algorithms::ReconstructedEvent;
use petreco_core::Edge;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const EVENT_HEADER: &str =
    "event,time_ps,multiplicity,flags,reco_flag,decay_x,decay_y,decay_z,decay_t,decay_status";

/// CSV writer for classified events, one row per event.
///
/// Decay columns are empty for events without a three-hit vertex. A
/// rejected vertex keeps its candidate coordinates, with the status naming
/// the reason.
pub struct EventCsvWriter<W: Write> {
    writer: W,
    rows: u64,
}

impl EventCsvWriter<BufWriter<File>> {
    /// Creates the output file and writes the header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> EventCsvWriter<W> {
    /// Wraps a writer and writes the header.
    ///
    /// # Errors
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{EVENT_HEADER}")?;
        Ok(Self { writer, rows: 0 })
    }

    /// Number of event rows written.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Writes one event under its run-wide number.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written.
    pub fn write_event(&mut self, number: u64, reconstructed: &ReconstructedEvent) -> Result<()> {
        let event = &reconstructed.event;
        let time = event.time_ps().map(|t| t.to_string()).unwrap_or_default();
        write!(
            self.writer,
            "{},{},{},{},{}",
            number,
            time,
            event.multiplicity(),
            event.flags(),
            event.reco_flag()
        )?;
        match &reconstructed.reconstruction.decay {
            Some(decay) => writeln!(
                self.writer,
                ",{},{},{},{},{}",
                decay.position.x, decay.position.y, decay.position.z, decay.time_ps, decay.status
            )?,
            None => writeln!(self.writer, ",,,,,")?,
        }
        self.rows += 1;
        Ok(())
    }

    /// Flushes buffered rows.
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Writes edges as JSON lines readable by [`crate::EdgeStreamReader`].
///
/// # Errors
/// Returns an error if serialization or writing fails.
pub fn write_edge_lines<W, I>(mut writer: W, edges: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (u64, Edge)>,
{
    for (window, edge) in edges {
        serde_json::to_writer(&mut writer, &EdgeRecord::new(window, &edge))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
