//! Time-window accumulation for streamed edges.
//!
//! Edges arrive as a flat stream tagged with the DAQ time-window index.
//! [`WindowAccumulator`] groups them into one [`EdgeCollector`] per window:
//! a change of window index is the boundary signal that closes the open
//! collector, and [`WindowAccumulator::flush`] drains the tail at the end of
//! the stream.

use petreco_core::edge::{Edge, EdgeCollector};
use petreco_core::error::{Error, Result};

/// Phase of a streaming accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    /// Nothing buffered.
    #[default]
    Idle,
    /// A group is open and accepting input.
    Accumulating,
    /// End of stream was signalled; no more input is accepted until reset.
    Flushing,
}

/// Groups an edge stream into per-window collectors.
#[derive(Debug, Default)]
pub struct WindowAccumulator {
    phase: StreamPhase,
    current: Option<EdgeCollector>,
    windows_closed: u64,
}

impl WindowAccumulator {
    /// Creates an idle accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Number of collectors handed out so far.
    #[must_use]
    pub fn windows_closed(&self) -> u64 {
        self.windows_closed
    }

    /// Adds an edge belonging to `window_index`.
    ///
    /// Returns the previous window's collector when the index changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the stream was already flushed.
    pub fn push(&mut self, window_index: u64, edge: Edge) -> Result<Option<EdgeCollector>> {
        match self.phase {
            StreamPhase::Flushing => Err(Error::InvalidInput(
                "edge pushed after end of stream".to_string(),
            )),
            StreamPhase::Idle => {
                let mut collector = EdgeCollector::new(window_index);
                collector.push(edge);
                self.current = Some(collector);
                self.phase = StreamPhase::Accumulating;
                Ok(None)
            }
            StreamPhase::Accumulating => {
                let boundary = self
                    .current
                    .as_ref()
                    .map_or(true, |open| open.window_index() != window_index);
                let closed = if boundary {
                    self.windows_closed += 1;
                    self.current
                        .replace(EdgeCollector::new(window_index))
                } else {
                    None
                };
                if let Some(open) = self.current.as_mut() {
                    open.push(edge);
                }
                Ok(closed)
            }
        }
    }

    /// Signals end of stream and returns the open collector, if any.
    pub fn flush(&mut self) -> Option<EdgeCollector> {
        self.phase = StreamPhase::Flushing;
        let tail = self.current.take();
        if tail.is_some() {
            self.windows_closed += 1;
        }
        tail
    }

    /// Returns to `Idle`, discarding anything buffered.
    pub fn reset(&mut self) {
        self.phase = StreamPhase::Idle;
        self.current = None;
    }
}
