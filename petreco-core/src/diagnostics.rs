//! Data-quality counters and the run-wide context.
//!
//! Recoverable conditions never abort a run; every stage counts them in a
//! [`Diagnostics`] instead. Per-window counters are merged into the
//! [`RunContext`], which reports the aggregate when the run finishes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters of recoverable conditions and produced objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    /// Edges outside the declared time-window bounds.
    pub edges_out_of_window: u64,
    /// Trailing edges without any earlier leading edge, and surplus edges.
    pub edges_unpaired: u64,
    /// Trailing edges whose nearest leading edge was too far away.
    pub edges_over_separation: u64,
    /// Leading edges matched with the trailing edge of the next threshold.
    pub lead_trail_cross_threshold: u64,
    /// Raw signals produced.
    pub signals_built: u64,
    /// Signals skipped because they carry no threshold-1 leading edge.
    pub signals_without_reference: u64,
    /// Signals whose photomultiplier is unknown to the geometry.
    pub signals_unmapped: u64,
    /// Scintillators with signals on one side only.
    pub one_sided_scintillators: u64,
    /// Hits produced.
    pub hits_built: u64,
    /// Signals that took part in more than one hit.
    pub ambiguous_matches: u64,
    /// Events constructed, including those below the multiplicity cut.
    pub events_built: u64,
    /// Events dropped by the multiplicity cut.
    pub events_below_multiplicity: u64,
    /// Events handed downstream.
    pub events_emitted: u64,
    /// Hit pairs rejected by the scatter test.
    pub pairs_scattered: u64,
    /// Three-hit vertices without a real solution.
    pub decay_no_real_solution: u64,
    /// Three-hit vertices outside the physical region.
    pub decay_out_of_range: u64,
    /// Three-hit vertices that were degenerate or NaN.
    pub decay_numerically_invalid: u64,
    /// Vertices improved by the kinematic refinement.
    pub decay_refined: u64,
    /// Refinements that fell back to the closed-form vertex.
    pub decay_refine_fallback: u64,
    /// Time windows processed.
    pub windows_processed: u64,
}

impl Diagnostics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds another set of counters to this one.
    pub fn merge(&mut self, other: &Diagnostics) {
        self.edges_out_of_window += other.edges_out_of_window;
        self.edges_unpaired += other.edges_unpaired;
        self.edges_over_separation += other.edges_over_separation;
        self.lead_trail_cross_threshold += other.lead_trail_cross_threshold;
        self.signals_built += other.signals_built;
        self.signals_without_reference += other.signals_without_reference;
        self.signals_unmapped += other.signals_unmapped;
        self.one_sided_scintillators += other.one_sided_scintillators;
        self.hits_built += other.hits_built;
        self.ambiguous_matches += other.ambiguous_matches;
        self.events_built += other.events_built;
        self.events_below_multiplicity += other.events_below_multiplicity;
        self.events_emitted += other.events_emitted;
        self.pairs_scattered += other.pairs_scattered;
        self.decay_no_real_solution += other.decay_no_real_solution;
        self.decay_out_of_range += other.decay_out_of_range;
        self.decay_numerically_invalid += other.decay_numerically_invalid;
        self.decay_refined += other.decay_refined;
        self.decay_refine_fallback += other.decay_refine_fallback;
        self.windows_processed += other.windows_processed;
    }

    /// Total number of dropped or rejected edges.
    #[must_use]
    pub fn edges_dropped(&self) -> u64 {
        self.edges_out_of_window + self.edges_unpaired + self.edges_over_separation
    }

    /// Total number of failed three-hit reconstructions.
    #[must_use]
    pub fn decay_failures(&self) -> u64 {
        self.decay_no_real_solution + self.decay_out_of_range + self.decay_numerically_invalid
    }
}

/// Aggregate result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// Events handed to the sink over the whole run.
    pub total_events: u64,
    /// Number of inputs (files, streams) consumed.
    pub inputs: u64,
    /// Aggregate counters.
    pub diagnostics: Diagnostics,
}

/// Run-wide state: aggregate counters and event numbering.
///
/// Create one at run start, fold each window's counters into it and call
/// [`RunContext::finish`] at the end.
#[derive(Debug, Default)]
pub struct RunContext {
    diagnostics: Diagnostics,
    next_event_number: u64,
    inputs: u64,
}

impl RunContext {
    /// Starts a run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that another input (file or stream) is being consumed.
    pub fn begin_input(&mut self) {
        self.inputs += 1;
    }

    /// Merges one window's counters.
    pub fn record(&mut self, diagnostics: &Diagnostics) {
        self.diagnostics.merge(diagnostics);
    }

    /// Reserves `count` consecutive event numbers and returns the first.
    pub fn reserve_event_numbers(&mut self, count: u64) -> u64 {
        let first = self.next_event_number;
        self.next_event_number += count;
        first
    }

    /// Events numbered so far.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.next_event_number
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Ends the run and logs the aggregate counters.
    #[must_use]
    pub fn finish(self) -> RunSummary {
        let d = &self.diagnostics;
        log::info!(
            "run finished: {} events from {} windows ({} inputs)",
            self.next_event_number,
            d.windows_processed,
            self.inputs
        );
        log::info!(
            "signals {} / hits {} / events built {} emitted {} below multiplicity {}",
            d.signals_built,
            d.hits_built,
            d.events_built,
            d.events_emitted,
            d.events_below_multiplicity
        );
        log::info!(
            "edges dropped {} (out of window {}, unpaired {}, over separation {}); scattered pairs {}; decay failures {}",
            d.edges_dropped(),
            d.edges_out_of_window,
            d.edges_unpaired,
            d.edges_over_separation,
            d.pairs_scattered,
            d.decay_failures()
        );
        RunSummary {
            total_events: self.next_event_number,
            inputs: self.inputs,
            diagnostics: self.diagnostics,
        }
    }
}
