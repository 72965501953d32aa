//! Events: time-clustered groups of hits, and their classification.

use crate::hit::Hit;
use crate::signal::Origin;
use nalgebra::Vector3;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Set of event classification flags.
    ///
    /// A fresh set holds only [`EventType::UNKNOWN`]; [`EventType::mark`]
    /// clears it when a real classification is added.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
    pub struct EventType: u8 {
        /// Not classified.
        const UNKNOWN = 1;
        /// Back-to-back annihilation pair.
        const TWO_GAMMA = 1 << 1;
        /// Three-photon ortho-positronium decay candidate.
        const THREE_GAMMA = 1 << 2;
        /// De-excitation (prompt) photon present.
        const PROMPT = 1 << 3;
        /// At least one pair looked Compton-scattered.
        const SCATTERED = 1 << 4;
        /// Cosmic-ray candidate.
        const COSMIC = 1 << 5;
    }
}

impl EventType {
    const NAMED: [(EventType, &'static str); 6] = [
        (Self::UNKNOWN, "unknown"),
        (Self::TWO_GAMMA, "2gamma"),
        (Self::THREE_GAMMA, "3gamma"),
        (Self::PROMPT, "prompt"),
        (Self::SCATTERED, "scattered"),
        (Self::COSMIC, "cosmic"),
    ];

    /// Adds a classification, clearing `UNKNOWN` unless only `UNKNOWN` is
    /// added.
    pub fn mark(&mut self, flag: EventType) {
        self.insert(flag);
        if !flag.difference(Self::UNKNOWN).is_empty() {
            self.remove(Self::UNKNOWN);
        }
    }

    /// Returns true if no real classification is set.
    #[must_use]
    pub fn is_unknown(self) -> bool {
        self.difference(Self::UNKNOWN).is_empty()
    }

    /// Names of the flags that are set, `unknown` for an unclassified set.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        let flags = if self.is_unknown() { Self::UNKNOWN } else { self };
        Self::NAMED
            .into_iter()
            .filter(move |(flag, _)| flags.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl Default for EventType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        f.write_str(&names.join("|"))
    }
}

/// Reconstruction status of a whole event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecoFlag {
    /// Built from good measured hits.
    #[default]
    Good,
    /// At least one hit was built from incomplete data.
    Corrupted,
    /// Built from simulated hits.
    Mc,
}

impl fmt::Display for RecoFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoFlag::Good => "good",
            RecoFlag::Corrupted => "corrupted",
            RecoFlag::Mc => "mc",
        };
        f.write_str(name)
    }
}

/// A time-ordered group of hits from one hypothesised decay.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    hits: Vec<Hit>,
    flags: EventType,
    reco_flag: RecoFlag,
    window_index: u64,
}

impl Event {
    /// Creates an event from time-ordered hits.
    ///
    /// The reco flag is `Corrupted` if any hit is corrupted, otherwise `Mc`
    /// if any hit is simulated, otherwise `Good`.
    #[must_use]
    pub fn new(hits: Vec<Hit>, window_index: u64) -> Self {
        let reco_flag = if hits.iter().any(Hit::is_corrupted) {
            RecoFlag::Corrupted
        } else if hits.iter().any(|hit| hit.origin == Origin::Mc) {
            RecoFlag::Mc
        } else {
            RecoFlag::Good
        };
        Self {
            hits,
            flags: EventType::UNKNOWN,
            reco_flag,
            window_index,
        }
    }

    /// Hits, ascending in time.
    #[must_use]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Number of hits.
    #[must_use]
    pub fn multiplicity(&self) -> usize {
        self.hits.len()
    }

    /// Classification flags.
    #[must_use]
    pub fn flags(&self) -> EventType {
        self.flags
    }

    /// Adds a classification flag.
    pub fn add_flag(&mut self, flag: EventType) {
        self.flags.mark(flag);
    }

    /// Reconstruction status.
    #[must_use]
    pub fn reco_flag(&self) -> RecoFlag {
        self.reco_flag
    }

    /// Time window the event was built in.
    #[must_use]
    pub fn window_index(&self) -> u64 {
        self.window_index
    }

    /// Time of the first hit (ps).
    #[must_use]
    pub fn time_ps(&self) -> Option<f64> {
        self.hits.first().map(|hit| hit.time_ps)
    }
}

/// Outcome of the three-hit decay solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecayStatus {
    /// A physical solution was found.
    Ok,
    /// No consistent in-plane point and time exist.
    NoRealSolution,
    /// Every solution lies outside the chamber or the allowed time range.
    OutOfPhysicalRange,
    /// The computation produced NaN or the hits were degenerate.
    NumericallyInvalid,
}

impl fmt::Display for DecayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecayStatus::Ok => "ok",
            DecayStatus::NoRealSolution => "no_real_solution",
            DecayStatus::OutOfPhysicalRange => "out_of_physical_range",
            DecayStatus::NumericallyInvalid => "numerically_invalid",
        };
        f.write_str(name)
    }
}

/// Reconstructed decay vertex of a three-hit event.
///
/// When `status` is not `Ok` the position and time are those of the
/// rejected candidate (NaN when no candidate exists).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecayPoint {
    /// Decay position (cm).
    pub position: Vector3<f64>,
    /// Decay time (ps), on the same clock as the hit times.
    pub time_ps: f64,
    /// Solver outcome.
    pub status: DecayStatus,
}

impl DecayPoint {
    /// A failed reconstruction without a candidate.
    #[must_use]
    pub fn failed(status: DecayStatus) -> Self {
        Self {
            position: Vector3::repeat(f64::NAN),
            time_ps: f64::NAN,
            status,
        }
    }

    /// Returns true if the solver accepted the point.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == DecayStatus::Ok
    }
}
