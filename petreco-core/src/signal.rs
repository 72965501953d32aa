//! Raw photomultiplier signals built from matched edges.

use crate::edge::{ChannelId, Threshold};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Data-quality tag carried by signals and hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quality {
    /// All edges were usable.
    #[default]
    Good,
    /// Some edges had to be dropped while building the object.
    Corrupted,
}

/// Where a signal or hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Origin {
    /// Measured detector data.
    #[default]
    Data,
    /// Monte Carlo simulation.
    Mc,
}

/// Matched leading/trailing edges of one photomultiplier in one time window.
///
/// Every threshold with a trailing time also has a leading time; a leading
/// time may stand alone when no trailing edge could be matched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSignal {
    pm_id: ChannelId,
    window_index: u64,
    leading: BTreeMap<Threshold, i64>,
    trailing: BTreeMap<Threshold, i64>,
    quality: Quality,
    origin: Origin,
}

impl RawSignal {
    /// Creates an empty signal for a photomultiplier.
    #[must_use]
    pub fn new(pm_id: ChannelId, window_index: u64) -> Self {
        Self {
            pm_id,
            window_index,
            ..Self::default()
        }
    }

    /// Sets the origin tag.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Records a leading edge without a trailing partner.
    pub fn set_leading(&mut self, threshold: Threshold, time_ps: i64) {
        self.leading.insert(threshold, time_ps);
        self.trailing.remove(&threshold);
    }

    /// Records a matched leading/trailing pair.
    pub fn set_pair(&mut self, threshold: Threshold, leading_ps: i64, trailing_ps: i64) {
        self.leading.insert(threshold, leading_ps);
        self.trailing.insert(threshold, trailing_ps);
    }

    /// Marks the signal as built from incomplete data.
    pub fn mark_corrupted(&mut self) {
        self.quality = Quality::Corrupted;
    }

    /// Photomultiplier identifier.
    #[inline]
    #[must_use]
    pub fn pm_id(&self) -> ChannelId {
        self.pm_id
    }

    /// Time window the edges came from.
    #[inline]
    #[must_use]
    pub fn window_index(&self) -> u64 {
        self.window_index
    }

    /// Data-quality tag.
    #[inline]
    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Origin tag.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Leading edge time at a threshold.
    #[must_use]
    pub fn leading(&self, threshold: Threshold) -> Option<i64> {
        self.leading.get(&threshold).copied()
    }

    /// Trailing edge time at a threshold.
    #[must_use]
    pub fn trailing(&self, threshold: Threshold) -> Option<i64> {
        self.trailing.get(&threshold).copied()
    }

    /// Leading times by threshold, ascending.
    pub fn leading_edges(&self) -> impl Iterator<Item = (Threshold, i64)> + '_ {
        self.leading.iter().map(|(&thr, &t)| (thr, t))
    }

    /// Trailing times by threshold, ascending.
    pub fn trailing_edges(&self) -> impl Iterator<Item = (Threshold, i64)> + '_ {
        self.trailing.iter().map(|(&thr, &t)| (thr, t))
    }

    /// Thresholds with a leading edge.
    pub fn thresholds(&self) -> impl Iterator<Item = Threshold> + '_ {
        self.leading.keys().copied()
    }

    /// Returns true if the signal holds no edge at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty()
    }

    /// Reference time: the leading edge at threshold 1. Signals that never
    /// crossed the first threshold have none.
    #[must_use]
    pub fn reference_time(&self) -> Option<i64> {
        self.leading(Threshold::FIRST)
    }

    /// Time over threshold at one level, if both edges are known.
    #[must_use]
    pub fn tot(&self, threshold: Threshold) -> Option<i64> {
        Some(self.trailing(threshold)? - self.leading(threshold)?)
    }

    /// Sum of time over threshold across all matched thresholds.
    #[must_use]
    pub fn tot_sum(&self) -> i64 {
        self.trailing
            .iter()
            .filter_map(|(thr, &trail)| self.leading(*thr).map(|lead| trail - lead))
            .sum()
    }
}
