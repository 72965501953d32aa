//! Per-channel time-offset calibration.

use crate::edge::{ChannelId, Edge, Threshold};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One calibration constant as stored in a calibration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationEntry {
    /// Channel the offset applies to.
    pub channel: ChannelId,
    /// Threshold level, or `None` for every threshold of the channel.
    #[cfg_attr(feature = "serde", serde(default))]
    pub threshold: Option<Threshold>,
    /// Additive correction (ps).
    pub offset_ps: i64,
}

/// Additive time offsets, looked up per `(channel, threshold)` with a
/// per-channel fallback. Channels without an entry are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeCalibration {
    per_threshold: HashMap<(ChannelId, Threshold), i64>,
    per_channel: HashMap<ChannelId, i64>,
}

impl TimeCalibration {
    /// Creates an empty calibration (all offsets zero).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the offset of every threshold on a channel.
    #[must_use]
    pub fn with_channel_offset(mut self, channel: ChannelId, offset_ps: i64) -> Self {
        self.per_channel.insert(channel, offset_ps);
        self
    }

    /// Sets the offset of a single threshold on a channel.
    #[must_use]
    pub fn with_threshold_offset(
        mut self,
        channel: ChannelId,
        threshold: Threshold,
        offset_ps: i64,
    ) -> Self {
        self.per_threshold.insert((channel, threshold), offset_ps);
        self
    }

    /// Offset for a channel and threshold.
    #[must_use]
    pub fn offset(&self, channel: ChannelId, threshold: Threshold) -> i64 {
        self.per_threshold
            .get(&(channel, threshold))
            .or_else(|| self.per_channel.get(&channel))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the calibrated copy of an edge.
    #[must_use]
    pub fn apply(&self, edge: Edge) -> Edge {
        edge.shifted(self.offset(edge.channel, edge.threshold))
    }

    /// Number of stored constants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.per_threshold.len() + self.per_channel.len()
    }

    /// Returns true if no constant is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<CalibrationEntry> for TimeCalibration {
    fn from_iter<I: IntoIterator<Item = CalibrationEntry>>(iter: I) -> Self {
        let mut calibration = Self::new();
        for entry in iter {
            match entry.threshold {
                Some(thr) => {
                    calibration
                        .per_threshold
                        .insert((entry.channel, thr), entry.offset_ps);
                }
                None => {
                    calibration.per_channel.insert(entry.channel, entry.offset_ps);
                }
            }
        }
        calibration
    }
}
