//! Raw threshold-crossing edges and the per-window edge collector.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a read-out channel. One channel serves one photomultiplier,
/// its threshold levels are carried on each [`Edge`].
pub type ChannelId = u32;

/// Discrete discriminator threshold level, `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct Threshold(u8);

impl Threshold {
    /// Number of threshold levels on a channel.
    pub const COUNT: u8 = 4;

    /// The lowest threshold level.
    pub const FIRST: Threshold = Threshold(1);

    /// Creates a threshold level, rejecting values outside `1..=4`.
    pub fn new(level: u8) -> Result<Self, ConfigError> {
        if (1..=Self::COUNT).contains(&level) {
            Ok(Self(level))
        } else {
            Err(ConfigError::InvalidThreshold(level))
        }
    }

    /// Returns the level number.
    #[inline]
    #[must_use]
    pub fn level(self) -> u8 {
        self.0
    }

    /// The next threshold up, if any.
    #[must_use]
    pub fn next_up(self) -> Option<Self> {
        (self.0 < Self::COUNT).then(|| Self(self.0 + 1))
    }

    /// All threshold levels in ascending order.
    pub fn all() -> impl Iterator<Item = Threshold> {
        (1..=Self::COUNT).map(Threshold)
    }
}

impl TryFrom<u8> for Threshold {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Threshold> for u8 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thr{}", self.0)
    }
}

/// Whether an edge is the rising or falling crossing of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum EdgeKind {
    /// Rising crossing.
    Leading,
    /// Falling crossing.
    Trailing,
}

/// A single threshold crossing from one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    /// Channel (photomultiplier) the edge was recorded on.
    pub channel: ChannelId,
    /// Threshold level that was crossed.
    pub threshold: Threshold,
    /// Leading or trailing crossing.
    pub kind: EdgeKind,
    /// Timestamp in picoseconds.
    pub time_ps: i64,
}

impl Edge {
    /// Creates a leading edge.
    #[must_use]
    pub fn leading(channel: ChannelId, threshold: Threshold, time_ps: i64) -> Self {
        Self {
            channel,
            threshold,
            kind: EdgeKind::Leading,
            time_ps,
        }
    }

    /// Creates a trailing edge.
    #[must_use]
    pub fn trailing(channel: ChannelId, threshold: Threshold, time_ps: i64) -> Self {
        Self {
            channel,
            threshold,
            kind: EdgeKind::Trailing,
            time_ps,
        }
    }

    /// Returns a copy shifted by `offset_ps`.
    #[inline]
    #[must_use]
    pub fn shifted(self, offset_ps: i64) -> Self {
        Self {
            time_ps: self.time_ps + offset_ps,
            ..self
        }
    }
}

/// Edges delivered for one finite time window, keyed by channel.
///
/// Edges keep their arrival order per channel; ordering by time is the
/// signal assembler's job.
#[derive(Debug, Clone, Default)]
pub struct EdgeCollector {
    window_index: u64,
    edges: BTreeMap<ChannelId, Vec<Edge>>,
    len: usize,
}

impl EdgeCollector {
    /// Creates an empty collector for the given time window.
    #[must_use]
    pub fn new(window_index: u64) -> Self {
        Self {
            window_index,
            edges: BTreeMap::new(),
            len: 0,
        }
    }

    /// Index of the time window these edges belong to.
    #[must_use]
    pub fn window_index(&self) -> u64 {
        self.window_index
    }

    /// Adds an edge.
    pub fn push(&mut self, edge: Edge) {
        self.edges.entry(edge.channel).or_default().push(edge);
        self.len += 1;
    }

    /// Total number of edges held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no edge was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Channels with at least one edge, ascending.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.edges.keys().copied()
    }

    /// All edges of one channel.
    #[must_use]
    pub fn edges_for(&self, channel: ChannelId) -> &[Edge] {
        self.edges.get(&channel).map_or(&[], Vec::as_slice)
    }

    /// Edges of one channel at one threshold level.
    pub fn edges_at(
        &self,
        channel: ChannelId,
        threshold: Threshold,
    ) -> impl Iterator<Item = &Edge> + '_ {
        self.edges_for(channel)
            .iter()
            .filter(move |edge| edge.threshold == threshold)
    }

    /// Iterates `(channel, edges)` pairs, ascending by channel.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &[Edge])> + '_ {
        self.edges.iter().map(|(&ch, edges)| (ch, edges.as_slice()))
    }
}

impl Extend<Edge> for EdgeCollector {
    fn extend<I: IntoIterator<Item = Edge>>(&mut self, iter: I) {
        for edge in iter {
            self.push(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thr(level: u8) -> Threshold {
        Threshold::new(level).unwrap()
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(Threshold::new(0).is_err());
        assert!(Threshold::new(5).is_err());
        assert_eq!(thr(4).level(), 4);
        assert_eq!(thr(3).next_up(), Some(thr(4)));
        assert_eq!(thr(4).next_up(), None);
        assert_eq!(Threshold::all().count(), 4);
    }

    #[test]
    fn test_collector_groups_by_channel() {
        let mut collector = EdgeCollector::new(7);
        collector.push(Edge::leading(3, thr(1), -500));
        collector.push(Edge::leading(1, thr(1), -900));
        collector.push(Edge::trailing(3, thr(1), -100));
        collector.push(Edge::leading(3, thr(2), -450));

        assert_eq!(collector.window_index(), 7);
        assert_eq!(collector.len(), 4);
        assert_eq!(collector.channels().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(collector.edges_for(3).len(), 3);
        assert_eq!(collector.edges_at(3, thr(1)).count(), 2);
        assert!(collector.edges_for(42).is_empty());
    }

    #[test]
    fn test_edge_shift() {
        let edge = Edge::trailing(2, thr(2), 1_000).shifted(-250);
        assert_eq!(edge.time_ps, 750);
        assert_eq!(edge.kind, EdgeKind::Trailing);
    }
}
