//! Signal assembly: pairing leading and trailing edges per threshold.
//!
//! For every threshold of one channel the assembler walks the trailing
//! edges in time order and pairs each with the nearest earlier leading edge
//! that is still free. Only the earliest pair of a threshold is kept on the
//! signal. Thresholds left with a lone leading edge may borrow a trailing
//! edge from the threshold above, within the cross-threshold limit.
//!
//! Problems in the data are never errors: they are counted in
//! [`Diagnostics`] and, where the signal is incomplete, the signal is tagged
//! corrupted.

use petreco_core::config::SignalConfig;
use petreco_core::diagnostics::Diagnostics;
use petreco_core::edge::{ChannelId, Edge, EdgeCollector, EdgeKind, Threshold};
use petreco_core::error::{Error, Result};
use petreco_core::signal::RawSignal;

const LEVELS: usize = Threshold::COUNT as usize;

/// Edge times of one channel, split by threshold and kind.
#[derive(Default)]
struct ThresholdEdges {
    leading: [Vec<i64>; LEVELS],
    trailing: [Vec<i64>; LEVELS],
}

impl ThresholdEdges {
    fn slot(threshold: Threshold) -> usize {
        usize::from(threshold.level() - 1)
    }

    fn push(&mut self, edge: &Edge) {
        let slot = Self::slot(edge.threshold);
        match edge.kind {
            EdgeKind::Leading => self.leading[slot].push(edge.time_ps),
            EdgeKind::Trailing => self.trailing[slot].push(edge.time_ps),
        }
    }

    fn sort(&mut self) {
        for times in self.leading.iter_mut().chain(self.trailing.iter_mut()) {
            times.sort_unstable();
        }
    }
}

/// Outcome of same-threshold pairing on one level.
enum LevelMatch {
    Pair(i64, i64),
    LeadOnly(i64),
    Empty,
}

/// Builds [`RawSignal`]s from the edges of one channel.
#[derive(Debug, Clone, Default)]
pub struct SignalAssembler {
    config: SignalConfig,
}

impl SignalAssembler {
    /// Creates an assembler.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a limit or the window width is
    /// negative.
    pub fn new(config: SignalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Assembles the signal of one channel in one time window.
    ///
    /// An empty edge list produces an empty signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the edges belong to more than one
    /// channel.
    pub fn assemble(
        &self,
        channel: ChannelId,
        window_index: u64,
        edges: &[Edge],
        diagnostics: &mut Diagnostics,
    ) -> Result<RawSignal> {
        if let Some(stray) = edges.iter().find(|edge| edge.channel != channel) {
            return Err(Error::InvalidInput(format!(
                "edge of channel {} handed to the assembler of channel {channel}",
                stray.channel
            )));
        }

        let mut split = ThresholdEdges::default();
        for edge in edges {
            if self.config.contains(edge.time_ps) {
                split.push(edge);
            } else {
                diagnostics.edges_out_of_window += 1;
                log::debug!(
                    "channel {channel}: {:?} edge at {} ps outside window {window_index}",
                    edge.kind,
                    edge.time_ps
                );
            }
        }
        split.sort();

        let mut signal = RawSignal::new(channel, window_index);
        let mut lead_only = Vec::new();
        for threshold in Threshold::all() {
            let slot = ThresholdEdges::slot(threshold);
            match self.match_level(
                &split.leading[slot],
                &split.trailing[slot],
                &mut signal,
                diagnostics,
            ) {
                LevelMatch::Pair(lead, trail) => signal.set_pair(threshold, lead, trail),
                LevelMatch::LeadOnly(lead) => {
                    signal.set_leading(threshold, lead);
                    lead_only.push(threshold);
                }
                LevelMatch::Empty => {}
            }
        }

        for threshold in lead_only {
            let Some(upper) = threshold.next_up() else {
                continue;
            };
            let Some(lead) = signal.leading(threshold) else {
                continue;
            };
            let limit = self.config.max_lead_trail_separation_ps;
            let borrowed = split.trailing[ThresholdEdges::slot(upper)]
                .iter()
                .copied()
                .find(|&trail| trail >= lead && trail - lead <= limit);
            if let Some(trail) = borrowed {
                signal.set_pair(threshold, lead, trail);
                diagnostics.lead_trail_cross_threshold += 1;
            }
        }

        if !signal.is_empty() {
            diagnostics.signals_built += 1;
        }
        Ok(signal)
    }

    /// Assembles every channel of a time window, skipping empty signals.
    ///
    /// Signals come out ascending by channel.
    #[must_use]
    pub fn assemble_window(
        &self,
        collector: &EdgeCollector,
        diagnostics: &mut Diagnostics,
    ) -> Vec<RawSignal> {
        let window_index = collector.window_index();
        collector
            .iter()
            .filter_map(|(channel, edges)| {
                // The collector keys edges by channel, so this cannot fail.
                self.assemble(channel, window_index, edges, diagnostics)
                    .ok()
                    .filter(|signal| !signal.is_empty())
            })
            .collect()
    }

    /// Pairs the sorted edges of one threshold.
    fn match_level(
        &self,
        leading: &[i64],
        trailing: &[i64],
        signal: &mut RawSignal,
        diagnostics: &mut Diagnostics,
    ) -> LevelMatch {
        let mut used = vec![false; leading.len()];
        let mut pairs: Vec<(i64, i64)> = Vec::new();

        for &trail in trailing {
            let nearest = leading
                .iter()
                .enumerate()
                .rev()
                .find(|&(idx, &lead)| !used[idx] && lead <= trail);
            match nearest {
                None => {
                    diagnostics.edges_unpaired += 1;
                    signal.mark_corrupted();
                }
                Some((_, &lead)) if trail - lead > self.config.max_edge_separation_ps => {
                    diagnostics.edges_over_separation += 1;
                    signal.mark_corrupted();
                }
                Some((idx, &lead)) => {
                    used[idx] = true;
                    pairs.push((lead, trail));
                }
            }
        }

        let free_leads: Vec<i64> = leading
            .iter()
            .zip(&used)
            .filter(|(_, &taken)| !taken)
            .map(|(&lead, _)| lead)
            .collect();

        // Trailing edges arrive sorted, but the earliest pair is the one with
        // the earliest leading edge.
        if let Some(&first) = pairs.iter().min_by_key(|(lead, _)| *lead) {
            let surplus = 2 * (pairs.len() - 1) + free_leads.len();
            diagnostics.edges_unpaired += surplus as u64;
            LevelMatch::Pair(first.0, first.1)
        } else if let Some((&first, rest)) = free_leads.split_first() {
            diagnostics.edges_unpaired += rest.len() as u64;
            LevelMatch::LeadOnly(first)
        } else {
            LevelMatch::Empty
        }
    }
}
