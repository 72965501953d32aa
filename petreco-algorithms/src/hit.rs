//! Hit building: matching the two ends of each scintillator strip.
//!
//! Signals are grouped per scintillator into side-A and side-B lists. Each
//! list is sorted by reference time (the threshold-1 leading edge; signals
//! without one are skipped), and a side-A signal is matched with every side-B signal whose
//! reference time lies strictly within the coincidence window. Because both
//! lists are sorted, the scan over side B stops as soon as the difference
//! exceeds the window.
//!
//! The hit time is the mean of the two reference times. The position along
//! the strip follows from the time difference and the effective light
//! velocity in the scintillator, with side A at negative z.
#![allow(clippy::cast_precision_loss)]

use petreco_core::config::{HitConfig, MatchPolicy};
use petreco_core::diagnostics::Diagnostics;
use petreco_core::error::{Error, Result};
use petreco_core::geometry::{DetectorGeometry, Scintillator, ScintillatorId, Side};
use petreco_core::hit::Hit;
use petreco_core::signal::{Origin, Quality, RawSignal};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Signals of one scintillator, split by read-out side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidePair {
    /// Signals from side A.
    pub a: Vec<Arc<RawSignal>>,
    /// Signals from side B.
    pub b: Vec<Arc<RawSignal>>,
}

impl SidePair {
    /// Returns true if both sides have signals.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.a.is_empty() && !self.b.is_empty()
    }
}

/// Signals of one time window keyed by scintillator.
pub type ScintillatorSignals = BTreeMap<ScintillatorId, SidePair>;

/// A signal ready for matching: its reference time and index in its list.
#[derive(Debug, Clone, Copy)]
struct Timed {
    time_ps: i64,
    index: usize,
}

/// Pairs side-A and side-B signals into [`Hit`]s.
pub struct HitBuilder<'g, G: DetectorGeometry + ?Sized> {
    config: HitConfig,
    geometry: &'g G,
}

impl<'g, G: DetectorGeometry + ?Sized> HitBuilder<'g, G> {
    /// Creates a hit builder.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the coincidence window or the
    /// effective velocity is negative.
    pub fn new(config: HitConfig, geometry: &'g G) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, geometry })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &HitConfig {
        &self.config
    }

    /// Sorts signals into per-scintillator side lists using the geometry.
    ///
    /// Signals whose photomultiplier is unknown are dropped and counted.
    pub fn group(
        &self,
        signals: impl IntoIterator<Item = RawSignal>,
        diagnostics: &mut Diagnostics,
    ) -> ScintillatorSignals {
        let mut grouped = ScintillatorSignals::new();
        for signal in signals {
            let Some(info) = self.geometry.pm(signal.pm_id()) else {
                diagnostics.signals_unmapped += 1;
                log::debug!("no geometry entry for PM {}", signal.pm_id());
                continue;
            };
            let entry = grouped.entry(info.scintillator_id).or_default();
            match info.side {
                Side::A => entry.a.push(Arc::new(signal)),
                Side::B => entry.b.push(Arc::new(signal)),
            }
        }
        grouped
    }

    /// Builds hits from per-scintillator side lists.
    ///
    /// Hits come out sorted by time. The input is not modified, so calling
    /// this twice yields the same hits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a list holds a signal from another
    /// scintillator or side, or if the two sides come from different time
    /// windows, and [`Error::MissingScintillator`] if the geometry has no
    /// placement for a scintillator.
    pub fn build(
        &self,
        signals: &ScintillatorSignals,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();
        for (&id, sides) in signals {
            if !sides.is_complete() {
                if !sides.a.is_empty() || !sides.b.is_empty() {
                    diagnostics.one_sided_scintillators += 1;
                }
                continue;
            }
            self.check_sides(id, sides)?;
            let scintillator = self
                .geometry
                .scintillator(id)
                .ok_or(Error::MissingScintillator { id })?;

            let side_a = Self::timed(&sides.a, diagnostics);
            let side_b = Self::timed(&sides.b, diagnostics);
            let pairs = match self.config.match_policy {
                MatchPolicy::AllPairs => self.all_pairs(&side_a, &side_b),
                MatchPolicy::NearestExclusive => self.nearest_exclusive(&side_a, &side_b),
            };
            diagnostics.ambiguous_matches += Self::count_shared(&pairs);

            for (a, b) in pairs {
                hits.push(self.make_hit(
                    &scintillator,
                    &sides.a[a.index],
                    &sides.b[b.index],
                    a.time_ps,
                    b.time_ps,
                ));
            }
        }

        hits.sort_by(|x, y| x.time_ps.total_cmp(&y.time_ps));
        diagnostics.hits_built += hits.len() as u64;
        Ok(hits)
    }

    fn check_sides(&self, id: ScintillatorId, sides: &SidePair) -> Result<()> {
        let window = sides.a[0].window_index();
        for (list, side) in [(&sides.a, Side::A), (&sides.b, Side::B)] {
            for signal in list {
                let info = self.geometry.pm(signal.pm_id()).ok_or(Error::MissingGeometry {
                    pm_id: signal.pm_id(),
                })?;
                if info.scintillator_id != id || info.side != side {
                    return Err(Error::InvalidInput(format!(
                        "PM {} listed as side {side:?} of scintillator {id}",
                        signal.pm_id()
                    )));
                }
                if signal.window_index() != window {
                    return Err(Error::InvalidInput(format!(
                        "scintillator {id} mixes time windows {window} and {}",
                        signal.window_index()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Reference times of one side, ascending; signals without one are
    /// skipped and counted.
    fn timed(list: &[Arc<RawSignal>], diagnostics: &mut Diagnostics) -> Vec<Timed> {
        let mut timed: Vec<Timed> = list
            .iter()
            .enumerate()
            .filter_map(|(index, signal)| match signal.reference_time() {
                Some(time_ps) => Some(Timed { time_ps, index }),
                None => {
                    diagnostics.signals_without_reference += 1;
                    None
                }
            })
            .collect();
        timed.sort_by_key(|t| (t.time_ps, t.index));
        timed
    }

    fn within_window(&self, a: Timed, b: Timed) -> bool {
        ((b.time_ps - a.time_ps).abs() as f64) < self.config.coincidence_window_ps
    }

    fn all_pairs(&self, side_a: &[Timed], side_b: &[Timed]) -> Vec<(Timed, Timed)> {
        let window = self.config.coincidence_window_ps;
        let mut pairs = Vec::new();
        for &a in side_a {
            for &b in side_b {
                if (b.time_ps - a.time_ps) as f64 >= window {
                    break;
                }
                if self.within_window(a, b) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    /// Greedy one-to-one matching by smallest time difference.
    fn nearest_exclusive(&self, side_a: &[Timed], side_b: &[Timed]) -> Vec<(Timed, Timed)> {
        let mut candidates = self.all_pairs(side_a, side_b);
        candidates.sort_by_key(|(a, b)| ((b.time_ps - a.time_ps).abs(), a.time_ps, b.time_ps));

        let mut used_a = BTreeSet::new();
        let mut used_b = BTreeSet::new();
        let mut pairs = Vec::new();
        for (a, b) in candidates {
            if used_a.contains(&a.index) || used_b.contains(&b.index) {
                continue;
            }
            used_a.insert(a.index);
            used_b.insert(b.index);
            pairs.push((a, b));
        }
        pairs.sort_by_key(|(a, b)| (a.time_ps, b.time_ps));
        pairs
    }

    /// Signals used by more than one hit.
    fn count_shared(pairs: &[(Timed, Timed)]) -> u64 {
        let mut uses_a: BTreeMap<usize, u32> = BTreeMap::new();
        let mut uses_b: BTreeMap<usize, u32> = BTreeMap::new();
        for (a, b) in pairs {
            *uses_a.entry(a.index).or_default() += 1;
            *uses_b.entry(b.index).or_default() += 1;
        }
        uses_a
            .values()
            .chain(uses_b.values())
            .filter(|&&n| n > 1)
            .count() as u64
    }

    fn make_hit(
        &self,
        scintillator: &Scintillator,
        side_a: &Arc<RawSignal>,
        side_b: &Arc<RawSignal>,
        time_a: i64,
        time_b: i64,
    ) -> Hit {
        let time_ps = (time_a as f64 + time_b as f64) / 2.0;
        let z = self.config.velocity_cm_per_ps() * (time_a - time_b) as f64 / 2.0;

        let quality = if side_a.quality() == Quality::Corrupted
            || side_b.quality() == Quality::Corrupted
        {
            Quality::Corrupted
        } else {
            Quality::Good
        };
        let origin = if side_a.origin() == Origin::Mc || side_b.origin() == Origin::Mc {
            Origin::Mc
        } else {
            Origin::Data
        };

        Hit {
            scintillator_id: scintillator.id,
            side_a: Arc::clone(side_a),
            side_b: Arc::clone(side_b),
            time_ps,
            position_along_strip_cm: z,
            position: scintillator.position_at(z),
            slot_theta_deg: scintillator.theta_deg,
            window_index: side_a.window_index(),
            tot_ps: (side_a.tot_sum() + side_b.tot_sum()) as f64,
            quality,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use petreco_core::edge::Threshold;
    use petreco_core::geometry::BarrelGeometry;

    fn geometry() -> BarrelGeometry {
        BarrelGeometry::single_ring(42.5, 4, 50.0)
    }

    fn signal(pm: u32, lead: i64, trail: i64) -> RawSignal {
        let mut s = RawSignal::new(pm, 0);
        s.set_pair(Threshold::FIRST, lead, trail);
        s
    }

    fn pm(id: ScintillatorId, side: Side) -> u32 {
        BarrelGeometry::pm_id(id, side)
    }

    #[test]
    fn test_single_pair_time_and_position() {
        let geo = geometry();
        let builder = HitBuilder::new(
            HitConfig::default()
                .with_coincidence_window(5_000.0)
                .with_effective_velocity(12.0),
            &geo,
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![
                signal(pm(1, Side::A), -2_000, -1_500),
                signal(pm(1, Side::B), -1_000, -600),
            ],
            &mut diag,
        );
        let hits = builder.build(&grouped, &mut diag).unwrap();

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.scintillator_id, 1);
        assert_relative_eq!(hit.time_ps, -1_500.0);
        // 0.012 cm/ps * (-1000 ps) / 2
        assert_relative_eq!(hit.position_along_strip_cm, -6.0, epsilon = 1e-12);
        assert_relative_eq!(hit.position.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hit.position.y, 42.5, epsilon = 1e-9);
        assert_relative_eq!(hit.slot_theta_deg, 90.0);
        assert_relative_eq!(hit.tot_ps, 900.0);
        assert_eq!(hit.time_diff_ab(), Some(-1_000));
        assert_eq!(diag.hits_built, 1);
    }

    #[test]
    fn test_hit_time_between_side_times() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![
                signal(pm(0, Side::A), -4_100, -3_000),
                signal(pm(0, Side::B), -200, 0),
            ],
            &mut diag,
        );
        for hit in builder.build(&grouped, &mut diag).unwrap() {
            let a = hit.side_a.reference_time().unwrap() as f64;
            let b = hit.side_b.reference_time().unwrap() as f64;
            assert!(hit.time_ps >= a.min(b) && hit.time_ps <= a.max(b));
        }
    }

    #[test]
    fn test_window_is_strict_and_short_circuits() {
        let geo = geometry();
        let builder = HitBuilder::new(
            HitConfig::default().with_coincidence_window(1_000.0),
            &geo,
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![
                signal(pm(2, Side::A), -10_000, -9_000),
                signal(pm(2, Side::B), -9_000, -8_000),
                signal(pm(2, Side::B), -9_500, -8_000),
            ],
            &mut diag,
        );
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].side_b.reference_time(), Some(-9_500));
    }

    #[test]
    fn test_all_pairs_reports_ambiguity() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![
                signal(pm(3, Side::A), -1_000, 0),
                signal(pm(3, Side::B), -1_200, 0),
                signal(pm(3, Side::B), -900, 0),
            ],
            &mut diag,
        );
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(Arc::ptr_eq(&hits[0].side_a, &hits[1].side_a));
        assert_eq!(diag.ambiguous_matches, 1);
    }

    #[test]
    fn test_nearest_exclusive_uses_each_signal_once() {
        let geo = geometry();
        let builder = HitBuilder::new(
            HitConfig::default().with_match_policy(MatchPolicy::NearestExclusive),
            &geo,
        )
        .unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![
                signal(pm(3, Side::A), -1_000, 0),
                signal(pm(3, Side::B), -1_200, 0),
                signal(pm(3, Side::B), -900, 0),
            ],
            &mut diag,
        );
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].side_b.reference_time(), Some(-900));
        assert_eq!(diag.ambiguous_matches, 0);
    }

    #[test]
    fn test_build_is_idempotent() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![
                signal(pm(0, Side::A), -3_000, 0),
                signal(pm(0, Side::B), -2_000, 0),
                signal(pm(1, Side::A), -8_000, 0),
                signal(pm(1, Side::B), -7_500, 0),
            ],
            &mut diag,
        );
        let first = builder.build(&grouped, &mut diag).unwrap();
        let second = builder.build(&grouped, &mut diag).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_sided_and_unmapped_signals_are_counted() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(
            vec![signal(pm(0, Side::A), -3_000, 0), signal(999, -3_000, 0)],
            &mut diag,
        );
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert!(hits.is_empty());
        assert_eq!(diag.signals_unmapped, 1);
        assert_eq!(diag.one_sided_scintillators, 1);
    }

    #[test]
    fn test_signals_above_first_threshold_only_make_no_hit() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let second = Threshold::new(2).unwrap();
        let signals = [Side::A, Side::B].map(|side| {
            let mut s = RawSignal::new(pm(0, side), 0);
            s.set_pair(second, -1_000, -500);
            s
        });
        let mut diag = Diagnostics::new();
        let grouped = builder.group(signals, &mut diag);
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert!(hits.is_empty());
        assert_eq!(diag.signals_without_reference, 2);
        assert_eq!(diag.hits_built, 0);
    }

    #[test]
    fn test_signals_without_reference_are_skipped() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut diag = Diagnostics::new();
        let mut grouped = ScintillatorSignals::new();
        grouped.insert(
            0,
            SidePair {
                a: vec![Arc::new(RawSignal::new(pm(0, Side::A), 0))],
                b: vec![Arc::new(signal(pm(0, Side::B), -10, 0))],
            },
        );
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert!(hits.is_empty());
        assert_eq!(diag.signals_without_reference, 1);
    }

    #[test]
    fn test_mismatched_windows_are_rejected() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut grouped = ScintillatorSignals::new();
        let mut late = RawSignal::new(pm(0, Side::B), 1);
        late.set_pair(Threshold::FIRST, -10, 0);
        grouped.insert(
            0,
            SidePair {
                a: vec![Arc::new(signal(pm(0, Side::A), -10, 0))],
                b: vec![Arc::new(late)],
            },
        );
        let mut diag = Diagnostics::new();
        assert!(matches!(
            builder.build(&grouped, &mut diag),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_wrong_side_is_rejected() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut grouped = ScintillatorSignals::new();
        grouped.insert(
            0,
            SidePair {
                a: vec![Arc::new(signal(pm(0, Side::B), -10, 0))],
                b: vec![Arc::new(signal(pm(0, Side::B), -10, 0))],
            },
        );
        let mut diag = Diagnostics::new();
        assert!(builder.build(&grouped, &mut diag).is_err());
    }

    #[test]
    fn test_negative_window_is_fatal() {
        let geo = geometry();
        let config = HitConfig::default().with_coincidence_window(-1.0);
        assert!(matches!(
            HitBuilder::new(config, &geo),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_corrupted_side_corrupts_hit() {
        let geo = geometry();
        let builder = HitBuilder::new(HitConfig::default(), &geo).unwrap();
        let mut bad = signal(pm(0, Side::B), -20, 0);
        bad.mark_corrupted();
        let mut diag = Diagnostics::new();
        let grouped = builder.group(vec![signal(pm(0, Side::A), -10, 0), bad], &mut diag);
        let hits = builder.build(&grouped, &mut diag).unwrap();
        assert!(hits[0].is_corrupted());
    }
}
