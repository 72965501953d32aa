//! Event classification and vertex reconstruction.
//!
//! Classification looks at every hit pair and every hit triple of an event:
//! - A pair is first put through the scatter test, with the earlier hit as
//!   primary. Scattered pairs mark the event `SCATTERED` and take no further
//!   part.
//! - The remaining pairs that are back to back, in time and with
//!   annihilation-like ToT on both hits make the event `TWO_GAMMA`.
//! - A triple whose two smallest opening angles (about the source) sum
//!   above the configured minimum makes it `THREE_GAMMA`.
//! - `PROMPT` and `COSMIC` are ToT tags.
//!
//! Three-hit events also get a decay vertex from the closed-form solver,
//! optionally improved by a [`DecayRefiner`]. A failed vertex is counted and
//! withholds the `THREE_GAMMA` flag.

use crate::decay::DecaySolver;
use crate::observables::{
    annihilation_point, opening_angle, ordered_time_of_flight, relative_time, slot_ordered,
};
use crate::refine::{ChamberRadiusRefiner, DecayRefiner};
use crate::scatter::{scatter_test, ScatterTest};
use petreco_core::config::ReconstructionConfig;
use petreco_core::diagnostics::Diagnostics;
use petreco_core::error::Result;
use petreco_core::event::{DecayPoint, DecayStatus, Event, EventType};
use petreco_core::hit::Hit;
use petreco_core::Vector3;

/// Observables of one hit pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairObservables {
    /// Index of the hit at the smaller slot angle.
    pub first: usize,
    /// Index of the other hit.
    pub second: usize,
    /// Absolute time difference (ps).
    pub relative_time_ps: f64,
    /// Opening angle about the source (degrees).
    pub angle_deg: f64,
    /// Time of flight in slot-angle order (ps).
    pub tof_ps: f64,
    /// Annihilation point on the line of response (cm).
    pub annihilation_point: Vector3<f64>,
    /// Rejected by the scatter test.
    pub scattered: bool,
    /// Passes the back-to-back selection.
    pub back_to_back: bool,
}

/// Per-event reconstruction products.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconstruction {
    /// One entry per hit pair, `(i, j)` with `i < j` in hit order.
    pub pairs: Vec<PairObservables>,
    /// Decay vertex of a three-hit event.
    pub decay: Option<DecayPoint>,
}

impl Reconstruction {
    /// Annihilation points of the back-to-back pairs.
    pub fn annihilation_points(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.pairs
            .iter()
            .filter(|pair| pair.back_to_back)
            .map(|pair| pair.annihilation_point)
    }
}

/// An event together with what was reconstructed from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedEvent {
    /// The classified event.
    pub event: Event,
    /// Pair observables and decay vertex.
    pub reconstruction: Reconstruction,
}

/// Classifies events and reconstructs their vertices.
pub struct EventReconstructor {
    config: ReconstructionConfig,
    scatter: Box<dyn ScatterTest>,
    solver: DecaySolver,
    refiner: Option<Box<dyn DecayRefiner>>,
}

impl EventReconstructor {
    /// Creates a reconstructor.
    ///
    /// The scatter test follows the configured policy, and the chamber
    /// radius refiner is installed when refinement is enabled.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a cut is invalid.
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        config.validate()?;
        let refiner: Option<Box<dyn DecayRefiner>> = if config.refine.enabled {
            Some(Box::new(ChamberRadiusRefiner::new(&config)))
        } else {
            None
        };
        Ok(Self {
            scatter: scatter_test(&config.scatter),
            solver: DecaySolver::new(&config),
            refiner,
            config,
        })
    }

    /// Replaces the scatter test.
    #[must_use]
    pub fn with_scatter_test(mut self, scatter: Box<dyn ScatterTest>) -> Self {
        self.scatter = scatter;
        self
    }

    /// Replaces (or installs) the vertex refiner.
    #[must_use]
    pub fn with_refiner(mut self, refiner: Box<dyn DecayRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Runs the scatter test with the earlier hit as primary.
    #[must_use]
    pub fn is_scattered(&self, a: &Hit, b: &Hit) -> bool {
        let (primary, secondary) = if a.time_ps <= b.time_ps { (a, b) } else { (b, a) };
        self.scatter
            .is_scattered(primary, secondary, &self.config.source_position)
    }

    fn in_tot_window(&self, hit: &Hit) -> bool {
        (self.config.tot_min_ps..=self.config.tot_max_ps).contains(&hit.tot())
    }

    /// Observables of every hit pair.
    #[must_use]
    pub fn pair_observables(&self, event: &Event) -> Vec<PairObservables> {
        let hits = event.hits();
        let source = &self.config.source_position;
        let mut pairs = Vec::with_capacity(hits.len() * hits.len().saturating_sub(1) / 2);
        for i in 0..hits.len() {
            for j in (i + 1)..hits.len() {
                let (a, b) = (&hits[i], &hits[j]);
                let (first, second) = if std::ptr::eq(slot_ordered(a, b).0, a) {
                    (i, j)
                } else {
                    (j, i)
                };
                let relative_time_ps = relative_time(a, b);
                let angle_deg = opening_angle(a, b, source);
                let scattered = self.is_scattered(a, b);
                let back_to_back = !scattered
                    && self.in_tot_window(a)
                    && self.in_tot_window(b)
                    && relative_time_ps < self.config.max_time_diff_ps
                    && 180.0 - angle_deg < self.config.max_theta_diff_deg;
                pairs.push(PairObservables {
                    first,
                    second,
                    relative_time_ps,
                    angle_deg,
                    tof_ps: ordered_time_of_flight(a, b),
                    annihilation_point: annihilation_point(a, b),
                    scattered,
                    back_to_back,
                });
            }
        }
        pairs
    }

    /// Returns true if some hit triple is three-photon like.
    #[must_use]
    pub fn has_three_gamma_triple(&self, event: &Event) -> bool {
        let hits = event.hits();
        let source = &self.config.source_position;
        let n = hits.len();
        for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    let mut angles = [
                        opening_angle(&hits[i], &hits[j], source),
                        opening_angle(&hits[j], &hits[k], source),
                        opening_angle(&hits[i], &hits[k], source),
                    ];
                    angles.sort_by(f64::total_cmp);
                    if angles[0] + angles[1] > self.config.min_three_gamma_angle_sum_deg {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn flags_from(&self, event: &Event, pairs: &[PairObservables]) -> EventType {
        let mut flags = EventType::default();
        if pairs.iter().any(|pair| pair.scattered) {
            flags.mark(EventType::SCATTERED);
        }
        if pairs.iter().any(|pair| pair.back_to_back) {
            flags.mark(EventType::TWO_GAMMA);
        }
        if self.has_three_gamma_triple(event) {
            flags.mark(EventType::THREE_GAMMA);
        }

        let deex = self.config.deex_tot_min_ps..=self.config.deex_tot_max_ps;
        if event.hits().iter().any(|hit| deex.contains(&hit.tot())) {
            flags.mark(EventType::PROMPT);
        }
        let high_tot = event
            .hits()
            .iter()
            .filter(|hit| hit.tot() > self.config.cosmic_tot_min_ps)
            .count();
        if self.config.cosmic_min_hits > 0 && high_tot >= self.config.cosmic_min_hits {
            flags.mark(EventType::COSMIC);
        }
        flags
    }

    /// Classification flags of an event. Does not modify the event.
    #[must_use]
    pub fn classify(&self, event: &Event) -> EventType {
        self.flags_from(event, &self.pair_observables(event))
    }

    /// Decay vertex of three hits, refined when a refiner is installed.
    pub fn decay_point(&self, hits: [&Hit; 3], diagnostics: &mut Diagnostics) -> DecayPoint {
        let seed = self.solver.solve(hits);
        match seed.status {
            DecayStatus::Ok => {}
            DecayStatus::NoRealSolution => diagnostics.decay_no_real_solution += 1,
            DecayStatus::OutOfPhysicalRange => diagnostics.decay_out_of_range += 1,
            DecayStatus::NumericallyInvalid => diagnostics.decay_numerically_invalid += 1,
        }
        if !seed.is_ok() {
            log::debug!("three-hit vertex rejected: {}", seed.status);
            return seed;
        }

        let Some(refiner) = &self.refiner else {
            return seed;
        };
        let positions = hits.map(Hit::position);
        let times = hits.map(|hit| hit.time_ps);
        if let Some(refined) = refiner.refine(&positions, &times, &seed) {
            diagnostics.decay_refined += 1;
            refined
        } else {
            diagnostics.decay_refine_fallback += 1;
            seed
        }
    }

    /// Classifies an event and reconstructs what it supports.
    pub fn reconstruct(
        &self,
        mut event: Event,
        diagnostics: &mut Diagnostics,
    ) -> ReconstructedEvent {
        let pairs = self.pair_observables(&event);
        diagnostics.pairs_scattered += pairs.iter().filter(|pair| pair.scattered).count() as u64;
        let mut flags = self.flags_from(&event, &pairs);

        let decay = match event.hits() {
            [a, b, c] => {
                let point = self.decay_point([a, b, c], diagnostics);
                if !point.is_ok() {
                    flags.remove(EventType::THREE_GAMMA);
                }
                Some(point)
            }
            _ => None,
        };

        event.add_flag(flags.difference(EventType::UNKNOWN));

        ReconstructedEvent {
            event,
            reconstruction: Reconstruction { pairs, decay },
        }
    }
}
