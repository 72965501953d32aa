//! Event building: grouping time-ordered hits into candidate events.
//!
//! The first hit of a group is its seed. A following hit joins the group if
//! it lies strictly less than the event time window after the seed;
//! otherwise the group is closed and the hit seeds the next one. Groups
//! smaller than the minimum multiplicity are built but not emitted.
//!
//! [`EventBuilder::push`] drives the grouping incrementally through an
//! [`EventBuilderState`]; a change of time-window index closes the open
//! group, and [`EventBuilder::flush`] drains the tail at end of stream.

use crate::window::StreamPhase;
use petreco_core::config::EventConfig;
use petreco_core::diagnostics::Diagnostics;
use petreco_core::error::{Error, Result};
use petreco_core::event::Event;
use petreco_core::hit::Hit;

/// Open group of an event builder.
#[derive(Debug, Default)]
pub struct EventBuilderState {
    phase: StreamPhase,
    open: Vec<Hit>,
    window_index: u64,
    last_time_ps: Option<f64>,
}

impl EventBuilderState {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Hits in the open group.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    /// Discards the open group and returns to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Groups hits into [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    config: EventConfig,
}

impl EventBuilder {
    /// Creates an event builder.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the time window is negative.
    pub fn new(config: EventConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &EventConfig {
        &self.config
    }

    /// Creates an empty streaming state.
    #[must_use]
    pub fn create_state(&self) -> EventBuilderState {
        EventBuilderState::default()
    }

    /// Feeds one hit.
    ///
    /// Returns the event closed by this hit, if any and if it passes the
    /// multiplicity cut.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnorderedHits`] if the hit is earlier than the
    /// previous hit of the same time window, and [`Error::InvalidInput`] if
    /// the state was already flushed.
    pub fn push(
        &self,
        state: &mut EventBuilderState,
        hit: Hit,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Event>> {
        match state.phase {
            StreamPhase::Flushing => Err(Error::InvalidInput(
                "hit pushed after end of stream".to_string(),
            )),
            StreamPhase::Idle => {
                Self::open(state, hit);
                Ok(None)
            }
            StreamPhase::Accumulating => {
                if hit.window_index != state.window_index {
                    let closed = self.close(state, diagnostics);
                    Self::open(state, hit);
                    return Ok(closed);
                }
                if let Some(previous) = state.last_time_ps {
                    if hit.time_ps < previous {
                        return Err(Error::UnorderedHits {
                            previous,
                            next: hit.time_ps,
                        });
                    }
                }
                let seed_time = state.open.first().map_or(hit.time_ps, |seed| seed.time_ps);
                if hit.time_ps - seed_time < self.config.event_time_window_ps {
                    state.last_time_ps = Some(hit.time_ps);
                    state.open.push(hit);
                    Ok(None)
                } else {
                    let closed = self.close(state, diagnostics);
                    Self::open(state, hit);
                    Ok(closed)
                }
            }
        }
    }

    /// Signals end of stream and returns the last group as an event.
    pub fn flush(
        &self,
        state: &mut EventBuilderState,
        diagnostics: &mut Diagnostics,
    ) -> Option<Event> {
        let closed = if state.open.is_empty() {
            None
        } else {
            self.close(state, diagnostics)
        };
        state.phase = StreamPhase::Flushing;
        closed
    }

    /// Groups a whole batch of hits.
    ///
    /// Hits are sorted by window and time first, so the input order does not
    /// matter.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`EventBuilder::push`]; none occur for sorted
    /// input.
    pub fn build(&self, mut hits: Vec<Hit>, diagnostics: &mut Diagnostics) -> Result<Vec<Event>> {
        hits.sort_by(|a, b| {
            a.window_index
                .cmp(&b.window_index)
                .then(a.time_ps.total_cmp(&b.time_ps))
        });

        let mut state = self.create_state();
        let mut events = Vec::new();
        for hit in hits {
            if let Some(event) = self.push(&mut state, hit, diagnostics)? {
                events.push(event);
            }
        }
        events.extend(self.flush(&mut state, diagnostics));
        Ok(events)
    }

    fn open(state: &mut EventBuilderState, hit: Hit) {
        state.phase = StreamPhase::Accumulating;
        state.window_index = hit.window_index;
        state.last_time_ps = Some(hit.time_ps);
        state.open.clear();
        state.open.push(hit);
    }

    fn close(&self, state: &mut EventBuilderState, diagnostics: &mut Diagnostics) -> Option<Event> {
        let hits = std::mem::take(&mut state.open);
        state.phase = StreamPhase::Idle;
        state.last_time_ps = None;
        diagnostics.events_built += 1;
        if hits.len() < self.config.min_multiplicity {
            diagnostics.events_below_multiplicity += 1;
            return None;
        }
        diagnostics.events_emitted += 1;
        Some(Event::new(hits, state.window_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petreco_core::event::RecoFlag;
    use petreco_core::signal::{Origin, Quality};
    use petreco_core::Vector3;

    fn hit(time: f64) -> Hit {
        Hit::detached(0, Vector3::zeros(), 0.0, time)
    }

    fn builder(window: f64, min: usize) -> EventBuilder {
        EventBuilder::new(
            EventConfig::default()
                .with_time_window(window)
                .with_min_multiplicity(min),
        )
        .unwrap()
    }

    #[test]
    fn test_groups_relative_to_seed() {
        let mut diag = Diagnostics::new();
        let events = builder(1_000.0, 1)
            .build(
                vec![hit(0.0), hit(600.0), hit(999.0), hit(1_000.0), hit(1_500.0)],
                &mut diag,
            )
            .unwrap();

        let sizes: Vec<usize> = events.iter().map(Event::multiplicity).collect();
        assert_eq!(sizes, vec![3, 2]);
        assert_eq!(diag.events_built, 2);
        assert_eq!(diag.events_emitted, 2);
    }

    #[test]
    fn test_every_hit_lands_in_exactly_one_group() {
        let times = [40.0, 5.0, 3_000.0, 2_999.0, 10_000.0, 7.5, 12_000.0];
        let mut diag = Diagnostics::new();
        let events = builder(500.0, 1)
            .build(times.iter().map(|&t| hit(t)).collect(), &mut diag)
            .unwrap();

        let total: usize = events.iter().map(Event::multiplicity).sum();
        assert_eq!(total, times.len());
        for event in &events {
            let hits = event.hits();
            assert!(hits.windows(2).all(|w| w[0].time_ps <= w[1].time_ps));
            let seed = hits[0].time_ps;
            assert!(hits.iter().all(|h| h.time_ps - seed < 500.0));
        }
    }

    #[test]
    fn test_multiplicity_cut_counts_dropped_groups() {
        let mut diag = Diagnostics::new();
        let events = builder(100.0, 2)
            .build(vec![hit(0.0), hit(50.0), hit(1_000.0)], &mut diag)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(diag.events_built, 2);
        assert_eq!(diag.events_below_multiplicity, 1);
        assert_eq!(diag.events_emitted, 1);
    }

    #[test]
    fn test_streaming_rejects_unordered_hits() {
        let builder = builder(1_000.0, 1);
        let mut state = builder.create_state();
        let mut diag = Diagnostics::new();
        builder.push(&mut state, hit(100.0), &mut diag).unwrap();
        let err = builder.push(&mut state, hit(50.0), &mut diag).unwrap_err();
        assert!(matches!(err, Error::UnorderedHits { .. }));
    }

    #[test]
    fn test_window_change_closes_group() {
        let builder = builder(1_000.0, 1);
        let mut state = builder.create_state();
        let mut diag = Diagnostics::new();

        assert!(builder.push(&mut state, hit(-100.0), &mut diag).unwrap().is_none());
        assert_eq!(state.phase(), StreamPhase::Accumulating);
        let closed = builder
            .push(&mut state, hit(-900.0).with_window(1), &mut diag)
            .unwrap()
            .unwrap();
        assert_eq!(closed.window_index(), 0);
        assert_eq!(state.pending(), 1);

        let tail = builder.flush(&mut state, &mut diag).unwrap();
        assert_eq!(tail.window_index(), 1);
        assert_eq!(state.phase(), StreamPhase::Flushing);
        assert!(builder.push(&mut state, hit(0.0), &mut diag).is_err());

        state.reset();
        assert_eq!(state.phase(), StreamPhase::Idle);
    }

    #[test]
    fn test_empty_input_produces_no_events() {
        let mut diag = Diagnostics::new();
        let events = builder(1_000.0, 1).build(Vec::new(), &mut diag).unwrap();
        assert!(events.is_empty());
        assert_eq!(diag.events_built, 0);
    }

    #[test]
    fn test_reco_flag_from_hits() {
        let mut diag = Diagnostics::new();
        let events = builder(1_000.0, 1)
            .build(
                vec![
                    hit(0.0).with_origin(Origin::Mc),
                    hit(10.0).with_quality(Quality::Corrupted),
                ],
                &mut diag,
            )
            .unwrap();
        assert_eq!(events[0].reco_flag(), RecoFlag::Corrupted);
    }
}
