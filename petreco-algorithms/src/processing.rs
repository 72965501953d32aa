//! High-level processing that chains the stages over time windows.
//!
//! A [`WindowPipeline`] takes the edges of one time window through
//! calibration, signal assembly, hit building, event building and
//! reconstruction. Windows are independent, so [`process_windows`] runs them
//! in parallel and returns the outputs in window order.

use crate::event::EventBuilder;
use crate::hit::HitBuilder;
use crate::reconstruction::{EventReconstructor, ReconstructedEvent};
use crate::signal::SignalAssembler;
use crate::window::WindowAccumulator;
use petreco_core::calibration::TimeCalibration;
use petreco_core::config::PipelineConfig;
use petreco_core::diagnostics::{Diagnostics, RunContext};
use petreco_core::edge::{Edge, EdgeCollector};
use petreco_core::error::Result;
use petreco_core::geometry::DetectorGeometry;
use rayon::prelude::*;

/// Everything produced from one time window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOutput {
    /// Index of the time window.
    pub window_index: u64,
    /// Reconstructed events, in time order.
    pub events: Vec<ReconstructedEvent>,
    /// Counters collected while processing the window.
    pub diagnostics: Diagnostics,
}

/// The full per-window reconstruction chain.
pub struct WindowPipeline<'g, G: DetectorGeometry + ?Sized> {
    calibration: Option<&'g TimeCalibration>,
    assembler: SignalAssembler,
    hits: HitBuilder<'g, G>,
    events: EventBuilder,
    reconstructor: EventReconstructor,
}

impl<'g, G: DetectorGeometry + ?Sized> WindowPipeline<'g, G> {
    /// Builds every stage from one configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any stage rejects its settings.
    pub fn new(config: &PipelineConfig, geometry: &'g G) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calibration: None,
            assembler: SignalAssembler::new(config.signal.clone())?,
            hits: HitBuilder::new(config.hit.clone(), geometry)?,
            events: EventBuilder::new(config.event.clone())?,
            reconstructor: EventReconstructor::new(config.reconstruction.clone())?,
        })
    }

    /// Applies a time calibration to every edge before assembly.
    #[must_use]
    pub fn with_calibration(mut self, calibration: &'g TimeCalibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Replaces the reconstructor, e.g. to install a custom scatter test.
    #[must_use]
    pub fn with_reconstructor(mut self, reconstructor: EventReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    /// The reconstruction stage.
    #[must_use]
    pub fn reconstructor(&self) -> &EventReconstructor {
        &self.reconstructor
    }

    /// Processes one time window.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage detects a contract violation or the
    /// geometry lacks an entry the data refers to.
    pub fn process(&self, window: &EdgeCollector) -> Result<WindowOutput> {
        let mut diagnostics = Diagnostics::new();

        let calibrated;
        let window = match self.calibration {
            Some(calibration) if !calibration.is_empty() => {
                let mut shifted = EdgeCollector::new(window.window_index());
                for (_, edges) in window.iter() {
                    shifted.extend(edges.iter().map(|&edge| calibration.apply(edge)));
                }
                calibrated = shifted;
                &calibrated
            }
            _ => window,
        };

        let signals = self.assembler.assemble_window(window, &mut diagnostics);
        let grouped = self.hits.group(signals, &mut diagnostics);
        let hits = self.hits.build(&grouped, &mut diagnostics)?;
        let events = self.events.build(hits, &mut diagnostics)?;
        let events: Vec<ReconstructedEvent> = events
            .into_iter()
            .map(|event| self.reconstructor.reconstruct(event, &mut diagnostics))
            .collect();

        diagnostics.windows_processed += 1;
        log::trace!(
            "window {}: {} edges, {} hits, {} events",
            window.window_index(),
            window.len(),
            diagnostics.hits_built,
            diagnostics.events_emitted
        );
        Ok(WindowOutput {
            window_index: window.window_index(),
            events,
            diagnostics,
        })
    }
}

/// Processes windows in parallel, returning outputs in window order.
///
/// # Errors
///
/// Returns the first error any window produced.
pub fn process_windows<G>(
    pipeline: &WindowPipeline<'_, G>,
    windows: &[EdgeCollector],
) -> Result<Vec<WindowOutput>>
where
    G: DetectorGeometry + ?Sized,
{
    let mut outputs = windows
        .par_iter()
        .map(|window| pipeline.process(window))
        .collect::<Result<Vec<_>>>()?;
    outputs.sort_by_key(|output| output.window_index);
    Ok(outputs)
}

/// Processes a stream of `(window_index, edge)` pairs.
///
/// Edges are grouped into windows as they arrive and handed to the pipeline
/// in batches of `batch_windows`, each batch processed in parallel. Every
/// emitted event is passed to `sink` together with its run-wide event
/// number, and the window counters are folded into `run`.
///
/// # Errors
///
/// Returns the first error from the pipeline or the sink.
pub fn process_stream<G, I, F, E>(
    pipeline: &WindowPipeline<'_, G>,
    edges: I,
    batch_windows: usize,
    run: &mut RunContext,
    mut sink: F,
) -> std::result::Result<(), E>
where
    G: DetectorGeometry + ?Sized,
    I: IntoIterator<Item = (u64, Edge)>,
    F: FnMut(u64, &ReconstructedEvent) -> std::result::Result<(), E>,
    E: From<petreco_core::error::Error>,
{
    let batch_windows = batch_windows.max(1);
    let mut accumulator = WindowAccumulator::new();
    let mut batch = Vec::with_capacity(batch_windows);

    let mut drain = |batch: &mut Vec<EdgeCollector>,
                     run: &mut RunContext|
     -> std::result::Result<(), E> {
        let outputs = process_windows(pipeline, batch)?;
        batch.clear();
        for output in outputs {
            run.record(&output.diagnostics);
            let first = run.reserve_event_numbers(output.events.len() as u64);
            for (offset, event) in output.events.iter().enumerate() {
                sink(first + offset as u64, event)?;
            }
        }
        Ok(())
    };

    for (window_index, edge) in edges {
        if let Some(closed) = accumulator.push(window_index, edge)? {
            batch.push(closed);
            if batch.len() >= batch_windows {
                drain(&mut batch, run)?;
            }
        }
    }
    batch.extend(accumulator.flush());
    if !batch.is_empty() {
        drain(&mut batch, run)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use petreco_core::edge::Threshold;
    use petreco_core::geometry::{BarrelGeometry, Side};

    fn pair_edges(pm: u32, lead: i64) -> [Edge; 2] {
        [
            Edge::leading(pm, Threshold::FIRST, lead),
            Edge::trailing(pm, Threshold::FIRST, lead + 15_000),
        ]
    }

    /// One window with a hit in scintillator 0 and one in scintillator 2.
    fn window(index: u64) -> EdgeCollector {
        let mut collector = EdgeCollector::new(index);
        let pm = BarrelGeometry::pm_id;
        collector.extend(pair_edges(pm(0, Side::A), -500_000));
        collector.extend(pair_edges(pm(0, Side::B), -499_800));
        collector.extend(pair_edges(pm(2, Side::A), -498_000));
        collector.extend(pair_edges(pm(2, Side::B), -498_100));
        collector
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::new();
        config.event.event_time_window_ps = 10_000.0;
        config
    }

    #[test]
    fn test_window_yields_one_event() {
        let geometry = BarrelGeometry::single_ring(42.5, 4, 50.0);
        let pipeline = WindowPipeline::new(&config(), &geometry).unwrap();
        let output = pipeline.process(&window(7)).unwrap();

        assert_eq!(output.window_index, 7);
        assert_eq!(output.events.len(), 1);
        assert_eq!(output.events[0].event.multiplicity(), 2);
        assert_eq!(output.diagnostics.signals_built, 4);
        assert_eq!(output.diagnostics.hits_built, 2);
        assert_eq!(output.diagnostics.windows_processed, 1);
    }

    #[test]
    fn test_calibration_shifts_hit_times() {
        let geometry = BarrelGeometry::single_ring(42.5, 4, 50.0);
        let calibration = TimeCalibration::new().with_channel_offset(0, -200);
        let plain = WindowPipeline::new(&config(), &geometry).unwrap();
        let shifted = WindowPipeline::new(&config(), &geometry)
            .unwrap()
            .with_calibration(&calibration);

        let before = plain.process(&window(0)).unwrap();
        let after = shifted.process(&window(0)).unwrap();
        let t0 = before.events[0].event.hits()[0].time_ps;
        let t1 = after.events[0].event.hits()[0].time_ps;
        approx::assert_relative_eq!(t0 - t1, 100.0);
    }

    #[test]
    fn test_parallel_windows_keep_order() {
        let geometry = BarrelGeometry::single_ring(42.5, 4, 50.0);
        let pipeline = WindowPipeline::new(&config(), &geometry).unwrap();
        let windows: Vec<EdgeCollector> = (0..16).rev().map(window).collect();
        let outputs = process_windows(&pipeline, &windows).unwrap();
        let order: Vec<u64> = outputs.iter().map(|o| o.window_index).collect();
        assert_eq!(order, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_stream_numbers_events_across_batches() {
        let geometry = BarrelGeometry::single_ring(42.5, 4, 50.0);
        let pipeline = WindowPipeline::new(&config(), &geometry).unwrap();
        let stream = (0..5u64).flat_map(|w| {
            let collector = window(w);
            collector
                .iter()
                .flat_map(|(_, edges)| edges.to_vec())
                .map(move |edge| (w, edge))
                .collect::<Vec<_>>()
        });

        let mut run = RunContext::new();
        let mut numbers = Vec::new();
        process_stream(&pipeline, stream, 2, &mut run, |number, _event| {
            numbers.push(number);
            Ok::<(), petreco_core::error::Error>(())
        })
        .unwrap();

        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
        let summary = run.finish();
        assert_eq!(summary.total_events, 5);
        assert_eq!(summary.diagnostics.windows_processed, 5);
    }
}
