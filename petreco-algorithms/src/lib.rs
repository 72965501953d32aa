//! petreco-algorithms: Reconstruction stages for PET detector data.
//!
//! This crate provides the processing chain from raw threshold crossings
//! to classified events:
//! - **Signal assembly** - leading/trailing edge pairing per threshold
//! - **Hit building** - A/B side coincidences within a scintillator
//! - **Event building** - time clustering of hits
//! - **Reconstruction** - classification, scatter rejection, annihilation
//!   points and the three-hit decay vertex
//!
#![warn(missing_docs)]

mod decay;
mod event;
mod hit;
pub mod observables;
mod processing;
mod reconstruction;
mod refine;
mod scatter;
mod signal;
mod window;

pub use decay::DecaySolver;
pub use event::{EventBuilder, EventBuilderState};
pub use hit::{HitBuilder, ScintillatorSignals, SidePair};
pub use processing::{process_stream, process_windows, WindowOutput, WindowPipeline};
pub use reconstruction::{EventReconstructor, PairObservables, ReconstructedEvent, Reconstruction};
pub use refine::{ChamberRadiusRefiner, DecayRefiner};
pub use scatter::{
    scatter_residual, scatter_test, scattering_angle, MinMaxScatterTest, ScatterTest,
    SimpleScatterTest,
};
pub use signal::SignalAssembler;
pub use window::{StreamPhase, WindowAccumulator};
