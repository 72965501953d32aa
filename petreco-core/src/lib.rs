//! petreco-core: Core types and services for PET event reconstruction.
//!
//! This crate provides the data model shared by the reconstruction stages
//! (edges, raw signals, hits, events, decay points), the read-only geometry
//! and calibration services they query, the pipeline configuration and the
//! diagnostics counters used to report recoverable data-quality problems.
//!

pub mod calibration;
pub mod config;
pub mod diagnostics;
pub mod edge;
pub mod error;
pub mod event;
pub mod geometry;
pub mod hit;
pub mod signal;

pub use calibration::{CalibrationEntry, TimeCalibration};
pub use config::{
    EventConfig, HitConfig, MatchPolicy, PipelineConfig, ReconstructionConfig, RefineConfig,
    ScatterPolicy, SignalConfig,
};
pub use diagnostics::{Diagnostics, RunContext, RunSummary};
pub use edge::{ChannelId, Edge, EdgeCollector, EdgeKind, Threshold};
pub use error::{ConfigError, Error, Result};
pub use event::{DecayPoint, DecayStatus, Event, EventType, RecoFlag};
pub use geometry::{
    BarrelGeometry, DetectorGeometry, Layer, PmInfo, Scintillator, ScintillatorId, Side,
};
pub use hit::Hit;
pub use signal::{Origin, Quality, RawSignal};

/// Re-exported so downstream crates use the same vector type.
pub use nalgebra::Vector3;

/// Speed of light in vacuum (cm/ps).
pub const SPEED_OF_LIGHT_CM_PER_PS: f64 = 0.029_979_245_8;
