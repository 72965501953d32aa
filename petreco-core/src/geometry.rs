//! Detector geometry lookup.
//!
//! The reconstruction stages only need a read-only view of the barrel:
//! which scintillator and side a photomultiplier reads out, and where each
//! scintillator sits. [`DetectorGeometry`] is that view; [`BarrelGeometry`]
//! is a concrete cylindrical layout that can be loaded from configuration.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::edge::ChannelId;
use crate::error::ConfigError;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scintillator identifier.
pub type ScintillatorId = u32;

/// Read-out side of a scintillator strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    /// Side at negative z.
    A,
    /// Side at positive z.
    B,
}

/// What a photomultiplier is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmInfo {
    /// Scintillator read out by the photomultiplier.
    pub scintillator_id: ScintillatorId,
    /// Which end of the strip.
    pub side: Side,
}

/// Placement of one scintillator strip.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scintillator {
    /// Scintillator identifier.
    pub id: ScintillatorId,
    /// Layer number (0 = innermost).
    pub layer: u32,
    /// Slot number within the layer.
    pub slot: u32,
    /// Azimuthal angle of the slot (degrees).
    pub theta_deg: f64,
    /// Distance of the strip axis from the detector axis (cm).
    pub radius_cm: f64,
    /// Strip length along z (cm).
    pub length_cm: f64,
}

impl Scintillator {
    /// Centre of the strip.
    #[must_use]
    pub fn center(&self) -> Vector3<f64> {
        self.position_at(0.0)
    }

    /// Point on the strip axis at `z` (cm).
    #[must_use]
    pub fn position_at(&self, z_cm: f64) -> Vector3<f64> {
        let theta = self.theta_deg.to_radians();
        Vector3::new(
            self.radius_cm * theta.cos(),
            self.radius_cm * theta.sin(),
            z_cm,
        )
    }
}

/// Read-only geometry service.
pub trait DetectorGeometry: Send + Sync {
    /// Looks up the scintillator and side a photomultiplier reads.
    fn pm(&self, pm_id: ChannelId) -> Option<PmInfo>;

    /// Looks up a scintillator's placement.
    fn scintillator(&self, id: ScintillatorId) -> Option<Scintillator>;

    /// Number of slots in a layer.
    fn number_of_slots(&self, layer: u32) -> Option<u32>;

    /// Layer number of a scintillator.
    fn layer_number(&self, id: ScintillatorId) -> Option<u32> {
        self.scintillator(id).map(|scin| scin.layer)
    }

    /// Slot number of a scintillator within its layer.
    fn slot_number(&self, id: ScintillatorId) -> Option<u32> {
        self.scintillator(id).map(|scin| scin.slot)
    }
}

/// One cylindrical layer of strips.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layer {
    /// Radius of the layer (cm).
    pub radius_cm: f64,
    /// Number of equally spaced slots.
    pub slots: u32,
    /// Azimuth of slot 0 (degrees).
    #[cfg_attr(feature = "serde", serde(default))]
    pub phase_deg: f64,
}

/// Largest scintillator count whose photomultiplier ids fit in a
/// [`ChannelId`].
pub const MAX_SCINTILLATORS: u32 = 1 << 31;

/// Cylindrical barrel made of concentric layers.
///
/// Scintillator ids are assigned layer-major starting at 0, and each strip
/// has two photomultipliers: `2 * id` on side A, `2 * id + 1` on side B.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BarrelGeometry {
    /// Layers, innermost first.
    pub layers: Vec<Layer>,
    /// Strip length (cm).
    pub scintillator_length_cm: f64,
}

impl Default for BarrelGeometry {
    fn default() -> Self {
        Self::three_layer_barrel()
    }
}

impl BarrelGeometry {
    /// Three-layer, 192-strip barrel with 50 cm strips.
    #[must_use]
    pub fn three_layer_barrel() -> Self {
        Self {
            layers: vec![
                Layer {
                    radius_cm: 42.5,
                    slots: 48,
                    phase_deg: 0.0,
                },
                Layer {
                    radius_cm: 46.75,
                    slots: 48,
                    phase_deg: 3.75,
                },
                Layer {
                    radius_cm: 57.5,
                    slots: 96,
                    phase_deg: 1.875,
                },
            ],
            scintillator_length_cm: 50.0,
        }
    }

    /// Single ring of `slots` strips at `radius_cm`.
    #[must_use]
    pub fn single_ring(radius_cm: f64, slots: u32, length_cm: f64) -> Self {
        Self {
            layers: vec![Layer {
                radius_cm,
                slots,
                phase_deg: 0.0,
            }],
            scintillator_length_cm: length_cm,
        }
    }

    /// Checks that every layer has a positive radius and at least one slot,
    /// and that every scintillator gets a photomultiplier id pair.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scintillator_length_cm.is_finite() {
            return Err(ConfigError::NonFinite {
                key: "scintillator_length_cm",
            });
        }
        if self.scintillator_length_cm < 0.0 {
            return Err(ConfigError::Negative {
                key: "scintillator_length_cm",
                value: self.scintillator_length_cm,
            });
        }
        for layer in &self.layers {
            if !layer.radius_cm.is_finite() || !layer.phase_deg.is_finite() {
                return Err(ConfigError::NonFinite { key: "layer" });
            }
            if layer.radius_cm < 0.0 {
                return Err(ConfigError::Negative {
                    key: "layer.radius_cm",
                    value: layer.radius_cm,
                });
            }
            if layer.slots == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "layer.slots".to_string(),
                    value: "0".to_string(),
                });
            }
        }
        let total: u64 = self.layers.iter().map(|layer| u64::from(layer.slots)).sum();
        if total > u64::from(MAX_SCINTILLATORS) {
            return Err(ConfigError::TooManyScintillators(total));
        }
        Ok(())
    }

    /// Total number of scintillators, saturating for unvalidated layouts.
    #[must_use]
    pub fn scintillator_count(&self) -> u32 {
        self.layers
            .iter()
            .fold(0u32, |total, layer| total.saturating_add(layer.slots))
    }

    /// Scintillator id of a `(layer, slot)` position.
    #[must_use]
    pub fn scintillator_id(&self, layer: u32, slot: u32) -> Option<ScintillatorId> {
        let target = self.layers.get(layer as usize)?;
        if slot >= target.slots {
            return None;
        }
        self.layers[..layer as usize]
            .iter()
            .try_fold(slot, |id, l| id.checked_add(l.slots))
    }

    /// Photomultiplier reading one side of a scintillator.
    #[must_use]
    pub fn pm_id(id: ScintillatorId, side: Side) -> ChannelId {
        match side {
            Side::A => 2 * id,
            Side::B => 2 * id + 1,
        }
    }
}

impl DetectorGeometry for BarrelGeometry {
    fn pm(&self, pm_id: ChannelId) -> Option<PmInfo> {
        let scintillator_id = pm_id / 2;
        if scintillator_id >= self.scintillator_count() {
            return None;
        }
        let side = if pm_id % 2 == 0 { Side::A } else { Side::B };
        Some(PmInfo {
            scintillator_id,
            side,
        })
    }

    fn scintillator(&self, id: ScintillatorId) -> Option<Scintillator> {
        let mut first = 0u32;
        for (layer_idx, layer) in self.layers.iter().enumerate() {
            let end = first.checked_add(layer.slots)?;
            if id < end {
                let slot = id - first;
                let theta_deg = layer.phase_deg + f64::from(slot) * 360.0 / f64::from(layer.slots);
                return Some(Scintillator {
                    id,
                    layer: layer_idx as u32,
                    slot,
                    theta_deg,
                    radius_cm: layer.radius_cm,
                    length_cm: self.scintillator_length_cm,
                });
            }
            first = end;
        }
        None
    }

    fn number_of_slots(&self, layer: u32) -> Option<u32> {
        self.layers.get(layer as usize).map(|l| l.slots)
    }
}
