//! Hits: coincident signals from both ends of one scintillator strip.

use crate::geometry::ScintillatorId;
use crate::signal::{Origin, Quality, RawSignal};
use nalgebra::Vector3;
use std::sync::Arc;

/// A reconstructed interaction in one scintillator.
///
/// The two side signals are shared, read-only associations: several hits
/// may reference the same signal when matching is ambiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Scintillator the interaction happened in.
    pub scintillator_id: ScintillatorId,
    /// Signal from side A (may be empty for detached hits).
    pub side_a: Arc<RawSignal>,
    /// Signal from side B (may be empty for detached hits).
    pub side_b: Arc<RawSignal>,
    /// Hit time: mean of the two side reference times (ps).
    pub time_ps: f64,
    /// Position along the strip axis (cm), negative towards side A.
    pub position_along_strip_cm: f64,
    /// Interaction point in detector coordinates (cm).
    pub position: Vector3<f64>,
    /// Azimuthal angle of the strip's slot (degrees).
    pub slot_theta_deg: f64,
    /// Time window the hit was built in.
    pub window_index: u64,
    /// Sum of time over threshold of both sides (ps).
    pub tot_ps: f64,
    /// Data-quality tag.
    pub quality: Quality,
    /// Data or simulation.
    pub origin: Origin,
}

impl Hit {
    /// Creates a hit that is not backed by raw signals.
    ///
    /// Used for simulated hits and for feeding the reconstruction directly.
    #[must_use]
    pub fn detached(
        scintillator_id: ScintillatorId,
        position: Vector3<f64>,
        slot_theta_deg: f64,
        time_ps: f64,
    ) -> Self {
        Self {
            scintillator_id,
            side_a: Arc::default(),
            side_b: Arc::default(),
            time_ps,
            position_along_strip_cm: position.z,
            position,
            slot_theta_deg,
            window_index: 0,
            tot_ps: 0.0,
            quality: Quality::Good,
            origin: Origin::Data,
        }
    }

    /// Sets the time over threshold.
    #[must_use]
    pub fn with_tot(mut self, tot_ps: f64) -> Self {
        self.tot_ps = tot_ps;
        self
    }

    /// Sets the origin tag.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the quality tag.
    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the time window index.
    #[must_use]
    pub fn with_window(mut self, window_index: u64) -> Self {
        self.window_index = window_index;
        self
    }

    /// Interaction point (cm).
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    /// Time over threshold (ps).
    #[inline]
    #[must_use]
    pub fn tot(&self) -> f64 {
        self.tot_ps
    }

    /// Side A minus side B reference time, if both are known.
    #[must_use]
    pub fn time_diff_ab(&self) -> Option<i64> {
        Some(self.side_a.reference_time()? - self.side_b.reference_time()?)
    }

    /// Returns true if the hit was built from incomplete data.
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        self.quality == Quality::Corrupted
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::edge::Threshold;

    #[test]
    fn test_detached_hit() {
        let hit = Hit::detached(3, Vector3::new(0.0, 42.5, -4.0), 90.0, 1_250.0)
            .with_tot(15_000.0)
            .with_origin(Origin::Mc);
        assert_eq!(hit.position_along_strip_cm, -4.0);
        assert_eq!(hit.tot(), 15_000.0);
        assert_eq!(hit.origin, Origin::Mc);
        assert!(!hit.is_corrupted());
        assert_eq!(hit.time_diff_ab(), None);
    }

    #[test]
    fn test_time_diff_ab() {
        let mut a = RawSignal::new(0, 0);
        a.set_pair(Threshold::FIRST, -1_000, -600);
        let mut b = RawSignal::new(1, 0);
        b.set_pair(Threshold::FIRST, -800, -500);

        let mut hit = Hit::detached(0, Vector3::zeros(), 0.0, -900.0);
        hit.side_a = Arc::new(a);
        hit.side_b = Arc::new(b);
        assert_eq!(hit.time_diff_ab(), Some(-200));
    }
}
