//! Scatter tests: was the secondary hit produced by a photon that scattered
//! off the primary hit?
//!
//! Both strategies compare the measured time difference of the two hits
//! with the light travel time between them, through the residual
//! `r = (t_secondary - t_primary) - d / c`. The simple strategy rejects a
//! pair whose residual is far from zero; the min-max strategy accepts only
//! residuals and scattering angles inside configured windows.

use crate::observables::angle_between;
use petreco_core::config::ScatterPolicy;
use petreco_core::hit::Hit;
use petreco_core::{Vector3, SPEED_OF_LIGHT_CM_PER_PS};

/// Decides whether a hit pair is a scattering chain.
pub trait ScatterTest: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Returns true if `secondary` is taken to be a scatter of `primary`.
    ///
    /// `source` is the assumed emission point, needed by strategies that
    /// look at the scattering angle.
    fn is_scattered(&self, primary: &Hit, secondary: &Hit, source: &Vector3<f64>) -> bool;
}

/// Time residual of the scatter hypothesis (ps).
#[must_use]
pub fn scatter_residual(primary: &Hit, secondary: &Hit) -> f64 {
    let distance = (secondary.position - primary.position).norm();
    (secondary.time_ps - primary.time_ps) - distance / SPEED_OF_LIGHT_CM_PER_PS
}

/// Angle between the incoming direction (source to primary) and the
/// outgoing direction (primary to secondary), in degrees.
#[must_use]
pub fn scattering_angle(primary: &Hit, secondary: &Hit, source: &Vector3<f64>) -> f64 {
    angle_between(
        &(primary.position - source),
        &(secondary.position - primary.position),
    )
}

/// Scattered if the absolute time residual exceeds a threshold. A pair at
/// exactly `dt = d/c` is never scattered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleScatterTest {
    /// Residual threshold (ps).
    pub time_diff_ps: f64,
}

impl ScatterTest for SimpleScatterTest {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn is_scattered(&self, primary: &Hit, secondary: &Hit, _source: &Vector3<f64>) -> bool {
        scatter_residual(primary, secondary).abs() > self.time_diff_ps
    }
}

/// Scattered unless both the residual and the scattering angle fall inside
/// their windows. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScatterTest {
    /// Lower residual bound (ps).
    pub time_min_ps: f64,
    /// Upper residual bound (ps).
    pub time_max_ps: f64,
    /// Lower angle bound (degrees).
    pub angle_min_deg: f64,
    /// Upper angle bound (degrees).
    pub angle_max_deg: f64,
}

impl ScatterTest for MinMaxScatterTest {
    fn name(&self) -> &'static str {
        "min_max"
    }

    fn is_scattered(&self, primary: &Hit, secondary: &Hit, source: &Vector3<f64>) -> bool {
        let residual = scatter_residual(primary, secondary);
        let angle = scattering_angle(primary, secondary, source);
        let time_ok = (self.time_min_ps..=self.time_max_ps).contains(&residual);
        let angle_ok = (self.angle_min_deg..=self.angle_max_deg).contains(&angle);
        !(time_ok && angle_ok)
    }
}

/// Instantiates the strategy named by a policy.
#[must_use]
pub fn scatter_test(policy: &ScatterPolicy) -> Box<dyn ScatterTest> {
    match *policy {
        ScatterPolicy::Simple { time_diff_ps } => Box::new(SimpleScatterTest { time_diff_ps }),
        ScatterPolicy::MinMax {
            time_min_ps,
            time_max_ps,
            angle_min_deg,
            angle_max_deg,
        } => Box::new(MinMaxScatterTest {
            time_min_ps,
            time_max_ps,
            angle_min_deg,
            angle_max_deg,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hit(x: f64, y: f64, time: f64) -> Hit {
        Hit::detached(0, Vector3::new(x, y, 0.0), 0.0, time)
    }

    /// Secondary reached exactly at light speed from the primary.
    fn light_chain() -> (Hit, Hit) {
        let primary = hit(42.5, 0.0, 0.0);
        let secondary = hit(42.5, 30.0, 30.0 / SPEED_OF_LIGHT_CM_PER_PS);
        (primary, secondary)
    }

    #[test]
    fn test_residual_of_light_chain_is_zero() {
        let (primary, secondary) = light_chain();
        assert_relative_eq!(scatter_residual(&primary, &secondary), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_simple_policy() {
        let test = SimpleScatterTest {
            time_diff_ps: 10.0,
        };
        let source = Vector3::zeros();
        let (primary, secondary) = light_chain();
        assert!(!test.is_scattered(&primary, &secondary, &source));

        let delayed = hit(42.5, 30.0, secondary.time_ps + 5_000.0);
        assert!(test.is_scattered(&primary, &delayed, &source));
    }

    #[test]
    fn test_simple_policy_threshold_edges() {
        let test = SimpleScatterTest {
            time_diff_ps: 300.0,
        };
        let source = Vector3::zeros();
        let (primary, secondary) = light_chain();
        let near = hit(42.5, 30.0, secondary.time_ps + 299.0);
        assert!(!test.is_scattered(&primary, &near, &source));
        let late = hit(42.5, 30.0, secondary.time_ps + 301.0);
        assert!(test.is_scattered(&primary, &late, &source));
        let early = hit(42.5, 30.0, secondary.time_ps - 301.0);
        assert!(test.is_scattered(&primary, &early, &source));
    }

    #[test]
    fn test_min_max_bounds_are_inclusive() {
        let test = MinMaxScatterTest {
            time_min_ps: 0.0,
            time_max_ps: 500.0,
            angle_min_deg: 0.0,
            angle_max_deg: 180.0,
        };
        let source = Vector3::zeros();
        let (primary, secondary) = light_chain();
        assert!(!test.is_scattered(&primary, &secondary, &source));

        let early = hit(42.5, 30.0, secondary.time_ps - 1.0);
        assert!(test.is_scattered(&primary, &early, &source));
        let late = hit(42.5, 30.0, secondary.time_ps + 501.0);
        assert!(test.is_scattered(&primary, &late, &source));
    }

    #[test]
    fn test_min_max_angle_window() {
        let test = MinMaxScatterTest {
            time_min_ps: -1_000.0,
            time_max_ps: 1_000.0,
            angle_min_deg: 0.0,
            angle_max_deg: 60.0,
        };
        let source = Vector3::zeros();
        let (primary, secondary) = light_chain();
        assert_relative_eq!(scattering_angle(&primary, &secondary, &source), 90.0, epsilon = 1e-9);
        assert!(test.is_scattered(&primary, &secondary, &source));

        let forward = hit(72.5, 0.0, 30.0 / SPEED_OF_LIGHT_CM_PER_PS);
        assert!(!test.is_scattered(&primary, &forward, &source));
    }

    #[test]
    fn test_factory_follows_policy() {
        assert_eq!(scatter_test(&ScatterPolicy::DEFAULT_SIMPLE).name(), "simple");
        assert_eq!(scatter_test(&ScatterPolicy::DEFAULT_MIN_MAX).name(), "min_max");
    }
}
