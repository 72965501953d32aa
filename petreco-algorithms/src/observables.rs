//! Pairwise kinematic observables of hits.
//!
//! All functions are pure. Angles are in degrees, times in ps and
//! positions in cm.

use petreco_core::hit::Hit;
use petreco_core::{Vector3, SPEED_OF_LIGHT_CM_PER_PS};

/// Absolute time difference of two hits (ps).
#[must_use]
pub fn relative_time(a: &Hit, b: &Hit) -> f64 {
    (a.time_ps - b.time_ps).abs()
}

/// Angle at `vertex` between the directions towards two hits (degrees).
///
/// Returns 0 if either hit coincides with the vertex.
#[must_use]
pub fn opening_angle(a: &Hit, b: &Hit, vertex: &Vector3<f64>) -> f64 {
    angle_between(&(a.position - vertex), &(b.position - vertex))
}

/// Angle between two vectors (degrees), 0 if either has zero length.
#[must_use]
pub fn angle_between(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    if u.norm_squared() == 0.0 || v.norm_squared() == 0.0 {
        return 0.0;
    }
    u.angle(v).to_degrees()
}

/// Signed time of flight `t(a) - t(b)` (ps).
#[must_use]
pub fn time_of_flight(a: &Hit, b: &Hit) -> f64 {
    a.time_ps - b.time_ps
}

/// Orders two hits by ascending slot angle.
///
/// The hit with the smaller slot angle comes first; on a tie the second
/// argument is taken as first.
#[must_use]
pub fn slot_ordered<'h>(a: &'h Hit, b: &'h Hit) -> (&'h Hit, &'h Hit) {
    if a.slot_theta_deg < b.slot_theta_deg {
        (a, b)
    } else {
        (b, a)
    }
}

/// Time of flight in slot-angle order: the time of the hit at the smaller
/// slot angle minus the time of the other. Symmetric in its arguments.
#[must_use]
pub fn ordered_time_of_flight(a: &Hit, b: &Hit) -> f64 {
    let (first, second) = slot_ordered(a, b);
    time_of_flight(first, second)
}

/// Annihilation point on the line of response of two hits.
///
/// The point is shifted from the middle of the line of response towards
/// the earlier hit by half the time of flight times the speed of light.
/// The result does not depend on the argument order.
#[must_use]
pub fn annihilation_point(a: &Hit, b: &Hit) -> Vector3<f64> {
    annihilation_point_from(&a.position, &b.position, time_of_flight(a, b))
}

/// Annihilation point from two positions and `t(a) - t(b)`.
///
/// Falls back to the midpoint when the positions coincide.
#[must_use]
pub fn annihilation_point_from(a: &Vector3<f64>, b: &Vector3<f64>, tof_ps: f64) -> Vector3<f64> {
    let middle = (a + b) * 0.5;
    match (b - a).try_normalize(0.0) {
        Some(direction) => middle + direction * (0.5 * tof_ps * SPEED_OF_LIGHT_CM_PER_PS),
        None => middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hit(x: f64, y: f64, z: f64, theta: f64, time: f64) -> Hit {
        Hit::detached(0, Vector3::new(x, y, z), theta, time)
    }

    #[test]
    fn test_annihilation_point_on_axis() {
        let a = hit(0.0, 45.0, 0.0, 90.0, 1_333.0);
        let b = hit(0.0, -45.0, 0.0, 270.0, 1_667.0);
        let point = annihilation_point(&a, &b);
        assert_relative_eq!(point.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(point.y, 5.006_534, epsilon = 1e-5);
        assert_relative_eq!(point.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_annihilation_offset_is_half_c_times_time_difference() {
        // 167 ps between the photons moves the point 2.503 cm off centre.
        let a = hit(0.0, 42.5, 0.0, 90.0, 666.5);
        let b = hit(0.0, -42.5, 0.0, 270.0, 833.5);
        let point = annihilation_point(&a, &b);
        assert_relative_eq!(point.y, 0.5 * SPEED_OF_LIGHT_CM_PER_PS * 167.0, epsilon = 1e-9);
        assert_relative_eq!(point.y, 2.503_267, epsilon = 1e-5);
    }

    #[test]
    fn test_annihilation_point_is_symmetric() {
        let a = hit(30.1, -12.0, 4.0, 338.0, 2_100.0);
        let b = hit(-25.0, 33.3, -7.5, 127.0, 1_650.0);
        let ab = annihilation_point(&a, &b);
        let ba = annihilation_point(&b, &a);
        assert_relative_eq!(ab, ba, epsilon = 1e-12);
    }

    #[test]
    fn test_equal_times_give_midpoint() {
        let a = hit(10.0, 0.0, 2.0, 0.0, 500.0);
        let b = hit(-10.0, 0.0, -2.0, 180.0, 500.0);
        assert_relative_eq!(annihilation_point(&a, &b), Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_time_of_flight_is_antisymmetric() {
        let a = hit(0.0, 45.0, 0.0, 90.0, 1_333.0);
        let b = hit(0.0, -45.0, 0.0, 270.0, 1_667.0);
        assert_relative_eq!(time_of_flight(&a, &b), -time_of_flight(&b, &a));
        assert_relative_eq!(time_of_flight(&a, &b), -334.0);
    }

    #[test]
    fn test_ordered_time_of_flight_follows_slot_angle() {
        let a = hit(0.0, 45.0, 0.0, 90.0, 1_333.0);
        let b = hit(0.0, -45.0, 0.0, 270.0, 1_667.0);
        assert_relative_eq!(ordered_time_of_flight(&a, &b), -334.0);
        assert_relative_eq!(ordered_time_of_flight(&b, &a), -334.0);
        let (first, _) = slot_ordered(&b, &a);
        assert_relative_eq!(first.slot_theta_deg, 90.0);
    }

    #[test]
    fn test_opening_angle_about_vertex() {
        let a = hit(10.0, 0.0, 0.0, 0.0, 0.0);
        let b = hit(0.0, 10.0, 0.0, 90.0, 0.0);
        assert_relative_eq!(opening_angle(&a, &b, &Vector3::zeros()), 90.0, epsilon = 1e-9);
        let vertex = Vector3::new(10.0, 10.0, 0.0);
        assert_relative_eq!(opening_angle(&a, &b, &vertex), 90.0, epsilon = 1e-9);
        assert_relative_eq!(opening_angle(&a, &a, &a.position), 0.0);
    }

    #[test]
    fn test_relative_time() {
        let a = hit(0.0, 0.0, 0.0, 0.0, 100.0);
        let b = hit(0.0, 0.0, 0.0, 0.0, 350.0);
        assert_relative_eq!(relative_time(&a, &b), 250.0);
        assert_relative_eq!(relative_time(&b, &a), 250.0);
    }
}
