//! The inverse-square law shared by the force pass and the gaussmeter.
//!
//! Both evaluate the same kernel:
//!
//! ```text
//! delta = to - from
//! |delta.x|, |delta.y| or |delta.z| > max_distance  →  no interaction
//! d = max(|delta|, min_distance)
//! kernel = scale / d² · delta / |delta|
//! ```
//!
//! The range test is a per-axis box, not a sphere: two poles on an exact
//! diagonal interact even when their Euclidean distance exceeds
//! `max_distance`. The clamp only bounds the magnitude; the direction is
//! taken from the raw separation, so coincident points yield no vector.

use crate::constants::PhysicalConstants;
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Scale from charge / distance² to Gauss in the flux density kernel.
pub const FLUX_DENSITY_GAIN: f64 = 1.0e3 / 4.0 * PI;

/// Returns true when any axis of `delta` exceeds `max_distance`.
pub fn axis_culled(delta: &Vector3<f64>, max_distance: f64) -> bool {
    delta.x.abs() > max_distance || delta.y.abs() > max_distance || delta.z.abs() > max_distance
}

/// `scale / max(|delta|, min)² · normalize(delta)`, or `None` when culled
/// or degenerate.
fn inverse_square(delta: Vector3<f64>, scale: f64, constants: &PhysicalConstants) -> Option<Vector3<f64>> {
    if axis_culled(&delta, constants.max_distance) {
        return None;
    }
    let magnitude = delta.norm();
    if magnitude == 0.0 || scale == 0.0 {
        return None;
    }
    let direction = delta / magnitude;
    let distance = magnitude.max(constants.min_distance);
    let kernel = scale / (distance * distance) * direction;
    kernel.iter().all(|c| c.is_finite()).then_some(kernel)
}

/// Force on the pole at `pos_i` exerted by the pole at `pos_j`.
///
/// `−k · q_i · q_j / d² · normalize(pos_j − pos_i)`: like charges push `i`
/// away from `j`. The reaction on `j` is the negation.
pub fn pair_force(
    pos_i: Vector3<f64>,
    charge_i: f64,
    pos_j: Vector3<f64>,
    charge_j: f64,
    constants: &PhysicalConstants,
) -> Option<Vector3<f64>> {
    // Product first so swapping i and j negates the result bit for bit
    let scale = -constants.coulomb_constant * (charge_i * charge_j);
    inverse_square(pos_j - pos_i, scale, constants)
}

/// Flux density at `point` due to a pole of `charge` at `pole`.
///
/// Points away from a positive (North) pole.
pub fn flux_density(
    pole: Vector3<f64>,
    charge: f64,
    point: Vector3<f64>,
    constants: &PhysicalConstants,
) -> Vector3<f64> {
    inverse_square(point - pole, FLUX_DENSITY_GAIN * charge, constants).unwrap_or_else(Vector3::zeros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    fn constants() -> PhysicalConstants {
        PhysicalConstants::new(1.0, 10.0, 0.5).unwrap()
    }
    
    #[test]
    fn test_like_charges_repel() {
        let f = pair_force(Vector3::zeros(), 1.0, Vector3::new(2.0, 0.0, 0.0), 1.0, &constants()).unwrap();
        assert!(f.x < 0.0, "force on i should point away from j");
        assert_relative_eq!(f.x, -0.25, epsilon = 1e-12);
    }
    
    #[test]
    fn test_opposite_charges_attract() {
        let f = pair_force(Vector3::zeros(), 1.0, Vector3::new(2.0, 0.0, 0.0), -1.0, &constants()).unwrap();
        assert!(f.x > 0.0);
    }
    
    #[test]
    fn test_axis_cutoff_ignores_euclidean_distance() {
        // |dx| just past max, Euclidean distance equal to that
        let far = Vector3::new(10.01, 0.0, 0.0);
        assert!(pair_force(Vector3::zeros(), 1.0, far, 1.0, &constants()).is_none());
        
        // Diagonal: every axis within max, Euclidean ≈ 17.3 > max
        let diagonal = Vector3::new(10.0, 10.0, 10.0);
        assert!(pair_force(Vector3::zeros(), 1.0, diagonal, 1.0, &constants()).is_some());
    }
    
    #[test]
    fn test_negative_axis_is_culled_too() {
        let far = Vector3::new(0.0, -10.5, 0.0);
        assert!(pair_force(Vector3::zeros(), 1.0, far, 1.0, &constants()).is_none());
    }
    
    #[test]
    fn test_min_distance_clamp() {
        let near = Vector3::new(1e-6, 0.0, 0.0);
        let f = pair_force(Vector3::zeros(), 2.0, near, 3.0, &constants()).unwrap();
        assert_relative_eq!(f.norm(), 1.0 * 6.0 / (0.5 * 0.5), epsilon = 1e-9);
    }
    
    #[test]
    fn test_coincident_points_produce_nothing() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert!(pair_force(p, 1.0, p, 1.0, &constants()).is_none());
        assert_eq!(flux_density(p, 1.0, p, &constants()), Vector3::zeros());
    }
    
    #[test]
    fn test_zero_charge_produces_nothing() {
        assert!(pair_force(Vector3::zeros(), 0.0, Vector3::x(), 1.0, &constants()).is_none());
    }
    
    #[test]
    fn test_flux_points_away_from_north() {
        let b = flux_density(Vector3::zeros(), 1.0, Vector3::new(0.0, 0.0, 2.0), &constants());
        assert!(b.z > 0.0);
        assert_relative_eq!(b.z, FLUX_DENSITY_GAIN / 4.0, epsilon = 1e-9);
        
        let b_south = flux_density(Vector3::zeros(), -1.0, Vector3::new(0.0, 0.0, 2.0), &constants());
        assert!(b_south.z < 0.0);
    }
}
