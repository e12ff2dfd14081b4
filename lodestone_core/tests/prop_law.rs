//! Property-based tests for the force law and the monopole registry.
//!
//! Covers: pairwise antisymmetry, distance clamping bound, box culling,
//! registration idempotence.

use lodestone_core::law::{axis_culled, flux_density, pair_force};
use lodestone_core::{MagnetConfig, Magnet, MonopoleRegistry, PhysicalConstants, Polarity};
use lodestone_env::{EntityKey, NodeId, RigidBody};
use nalgebra::{UnitQuaternion, Vector3};
use proptest::prelude::*;
use std::sync::Arc;

fn coord() -> impl Strategy<Value = f64> {
    -12.0f64..12.0
}

fn point() -> impl Strategy<Value = Vector3<f64>> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

fn charge() -> impl Strategy<Value = f64> {
    prop_oneof![-5.0f64..-0.1, 0.1f64..5.0]
}

fn constants() -> PhysicalConstants {
    PhysicalConstants::default()
}

struct StaticBody(Vector3<f64>);

impl RigidBody for StaticBody {
    fn world_position(&self) -> Vector3<f64> {
        self.0
    }
    
    fn world_rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::identity()
    }
    
    fn apply_force_at_point(&self, _force: Vector3<f64>, _point: Vector3<f64>) {}
}

// ── Force Law ────────────────────────────────────────────────────────

proptest! {
    /// Swapping the pair negates the force exactly.
    #[test]
    fn pair_force_is_antisymmetric(
        pi in point(),
        pj in point(),
        qi in charge(),
        qj in charge(),
    ) {
        let c = constants();
        let forward = pair_force(pi, qi, pj, qj, &c);
        let backward = pair_force(pj, qj, pi, qi, &c);
        match (forward, backward) {
            (Some(f), Some(b)) => prop_assert_eq!(f, -b),
            (None, None) => {}
            other => prop_assert!(false, "asymmetric cull: {:?}", other),
        }
    }

    /// Magnitude never exceeds k·|qi·qj| / min².
    #[test]
    fn pair_force_is_bounded_by_min_distance(
        pi in point(),
        pj in point(),
        qi in charge(),
        qj in charge(),
    ) {
        let c = constants();
        if let Some(force) = pair_force(pi, qi, pj, qj, &c) {
            let bound = c.coulomb_constant * (qi * qj).abs() / (c.min_distance * c.min_distance);
            prop_assert!(force.norm() <= bound * (1.0 + 1e-12),
                "|F| = {} exceeds {}", force.norm(), bound);
            prop_assert!(force.iter().all(|v| v.is_finite()));
        }
    }

    /// Any axis beyond max_distance means no force.
    #[test]
    fn culled_pairs_produce_nothing(
        pi in point(),
        pj in point(),
        qi in charge(),
        qj in charge(),
    ) {
        let c = constants();
        if axis_culled(&(pj - pi), c.max_distance) {
            prop_assert!(pair_force(pi, qi, pj, qj, &c).is_none());
        }
    }

    /// Like charges push apart, opposite charges pull together.
    #[test]
    fn force_direction_follows_charge_signs(
        pi in point(),
        pj in point(),
        qi in charge(),
        qj in charge(),
    ) {
        let c = constants();
        if let Some(force) = pair_force(pi, qi, pj, qj, &c) {
            let toward_j = force.dot(&(pj - pi));
            if qi * qj > 0.0 {
                prop_assert!(toward_j <= 0.0);
            } else {
                prop_assert!(toward_j >= 0.0);
            }
        }
    }

    /// Flux density is always finite, including at the pole itself.
    #[test]
    fn flux_density_is_finite(pole in point(), probe in point(), q in charge()) {
        let density = flux_density(pole, q, probe, &constants());
        prop_assert!(density.iter().all(|v| v.is_finite()));
        prop_assert!(flux_density(pole, q, pole, &constants()) == Vector3::zeros());
    }
}

// ── Registry ─────────────────────────────────────────────────────────

proptest! {
    /// Registering any key any number of times leaves one entry.
    #[test]
    fn register_is_idempotent(
        indices in prop::collection::vec(0u32..8, 1..32),
    ) {
        let owner = NodeId::from_seed(7);
        let config = MagnetConfig::natural(1.0, Polarity::North);
        let magnets: Vec<_> = (0..8)
            .map(|i| Arc::new(Magnet::new(EntityKey::new(owner, i), StaticBody(Vector3::new(i as f64, 0.0, 0.0)), &config)))
            .collect();

        let mut registry = MonopoleRegistry::new(constants());
        for &i in &indices {
            registry.register(&magnets[i as usize]);
        }

        let mut distinct = indices.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(registry.len(), distinct.len());
        prop_assert_eq!(registry.step().live, distinct.len());
    }

    /// Deregistering removes exactly the named key.
    #[test]
    fn deregister_removes_one(count in 1u32..8, victim in 0u32..8) {
        let owner = NodeId::from_seed(7);
        let config = MagnetConfig::natural(1.0, Polarity::South);
        let magnets: Vec<_> = (0..count)
            .map(|i| Arc::new(Magnet::new(EntityKey::new(owner, i), StaticBody(Vector3::zeros()), &config)))
            .collect();

        let mut registry = MonopoleRegistry::new(constants());
        for magnet in &magnets {
            registry.register(magnet);
        }
        let key = EntityKey::new(owner, victim);
        let removed = registry.deregister(&key);
        prop_assert_eq!(removed, victim < count);
        prop_assert!(!registry.contains(&key));
        prop_assert_eq!(registry.len(), (count - u32::from(removed)) as usize);
    }
}
