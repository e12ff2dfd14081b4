//! Monopole entities: magnetic blocks attached to engine rigid bodies.

use crate::constants::PhysicalConstants;
use crate::law;
use crate::pole::{PoleInputs, PoleSource, PoleState};
use crate::polarity::Polarity;
use lodestone_env::{ControlInput, EntityKey, RigidBody};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};

/// A point-like magnetic pole the registry can pair with others.
pub trait Monopole: Send + Sync {
    /// Stable identity of this entity.
    fn key(&self) -> EntityKey;
    
    /// World-space pole position, read live from the body.
    fn pole_position(&self) -> Vector3<f64>;
    
    /// Polarity currently contributing charge.
    fn polarity(&self) -> Polarity;
    
    /// Signed magnetic charge (zero when inactive).
    fn charge(&self) -> f64;
    
    /// Pushes a world-space force into the body at the pole.
    fn apply_force(&self, force: Vector3<f64>);
    
    /// Takes part in the force pass.
    fn is_magnetized(&self) -> bool {
        self.polarity().is_magnetized()
    }
    
    /// Flux density this pole produces at `point`.
    fn flux_density_at(&self, point: Vector3<f64>, constants: &PhysicalConstants) -> Vector3<f64> {
        law::flux_density(self.pole_position(), self.charge(), point, constants)
    }
}

/// Per-block magnet configuration.
///
/// Which control fields are present decides the pole state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetConfig {
    /// Base magnetic charge of the block
    pub charge: f64,
    
    /// Slider multiplier on `charge`
    pub charge_gain: f64,
    
    /// Pole location in the body's local frame
    pub pole_offset: [f64; 3],
    
    /// Pole-type menu index (0 = North, 1 = South)
    pub pole_type: usize,
    
    /// Control that magnetizes north (electromagnet)
    pub north_key: Option<String>,
    
    /// Control that magnetizes south (electromagnet)
    pub south_key: Option<String>,
    
    /// Single on/off control (legacy electromagnet)
    pub activation_key: Option<String>,
    
    /// Hold mode when true, toggle mode otherwise
    pub hold_to_magnetize: bool,
}

impl Default for MagnetConfig {
    fn default() -> Self {
        Self {
            charge: 1.0,
            charge_gain: 1.0,
            pole_offset: [0.0; 3],
            pole_type: 0,
            north_key: None,
            south_key: None,
            activation_key: None,
            hold_to_magnetize: true,
        }
    }
}

impl MagnetConfig {
    /// Permanent magnet with the given menu polarity.
    pub fn natural(charge: f64, polarity: Polarity) -> Self {
        Self {
            charge,
            pole_type: match polarity {
                Polarity::South => 1,
                Polarity::North => 0,
                Polarity::None => 2,
            },
            ..Self::default()
        }
    }
    
    /// Dual-key electromagnet.
    pub fn electromagnet(charge: f64, north_key: &str, south_key: &str, hold_to_magnetize: bool) -> Self {
        Self {
            charge,
            north_key: Some(north_key.to_string()),
            south_key: Some(south_key.to_string()),
            hold_to_magnetize,
            ..Self::default()
        }
    }
    
    fn pole_source(&self) -> PoleSource {
        PoleSource::select(
            self.north_key.as_deref(),
            self.south_key.as_deref(),
            self.activation_key.as_deref(),
            self.hold_to_magnetize,
        )
    }
}

/// A magnetic block bound to an engine rigid body.
///
/// Owned by the session (the "host object"); the registry only keeps a
/// weak handle. Pole state lives in atomics so it can change while the
/// registry holds shared references.
pub struct Magnet<B: RigidBody> {
    key: EntityKey,
    body: B,
    source: PoleSource,
    charge_magnitude: f64,
    pole_offset: Vector3<f64>,
    polarity: AtomicI8,
    activated: AtomicBool,
}

impl<B: RigidBody> Magnet<B> {
    /// Builds a magnet from its configuration.
    pub fn new(key: EntityKey, body: B, config: &MagnetConfig) -> Self {
        let source = config.pole_source();
        let initial = source.initial_state(Polarity::from_menu_index(config.pole_type));
        Self {
            key,
            body,
            source,
            charge_magnitude: config.charge * config.charge_gain,
            pole_offset: Vector3::from(config.pole_offset),
            polarity: AtomicI8::new(initial.polarity.sign() as i8),
            activated: AtomicBool::new(initial.activated),
        }
    }
    
    pub fn source(&self) -> &PoleSource {
        &self.source
    }
    
    pub fn body(&self) -> &B {
        &self.body
    }
    
    pub fn is_electromagnet(&self) -> bool {
        self.source.is_electromagnet()
    }
    
    /// Stored polarity and activation.
    pub fn state(&self) -> PoleState {
        PoleState {
            polarity: Polarity::from_wire(self.polarity.load(Ordering::Relaxed) as i32),
            activated: self.activated.load(Ordering::Relaxed),
        }
    }
    
    fn store(&self, state: PoleState) {
        self.polarity.store(state.polarity.sign() as i8, Ordering::Relaxed);
        self.activated.store(state.activated, Ordering::Relaxed);
    }
    
    /// Samples controls and advances the pole state machine.
    ///
    /// Returns the new effective polarity when it changed.
    pub fn update_pole<I: ControlInput + ?Sized>(&self, input: &I) -> Option<Polarity> {
        self.apply_inputs(self.source.sample(input))
    }
    
    /// Advances the pole state machine with pre-sampled inputs.
    pub fn apply_inputs(&self, inputs: PoleInputs) -> Option<Polarity> {
        let before = self.state();
        let after = self.source.next(before, inputs);
        self.store(after);
        (after.effective() != before.effective()).then(|| after.effective())
    }
    
    /// Sets the menu polarity of a natural or single-key magnet.
    ///
    /// Dual-key electromagnets take their polarity from the controls and
    /// ignore the menu. Returns the new effective polarity when it changed.
    pub fn select_polarity(&self, polarity: Polarity) -> Option<Polarity> {
        if matches!(self.source, PoleSource::DualKey { .. }) {
            return None;
        }
        let before = self.state();
        let after = PoleState { polarity, ..before };
        self.store(after);
        (after.effective() != before.effective()).then(|| after.effective())
    }
    
    /// Overwrites the presented polarity with a replicated value.
    pub fn apply_replicated(&self, polarity: Polarity) {
        self.store(PoleState {
            polarity,
            activated: true,
        });
    }
}

impl<B: RigidBody> Monopole for Magnet<B> {
    fn key(&self) -> EntityKey {
        self.key
    }
    
    fn pole_position(&self) -> Vector3<f64> {
        self.body.world_position() + self.body.world_rotation() * self.pole_offset
    }
    
    fn polarity(&self) -> Polarity {
        self.state().effective()
    }
    
    fn charge(&self) -> f64 {
        self.charge_magnitude * self.polarity().sign() as f64
    }
    
    fn apply_force(&self, force: Vector3<f64>) {
        self.body.apply_force_at_point(force, self.pole_position());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lodestone_env::NodeId;
    use nalgebra::UnitQuaternion;
    use std::sync::Mutex;
    
    /// Minimal body that records applied forces.
    pub(crate) struct TestBody {
        pub position: Mutex<Vector3<f64>>,
        pub rotation: UnitQuaternion<f64>,
        pub forces: Mutex<Vec<Vector3<f64>>>,
    }
    
    impl TestBody {
        pub(crate) fn at(x: f64, y: f64, z: f64) -> Self {
            Self {
                position: Mutex::new(Vector3::new(x, y, z)),
                rotation: UnitQuaternion::identity(),
                forces: Mutex::new(Vec::new()),
            }
        }
        
        pub(crate) fn total_force(&self) -> Vector3<f64> {
            self.forces.lock().unwrap().iter().sum()
        }
        
        pub(crate) fn force_calls(&self) -> usize {
            self.forces.lock().unwrap().len()
        }
    }
    
    impl RigidBody for TestBody {
        fn world_position(&self) -> Vector3<f64> {
            *self.position.lock().unwrap()
        }
        
        fn world_rotation(&self) -> UnitQuaternion<f64> {
            self.rotation
        }
        
        fn apply_force_at_point(&self, force: Vector3<f64>, _point: Vector3<f64>) {
            self.forces.lock().unwrap().push(force);
        }
    }
    
    pub(crate) fn key(index: u32) -> EntityKey {
        EntityKey::new(NodeId::from_seed(0), index)
    }
    
    #[test]
    fn test_natural_magnet_charge_sign() {
        let north = Magnet::new(key(0), TestBody::at(0.0, 0.0, 0.0), &MagnetConfig::natural(2.0, Polarity::North));
        let south = Magnet::new(key(1), TestBody::at(0.0, 0.0, 0.0), &MagnetConfig::natural(2.0, Polarity::South));
        assert_eq!(north.charge(), 2.0);
        assert_eq!(south.charge(), -2.0);
        assert!(north.is_magnetized());
    }
    
    #[test]
    fn test_charge_gain_multiplies() {
        let config = MagnetConfig {
            charge: 2.0,
            charge_gain: 1.5,
            ..MagnetConfig::default()
        };
        let magnet = Magnet::new(key(0), TestBody::at(0.0, 0.0, 0.0), &config);
        assert_eq!(magnet.charge(), 3.0);
    }
    
    #[test]
    fn test_electromagnet_starts_off() {
        let magnet = Magnet::new(key(0), TestBody::at(0.0, 0.0, 0.0), &MagnetConfig::electromagnet(1.0, "n", "s", true));
        assert!(magnet.is_electromagnet());
        assert_eq!(magnet.charge(), 0.0);
        assert!(!magnet.is_magnetized());
    }
    
    #[test]
    fn test_pole_offset_follows_rotation() {
        let mut body = TestBody::at(1.0, 0.0, 0.0);
        body.rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let config = MagnetConfig {
            pole_offset: [0.0, 0.0, 1.0],
            ..MagnetConfig::default()
        };
        let magnet = Magnet::new(key(0), body, &config);
        let pole = magnet.pole_position();
        approx::assert_relative_eq!(pole, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    }
    
    #[test]
    fn test_update_pole_reports_changes_only() {
        use crate::input::ControlSample;
        let magnet = Magnet::new(key(0), TestBody::at(0.0, 0.0, 0.0), &MagnetConfig::electromagnet(1.0, "n", "s", true));
        let held = PoleInputs { north: ControlSample::HELD, south: ControlSample::default() };
        assert_eq!(magnet.apply_inputs(held), Some(Polarity::North));
        assert_eq!(magnet.apply_inputs(held), None);
        assert_eq!(magnet.apply_inputs(PoleInputs::default()), Some(Polarity::None));
    }
    
    #[test]
    fn test_menu_selection_flips_charge() {
        let magnet = Magnet::new(key(0), TestBody::at(0.0, 0.0, 0.0), &MagnetConfig::natural(1.0, Polarity::North));
        assert_eq!(magnet.select_polarity(Polarity::South), Some(Polarity::South));
        assert_eq!(magnet.charge(), -1.0);
        assert_eq!(magnet.select_polarity(Polarity::South), None);
    }
    
    #[test]
    fn test_dual_key_ignores_menu_selection() {
        let magnet = Magnet::new(key(0), TestBody::at(0.0, 0.0, 0.0), &MagnetConfig::electromagnet(1.0, "n", "s", true));
        assert_eq!(magnet.select_polarity(Polarity::North), None);
        assert_eq!(magnet.polarity(), Polarity::None);
    }
}
