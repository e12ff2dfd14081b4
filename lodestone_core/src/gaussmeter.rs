//! The gaussmeter: a directional flux density sensor with hysteresis.
//!
//! Each tick the sensor sums the flux density of every registered monopole
//! at its probe, projects the sum on its forward axis and classifies the
//! signed result against a threshold:
//!
//! ```text
//!   density < -t        → North
//!   -t <= density < t   → None
//!   t <= density        → South
//! ```
//!
//! Side effects (replication, key emulation) fire on transitions only. A
//! boundary counts as crossed when the boundary-relative products of the
//! current and previous readings have opposite signs.

use crate::constants::PhysicalConstants;
use crate::error::CoreError;
use crate::input::ControlSample;
use crate::monopole::Monopole;
use crate::polarity::Polarity;
use lodestone_env::{ControlInput, EntityKey, RigidBody};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flux density vector `monopole` produces at `point`.
pub fn flux_from(monopole: &dyn Monopole, point: Vector3<f64>, constants: &PhysicalConstants) -> Vector3<f64> {
    monopole.flux_density_at(point, constants)
}

/// Tri-state classification of a signed density.
pub fn classify(density: f64, threshold: f64) -> Polarity {
    if density < -threshold {
        Polarity::North
    } else if threshold <= density {
        Polarity::South
    } else {
        Polarity::None
    }
}

/// Which threshold boundaries were crossed between two readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryCrossing {
    /// Passed through `-threshold`
    pub north: bool,
    
    /// Passed through `+threshold`
    pub south: bool,
}

impl BoundaryCrossing {
    pub fn between(density: f64, last_density: f64, threshold: f64) -> Self {
        Self {
            north: (threshold + density) * (threshold + last_density) < 0.0,
            south: (density - threshold) * (last_density - threshold) < 0.0,
        }
    }
    
    pub fn any(&self) -> bool {
        self.north || self.south
    }
}

/// Result of one classification step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussmeterReading {
    /// Gated signed density
    pub density: f64,
    
    /// Classification of `density`
    pub polarity: Polarity,
    
    /// Boundaries crossed since the previous reading
    pub crossing: BoundaryCrossing,
    
    /// Classification differs from the previous reading
    pub changed: bool,
}

impl GaussmeterReading {
    /// Whether downstream side effects should fire this tick.
    pub fn is_transition(&self) -> bool {
        self.changed || self.crossing.any()
    }
}

/// Threshold classifier remembering the previous reading.
#[derive(Debug, Clone)]
pub struct HysteresisClassifier {
    threshold: f64,
    last_density: f64,
    polarity: Polarity,
}

impl HysteresisClassifier {
    pub fn new(threshold: f64) -> Result<Self, CoreError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CoreError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            last_density: 0.0,
            polarity: Polarity::None,
        })
    }
    
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
    
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
    
    pub fn last_density(&self) -> f64 {
        self.last_density
    }
    
    /// Classifies `density` and records it as the previous reading.
    pub fn observe(&mut self, density: f64) -> GaussmeterReading {
        let polarity = classify(density, self.threshold);
        let reading = GaussmeterReading {
            density,
            polarity,
            crossing: BoundaryCrossing::between(density, self.last_density, self.threshold),
            changed: polarity != self.polarity,
        };
        self.last_density = density;
        self.polarity = polarity;
        reading
    }
    
    /// Overrides the classification with a replicated value.
    pub fn force_polarity(&mut self, polarity: Polarity) {
        self.polarity = polarity;
    }
}

/// Per-block gaussmeter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussmeterConfig {
    /// Classification threshold (Gauss)
    pub threshold: f64,
    
    /// Probe location in the body's local frame
    pub pole_offset: [f64; 3],
    
    /// Probe mounting angles in degrees about the local x, y and z axes
    pub pole_rotation: [f64; 3],
    
    /// Measure only while `activation_key` is held
    pub activate_by_key: bool,
    
    /// Control gating the measurement
    pub activation_key: Option<String>,
    
    /// Control emulated while the reading is North
    pub emulate_north: Option<String>,
    
    /// Control emulated while the reading is South
    pub emulate_south: Option<String>,
}

impl Default for GaussmeterConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            pole_offset: [0.0; 3],
            pole_rotation: [0.0; 3],
            activate_by_key: false,
            activation_key: None,
            emulate_north: Some("gaussmeter-north".to_string()),
            emulate_south: Some("gaussmeter-south".to_string()),
        }
    }
}

/// A gaussmeter block bound to an engine rigid body.
///
/// Not a monopole itself; it only reads the registry.
pub struct Gaussmeter<B: RigidBody> {
    key: EntityKey,
    body: B,
    config: GaussmeterConfig,
    classifier: HysteresisClassifier,
    measured_density: f64,
}

impl<B: RigidBody> Gaussmeter<B> {
    pub fn new(key: EntityKey, body: B, config: GaussmeterConfig) -> Result<Self, CoreError> {
        let classifier = HysteresisClassifier::new(config.threshold)?;
        Ok(Self {
            key,
            body,
            config,
            classifier,
            measured_density: 0.0,
        })
    }
    
    pub fn key(&self) -> EntityKey {
        self.key
    }
    
    pub fn body(&self) -> &B {
        &self.body
    }
    
    pub fn config(&self) -> &GaussmeterConfig {
        &self.config
    }
    
    /// World-space probe position.
    pub fn probe_position(&self) -> Vector3<f64> {
        self.body.world_position() + self.body.world_rotation() * Vector3::from(self.config.pole_offset)
    }
    
    /// Probe orientation relative to the body.
    pub fn probe_rotation(&self) -> UnitQuaternion<f64> {
        let [x, y, z] = self.config.pole_rotation.map(f64::to_radians);
        UnitQuaternion::from_euler_angles(x, y, z)
    }
    
    /// World-space measuring direction: the probe's own forward axis.
    pub fn probe_direction(&self) -> Vector3<f64> {
        self.body.world_rotation() * self.probe_rotation() * Vector3::z()
    }
    
    pub fn measured_density(&self) -> f64 {
        self.measured_density
    }
    
    pub fn last_measured_density(&self) -> f64 {
        self.classifier.last_density()
    }
    
    pub fn polarity(&self) -> Polarity {
        self.classifier.polarity()
    }
    
    /// Whether the measurement gate lets a reading through.
    ///
    /// A gate configured without a control never opens.
    pub fn gate_open<I: ControlInput + ?Sized>(&self, input: &I) -> bool {
        !self.config.activate_by_key || ControlSample::read(input, self.config.activation_key.as_deref()).held
    }
    
    /// Projected flux density of `monopoles` at the probe.
    pub fn density(&self, monopoles: &[Arc<dyn Monopole>], constants: &PhysicalConstants) -> f64 {
        let point = self.probe_position();
        let total: Vector3<f64> = monopoles
            .iter()
            .map(|m| flux_from(m.as_ref(), point, constants))
            .sum();
        total.dot(&self.probe_direction())
    }
    
    /// Takes one measurement and classifies it. Host only.
    ///
    /// A closed gate measures zero rather than holding the last value.
    pub fn measure<I: ControlInput + ?Sized>(
        &mut self,
        monopoles: &[Arc<dyn Monopole>],
        constants: &PhysicalConstants,
        input: &I,
    ) -> GaussmeterReading {
        let density = if self.gate_open(input) {
            self.density(monopoles, constants)
        } else {
            0.0
        };
        self.measured_density = density;
        self.classifier.observe(density)
    }
    
    /// Emulated control states for the current classification.
    pub fn emulation_outputs(&self) -> Vec<(&str, bool)> {
        let polarity = self.polarity();
        let mut outputs = Vec::with_capacity(2);
        if let Some(control) = self.config.emulate_north.as_deref() {
            outputs.push((control, polarity == Polarity::North));
        }
        if let Some(control) = self.config.emulate_south.as_deref() {
            outputs.push((control, polarity == Polarity::South));
        }
        outputs
    }
    
    /// Presents a replicated classification (observers).
    pub fn apply_replicated(&mut self, polarity: Polarity) {
        self.classifier.force_polarity(polarity);
    }
}
