//! Engine capabilities consumed by the magnet engine.
//!
//! Rigid-body dynamics and raw key handling belong to the hosting engine.
//! The magnet engine only needs to read a body's pose, push a force into it,
//! and ask whether a named control is held or was just pressed.

use nalgebra::{UnitQuaternion, Vector3};

/// An opaque rigid body owned by the hosting engine.
///
/// Methods take `&self`: the engine owns the body and its interior state,
/// the magnet engine only holds handles to it.
pub trait RigidBody: Send + Sync {
    /// World-space position of the body origin.
    fn world_position(&self) -> Vector3<f64>;
    
    /// World-space orientation of the body.
    fn world_rotation(&self) -> UnitQuaternion<f64>;
    
    /// World-space forward axis (unit length).
    fn world_forward(&self) -> Vector3<f64> {
        self.world_rotation() * Vector3::z()
    }
    
    /// Applies a world-space force at a world-space point.
    fn apply_force_at_point(&self, force: Vector3<f64>, point: Vector3<f64>);
}

/// Per-control input state for the current frame.
///
/// Controls are addressed by name. Each has a physical state (local keys)
/// and an emulated state (driven by other blocks or remote clients).
pub trait ControlInput {
    /// The physical control is currently held.
    fn is_held(&self, control: &str) -> bool;
    
    /// The physical control went down this frame.
    fn is_pressed(&self, control: &str) -> bool;
    
    /// The control is held through emulation.
    fn emulation_held(&self, control: &str) -> bool;
    
    /// The control was pressed through emulation this frame.
    fn emulation_pressed(&self, control: &str) -> bool;
}

/// Input source with nothing held, used by observers and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl ControlInput for NoInput {
    fn is_held(&self, _control: &str) -> bool {
        false
    }
    
    fn is_pressed(&self, _control: &str) -> bool {
        false
    }
    
    fn emulation_held(&self, _control: &str) -> bool {
        false
    }
    
    fn emulation_pressed(&self, _control: &str) -> bool {
        false
    }
}
