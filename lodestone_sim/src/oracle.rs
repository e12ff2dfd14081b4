//! Ground truth oracle for simulation.
//!
//! The Oracle owns the simulated rigid bodies every participant's blocks
//! are bound to:
//! - True positions and orientations
//! - Scripted kinematics (constant velocity; forces never move a body)
//! - A record of every force the host applied, per tick

use crate::locked;
use lodestone_env::RigidBody;
use nalgebra::{UnitQuaternion, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Kinematic state of a body, as exported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    /// Position [x, y, z] in meters (world frame)
    pub position: Vector3<f64>,
    
    /// Velocity [vx, vy, vz] in m/s
    pub velocity: Vector3<f64>,
}

/// A ground truth body in the simulation.
#[derive(Debug)]
pub struct SimBody {
    /// Unique body ID
    pub id: u64,
    
    state: Mutex<BodyState>,
    rotation: UnitQuaternion<f64>,
    
    /// Net force accumulated during the current tick
    pending_force: Mutex<Vector3<f64>>,
    
    /// Net force committed at the end of the last tick
    last_force: Mutex<Vector3<f64>>,
    
    /// Total `apply_force_at_point` calls
    force_calls: AtomicUsize,
}

impl SimBody {
    fn new(id: u64, position: Vector3<f64>, velocity: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            id,
            state: Mutex::new(BodyState { position, velocity }),
            rotation,
            pending_force: Mutex::new(Vector3::zeros()),
            last_force: Mutex::new(Vector3::zeros()),
            force_calls: AtomicUsize::new(0),
        }
    }
    
    pub fn state(&self) -> BodyState {
        *locked(&self.state)
    }
    
    /// Net force applied during the current (uncommitted) tick.
    pub fn pending_force(&self) -> Vector3<f64> {
        *locked(&self.pending_force)
    }
    
    /// Net force applied during the last committed tick.
    pub fn last_force(&self) -> Vector3<f64> {
        *locked(&self.last_force)
    }
    
    pub fn force_calls(&self) -> usize {
        self.force_calls.load(Ordering::SeqCst)
    }
    
    /// Commits the tick's force and moves the body along its velocity.
    fn step(&self, dt: f64) {
        let force = std::mem::replace(&mut *locked(&self.pending_force), Vector3::zeros());
        *locked(&self.last_force) = force;
        
        let mut state = locked(&self.state);
        let velocity = state.velocity;
        state.position += velocity * dt;
    }
}

/// Shared handle to a body; what sessions bind their blocks to.
#[derive(Debug, Clone)]
pub struct BodyHandle(Arc<SimBody>);

impl Deref for BodyHandle {
    type Target = SimBody;
    
    fn deref(&self) -> &SimBody {
        &self.0
    }
}

impl RigidBody for BodyHandle {
    fn world_position(&self) -> Vector3<f64> {
        self.state().position
    }
    
    fn world_rotation(&self) -> UnitQuaternion<f64> {
        self.0.rotation
    }
    
    fn apply_force_at_point(&self, force: Vector3<f64>, _point: Vector3<f64>) {
        *locked(&self.0.pending_force) += force;
        self.0.force_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// The Oracle - owns ground truth bodies.
pub struct BodyOracle {
    /// RNG for placement jitter
    physics_rng: ChaCha8Rng,
    
    /// All bodies, in spawn order
    bodies: Vec<BodyHandle>,
    
    /// Current simulation time (seconds)
    current_time: f64,
    
    /// Gaussian placement jitter, if enabled
    placement_noise: Option<Normal<f64>>,
}

impl BodyOracle {
    /// Creates a new Oracle with the given physics seed.
    ///
    /// Note: The physics seed should be derived separately from the network seed
    /// so that changing network faults doesn't affect placement.
    pub fn new(physics_seed: u64) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            bodies: Vec::new(),
            current_time: 0.0,
            placement_noise: None,
        }
    }
    
    /// Sets the placement jitter standard deviation. Zero or invalid disables it.
    pub fn set_placement_noise(&mut self, std_dev: f64) {
        self.placement_noise = if std_dev > 0.0 {
            Normal::new(0.0, std_dev).ok()
        } else {
            None
        };
    }
    
    /// Spawns a body and returns a handle to it.
    pub fn spawn_body(
        &mut self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> BodyHandle {
        let position = match &self.placement_noise {
            Some(normal) => {
                position
                    + Vector3::new(
                        normal.sample(&mut self.physics_rng),
                        normal.sample(&mut self.physics_rng),
                        normal.sample(&mut self.physics_rng),
                    )
            }
            None => position,
        };
        
        let id = self.bodies.len() as u64;
        let handle = BodyHandle(Arc::new(SimBody::new(id, position, velocity, rotation)));
        self.bodies.push(handle.clone());
        handle
    }
    
    /// Advances kinematics by dt seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;
        for body in &self.bodies {
            body.step(dt);
        }
    }
    
    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.current_time
    }
    
    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }
    
    /// Returns a specific body by ID.
    pub fn body(&self, id: u64) -> Option<&BodyHandle> {
        self.bodies.get(id as usize)
    }
    
    pub fn len(&self) -> usize {
        self.bodies.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_oracle_spawn_body() {
        let mut oracle = BodyOracle::new(42);
        
        let body = oracle.spawn_body(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::zeros(),
            UnitQuaternion::identity(),
        );
        
        assert_eq!(body.id, 0);
        assert_eq!(body.world_position(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(oracle.len(), 1);
    }
    
    #[test]
    fn test_oracle_kinematic_step() {
        let mut oracle = BodyOracle::new(42);
        
        let body = oracle.spawn_body(
            Vector3::zeros(),
            Vector3::new(2.0, 0.0, 0.0), // 2 m/s in x direction
            UnitQuaternion::identity(),
        );
        
        oracle.step(0.5);
        
        assert!((body.world_position().x - 1.0).abs() < 1e-12);
        assert!((oracle.time() - 0.5).abs() < 1e-12);
    }
    
    #[test]
    fn test_forces_are_recorded_not_integrated() {
        let mut oracle = BodyOracle::new(42);
        let body = oracle.spawn_body(Vector3::zeros(), Vector3::zeros(), UnitQuaternion::identity());
        
        body.apply_force_at_point(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros());
        body.apply_force_at_point(Vector3::new(0.5, 0.0, 0.0), Vector3::zeros());
        assert_eq!(body.pending_force(), Vector3::new(1.5, 0.0, 0.0));
        
        oracle.step(1.0);
        assert_eq!(body.last_force(), Vector3::new(1.5, 0.0, 0.0));
        assert_eq!(body.pending_force(), Vector3::zeros());
        assert_eq!(body.force_calls(), 2);
        
        // Force never moves the body
        assert_eq!(body.world_position(), Vector3::zeros());
    }
    
    #[test]
    fn test_oracle_deterministic_jitter() {
        let spawn = |seed| {
            let mut oracle = BodyOracle::new(seed);
            oracle.set_placement_noise(0.1);
            oracle
                .spawn_body(Vector3::zeros(), Vector3::zeros(), UnitQuaternion::identity())
                .world_position()
        };
        
        // Same seed = same jitter
        assert_eq!(spawn(42), spawn(42));
        assert_ne!(spawn(42), Vector3::zeros());
    }
}
