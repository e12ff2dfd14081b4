//! JSON exporter for offline inspection.
//!
//! Exports simulation frames (body positions and forces, presented
//! polarities, gaussmeter densities, events) as one JSON document.

use crate::world::SimWorld;
use lodestone_core::Monopole;
use lodestone_env::EntityKey;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// World tick
    pub tick: u64,
    
    /// Simulation time in seconds
    pub time_sec: f64,
    
    /// Ground truth bodies with the net force of the last tick
    pub bodies: Vec<BodyFrame>,
    
    /// Per-block presented state
    pub blocks: Vec<BlockFrame>,
    
    /// Events (pole changes, partitions, etc.)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// Position and last-tick force of a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyFrame {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
}

impl BodyFrame {
    pub fn new(id: u64, pos: Vector3<f64>, force: Vector3<f64>) -> Self {
        Self {
            id,
            x: pos.x,
            y: pos.y,
            z: pos.z,
            fx: force.x,
            fy: force.y,
            fz: force.z,
        }
    }
}

/// Block state as each participant presents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFrame {
    /// Replication identity
    pub identity: String,
    
    /// "magnet" or "gaussmeter"
    pub kind: String,
    
    /// Host polarity as a wire value
    pub host: i32,
    
    /// Observer polarities as wire values
    pub observers: Vec<i32>,
    
    /// Measured density (gaussmeters only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(tick: u64, message: impl Into<String>) -> Self {
        Self {
            tick,
            message: message.into(),
            level: None,
        }
    }
    
    pub fn warn(tick: u64, message: impl Into<String>) -> Self {
        Self {
            tick,
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

impl SimFrame {
    /// Captures the world's current state.
    pub fn capture(world: &SimWorld, events: Vec<SimEvent>) -> Self {
        let bodies = world
            .oracle
            .bodies()
            .iter()
            .map(|b| BodyFrame::new(b.id, b.state().position, b.last_force()))
            .collect();
        
        let host = world.host().session();
        let observers = world.observers();
        let presented = |key: &EntityKey| observers.iter().map(|o| o.presented(key).to_wire()).collect::<Vec<_>>();
        
        let mut blocks: Vec<BlockFrame> = host
            .magnets()
            .iter()
            .map(|m| BlockFrame {
                identity: m.key().wire_id(),
                kind: "magnet".to_string(),
                host: m.polarity().to_wire(),
                observers: presented(&m.key()),
                density: None,
            })
            .collect();
        blocks.extend(host.gaussmeters().iter().map(|g| BlockFrame {
            identity: g.key().wire_id(),
            kind: "gaussmeter".to_string(),
            host: g.polarity().to_wire(),
            observers: presented(&g.key()),
            density: Some(g.measured_density()),
        }));
        
        Self {
            tick: world.tick_count(),
            time_sec: world.time(),
            bodies,
            blocks,
            events,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,
    
    /// Seed used
    pub seed: u64,
    
    /// Duration in seconds
    pub duration_sec: f64,
    
    /// All frames
    pub frames: Vec<SimFrame>,
    
    /// Final results
    pub passed: bool,
    
    /// Failure message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }
    
    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }
    
    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }
    
    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
