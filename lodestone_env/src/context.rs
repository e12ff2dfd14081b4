//! Core environment context trait for Lodestone sessions.

use crate::types::Authority;
use std::time::Duration;

/// The central interface for the fixed-timestep loop a session runs in.
///
/// This trait abstracts the hosting engine so that the magnet engine can
/// run inside a game loop or inside the deterministic harness.
///
/// # Implementations
///
/// - **Simulation**: `SimContext` - virtual clock advanced per tick
pub trait SimulationContext: Send + Sync + 'static {
    /// Returns the current monotonic time since simulation start.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;
    
    /// Returns the number of fixed steps completed so far.
    fn tick(&self) -> u64;
    
    /// Returns the length of one fixed step.
    fn fixed_dt(&self) -> Duration;
    
    /// Returns whether this participant is the host.
    ///
    /// Only the host runs the force pass, classification and replication.
    fn authority(&self) -> Authority;
    
    /// Returns the context's seed (for logging/debugging).
    fn seed(&self) -> u64;
}
