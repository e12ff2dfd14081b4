//! Simulation context implementing SimulationContext for deterministic testing.

use lodestone_env::{Authority, SimulationContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulation context backed by a virtual clock.
///
/// Every participant of a world holds its own `SimContext` (its own
/// authority) but they all share one clock:
/// - time only moves when the world advances a tick
/// - the tick counter is the world's fixed-step counter
#[derive(Debug, Clone)]
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,
    
    /// Host or observer
    authority: Authority,
    
    /// Length of one fixed step
    fixed_dt: Duration,
    
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,
    
    /// Fixed steps completed
    tick: Arc<AtomicU64>,
}

impl SimContext {
    /// Creates a host context with the given seed and step length.
    pub fn new(seed: u64, fixed_dt: Duration) -> Self {
        Self {
            seed,
            authority: Authority::Host,
            fixed_dt,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
            tick: Arc::new(AtomicU64::new(0)),
        }
    }
    
    /// Creates an Arc-wrapped host context for sharing.
    pub fn shared(seed: u64, fixed_dt: Duration) -> Arc<Self> {
        Arc::new(Self::new(seed, fixed_dt))
    }
    
    /// Returns a context on the same clock with a different authority.
    pub fn with_authority(&self, authority: Authority) -> Self {
        Self {
            authority,
            ..self.clone()
        }
    }
    
    /// Completes one fixed step: bumps the tick and advances time by `fixed_dt`.
    pub fn advance_tick(&self) -> u64 {
        self.advance_time(self.fixed_dt);
        self.tick.fetch_add(1, Ordering::SeqCst) + 1
    }
    
    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
    
    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        self.virtual_time_ns.store(time_ns, Ordering::SeqCst);
    }
    
    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }
}

impl SimulationContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }
    
    fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }
    
    fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }
    
    fn authority(&self) -> Authority {
        self.authority
    }
    
    fn seed(&self) -> u64 {
        self.seed
    }
}
