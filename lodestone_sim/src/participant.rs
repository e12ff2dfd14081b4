//! SimParticipant - runs a MagnetSession inside the simulation.
//!
//! This module bridges `lodestone_core::MagnetSession` with the simulation
//! infrastructure: a shared virtual clock, the routed network and the
//! oracle's bodies.

use crate::context::SimContext;
use crate::network::SimNetwork;
use crate::oracle::BodyHandle;

use lodestone_core::{MagnetSession, PhysicalConstants, Polarity, TickReport};
use lodestone_env::{Authority, ControlInput, EntityKey, NodeId};
use std::sync::Arc;

/// Session type every simulated participant runs.
pub type SimSession = MagnetSession<SimContext, SimNetwork, BodyHandle>;

/// A participant (host or observer) in the deterministic environment.
pub struct SimParticipant {
    /// The underlying magnet session
    inner: SimSession,
    
    /// Participant index (0 is the host)
    index: u64,
    
    /// Report of the most recent tick
    last_report: TickReport,
}

impl SimParticipant {
    /// Creates a new simulated participant.
    ///
    /// # Arguments
    /// * `context` - Simulation context carrying this participant's authority
    /// * `network` - Network interface
    /// * `index` - Index for identification
    /// * `constants` - Physical constants for the session registry
    pub fn new(
        context: Arc<SimContext>,
        network: Arc<SimNetwork>,
        index: u64,
        constants: PhysicalConstants,
    ) -> Self {
        Self {
            inner: MagnetSession::new(context, network, constants),
            index,
            last_report: TickReport::default(),
        }
    }
    
    /// Returns the participant's node ID.
    pub fn node_id(&self) -> NodeId {
        self.inner.node_id
    }
    
    pub fn authority(&self) -> Authority {
        self.inner.authority()
    }
    
    pub fn is_host(&self) -> bool {
        self.authority().is_host()
    }
    
    /// Runs one session tick.
    pub fn tick<I: ControlInput + ?Sized>(&mut self, input: &I) -> &TickReport {
        self.last_report = self.inner.tick(input);
        &self.last_report
    }
    
    /// Polarity this participant presents for `key`.
    pub fn presented(&self, key: &EntityKey) -> Polarity {
        self.inner.presented_polarity(key)
    }
    
    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }
    
    /// Returns a reference to the inner session.
    pub fn session(&self) -> &SimSession {
        &self.inner
    }
    
    /// Returns a mutable reference to the inner session.
    pub fn session_mut(&mut self) -> &mut SimSession {
        &mut self.inner
    }
    
    /// Returns the participant index.
    pub fn index(&self) -> u64 {
        self.index
    }
}
