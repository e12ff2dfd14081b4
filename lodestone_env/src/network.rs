//! Replication transport abstraction for Lodestone participants.

use crate::error::EnvError;
use crate::types::{Envelope, NodeId};

/// Abstraction for replication I/O between participants.
///
/// # Implementations
///
/// - **Production**: wraps whatever channel the hosting engine offers
/// - **Simulation**: channel-based with partitions and seeded loss
///
/// # Packet Flow
///
/// ```text
/// Host                       Network                    Observer
///   |                           |                          |
///   |-- broadcast(envelope) --->|                          |
///   |                           |-- [partition/loss] ----->|
///   |                           |                          |-- try_recv() -> envelope
/// ```
///
/// All calls are non-blocking; the session drains the inbox once per tick.
pub trait ReplicationTransport: Send + Sync + 'static {
    /// Sends an envelope to a single participant.
    ///
    /// # Returns
    /// * `Ok(())` - Envelope queued for delivery
    /// * `Err(EnvError::ChannelClosed)` - The router is gone
    ///
    /// # Note
    /// Success does not guarantee delivery - envelopes may be dropped in simulation.
    fn send(&self, target: NodeId, envelope: Envelope) -> Result<(), EnvError>;
    
    /// Sends an envelope to every known peer.
    ///
    /// # Returns
    /// Number of peers the envelope was queued for.
    fn broadcast(&self, envelope: Envelope) -> Result<usize, EnvError>;
    
    /// Takes the next envelope addressed to this participant, if any.
    fn try_recv(&self) -> Option<(NodeId, Envelope)>;
    
    /// Returns this participant's ID.
    fn local_id(&self) -> NodeId;
}

/// Marker trait for network controllers in simulation.
///
/// Allows injecting faults like partitions and packet loss.
pub trait NetworkController: Send + Sync {
    /// Creates a network partition between two node sets.
    fn partition(&self, group_a: &[NodeId], group_b: &[NodeId]);
    
    /// Heals all partitions.
    fn heal_all(&self);
    
    /// Sets packet loss probability for a link (0.0 - 1.0).
    fn set_link_loss(&self, from: NodeId, to: NodeId, loss_rate: f64);
}
