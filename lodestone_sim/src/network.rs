//! Simulated replication transport with fault injection.

use crate::locked;
use lodestone_env::{EnvError, Envelope, NetworkController, NodeId, ReplicationTransport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Internal message to the network router.
#[derive(Debug)]
pub struct NetworkMessage {
    pub from: NodeId,
    pub to: NodeId,
    pub envelope: Envelope,
}

/// Simulated network interface for a participant.
///
/// Outgoing envelopes go to the world's central router; incoming ones are
/// drained from a per-participant inbox once per tick.
pub struct SimNetwork {
    /// This participant's ID
    local_id: NodeId,
    
    /// Sender to central router
    tx: mpsc::UnboundedSender<NetworkMessage>,
    
    /// Receiver for incoming envelopes
    rx: Mutex<mpsc::UnboundedReceiver<(NodeId, Envelope)>>,
    
    /// Participants reached by `broadcast`
    peers: Mutex<Vec<NodeId>>,
}

impl SimNetwork {
    /// Creates a new simulated network interface.
    pub fn new(
        local_id: NodeId,
        tx: mpsc::UnboundedSender<NetworkMessage>,
        rx: mpsc::UnboundedReceiver<(NodeId, Envelope)>,
    ) -> Self {
        Self {
            local_id,
            tx,
            rx: Mutex::new(rx),
            peers: Mutex::new(Vec::new()),
        }
    }
    
    /// Creates a stub network whose router is already gone.
    pub fn new_stub(local_id: NodeId) -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        let (_, rx) = mpsc::unbounded_channel();
        Self::new(local_id, tx, rx)
    }
    
    /// Replaces the broadcast peer list. The local ID is skipped.
    pub fn set_peers(&self, peers: &[NodeId]) {
        let mut current = locked(&self.peers);
        current.clear();
        current.extend(peers.iter().copied().filter(|p| *p != self.local_id));
    }
    
    pub fn peers(&self) -> Vec<NodeId> {
        locked(&self.peers).clone()
    }
}

impl ReplicationTransport for SimNetwork {
    fn send(&self, target: NodeId, envelope: Envelope) -> Result<(), EnvError> {
        let msg = NetworkMessage {
            from: self.local_id,
            to: target,
            envelope,
        };
        
        self.tx.send(msg).map_err(|_| EnvError::ChannelClosed)
    }
    
    fn broadcast(&self, envelope: Envelope) -> Result<usize, EnvError> {
        let peers = self.peers();
        for peer in &peers {
            self.send(*peer, envelope.clone())?;
        }
        Ok(peers.len())
    }
    
    fn try_recv(&self) -> Option<(NodeId, Envelope)> {
        locked(&self.rx).try_recv().ok()
    }
    
    fn local_id(&self) -> NodeId {
        self.local_id
    }
}

/// Outcome of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Partitioned,
    Lost,
}

/// Network controller for fault injection.
pub struct SimNetworkController {
    /// Per-link packet loss rate (0.0 - 1.0)
    link_loss: Mutex<HashMap<(NodeId, NodeId), f64>>,
    
    /// Active partitions (nodes that cannot communicate)
    partitions: Mutex<Vec<(Vec<NodeId>, Vec<NodeId>)>>,
    
    /// RNG for loss rolls (separate from physics so topology changes don't move bodies)
    rng: Mutex<ChaCha8Rng>,
}

impl SimNetworkController {
    /// Creates a new network controller.
    pub fn new(network_seed: u64) -> Self {
        Self {
            link_loss: Mutex::new(HashMap::new()),
            partitions: Mutex::new(Vec::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(network_seed)),
        }
    }
    
    /// Checks if two nodes can communicate (not partitioned).
    pub fn can_communicate(&self, from: NodeId, to: NodeId) -> bool {
        let partitions = locked(&self.partitions);
        
        for (group_a, group_b) in partitions.iter() {
            let from_in_a = group_a.contains(&from);
            let from_in_b = group_b.contains(&from);
            let to_in_a = group_a.contains(&to);
            let to_in_b = group_b.contains(&to);
            
            // Partitioned if one is in A and other in B (or vice versa)
            if (from_in_a && to_in_b) || (from_in_b && to_in_a) {
                return false;
            }
        }
        
        true
    }
    
    /// Gets the loss rate for a link (default 0.0).
    pub fn get_loss(&self, from: NodeId, to: NodeId) -> f64 {
        locked(&self.link_loss).get(&(from, to)).copied().unwrap_or(0.0)
    }
    
    /// Decides the fate of one message.
    ///
    /// Loss is only rolled on lossy links, so adding a lossy link never
    /// shifts the outcomes of the others.
    pub fn route(&self, from: NodeId, to: NodeId) -> Delivery {
        if !self.can_communicate(from, to) {
            return Delivery::Partitioned;
        }
        let loss = self.get_loss(from, to);
        if loss > 0.0 && locked(&self.rng).gen::<f64>() < loss {
            return Delivery::Lost;
        }
        Delivery::Delivered
    }
}

impl NetworkController for SimNetworkController {
    fn partition(&self, group_a: &[NodeId], group_b: &[NodeId]) {
        locked(&self.partitions).push((group_a.to_vec(), group_b.to_vec()));
    }
    
    fn heal_all(&self) {
        locked(&self.partitions).clear();
    }
    
    fn set_link_loss(&self, from: NodeId, to: NodeId, loss_rate: f64) {
        locked(&self.link_loss).insert((from, to), loss_rate.clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_network_controller_partition() {
        let controller = SimNetworkController::new(7);
        
        let a = NodeId::from_seed(1);
        let b = NodeId::from_seed(2);
        let c = NodeId::from_seed(3);
        
        // Initially all can communicate
        assert!(controller.can_communicate(a, b));
        assert!(controller.can_communicate(a, c));
        assert!(controller.can_communicate(b, c));
        
        // Partition: {a} vs {b, c}
        controller.partition(&[a], &[b, c]);
        
        // Now a cannot talk to b or c
        assert!(!controller.can_communicate(a, b));
        assert!(!controller.can_communicate(c, a));
        assert_eq!(controller.route(a, b), Delivery::Partitioned);
        
        // But b and c can still talk
        assert!(controller.can_communicate(b, c));
        
        // Heal
        controller.heal_all();
        assert!(controller.can_communicate(a, b));
    }
    
    #[test]
    fn test_link_loss_is_directional_and_clamped() {
        let controller = SimNetworkController::new(7);
        
        let a = NodeId::from_seed(1);
        let b = NodeId::from_seed(2);
        
        assert_eq!(controller.get_loss(a, b), 0.0);
        
        controller.set_link_loss(a, b, 3.0);
        assert_eq!(controller.get_loss(a, b), 1.0);
        assert_eq!(controller.route(a, b), Delivery::Lost);
        
        // Reverse direction is separate
        assert_eq!(controller.get_loss(b, a), 0.0);
        assert_eq!(controller.route(b, a), Delivery::Delivered);
    }
    
    #[test]
    fn test_loss_rolls_are_seeded() {
        let a = NodeId::from_seed(1);
        let b = NodeId::from_seed(2);
        let outcomes = |seed| {
            let controller = SimNetworkController::new(seed);
            controller.set_link_loss(a, b, 0.5);
            (0..64).map(|_| controller.route(a, b)).collect::<Vec<_>>()
        };
        
        let first = outcomes(99);
        assert_eq!(first, outcomes(99));
        assert!(first.contains(&Delivery::Lost));
        assert!(first.contains(&Delivery::Delivered));
    }
    
    #[test]
    fn test_broadcast_reaches_peers_through_router() {
        let (router_tx, mut router_rx) = mpsc::unbounded_channel();
        let (_inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let me = NodeId::from_seed(0);
        let network = SimNetwork::new(me, router_tx, inbox_rx);
        network.set_peers(&[me, NodeId::from_seed(1), NodeId::from_seed(2)]);
        
        let sent = network.broadcast(Envelope::new(vec![1, 2, 3], 5)).unwrap();
        assert_eq!(sent, 2);
        
        let first = router_rx.try_recv().unwrap();
        assert_eq!(first.from, me);
        assert_eq!(first.to, NodeId::from_seed(1));
        assert_eq!(first.envelope.tick, 5);
        assert!(router_rx.try_recv().is_ok());
        assert!(router_rx.try_recv().is_err());
    }
    
    #[test]
    fn test_stub_network_reports_closed_channel() {
        let network = SimNetwork::new_stub(NodeId::from_seed(0));
        let result = network.send(NodeId::from_seed(1), Envelope::new(vec![], 0));
        assert!(matches!(result, Err(EnvError::ChannelClosed)));
        assert!(network.try_recv().is_none());
    }
}
