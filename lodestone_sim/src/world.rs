//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::network::{Delivery, NetworkMessage, SimNetwork, SimNetworkController};
use crate::oracle::{BodyHandle, BodyOracle};
use crate::participant::SimParticipant;

use lodestone_core::{CoreError, GaussmeterConfig, MagnetConfig, PhysicalConstants, Polarity, TickReport};
use lodestone_env::{Authority, ControlInput, EntityKey, Envelope, NetworkController, NoInput, NodeId, SimulationContext};
use nalgebra::{UnitQuaternion, Vector3};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,
    
    /// Number of observer participants besides the host
    pub observers: usize,
    
    /// Tick rate in Hz
    pub tick_rate_hz: u32,
    
    /// Placement jitter standard deviation for spawned bodies (0 = exact)
    pub placement_noise_std: f64,
    
    /// Physical constants for every participant's registry
    pub constants: PhysicalConstants,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            observers: 2,
            tick_rate_hz: 30,
            placement_noise_std: 0.0,
            constants: PhysicalConstants::default(),
        }
    }
}

impl SimConfig {
    /// Length of one fixed step.
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

/// Router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Envelopes placed in a recipient's inbox
    pub delivered: u64,
    
    /// Envelopes dropped by an active partition
    pub partitioned: u64,
    
    /// Envelopes dropped by link loss
    pub lost: u64,
    
    /// Envelopes addressed to an unknown participant
    pub undeliverable: u64,
}

impl RouteStats {
    fn absorb(&mut self, other: RouteStats) {
        self.delivered += other.delivered;
        self.partitioned += other.partitioned;
        self.lost += other.lost;
        self.undeliverable += other.undeliverable;
    }
}

/// What happened during one world tick.
#[derive(Debug, Clone, Default)]
pub struct WorldTickReport {
    /// World tick number (1-based)
    pub tick: u64,
    
    /// The host session's report
    pub host: TickReport,
    
    /// Router counters for this tick
    pub routing: RouteStats,
    
    /// Replicated updates observers applied this tick
    pub observers_applied: usize,
}

/// The SimWorld - container for the entire simulation.
///
/// One host and any number of observers, all bound to the same oracle
/// bodies. Each tick runs the host session, routes its envelopes, runs
/// the observers, then moves the bodies.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,
    
    /// Host simulation context (the shared virtual clock)
    pub context: Arc<SimContext>,
    
    /// Ground truth oracle
    pub oracle: BodyOracle,
    
    /// Network controller for fault injection
    pub network_controller: Arc<SimNetworkController>,
    
    /// Host first, then observers
    participants: Vec<SimParticipant>,
    
    /// Per-participant inbox senders
    inboxes: HashMap<NodeId, mpsc::UnboundedSender<(NodeId, Envelope)>>,
    
    /// Central router receiver
    router_rx: mpsc::UnboundedReceiver<NetworkMessage>,
    
    /// Next block index
    next_index: u32,
    
    /// Router counters since creation
    totals: RouteStats,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        // Derive separate seeds for different subsystems
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let network_seed = config.seed.wrapping_mul(0x517cc1b727220a95);
        
        let context = SimContext::shared(config.seed, config.fixed_dt());
        
        let mut oracle = BodyOracle::new(physics_seed);
        oracle.set_placement_noise(config.placement_noise_std);
        
        let network_controller = Arc::new(SimNetworkController::new(network_seed));
        
        // Create central router channel
        let (router_tx, router_rx) = mpsc::unbounded_channel::<NetworkMessage>();
        
        let ids: Vec<NodeId> = (0..=config.observers).map(|i| NodeId::from_seed(i as u64)).collect();
        let mut participants = Vec::with_capacity(ids.len());
        let mut inboxes = HashMap::new();
        
        for (i, node_id) in ids.iter().copied().enumerate() {
            let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
            let network = Arc::new(SimNetwork::new(node_id, router_tx.clone(), inbox_rx));
            network.set_peers(&ids);
            
            let authority = if i == 0 { Authority::Host } else { Authority::Observer };
            let participant_context = Arc::new(context.with_authority(authority));
            
            participants.push(SimParticipant::new(participant_context, network, i as u64, config.constants));
            inboxes.insert(node_id, inbox_tx);
        }
        
        Self {
            config,
            context,
            oracle,
            network_controller,
            participants,
            inboxes,
            router_rx,
            next_index: 0,
            totals: RouteStats::default(),
        }
    }
    
    pub fn host(&self) -> &SimParticipant {
        &self.participants[0]
    }
    
    pub fn host_id(&self) -> NodeId {
        self.host().node_id()
    }
    
    pub fn observers(&self) -> &[SimParticipant] {
        &self.participants[1..]
    }
    
    pub fn observer_ids(&self) -> Vec<NodeId> {
        self.observers().iter().map(|p| p.node_id()).collect()
    }
    
    pub fn participants(&self) -> &[SimParticipant] {
        &self.participants
    }
    
    fn next_key(&mut self) -> EntityKey {
        let key = EntityKey::new(self.host_id(), self.next_index);
        self.next_index += 1;
        key
    }
    
    /// Spawns a magnet block on every participant, bound to one new body.
    pub fn spawn_magnet(
        &mut self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        config: &MagnetConfig,
    ) -> (EntityKey, BodyHandle) {
        let body = self.oracle.spawn_body(position, velocity, UnitQuaternion::identity());
        let key = self.next_key();
        for participant in &mut self.participants {
            participant.session_mut().spawn_magnet(key, body.clone(), config);
        }
        debug!("spawned magnet {} on body {}", key, body.id);
        (key, body)
    }
    
    /// Spawns a gaussmeter block on every participant.
    pub fn spawn_gaussmeter(
        &mut self,
        position: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
        config: GaussmeterConfig,
    ) -> Result<(EntityKey, BodyHandle), CoreError> {
        let body = self.oracle.spawn_body(position, Vector3::zeros(), rotation);
        let key = self.next_key();
        for participant in &mut self.participants {
            participant.session_mut().spawn_gaussmeter(key, body.clone(), config.clone())?;
        }
        debug!("spawned gaussmeter {} on body {}", key, body.id);
        Ok((key, body))
    }
    
    /// Removes a block from every participant.
    pub fn despawn(&mut self, key: &EntityKey) -> bool {
        let mut removed = false;
        for participant in &mut self.participants {
            removed |= participant.session_mut().despawn(key);
        }
        removed
    }
    
    /// Enters simulation on every participant.
    pub fn start_simulation(&mut self) {
        for participant in &mut self.participants {
            participant.session_mut().start_simulation();
        }
    }
    
    /// Leaves simulation on every participant.
    pub fn stop_simulation(&mut self) {
        for participant in &mut self.participants {
            participant.session_mut().stop_simulation();
        }
    }
    
    /// Advances simulation by one tick.
    pub fn tick<I: ControlInput + ?Sized>(&mut self, input: &I) -> WorldTickReport {
        let tick = self.context.advance_tick();
        
        let host = self.participants[0].tick(input).clone();
        let routing = self.route();
        
        let mut observers_applied = 0;
        for observer in self.participants.iter_mut().skip(1) {
            observers_applied += observer.tick(&NoInput).messages_applied;
        }
        
        self.oracle.step(self.context.fixed_dt().as_secs_f64());
        
        WorldTickReport {
            tick,
            host,
            routing,
            observers_applied,
        }
    }
    
    /// Routes pending envelopes into recipients' inboxes.
    pub fn route(&mut self) -> RouteStats {
        let mut stats = RouteStats::default();
        
        while let Ok(msg) = self.router_rx.try_recv() {
            match self.network_controller.route(msg.from, msg.to) {
                Delivery::Partitioned => {
                    trace!("partition dropped {} -> {}", msg.from, msg.to);
                    stats.partitioned += 1;
                }
                Delivery::Lost => {
                    trace!("link loss dropped {} -> {}", msg.from, msg.to);
                    stats.lost += 1;
                }
                Delivery::Delivered => match self.inboxes.get(&msg.to) {
                    Some(inbox) if inbox.send((msg.from, msg.envelope)).is_ok() => stats.delivered += 1,
                    _ => stats.undeliverable += 1,
                },
            }
        }
        
        self.totals.absorb(stats);
        stats
    }
    
    /// Splits `nodes` off from everyone else.
    pub fn isolate(&self, nodes: &[NodeId]) {
        let rest: Vec<NodeId> = self
            .participants
            .iter()
            .map(|p| p.node_id())
            .filter(|id| !nodes.contains(id))
            .collect();
        self.network_controller.partition(nodes, &rest);
    }
    
    pub fn heal(&self) {
        self.network_controller.heal_all();
    }
    
    /// Polarity presented for `key` by each participant, host first.
    pub fn presented(&self, key: &EntityKey) -> Vec<Polarity> {
        self.participants.iter().map(|p| p.presented(key)).collect()
    }
    
    /// True when every observer presents what the host holds for `key`.
    pub fn converged(&self, key: &EntityKey) -> bool {
        let host = self.host().presented(key);
        self.observers().iter().all(|p| p.presented(key) == host)
    }
    
    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }
    
    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.context.tick()
    }
    
    /// Returns the number of participants, host included.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
    
    /// Router counters since creation.
    pub fn totals(&self) -> RouteStats {
        self.totals
    }
}
