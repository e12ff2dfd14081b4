//! Common types for the Lodestone environment abstraction.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a simulation participant (host or observer).
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Creates a new random NodeId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a NodeId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
    
    /// Creates a deterministic NodeId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
    
    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Stable identity of one magnetic block.
///
/// The owner component keeps blocks of independent constructions apart
/// when several players share a session; the index is the block's slot
/// within its owner's construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Participant that built the block
    pub owner: NodeId,
    
    /// Block slot within the owner's construction
    pub index: u32,
}

impl EntityKey {
    /// Creates a key for block `index` owned by `owner`.
    pub fn new(owner: NodeId, index: u32) -> Self {
        Self { owner, index }
    }
    
    /// Identity string used on the wire.
    ///
    /// Unlike `Display` this carries the full owner UUID.
    pub fn wire_id(&self) -> String {
        format!("{}#{}", self.owner.as_uuid(), self.index)
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner, self.index)
    }
}

impl FromStr for EntityKey {
    type Err = String;
    
    /// Parses the `wire_id` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, index) = s
            .split_once('#')
            .ok_or_else(|| format!("Missing '#' in entity key: {}", s))?;
        let owner = Uuid::parse_str(owner).map_err(|e| format!("Bad owner in {}: {}", s, e))?;
        let index = index.parse::<u32>().map_err(|e| format!("Bad index in {}: {}", s, e))?;
        Ok(Self::new(NodeId::from_uuid(owner), index))
    }
}

/// Whether a participant runs the authoritative simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authority {
    /// Runs physics, classification and replication
    Host,
    
    /// Applies replicated state only
    Observer,
}

impl Authority {
    /// Returns true for the host.
    pub fn is_host(&self) -> bool {
        matches!(self, Authority::Host)
    }
}

/// Envelope for replication payloads transmitted between participants.
///
/// This is a transport-layer wrapper - the payload is opaque bytes that
/// the receiving engine decodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The raw payload bytes
    pub payload: Vec<u8>,
    
    /// Sender's simulation tick when the envelope was built
    pub tick: u64,
}

impl Envelope {
    /// Creates a new envelope from payload bytes.
    pub fn new(payload: Vec<u8>, tick: u64) -> Self {
        Self { payload, tick }
    }
    
    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_node_id_from_seed_is_deterministic() {
        assert_eq!(NodeId::from_seed(7), NodeId::from_seed(7));
        assert_ne!(NodeId::from_seed(7), NodeId::from_seed(8));
    }
    
    #[test]
    fn test_entity_key_wire_id_parses_back() {
        let key = EntityKey::new(NodeId::from_seed(3), 12);
        let parsed: EntityKey = key.wire_id().parse().unwrap();
        assert_eq!(parsed, key);
    }
    
    #[test]
    fn test_entity_key_distinguishes_owners() {
        let a = EntityKey::new(NodeId::from_seed(1), 0);
        let b = EntityKey::new(NodeId::from_seed(2), 0);
        assert_ne!(a.wire_id(), b.wire_id());
    }
    
    #[test]
    fn test_entity_key_rejects_garbage() {
        assert!("not-a-key".parse::<EntityKey>().is_err());
        assert!("abc#1".parse::<EntityKey>().is_err());
    }
}
