//! Host → observer replication of derived polarity.
//!
//! The host is the only participant that computes pole states and
//! gaussmeter classifications. Whenever one of them changes it sends a
//! `(identity, polarity)` pair to every observer; observers overwrite
//! their presented polarity with whatever arrives last.

use crate::error::CoreError;
use crate::polarity::Polarity;
use lodestone_env::{EntityKey, Envelope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One replicated polarity update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationMessage {
    /// `EntityKey::wire_id` of the block
    pub target_identity: String,
    
    /// `Polarity::to_wire` value
    pub polarity_value: i32,
}

impl ReplicationMessage {
    pub fn new(target_identity: impl Into<String>, polarity: Polarity) -> Self {
        Self {
            target_identity: target_identity.into(),
            polarity_value: polarity.to_wire(),
        }
    }
    
    /// Decoded polarity; out-of-range values read as `None`.
    pub fn polarity(&self) -> Polarity {
        Polarity::from_wire(self.polarity_value)
    }
    
    /// Packs the message into a transport envelope.
    pub fn to_envelope(&self, tick: u64) -> Result<Envelope, CoreError> {
        let payload = serde_json::to_vec(self).map_err(|e| CoreError::Codec(e.to_string()))?;
        Ok(Envelope::new(payload, tick))
    }
    
    /// Unpacks a message from a transport envelope.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CoreError> {
        serde_json::from_slice(&envelope.payload).map_err(|e| CoreError::Codec(e.to_string()))
    }
}

/// Host-side bookkeeping of what each observer was last told.
#[derive(Debug, Default)]
pub struct PolarityBroadcaster {
    last_sent: HashMap<String, Polarity>,
}

impl PolarityBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Builds a message when `polarity` differs from the last one sent
    /// for `key`, or when `force` is set (a sensor boundary crossing).
    ///
    /// Nothing is recorded here; call `mark_sent` once the transport has
    /// accepted the message, so a failed send is retried next tick.
    pub fn publish(&self, key: &EntityKey, polarity: Polarity, force: bool) -> Option<ReplicationMessage> {
        if self.last_sent(key) == polarity && !force {
            return None;
        }
        Some(ReplicationMessage::new(key.wire_id(), polarity))
    }
    
    /// Records `message` as delivered to the transport.
    pub fn mark_sent(&mut self, message: &ReplicationMessage) {
        self.last_sent.insert(message.target_identity.clone(), message.polarity());
    }
    
    /// Last polarity sent for `key`.
    pub fn last_sent(&self, key: &EntityKey) -> Polarity {
        self.last_sent.get(&key.wire_id()).copied().unwrap_or_default()
    }
    
    /// Forgets `key` (block despawned).
    pub fn forget(&mut self, key: &EntityKey) {
        self.last_sent.remove(&key.wire_id());
    }
}

/// Observer-side store of replicated polarities.
#[derive(Debug, Default)]
pub struct PolarityMirror {
    received: HashMap<String, Polarity>,
}

impl PolarityMirror {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Records `message`. Returns true when the presented value changed;
    /// re-delivery of the same value is a no-op.
    pub fn apply(&mut self, message: &ReplicationMessage) -> bool {
        let polarity = message.polarity();
        let previous = self.received.insert(message.target_identity.clone(), polarity);
        previous != Some(polarity)
    }
    
    /// Replicated polarity for a wire identity, if any arrived.
    pub fn get(&self, identity: &str) -> Option<Polarity> {
        self.received.get(identity).copied()
    }
    
    /// Replicated value when present, otherwise `local`.
    pub fn presented(&self, key: &EntityKey, local: Polarity) -> Polarity {
        self.get(&key.wire_id()).unwrap_or(local)
    }
    
    pub fn len(&self) -> usize {
        self.received.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }
}
