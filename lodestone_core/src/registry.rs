//! The monopole registry and its per-tick force pass.

use crate::constants::PhysicalConstants;
use crate::law;
use crate::monopole::Monopole;
use lodestone_env::EntityKey;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Summary of one force pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Live entities in the snapshot
    pub live: usize,
    
    /// Pairs where both sides were magnetized
    pub pairs_considered: usize,
    
    /// Pairs that produced a force
    pub pairs_applied: usize,
    
    /// Dead handles dropped from the registry
    pub pruned: usize,
}

/// Live set of monopoles for one simulation session.
///
/// Holds weak handles in registration order; the entities themselves are
/// owned by their blocks. Every participant keeps its own registry, but
/// only the host runs `step`.
pub struct MonopoleRegistry {
    constants: PhysicalConstants,
    entries: Vec<(EntityKey, Weak<dyn Monopole>)>,
    members: HashSet<EntityKey>,
}

impl MonopoleRegistry {
    pub fn new(constants: PhysicalConstants) -> Self {
        Self {
            constants,
            entries: Vec::new(),
            members: HashSet::new(),
        }
    }
    
    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }
    
    /// Swaps in reloaded constants between ticks.
    pub fn replace_constants(&mut self, constants: PhysicalConstants) {
        self.constants = constants;
    }
    
    /// Adds `entity` unless its key is already registered.
    ///
    /// Returns true when it was added.
    pub fn register<M: Monopole + 'static>(&mut self, entity: &Arc<M>) -> bool {
        let key = entity.key();
        if !self.members.insert(key) {
            return false;
        }
        let handle: Arc<dyn Monopole> = entity.clone();
        self.entries.push((key, Arc::downgrade(&handle)));
        true
    }
    
    /// Removes `key` if present. Returns true when something was removed.
    pub fn deregister(&mut self, key: &EntityKey) -> bool {
        if !self.members.remove(key) {
            return false;
        }
        self.entries.retain(|(k, _)| k != key);
        true
    }
    
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.members.contains(key)
    }
    
    /// Number of registered keys, including ones whose owner already dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    
    /// Live entities in registration order.
    pub fn monopoles(&self) -> Vec<Arc<dyn Monopole>> {
        self.entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
    }
    
    /// Drops handles whose owners are gone. Returns how many were removed.
    fn prune(&mut self) -> usize {
        let before = self.entries.len();
        let members = &mut self.members;
        self.entries.retain(|(key, weak)| {
            let alive = weak.strong_count() > 0;
            if !alive {
                members.remove(key);
            }
            alive
        });
        before - self.entries.len()
    }
    
    /// Runs the all-pairs force pass once. Host only.
    ///
    /// Works on a snapshot taken up front, so entities dropped by a side
    /// effect of force application stay valid until the pass ends.
    pub fn step(&mut self) -> StepReport {
        let pruned = self.prune();
        let snapshot = self.monopoles();
        let mut report = StepReport {
            live: snapshot.len(),
            pruned,
            ..StepReport::default()
        };
        
        for (i, a) in snapshot.iter().enumerate() {
            if !a.is_magnetized() {
                continue;
            }
            for b in &snapshot[i + 1..] {
                if !b.is_magnetized() {
                    continue;
                }
                report.pairs_considered += 1;
                
                let Some(force) = law::pair_force(
                    a.pole_position(),
                    a.charge(),
                    b.pole_position(),
                    b.charge(),
                    &self.constants,
                ) else {
                    continue;
                };
                
                trace!("force {} <-> {}: {:?}", a.key(), b.key(), force);
                a.apply_force(force);
                b.apply_force(-force);
                report.pairs_applied += 1;
            }
        }
        
        report
    }
}
