//! Lodestone Deterministic Simulation Harness
//!
//! This crate runs several magnet sessions (one host, any number of
//! observers) against a shared set of simulated bodies, fully
//! deterministically.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances one fixed step per world tick
//! - **Network**: Channels with partitions and seeded per-link loss
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │                                                             │
//! │  ┌──────────┐  envelopes  ┌────────┐  inbox  ┌──────────┐   │
//! │  │   Host   │────────────►│ Router │────────►│ Observer │   │
//! │  │ session  │             │(faults)│         │ sessions │   │
//! │  └────┬─────┘             └────────┘         └────┬─────┘   │
//! │       │ forces                                    │ reads   │
//! │  ┌────▼───────────────────────────────────────────▼─────┐   │
//! │  │                     BodyOracle                       │   │
//! │  │        (kinematic bodies, recorded forces)           │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use lodestone_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 2).with_duration(5.0);
//! let result = runner.run(ScenarioId::GaussRelay);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod input;
mod network;
mod oracle;
mod participant;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{BlockFrame, BodyFrame, SimEvent, SimExport, SimFrame};
pub use input::{KeyHold, ScriptedInput};
pub use network::{Delivery, NetworkMessage, SimNetwork, SimNetworkController};
pub use oracle::{BodyHandle, BodyOracle, BodyState, SimBody};
pub use participant::{SimParticipant, SimSession};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{RouteStats, SimConfig, SimWorld, WorldTickReport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a panicking thread poisoned it.
pub(crate) fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
