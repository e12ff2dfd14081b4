//! Lodestone Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Lodestone
//! magnet engine to run inside a game engine or inside the deterministic
//! simulation harness.
//!
//! # Core Concept
//!
//! Everything the magnet engine does not own is reached through a trait:
//! - Rigid bodies (`RigidBody`): pose reads and force application
//! - Controls (`ControlInput`): held / pressed / emulated key state
//! - Time and authority (`SimulationContext`)
//! - Replication (`ReplicationTransport`)
//!
//! # Example
//!
//! ```ignore
//! use lodestone_env::{SimulationContext, ReplicationTransport};
//!
//! fn fixed_update<Ctx: SimulationContext, Net: ReplicationTransport>(
//!     ctx: &Ctx,
//!     net: &Net,
//! ) {
//!     if ctx.authority().is_host() {
//!         step_physics();
//!     }
//!     while let Some((from, envelope)) = net.try_recv() {
//!         apply(from, envelope);
//!     }
//! }
//! ```

mod context;
mod network;
mod physics;
mod types;
mod error;

pub use context::SimulationContext;
pub use network::{NetworkController, ReplicationTransport};
pub use physics::{ControlInput, NoInput, RigidBody};
pub use types::{Authority, EntityKey, Envelope, NodeId};
pub use error::EnvError;
