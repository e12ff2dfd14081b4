//! Lodestone Core - Magnetic monopole interactions for fixed-timestep simulations
//!
//! Each magnet block is modelled as a single point charge. Once per physics
//! step the host computes pairwise inverse-square forces between every live
//! monopole, gaussmeter blocks classify the field they sit in, and the
//! resulting polarity state is replicated to observers.
//!
//! # Modules
//!
//! - [`law`]: Coulomb-style force and flux density with distance clamping
//! - [`registry`]: Live monopole set and the all-pairs force pass
//! - [`pole`]: Natural / dual-key / single-key pole state machines
//! - [`gaussmeter`]: Threshold flux classification and key emulation
//! - [`replication`]: Host-to-observer polarity broadcasting
//! - [`session`]: Per-participant tick pipeline tying it all together

pub mod constants;
pub mod error;
pub mod gaussmeter;
pub mod input;
pub mod law;
pub mod monopole;
pub mod polarity;
pub mod pole;
pub mod registry;
pub mod replication;
pub mod session;

// Re-export key types for convenience
pub use constants::{ConfigStore, PhysicalConstants};
pub use error::CoreError;
pub use gaussmeter::{BoundaryCrossing, Gaussmeter, GaussmeterConfig, GaussmeterReading, HysteresisClassifier};
pub use input::{ControlSample, EmulationBus, LayeredInput};
pub use monopole::{Magnet, MagnetConfig, Monopole};
pub use polarity::Polarity;
pub use pole::{ActivationMode, PoleInputs, PoleSource, PoleState};
pub use registry::{MonopoleRegistry, StepReport};
pub use replication::{PolarityBroadcaster, PolarityMirror, ReplicationMessage};
pub use session::{MagnetSession, TickReport};
