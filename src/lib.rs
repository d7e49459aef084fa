//! Simulation core of a space-flight game world
//!
//! Entities live inside a hierarchy of reference frames and are advanced
//! by a fixed-step tick loop: classical-mechanics integration with both
//! Cartesian and Keplerian position representations, per-frame hot/idle
//! scheduling, and bounding-volume-hierarchy collision broad-phase.
//! Transport, persistence and world generation are external collaborators;
//! this crate owns the state they act on and the loop that advances it.

pub mod action;
pub mod bvh;
pub mod config;
pub mod engine;
pub mod frame;
pub mod math;
pub mod orbit;
pub mod sim;
pub mod snapshot;

pub use action::{Action, ActionKind, ActionRejection};
pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle};
pub use frame::{FrameId, FrameLocation, FrameTree, RefFrame};
pub use orbit::{Oe, OrbitError};
pub use sim::{SimState, System};
pub use snapshot::Snapshot;
