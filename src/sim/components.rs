/// Core components for simulated space entities
///
/// All positions use 64-bit coordinates (DVec3) for planetary-scale
/// precision; rotations use double-precision quaternions (DQuat).
/// Components hold state only; the systems in this module's siblings hold
/// the logic.

use glam::{DAffine3, DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::orbit::Oe;
use crate::sim::forcegen::ForceGen;

/// 64-bit frame-local position component.
/// For orbit-represented entities this is a per-tick derived mirror of the
/// `Orbit` component, kept fresh for the broad-phase and snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Position(pub DVec3);

/// Linear velocity component (meters per second). Mirrors `Orbit` the same
/// way `Position` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity(pub DVec3);

/// Orientation component (unit quaternion).
#[derive(Debug, Clone, Copy)]
pub struct Rotation(pub DQuat);

impl Default for Rotation {
    fn default() -> Self {
        Self(DQuat::IDENTITY)
    }
}

/// Angular velocity component (radians per second).
#[derive(Debug, Clone, Copy, Default)]
pub struct AngularVelocity(pub DVec3);

/// Mass component (kilograms). Mutable only by gameplay effects and
/// never zero for an integrated entity.
#[derive(Debug, Clone, Copy)]
pub struct Mass(pub f64);

/// Rotational inertia state.
///
/// `inv_body` is set once from mass and shape at creation. The world-space
/// tensor and the body-to-world transform are derived data, fully
/// recomputed by the integrator every tick.
#[derive(Debug, Clone, Copy)]
pub struct Inertia {
    /// Inverse inertia tensor in body space.
    pub inv_body: DMat3,
    /// Inverse inertia tensor in world space (derived).
    pub inv_world: DMat3,
    /// Body-to-world transform (derived).
    pub transform: DAffine3,
}

impl Inertia {
    pub fn new(inv_body: DMat3) -> Self {
        Inertia {
            inv_body,
            inv_world: inv_body,
            transform: DAffine3::IDENTITY,
        }
    }
}

/// Keplerian orbit component. When present, it is the authoritative
/// position representation for the entity, superseding `Position`.
#[derive(Debug, Clone, Copy)]
pub struct Orbit(pub Oe);

/// Ordered force/torque generators attached to a movable entity.
#[derive(Debug, Default)]
pub struct ForceGens(pub Vec<ForceGen>);

/// Bounding sphere radius for the collision broad-phase (meters).
#[derive(Debug, Clone, Copy)]
pub struct Collider {
    pub radius: f64,
}

/// Ship hull class capability caps, used to validate player actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipClass {
    pub name: String,
    /// Hull mass before modules and cargo (kg).
    pub mass_base: f64,
    /// Per-axis torque cap of the control moment gyroscopes (N m).
    pub cmg_torque_cap: DVec3,
    /// Hull bounding sphere radius (m).
    pub bounding_radius: f64,
}

impl ShipClass {
    /// The starter hull. 42 t, box-shaped, modest gyros.
    pub fn warmjet() -> Self {
        ShipClass {
            name: "WarmJet".to_string(),
            mass_base: 42_000.0,
            cmg_torque_cap: DVec3::splat(1_000_000.0),
            bounding_radius: 10.0,
        }
    }
}
