/// World construction helpers
///
/// Provisions the static frame hierarchy and initial entities. Only valid
/// before the tick loop starts; the engine owns the state afterwards.

use glam::{DQuat, DVec3};
use hecs::Entity;
use log::info;

use crate::frame::FrameId;
use crate::math::{inertia_tensor_cuboid, inverse_checked};
use crate::orbit::Oe;
use crate::sim::components::*;
use crate::sim::SimState;

pub const EARTH_MU: f64 = 3.986004418e14; // m^3/s^2
pub const EARTH_RADIUS: f64 = 6.3781e6; // m

/// Spawn a pilotable ship of the given hull class, at rest.
pub fn spawn_ship(
    state: &mut SimState,
    frame: FrameId,
    class: ShipClass,
    position: DVec3,
) -> Entity {
    let mass = class.mass_base;
    // hull approximated as a 10 m solid cube for rotational inertia
    let inv_body = inverse_checked(inertia_tensor_cuboid(mass, 10.0, 10.0, 10.0));

    let radius = class.bounding_radius;
    let entity = state.world.spawn((
        Position(position),
        Velocity::default(),
        Rotation::default(),
        AngularVelocity::default(),
        Mass(mass),
        Inertia::new(inv_body),
        ForceGens::default(),
        Collider { radius },
        class,
    ));
    state.attach(entity, frame, 0.0);
    entity
}

/// Spawn a stationary structure: no mass, no velocity, no force
/// generators, just a position and a bounding sphere.
pub fn spawn_station(
    state: &mut SimState,
    frame: FrameId,
    position: DVec3,
    radius: f64,
) -> Entity {
    let entity = state.world.spawn((
        Position(position),
        Rotation::default(),
        Collider { radius },
    ));
    state.attach(entity, frame, 0.0);
    entity
}

pub struct DevWorld {
    pub planet_frame: FrameId,
    pub local_frame: FrameId,
    pub ship: Entity,
    pub station: Entity,
}

/// The development scene: a planet frame inside the galactic root, a local
/// grid on a circular 500 km orbit above the planet, one ship and one
/// station inside the grid.
pub fn setup_dev_world(state: &mut SimState) -> DevWorld {
    let root = state.frames.root();
    let planet_frame = state.frames.add_fixed(
        root,
        DVec3::ZERO,
        DQuat::IDENTITY,
        1.0e9,
        Some(EARTH_MU),
    );

    let orbit_radius = EARTH_RADIUS + 500_000.0;
    let orbit = Oe {
        h: (EARTH_MU * orbit_radius).sqrt(),
        incl: 0.0,
        raan: 0.0,
        ecc: 0.0,
        argp: 0.0,
        ta: 0.0,
        mu: EARTH_MU,
    };
    let local_frame = state
        .frames
        .add_orbiting(planet_frame, orbit, DQuat::IDENTITY, 20_000.0, None, 0.0);

    let ship = spawn_ship(
        state,
        local_frame,
        ShipClass::warmjet(),
        DVec3::new(1_000.0, 1_000.0, 1_000.0),
    );
    let station = spawn_station(state, local_frame, DVec3::ZERO, 200.0);

    info!(
        "dev world ready: {} frames, ship {:?}, station {:?}",
        state.frames.len(),
        ship,
        station
    );

    DevWorld { planet_frame, local_frame, ship, station }
}
