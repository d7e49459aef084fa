/// Integration tests driving whole ticks through the engine: thrust and
/// expiry, conservation under pure drift, torque, scheduling state, and
/// frame transfer.

use approx::assert_relative_eq;
use glam::{DQuat, DVec3};
use orrery_engine::action::{Action, ActionKind};
use orrery_engine::config::EngineConfig;
use orrery_engine::engine::{Engine, EngineHandle};
use orrery_engine::sim::components::{AngularVelocity, Orbit, Position, ShipClass, Velocity};
use orrery_engine::sim::init::{spawn_ship, EARTH_MU};
use orrery_engine::sim::SimState;
use orrery_engine::FrameId;

/// One ship at rest inside a fixed frame under the root.
fn single_ship_world() -> (Engine, EngineHandle, FrameId, hecs::Entity) {
    let mut state = SimState::new();
    let root = state.frames.root();
    let frame = state
        .frames
        .add_fixed(root, DVec3::ZERO, DQuat::IDENTITY, 1.0e9, Some(EARTH_MU));
    let ship = spawn_ship(&mut state, frame, ShipClass::warmjet(), DVec3::ZERO);
    let (engine, handle) = Engine::new(state, EngineConfig::default());
    (engine, handle, frame, ship)
}

fn velocity_of(engine: &Engine, e: hecs::Entity) -> DVec3 {
    engine.state().world.get::<&Velocity>(e).unwrap().0
}

#[test]
fn thrust_accelerates_then_expires() {
    let (mut engine, handle, _, ship) = single_ship_world();

    handle
        .submit(Action {
            id: 1,
            entity: ship.to_bits().get(),
            kind: ActionKind::EngineThrust { thrust: 1000.0, duration: 10.0 },
        })
        .unwrap();

    engine.step(1.0).unwrap();
    let v1 = velocity_of(&engine, ship);
    assert_relative_eq!(v1.x, 1000.0 / 42_000.0, max_relative = 1e-12);
    assert_eq!(v1.y, 0.0);
    assert_eq!(v1.z, 0.0);

    for _ in 0..9 {
        engine.step(1.0).unwrap();
    }
    let v10 = velocity_of(&engine, ship);
    assert_relative_eq!(v10.x, 10_000.0 / 42_000.0, max_relative = 1e-12);

    // duration consumed: no further gain, generator gone within one tick
    engine.step(1.0).unwrap();
    assert_relative_eq!(velocity_of(&engine, ship).x, v10.x, max_relative = 1e-12);
    assert!(engine.state().is_idle(ship));
}

#[test]
fn pure_drift_conserves_speed_and_spin() {
    let (mut engine, _handle, frame, ship) = single_ship_world();

    {
        let state = engine.state_mut();
        state.world.query_one_mut::<&mut Velocity>(ship).unwrap().0 =
            DVec3::new(3.0, -2.0, 1.0);
        state
            .world
            .query_one_mut::<&mut AngularVelocity>(ship)
            .unwrap()
            .0 = DVec3::new(0.1, 0.2, -0.05);
    }

    let speed = velocity_of(&engine, ship).length();
    let spin = DVec3::new(0.1, 0.2, -0.05).length();

    let mut positions = Vec::new();
    for _ in 0..20 {
        // keep the entity hot without attaching forces
        engine.state_mut().set_hot(ship, frame);
        engine.step(1.0).unwrap();
        positions.push(engine.state().world.get::<&Position>(ship).unwrap().0);

        assert_relative_eq!(velocity_of(&engine, ship).length(), speed, max_relative = 1e-12);
        let w = engine
            .state()
            .world
            .get::<&AngularVelocity>(ship)
            .unwrap()
            .0;
        assert_relative_eq!(w.length(), spin, max_relative = 1e-12);
    }

    // it drifted: one tick of travel per step
    assert_relative_eq!(
        positions[0].distance(positions[19]),
        19.0 * speed,
        max_relative = 1e-9
    );
}

#[test]
fn torque_spins_the_hull() {
    let (mut engine, handle, _, ship) = single_ship_world();

    // solid 10 m cube at 42 t: I = m/12 * (100+100) = 700000 kg m^2
    handle
        .submit(Action {
            id: 1,
            entity: ship.to_bits().get(),
            kind: ActionKind::Rotate {
                torque: DVec3::new(0.0, 0.0, 700_000.0),
                duration: 1.0,
            },
        })
        .unwrap();

    engine.step(1.0).unwrap();
    let w = engine
        .state()
        .world
        .get::<&AngularVelocity>(ship)
        .unwrap()
        .0;
    assert_relative_eq!(w.z, 1.0, max_relative = 1e-12);

    // the gyro burn is over; spin coasts
    let frame = engine.state().frame_of(ship).unwrap();
    engine.state_mut().set_hot(ship, frame);
    engine.step(1.0).unwrap();
    let w2 = engine
        .state()
        .world
        .get::<&AngularVelocity>(ship)
        .unwrap()
        .0;
    assert_relative_eq!(w2.z, 1.0, max_relative = 1e-12);
}

#[test]
fn torque_above_class_cap_is_rejected() {
    let (mut engine, handle, _, ship) = single_ship_world();

    handle
        .submit(Action {
            id: 7,
            entity: ship.to_bits().get(),
            kind: ActionKind::Rotate {
                torque: DVec3::new(2_000_000.0, 0.0, 0.0),
                duration: 1.0,
            },
        })
        .unwrap();

    engine.step(1.0).unwrap();

    let rejection = engine_rejection(&handle);
    assert_eq!(rejection.action_id, 7);
    assert!(rejection.reason.contains("cap"));
    assert!(engine.state().is_idle(ship));
}

fn engine_rejection(handle: &EngineHandle) -> orrery_engine::ActionRejection {
    handle.rejections.try_recv().expect("expected a rejection")
}

#[test]
fn hot_while_generators_live_idle_after() {
    let (mut engine, handle, _, ship) = single_ship_world();

    handle
        .submit(Action {
            id: 1,
            entity: ship.to_bits().get(),
            kind: ActionKind::EngineThrust { thrust: 500.0, duration: 2.0 },
        })
        .unwrap();

    engine.step(1.0).unwrap();
    assert!(engine.state().is_hot(ship));
    assert!(!engine.state().is_idle(ship));

    engine.step(1.0).unwrap();
    // duration exhausted this tick, generator pruned, no system claims it
    assert!(engine.state().is_idle(ship));
    assert_eq!(engine.state().idle_since(ship), Some(2.0));
}

#[test]
fn action_drain_is_capped_per_tick() {
    let (mut engine, handle, _, _) = single_ship_world();

    // 12 actions against an entity id that does not exist; the default cap
    // drains 10 per tick and defers the rest
    for i in 0..12 {
        handle
            .submit(Action {
                id: i,
                entity: u64::MAX,
                kind: ActionKind::EngineThrust { thrust: 1.0, duration: 1.0 },
            })
            .unwrap();
    }

    engine.step(1.0).unwrap();
    assert_eq!(handle.rejections.try_iter().count(), 10);

    engine.step(1.0).unwrap();
    assert_eq!(handle.rejections.try_iter().count(), 2);
}

#[test]
fn orbiting_entity_advances_along_its_orbit() {
    let mut state = SimState::new();
    let root = state.frames.root();
    let frame = state
        .frames
        .add_fixed(root, DVec3::ZERO, DQuat::IDENTITY, 1.0e9, Some(EARTH_MU));

    let r = 6.878e6; // ~500 km altitude
    let oe = orrery_engine::Oe {
        h: (EARTH_MU * r).sqrt(),
        incl: 0.0,
        raan: 0.0,
        ecc: 0.0,
        argp: 0.0,
        ta: 0.0,
        mu: EARTH_MU,
    };
    let ship = spawn_ship(&mut state, frame, ShipClass::warmjet(), DVec3::ZERO);
    state.world.insert_one(ship, Orbit(oe)).unwrap();

    let (mut engine, _handle) = Engine::new(state, EngineConfig::default());

    let before = engine.state().world.get::<&Position>(ship).unwrap().0;
    for _ in 0..30 {
        let f = engine.state().frame_of(ship).unwrap();
        engine.state_mut().set_hot(ship, f);
        engine.step(1.0).unwrap();
    }
    let after = engine.state().world.get::<&Position>(ship).unwrap().0;

    assert!(before.distance(after) > 1.0);
    // unforced circular orbit: radius holds to integration tolerance
    assert_relative_eq!(after.length(), r, max_relative = 1e-5);

    let oe_after = engine.state().world.get::<&Orbit>(ship).unwrap().0;
    assert_relative_eq!(oe_after.ecc, 0.0, epsilon = 1e-5);
}

#[test]
fn transfer_rebases_position_between_frames() {
    let mut state = SimState::new();
    let root = state.frames.root();
    let near = state.frames.add_fixed(
        root,
        DVec3::new(10_000.0, 0.0, 0.0),
        DQuat::IDENTITY,
        1.0e6,
        None,
    );
    let far = state.frames.add_fixed(
        root,
        DVec3::new(-5_000.0, 2_000.0, 0.0),
        DQuat::IDENTITY,
        1.0e6,
        None,
    );
    let ship = spawn_ship(
        &mut state,
        near,
        ShipClass::warmjet(),
        DVec3::new(100.0, 0.0, 0.0),
    );

    state.transfer(ship, far).unwrap();

    assert_eq!(state.frame_of(ship), Some(far));
    assert!(state.is_hot(ship));
    let pos = state.world.get::<&Position>(ship).unwrap().0;
    // root position was (10100, 0, 0); relative to `far` that is:
    assert_relative_eq!(pos.x, 15_100.0, max_relative = 1e-12);
    assert_relative_eq!(pos.y, -2_000.0, max_relative = 1e-12);
}
