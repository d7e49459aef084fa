/// Rigid-body integrator
///
/// Simulates classical mechanics for the hot entities of one reference
/// frame per update call: force/torque accumulation from the entity's
/// generators, semi-implicit Euler integration of linear and angular
/// state, quaternion orientation update, and transport of the inverse
/// inertia tensor into world space.
///
/// Entities with an `Orbit` component first advance their true anomaly by
/// the elapsed time, then are converted to a Cartesian state vector for
/// the force step and converted back afterwards; force generators operate
/// in Cartesian and angular space, so the round trip is unavoidable, and
/// the anomaly advance keeps unforced orbital motion Keplerian instead of
/// a tangent drift.

use anyhow::{anyhow, Result};
use glam::DVec3;
use hecs::Entity;
use log::{debug, error};

use crate::frame::FrameId;
use crate::math::{
    body_to_world, integrate_orientation, normalize_or_identity, world_inv_inertia,
};
use crate::orbit::Oe;
use crate::sim::components::{
    AngularVelocity, ForceGens, Inertia, Mass, Orbit, Position, Rotation, Velocity,
};
use crate::sim::forcegen::BodyContext;
use crate::sim::{SimState, System};

pub struct Physics {
    /// Multiplicative velocity damping per second. 1.0 = no damping, the
    /// default, so momentum is conserved unless explicitly configured.
    pub linear_damping: f64,
    pub angular_damping: f64,
}

impl Physics {
    pub fn new(linear_damping: f64, angular_damping: f64) -> Self {
        Physics { linear_damping, angular_damping }
    }
}

impl Default for Physics {
    fn default() -> Self {
        Physics::new(1.0, 1.0)
    }
}

impl System for Physics {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn update(
        &mut self,
        state: &mut SimState,
        _world_time: f64,
        elapsed: f64,
        _frame: FrameId,
        hot: &[Entity],
    ) -> Result<()> {
        for &entity in hot {
            self.integrate(state, elapsed, entity)?;
        }
        Ok(())
    }

    fn is_hot_post_update(&self, state: &SimState, entity: Entity) -> bool {
        state
            .world
            .get::<&ForceGens>(entity)
            .map(|fgs| !fgs.0.is_empty())
            .unwrap_or(false)
    }
}

impl Physics {
    fn integrate(&self, state: &mut SimState, elapsed: f64, entity: Entity) -> Result<()> {
        // resolve the working Cartesian state; orbit-represented entities
        // first advance along their orbit, then take the force step
        let orbit = state.world.get::<&Orbit>(entity).ok().map(|o| o.0);
        let (mut pos, mut vel) = match orbit {
            Some(oe) => {
                let advanced = oe
                    .time_since_periapsis()
                    .and_then(|t| oe.true_anomaly_from_time(0.0, t + elapsed));
                match advanced {
                    Ok(ta) => {
                        let oe = Oe { ta, ..oe };
                        oe.to_state_vector()
                    }
                    Err(e) => {
                        // leave the entity untouched this tick; retried next
                        error!("orbit advance for {:?} failed, skipping tick: {e}", entity);
                        return Ok(());
                    }
                }
            }
            None => {
                let pos = state
                    .world
                    .get::<&Position>(entity)
                    .map_err(|_| anyhow!("hot entity {:?} has no position", entity))?
                    .0;
                let vel = state
                    .world
                    .get::<&Velocity>(entity)
                    .map_err(|_| anyhow!("hot entity {:?} has no velocity", entity))?
                    .0;
                (pos, vel)
            }
        };

        let inv_mass = {
            let mass = state
                .world
                .get::<&Mass>(entity)
                .map_err(|_| anyhow!("hot entity {:?} has no mass", entity))?
                .0;
            1.0 / mass
        };
        let orientation = state
            .world
            .get::<&Rotation>(entity)
            .map_err(|_| anyhow!("hot entity {:?} has no orientation", entity))?
            .0;
        let inertia = *state
            .world
            .get::<&Inertia>(entity)
            .map_err(|_| anyhow!("hot entity {:?} has no inertia", entity))?;

        // accumulate forces and torques from the generators
        let body = BodyContext { velocity: vel, orientation, transform: inertia.transform };
        let (mut force, mut torque) = (DVec3::ZERO, DVec3::ZERO);
        {
            let fgs = state.world.query_one_mut::<&mut ForceGens>(entity)?;
            for fg in fgs.0.iter_mut() {
                let (f, t) = fg.update_force(&body, elapsed);
                if let Some(f) = f {
                    force += f;
                }
                if let Some(t) = t {
                    torque += t;
                }
            }
        }
        debug!("integrate {:?}: f={force} tq={torque}", entity);

        // semi-implicit Euler: velocities first, then position/orientation
        if force != DVec3::ZERO {
            vel += force * inv_mass * elapsed;
        }

        let mut angular = state.world.query_one_mut::<&mut AngularVelocity>(entity)?.0;
        if torque != DVec3::ZERO {
            angular += inertia.inv_world * torque * elapsed;
        }

        // orbit-represented entities already advanced their position along
        // the orbit; forces reach their position through the reconverted
        // elements on the next tick
        if orbit.is_none() {
            pos += vel * elapsed;
        }

        let new_orientation =
            normalize_or_identity(integrate_orientation(orientation, angular, elapsed));

        // damping is off (factor 1.0) unless configured
        if self.linear_damping != 1.0 {
            vel *= self.linear_damping.powf(elapsed);
        }
        if self.angular_damping != 1.0 {
            angular *= self.angular_damping.powf(elapsed);
        }

        // refresh derived data: body->world transform, then the world-space
        // inverse inertia tensor conjugated through its rotation part
        let transform = body_to_world(pos, new_orientation);
        let inv_world = world_inv_inertia(inertia.inv_body, &transform);

        // write everything back
        state.world.query_one_mut::<&mut AngularVelocity>(entity)?.0 = angular;
        state.world.query_one_mut::<&mut Rotation>(entity)?.0 = new_orientation;
        {
            let i = state.world.query_one_mut::<&mut Inertia>(entity)?;
            i.transform = transform;
            i.inv_world = inv_world;
        }
        if let Some(oe) = orbit {
            *state.world.query_one_mut::<&mut Orbit>(entity)? =
                Orbit(Oe::from_state_vector(pos, vel, oe.mu));
        }
        state.world.query_one_mut::<&mut Position>(entity)?.0 = pos;
        state.world.query_one_mut::<&mut Velocity>(entity)?.0 = vel;

        // drop expired generators; survivor order is not significant
        state
            .world
            .query_one_mut::<&mut ForceGens>(entity)?
            .0
            .retain(|fg| !fg.is_expired());

        Ok(())
    }
}
