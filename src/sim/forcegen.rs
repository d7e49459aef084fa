/// Force generators
///
/// Time-bounded or persistent sources of linear force and angular torque,
/// applied to movable entities by the physics system once per tick. The
/// variant set is small, fixed and hot, so it is a closed enum dispatched
/// by match rather than a trait object.
///
/// Generators track their own expiry; the physics system prunes expired
/// generators after force accumulation each tick. All mutation happens
/// from the single-threaded tick context.

use glam::{DAffine3, DQuat, DVec3};
use log::debug;

use crate::math::forward_vector;

/// Snapshot of the owning body's state a generator may consult.
#[derive(Debug, Clone, Copy)]
pub struct BodyContext {
    pub velocity: DVec3,
    pub orientation: DQuat,
    /// Body-to-world transform from the previous integration step.
    pub transform: DAffine3,
}

#[derive(Debug, Clone, Copy)]
pub enum ForceGen {
    /// Center-of-mass-aligned engine burn: scalar thrust (N) along the
    /// entity's current forward vector for a bounded duration.
    Thrust { thrust: f64, time_left: f64 },
    /// Attitude-control torque, fixed in body space, for a bounded
    /// duration.
    Turn { torque: DVec3, time_left: f64 },
    /// Velocity-opposing drag `v*c1 + v^2*c2`; never expires.
    Drag { coef1: f64, coef2: f64 },
}

impl ForceGen {
    /// Returns the linear force and torque contributed over this tick.
    /// `None` means a zero contribution. A generator whose remaining
    /// duration is shorter than the tick contributes proportionally
    /// (`time_left / elapsed`), so the impulse delivered over its lifetime
    /// is exactly magnitude x duration; remaining duration never goes
    /// negative.
    pub fn update_force(
        &mut self,
        body: &BodyContext,
        elapsed: f64,
    ) -> (Option<DVec3>, Option<DVec3>) {
        match self {
            ForceGen::Thrust { thrust, time_left } => {
                let dt = elapsed.min(*time_left);
                *time_left -= dt;
                let f = *thrust * (dt / elapsed);
                debug!("thrust update: f={f}, time_left={time_left}");
                (Some(forward_vector(body.orientation) * f), None)
            }
            ForceGen::Turn { torque, time_left } => {
                let dt = elapsed.min(*time_left);
                *time_left -= dt;
                // body-space torque rotated into world space
                let world = body.transform.matrix3 * *torque;
                (None, Some(world * (dt / elapsed)))
            }
            ForceGen::Drag { coef1, coef2 } => {
                let speed = body.velocity.length();
                if speed == 0.0 {
                    return (None, None);
                }
                let drag = speed * *coef1 + speed * speed * *coef2;
                let force = body.velocity / speed * -drag;
                debug!("drag update: f={force}");
                (Some(force), None)
            }
        }
    }

    pub fn is_expired(&self) -> bool {
        match self {
            ForceGen::Thrust { time_left, .. } | ForceGen::Turn { time_left, .. } => {
                *time_left <= 0.0
            }
            ForceGen::Drag { .. } => false,
        }
    }
}
