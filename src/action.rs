/// External actions
///
/// Actions are authenticated requests to modify the game state. They arrive
/// pre-validated at the transport boundary (framing, auth and decoding are
/// other layers' jobs) but are semantically validated here: unknown
/// entities, out-of-range parameters and capability-cap violations reject
/// the single offending action without touching the rest of the queue or
/// the tick loop's liveness.

use glam::DVec3;
use hecs::Entity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::components::ShipClass;
use crate::sim::forcegen::ForceGen;
use crate::sim::SimState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Correlation id assigned by the submitter, echoed on rejection.
    pub id: u64,
    /// Target entity as its 64-bit id.
    pub entity: u64,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionKind {
    /// Burn the main engine: scalar thrust in newtons for a duration in
    /// seconds.
    EngineThrust { thrust: f64, duration: f64 },
    /// Fire the attitude gyros: body-space torque in newton-meters for a
    /// duration in seconds.
    Rotate { torque: DVec3, duration: f64 },
    /// Attach a persistent drag source (atmosphere entry, tractor
    /// effects).
    Drag { coef1: f64, coef2: f64 },
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown entity {0}")]
    UnknownEntity(u64),
    #[error("{0} must be finite and positive")]
    OutOfRange(&'static str),
    #[error("torque {requested:?} exceeds the class cap {cap:?}")]
    TorqueCapExceeded { requested: DVec3, cap: DVec3 },
    #[error("action not applicable: {0}")]
    NotApplicable(String),
}

/// Rejection notice delivered on the submission channel's response path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRejection {
    pub action_id: u64,
    pub entity: u64,
    pub reason: String,
}

/// Validate and apply one action against the simulation state. Called only
/// from the tick context during the action drain.
pub fn execute(state: &mut SimState, action: &Action) -> Result<(), ActionError> {
    let entity = Entity::from_bits(action.entity)
        .filter(|e| state.world.contains(*e))
        .ok_or(ActionError::UnknownEntity(action.entity))?;

    let fg = match action.kind {
        ActionKind::EngineThrust { thrust, duration } => {
            if !thrust.is_finite() || thrust <= 0.0 {
                return Err(ActionError::OutOfRange("thrust"));
            }
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ActionError::OutOfRange("duration"));
            }
            ForceGen::Thrust { thrust, time_left: duration }
        }
        ActionKind::Rotate { torque, duration } => {
            if !torque.is_finite() {
                return Err(ActionError::OutOfRange("torque"));
            }
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ActionError::OutOfRange("duration"));
            }
            // the hull's gyros cap how hard a ship can turn
            if let Ok(class) = state.world.get::<&ShipClass>(entity) {
                let cap = class.cmg_torque_cap;
                if torque.x.abs() > cap.x || torque.y.abs() > cap.y || torque.z.abs() > cap.z {
                    return Err(ActionError::TorqueCapExceeded { requested: torque, cap });
                }
            }
            ForceGen::Turn { torque, time_left: duration }
        }
        ActionKind::Drag { coef1, coef2 } => {
            if !coef1.is_finite() || !coef2.is_finite() || coef1 < 0.0 || coef2 < 0.0 {
                return Err(ActionError::OutOfRange("drag coefficient"));
            }
            ForceGen::Drag { coef1, coef2 }
        }
    };

    state
        .add_force_gen(entity, fg)
        .map_err(|e| ActionError::NotApplicable(e.to_string()))
}
