/// Point-in-time state export
///
/// Captured once per tick after the broad-phase pass and handed to the
/// publication collaborator by value; the core never retains a reference
/// to it or waits on the consumer. Entities are grouped by reference frame
/// and sorted by id so the encoded form is stable.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::frame::FrameId;
use crate::sim::components::{AngularVelocity, Mass, Position, Rotation, Velocity};
use crate::sim::SimState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntSnapshot {
    pub id: u64,
    pub mass: Option<f64>,
    pub pos: DVec3,
    pub vel: DVec3,
    pub ori: DQuat,
    pub rot: DVec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub frame: FrameId,
    pub ents: Vec<EntSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub world_time: f64,
    pub frames: Vec<FrameSnapshot>,
}

impl Snapshot {
    pub fn capture(state: &SimState, tick: u64, world_time: f64) -> Snapshot {
        let mut frames: Vec<FrameSnapshot> = state
            .frames
            .ids()
            .map(|frame| FrameSnapshot { frame, ents: Vec::new() })
            .collect();

        for (entity, pos) in state.world.query::<&Position>().iter() {
            let Some(frame) = state.frame_of(entity) else {
                continue;
            };
            let ent = EntSnapshot {
                id: entity.to_bits().get(),
                mass: state.world.get::<&Mass>(entity).ok().map(|m| m.0),
                pos: pos.0,
                vel: state
                    .world
                    .get::<&Velocity>(entity)
                    .map(|v| v.0)
                    .unwrap_or_default(),
                ori: state
                    .world
                    .get::<&Rotation>(entity)
                    .map(|r| r.0)
                    .unwrap_or(DQuat::IDENTITY),
                rot: state
                    .world
                    .get::<&AngularVelocity>(entity)
                    .map(|r| r.0)
                    .unwrap_or_default(),
            };
            frames[frame.index()].ents.push(ent);
        }

        for frame in frames.iter_mut() {
            frame.ents.sort_by_key(|e| e.id);
        }

        Snapshot { tick, world_time, frames }
    }
}
