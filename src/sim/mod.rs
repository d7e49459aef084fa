/// Simulation state and the system contract
///
/// `SimState` owns everything the tick mutates: the component world, the
/// reference frame tree, per-frame hot/idle scheduling sets, and the
/// per-frame broad-phase trees. It is a plain value passed `&mut` into the
/// tick - single-writer ownership, no global.
///
/// Systems contain the game logic. Each system updates the hot entities of
/// one frame per call and afterwards answers, per entity, whether that
/// entity still needs per-tick integration. Entities claimed by no system
/// demote to idle until an external action touches them again.

pub mod components;
pub mod forcegen;
pub mod init;
pub mod physics;

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use hecs::{Entity, World};
use log::debug;

use crate::bvh::{BoundingSphere, Bvh};
use crate::frame::{FrameId, FrameTree};
use crate::orbit::Oe;
use crate::sim::components::{Collider, ForceGens, Orbit, Position, Velocity};
use crate::sim::forcegen::ForceGen;

pub trait System {
    fn name(&self) -> &'static str;

    /// Advance all hot entities of `frame` by `elapsed` seconds. Not called
    /// for frames with no hot entities.
    fn update(
        &mut self,
        state: &mut SimState,
        world_time: f64,
        elapsed: f64,
        frame: FrameId,
        hot: &[Entity],
    ) -> Result<()>;

    /// Whether the entity still needs per-tick updates after this tick.
    /// The physics system claims any entity with a live force generator.
    fn is_hot_post_update(&self, state: &SimState, entity: Entity) -> bool;
}

pub struct SimState {
    pub world: World,
    pub frames: FrameTree,
    ent_frames: HashMap<Entity, FrameId>,
    hot: HashMap<FrameId, HashSet<Entity>>,
    idle: HashMap<FrameId, HashSet<Entity>>,
    idle_since: HashMap<Entity, f64>,
    broad_phase: HashMap<FrameId, Bvh<BoundingSphere>>,
    /// Candidate contact pairs from the latest broad-phase pass.
    pub contacts: Vec<(Entity, Entity)>,
}

impl SimState {
    pub fn new() -> Self {
        SimState {
            world: World::new(),
            frames: FrameTree::new(),
            ent_frames: HashMap::new(),
            hot: HashMap::new(),
            idle: HashMap::new(),
            idle_since: HashMap::new(),
            broad_phase: HashMap::new(),
            contacts: Vec::new(),
        }
    }

    /// Associate an entity with a reference frame. New entities start idle
    /// until something attaches a force generator.
    pub fn attach(&mut self, entity: Entity, frame: FrameId, world_time: f64) {
        self.ent_frames.insert(entity, frame);
        self.set_idle(entity, frame, world_time);
    }

    /// Remove an entity from the simulation entirely.
    pub fn remove(&mut self, entity: Entity) {
        if let Some(frame) = self.ent_frames.remove(&entity) {
            if let Some(set) = self.hot.get_mut(&frame) {
                set.remove(&entity);
            }
            if let Some(set) = self.idle.get_mut(&frame) {
                set.remove(&entity);
            }
            if let Some(tree) = self.broad_phase.get_mut(&frame) {
                tree.remove(entity);
            }
        }
        self.idle_since.remove(&entity);
        let _ = self.world.despawn(entity);
    }

    pub fn frame_of(&self, entity: Entity) -> Option<FrameId> {
        self.ent_frames.get(&entity).copied()
    }

    pub fn set_hot(&mut self, entity: Entity, frame: FrameId) {
        self.hot.entry(frame).or_default().insert(entity);
        if let Some(set) = self.idle.get_mut(&frame) {
            set.remove(&entity);
        }
        self.idle_since.remove(&entity);
    }

    pub fn set_idle(&mut self, entity: Entity, frame: FrameId, since: f64) {
        if let Some(set) = self.hot.get_mut(&frame) {
            set.remove(&entity);
        }
        self.idle.entry(frame).or_default().insert(entity);
        self.idle_since.insert(entity, since);
    }

    pub fn is_hot(&self, entity: Entity) -> bool {
        self.frame_of(entity)
            .and_then(|f| self.hot.get(&f))
            .is_some_and(|set| set.contains(&entity))
    }

    pub fn is_idle(&self, entity: Entity) -> bool {
        self.frame_of(entity)
            .and_then(|f| self.idle.get(&f))
            .is_some_and(|set| set.contains(&entity))
    }

    pub fn idle_since(&self, entity: Entity) -> Option<f64> {
        self.idle_since.get(&entity).copied()
    }

    /// Hot entities of one frame, unordered.
    pub fn hot_in(&self, frame: FrameId) -> Vec<Entity> {
        self.hot
            .get(&frame)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Frames that currently have at least one hot entity, in id order so
    /// the per-tick frame walk is consistent.
    pub fn frames_with_hot(&self) -> Vec<FrameId> {
        let mut frames: Vec<FrameId> = self
            .hot
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(f, _)| *f)
            .collect();
        frames.sort();
        frames
    }

    /// Entities associated with a frame (hot and idle).
    pub fn ents_in(&self, frame: FrameId) -> Vec<Entity> {
        self.ent_frames
            .iter()
            .filter(|(_, f)| **f == frame)
            .map(|(e, _)| *e)
            .collect()
    }

    /// Attach a force generator: the external mutation that promotes an
    /// entity back to hot.
    pub fn add_force_gen(&mut self, entity: Entity, fg: ForceGen) -> Result<()> {
        let frame = self
            .frame_of(entity)
            .ok_or_else(|| anyhow::anyhow!("entity {:?} is not in any frame", entity))?;
        self.world
            .query_one_mut::<&mut ForceGens>(entity)
            .map_err(|_| anyhow::anyhow!("entity {:?} cannot carry force generators", entity))?
            .0
            .push(fg);
        self.set_hot(entity, frame);
        Ok(())
    }

    /// Move an entity into another reference frame, reconciling its
    /// position representation and re-parenting its scheduling state.
    ///
    /// The entity's state is rebased through the common root. An entity
    /// that was orbit-represented keeps an orbital representation if the
    /// destination frame has a primary (`mu`), and falls back to Cartesian
    /// otherwise. The entity arrives hot; its broad-phase leaf re-appears
    /// in the destination tree on the next pass.
    pub fn transfer(&mut self, entity: Entity, dest: FrameId) -> Result<()> {
        let src = self
            .frame_of(entity)
            .ok_or_else(|| anyhow::anyhow!("entity {:?} is not in any frame", entity))?;
        if src == dest {
            return Ok(());
        }

        let orbit = self.world.get::<&Orbit>(entity).ok().map(|o| o.0);
        let (local_pos, local_vel) = match orbit {
            Some(oe) => oe.to_state_vector(),
            None => {
                let pos = self.world.get::<&Position>(entity).map(|p| p.0)?;
                let vel = self
                    .world
                    .get::<&Velocity>(entity)
                    .map(|v| v.0)
                    .unwrap_or_default();
                (pos, vel)
            }
        };

        let (root_pos, root_vel) = self.frames.to_root(src, local_pos, local_vel);
        let (dest_pos, dest_vel) = self.frames.from_root(dest, root_pos, root_vel);

        match (orbit, self.frames.get(dest).mu) {
            (Some(_), Some(mu)) => {
                let oe = Oe::from_state_vector(dest_pos, dest_vel, mu);
                *self.world.query_one_mut::<&mut Orbit>(entity)? = Orbit(oe);
            }
            (Some(_), None) => {
                // no primary to orbit here; drop to Cartesian
                self.world.remove_one::<Orbit>(entity)?;
            }
            _ => {}
        }
        if let Ok(p) = self.world.query_one_mut::<&mut Position>(entity) {
            p.0 = dest_pos;
        }
        if let Ok(v) = self.world.query_one_mut::<&mut Velocity>(entity) {
            v.0 = dest_vel;
        }

        if let Some(set) = self.hot.get_mut(&src) {
            set.remove(&entity);
        }
        if let Some(set) = self.idle.get_mut(&src) {
            set.remove(&entity);
        }
        if let Some(tree) = self.broad_phase.get_mut(&src) {
            tree.remove(entity);
        }
        self.ent_frames.insert(entity, dest);
        self.set_hot(entity, dest);
        debug!("transferred {:?}: {:?} -> {:?}", entity, src, dest);
        Ok(())
    }

    /// Refresh broad-phase leaves from current positions and collect this
    /// tick's candidate contact pairs. `moved` is the set of entities
    /// integrated this tick (captured before hot/idle re-evaluation, which
    /// may already have demoted some of them).
    pub fn run_broad_phase(&mut self, moved: &HashSet<Entity>) {
        for (entity, (pos, collider)) in self.world.query::<(&Position, &Collider)>().iter() {
            let Some(frame) = self.ent_frames.get(&entity) else {
                continue;
            };
            let volume = BoundingSphere::new(pos.0, collider.radius);
            let tree = self.broad_phase.entry(*frame).or_default();
            if tree.contains_entity(entity) {
                if moved.contains(&entity) {
                    tree.update(entity, volume);
                }
            } else {
                tree.insert(entity, volume);
            }
        }

        self.contacts.clear();
        for tree in self.broad_phase.values() {
            self.contacts.extend(tree.potential_contacts());
        }
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}
