/// Hierarchical reference frames
///
/// The game world is a tree of reference frames. Each frame except the root
/// has one parent and is located relative to it either by a fixed offset or
/// by a Keplerian orbit; child frames are dragged along their parents. The
/// root frame (the galactic grid) has neither. Frames do not rotate
/// relative to their parents; a frame carries at most one fixed orientation,
/// so frame-to-frame transforms stay pure translations plus that rotation.
///
/// The tree is read-mostly after world setup: frames are created during
/// setup (or when procedural generation allocates a new system) and never
/// deleted during play.

use glam::{DQuat, DVec3};
use log::error;
use serde::{Deserialize, Serialize};

use crate::orbit::Oe;

/// Stable index of a frame in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(u32);

impl FrameId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Location of a non-root frame relative to its parent. The two
/// representations are mutually exclusive by construction.
#[derive(Debug, Clone, Copy)]
pub enum FrameLocation {
    /// Stationary offset, e.g. the inside of a station module.
    Fixed(DVec3),
    /// Keplerian orbit around the parent's primary, e.g. the grid
    /// surrounding a station orbiting a planet.
    Orbiting(Oe),
}

pub struct RefFrame {
    pub parent: Option<FrameId>,
    /// `None` only for the root frame.
    pub location: Option<FrameLocation>,
    /// Fixed orientation relative to the parent; identity inherits it.
    pub orientation: DQuat,
    /// Interaction radius of the frame's grid.
    pub radius: f64,
    /// Standard gravitational parameter of the frame's primary body, when
    /// the frame has one. Required to orbit-represent entities inside it.
    pub mu: Option<f64>,
    /// World time of periapsis passage for orbiting frames.
    t_periapsis: f64,
}

impl RefFrame {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

pub struct FrameTree {
    frames: Vec<RefFrame>,
}

impl FrameTree {
    /// Create the tree with its root (galactic) frame.
    pub fn new() -> Self {
        FrameTree {
            frames: vec![RefFrame {
                parent: None,
                location: None,
                orientation: DQuat::IDENTITY,
                radius: f64::INFINITY,
                mu: None,
                t_periapsis: 0.0,
            }],
        }
    }

    pub fn root(&self) -> FrameId {
        FrameId(0)
    }

    pub fn get(&self, id: FrameId) -> &RefFrame {
        &self.frames[id.index()]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Frame ids in creation order (stable across a run).
    pub fn ids(&self) -> impl Iterator<Item = FrameId> {
        (0..self.frames.len() as u32).map(FrameId)
    }

    /// Add a frame at a fixed offset from its parent.
    pub fn add_fixed(
        &mut self,
        parent: FrameId,
        offset: DVec3,
        orientation: DQuat,
        radius: f64,
        mu: Option<f64>,
    ) -> FrameId {
        self.push(RefFrame {
            parent: Some(parent),
            location: Some(FrameLocation::Fixed(offset)),
            orientation,
            radius,
            mu,
            t_periapsis: 0.0,
        })
    }

    /// Add a frame orbiting within its parent. `world_time` anchors the
    /// orbit's epoch so later propagation is phase-correct.
    pub fn add_orbiting(
        &mut self,
        parent: FrameId,
        orbit: Oe,
        orientation: DQuat,
        radius: f64,
        mu: Option<f64>,
        world_time: f64,
    ) -> FrameId {
        let t_periapsis = match orbit.time_since_periapsis() {
            Ok(t) => world_time - t,
            Err(e) => {
                // only reachable for a hyperbolic frame inserted past its
                // asymptote; treat the insertion time as periapsis
                error!("frame orbit epoch: {e}");
                world_time
            }
        };
        self.push(RefFrame {
            parent: Some(parent),
            location: Some(FrameLocation::Orbiting(orbit)),
            orientation,
            radius,
            mu,
            t_periapsis,
        })
    }

    fn push(&mut self, frame: RefFrame) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(frame);
        id
    }

    /// Advance every orbiting frame's true anomaly to `world_time`.
    /// A frame whose solver does not converge keeps its previous anomaly
    /// for this tick and is retried on the next.
    pub fn propagate(&mut self, world_time: f64) {
        for frame in self.frames.iter_mut() {
            let t_periapsis = frame.t_periapsis;
            if let Some(FrameLocation::Orbiting(ref mut oe)) = frame.location {
                match oe.true_anomaly_from_time(t_periapsis, world_time) {
                    Ok(ta) => oe.ta = ta,
                    Err(e) => error!("frame orbit propagation skipped this tick: {e}"),
                }
            }
        }
    }

    /// Current offset and velocity of a frame relative to its parent.
    /// The root is stationary at the origin by definition.
    pub fn local_state(&self, id: FrameId) -> (DVec3, DVec3) {
        match self.get(id).location {
            None => (DVec3::ZERO, DVec3::ZERO),
            Some(FrameLocation::Fixed(offset)) => (offset, DVec3::ZERO),
            Some(FrameLocation::Orbiting(oe)) => oe.to_state_vector(),
        }
    }

    /// Express a frame-local position/velocity pair in root coordinates.
    pub fn to_root(&self, from: FrameId, pos: DVec3, vel: DVec3) -> (DVec3, DVec3) {
        let mut id = from;
        let (mut pos, mut vel) = (pos, vel);
        loop {
            let frame = self.get(id);
            let Some(parent) = frame.parent else {
                return (pos, vel);
            };
            let (offset, offset_vel) = self.local_state(id);
            pos = frame.orientation * pos + offset;
            vel = frame.orientation * vel + offset_vel;
            id = parent;
        }
    }

    /// Express a root-space position/velocity pair in a frame's local
    /// coordinates.
    pub fn from_root(&self, to: FrameId, pos: DVec3, vel: DVec3) -> (DVec3, DVec3) {
        // collect the chain root -> `to`, then invert each step in order
        let mut chain = Vec::new();
        let mut id = to;
        while let Some(parent) = self.get(id).parent {
            chain.push(id);
            id = parent;
        }
        let (mut pos, mut vel) = (pos, vel);
        for &id in chain.iter().rev() {
            let frame = self.get(id);
            let (offset, offset_vel) = self.local_state(id);
            let inv = frame.orientation.inverse();
            pos = inv * (pos - offset);
            vel = inv * (vel - offset_vel);
        }
        (pos, vel)
    }
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fixed_offsets_compose_through_the_tree() {
        let mut tree = FrameTree::new();
        let system = tree.add_fixed(
            tree.root(),
            DVec3::new(1000.0, 0.0, 0.0),
            DQuat::IDENTITY,
            500.0,
            None,
        );
        let local = tree.add_fixed(
            system,
            DVec3::new(0.0, 10.0, 0.0),
            DQuat::IDENTITY,
            50.0,
            None,
        );

        let (p, v) = tree.to_root(local, DVec3::new(1.0, 2.0, 3.0), DVec3::X);
        assert_eq!(p, DVec3::new(1001.0, 12.0, 3.0));
        assert_eq!(v, DVec3::X);

        let (back, _) = tree.from_root(local, p, v);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(back.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(back.z, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn orbiting_frame_moves_under_propagation() {
        let mu: f64 = 3.986004418e14;
        let r = 6.3781e6 + 500_000.0;
        // circular orbit: h = sqrt(mu * r)
        let orbit = Oe {
            h: (mu * r).sqrt(),
            incl: 0.0,
            raan: 0.0,
            ecc: 0.0,
            argp: 0.0,
            ta: 0.0,
            mu,
        };
        let mut tree = FrameTree::new();
        let planet = tree.add_fixed(tree.root(), DVec3::ZERO, DQuat::IDENTITY, 1e9, Some(mu));
        let grid = tree.add_orbiting(planet, orbit, DQuat::IDENTITY, 20_000.0, None, 0.0);

        let (before, _) = tree.local_state(grid);
        tree.propagate(60.0);
        let (after, _) = tree.local_state(grid);

        assert!(before.distance(after) > 1.0);
        // circular orbit: radius is conserved
        assert_relative_eq!(before.length(), after.length(), epsilon = 1e-3);
    }
}
