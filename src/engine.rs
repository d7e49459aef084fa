/// Tick loop and action drain
///
/// One fixed-cadence loop advances the world: drain pending external
/// actions up to a bounded count, run every system over the hot entities
/// of each frame, re-evaluate hot/idle scheduling, run the collision
/// broad-phase, publish a state snapshot. The tick is single-threaded and
/// cooperative; the bounded action queue is the only concurrency boundary,
/// so everything past the drain point runs with exclusive access to the
/// simulation state and the hot path needs no locks.
///
/// If a tick overruns its wall-clock target the next tick simply sees a
/// larger elapsed time; there are no catch-up ticks, keeping the
/// one-step-per-tick invariant of the integrator.

use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender, TrySendError};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::action::{self, Action, ActionRejection};
use crate::config::EngineConfig;
use crate::sim::physics::Physics;
use crate::sim::{SimState, System};
use crate::snapshot::Snapshot;

/// An action postponed to a future world time (delayed-effect weapons,
/// manufacturing, skill training).
struct ScheduledAction {
    at: f64,
    action: Action,
}

pub struct Engine {
    state: SimState,
    systems: Vec<Box<dyn System>>,
    config: EngineConfig,
    action_rx: Receiver<Action>,
    rejection_tx: Sender<ActionRejection>,
    snapshot_tx: Sender<Snapshot>,
    /// Pending scheduled actions, kept sorted chronologically.
    scheduled: Vec<ScheduledAction>,
    world_time: f64,
    tick: u64,
}

/// The engine's face to its collaborators: non-blocking action submission,
/// the rejection response path, and the per-tick snapshot stream.
pub struct EngineHandle {
    action_tx: SyncSender<Action>,
    pub rejections: Receiver<ActionRejection>,
    pub snapshots: Receiver<Snapshot>,
}

#[derive(Debug, thiserror::Error)]
#[error("action queue is full")]
pub struct QueueFull(pub Action);

impl EngineHandle {
    /// Enqueue an action; never blocks. A full queue hands the action
    /// back. Application success is observed via subsequent snapshots.
    pub fn submit(&self, action: Action) -> Result<(), QueueFull> {
        self.action_tx.try_send(action).map_err(|e| match e {
            TrySendError::Full(a) | TrySendError::Disconnected(a) => QueueFull(a),
        })
    }
}

impl Engine {
    pub fn new(state: SimState, config: EngineConfig) -> (Self, EngineHandle) {
        let (action_tx, action_rx) = sync_channel(config.tick.action_queue_capacity);
        let (rejection_tx, rejections) = channel();
        let (snapshot_tx, snapshots) = channel();

        let physics = Physics::new(config.physics.linear_damping, config.physics.angular_damping);
        let engine = Engine {
            state,
            systems: vec![Box::new(physics)],
            config,
            action_rx,
            rejection_tx,
            snapshot_tx,
            scheduled: Vec::new(),
            world_time: 0.0,
            tick: 0,
        };
        let handle = EngineHandle { action_tx, rejections, snapshots };
        (engine, handle)
    }

    pub fn world_time(&self) -> f64 {
        self.world_time
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimState {
        &mut self.state
    }

    /// Schedule an action for a future world time. A target time that is
    /// not in the future means an upstream invariant was violated.
    pub fn schedule(&mut self, at: f64, action: Action) -> Result<()> {
        if at <= self.world_time {
            bail!("scheduled time {at} is not after world time {}", self.world_time);
        }
        let i = self.scheduled.partition_point(|s| s.at <= at);
        self.scheduled.insert(i, ScheduledAction { at, action });
        Ok(())
    }

    /// Run the loop until a fatal error terminates it.
    pub fn run(mut self) -> Result<()> {
        info!(
            "engine loop starting: target {}s, {} frames",
            self.config.tick.target_seconds,
            self.state.frames.len()
        );

        let target = Duration::from_secs_f64(self.config.tick.target_seconds);
        let mut last = Instant::now();
        loop {
            let now = Instant::now();
            let mut elapsed = now - last;
            if elapsed < target {
                std::thread::sleep(target - elapsed);
                elapsed = target;
                last = Instant::now();
            } else {
                // overrun: let elapsed grow, no catch-up ticks
                last = now;
            }
            if let Err(e) = self.step(elapsed.as_secs_f64()) {
                info!("engine loop terminated: {e}");
                return Err(e);
            }
        }
    }

    /// Advance the world by one tick of `elapsed` seconds.
    pub fn step(&mut self, elapsed: f64) -> Result<()> {
        self.world_time += elapsed;

        // (a) due scheduled actions, then the external queue up to the cap
        self.drain_actions();

        // (b) child frames are dragged along their orbits
        self.state.frames.propagate(self.world_time);

        // (c) per-frame, per-system update of hot entities; entity order
        // within a frame is shuffled deterministically from the seed so
        // nobody can rely on being updated first
        let mut rng = Pcg32::seed_from_u64(
            self.config.tick.world_seed ^ self.tick.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let mut moved = std::collections::HashSet::new();
        for frame in self.state.frames_with_hot() {
            let mut hot = self.state.hot_in(frame);
            hot.sort_by_key(|e| e.to_bits());
            hot.shuffle(&mut rng);
            moved.extend(hot.iter().copied());

            for sys in self.systems.iter_mut() {
                sys.update(&mut self.state, self.world_time, elapsed, frame, &hot)?;
            }

            // (d) hot entities no system claims go idle
            for e in hot {
                let still_hot = self
                    .systems
                    .iter()
                    .any(|sys| sys.is_hot_post_update(&self.state, e));
                if !still_hot {
                    self.state.set_idle(e, frame, self.world_time);
                }
            }
        }

        // (e) collision broad-phase over the fresh positions
        self.state.run_broad_phase(&moved);
        if !self.state.contacts.is_empty() {
            debug!("tick {}: {} candidate contacts", self.tick, self.state.contacts.len());
        }

        // (f) hand the snapshot off by value; a gone consumer is fine
        let snapshot = Snapshot::capture(&self.state, self.tick, self.world_time);
        let _ = self.snapshot_tx.send(snapshot);

        self.tick += 1;
        Ok(())
    }

    fn drain_actions(&mut self) {
        while self
            .scheduled
            .first()
            .is_some_and(|s| s.at <= self.world_time)
        {
            let due = self.scheduled.remove(0);
            self.execute_action(due.action);
        }

        for _ in 0..self.config.tick.max_actions_per_tick {
            match self.action_rx.try_recv() {
                Ok(action) => self.execute_action(action),
                Err(_) => break,
            }
        }
    }

    fn execute_action(&mut self, action: Action) {
        debug!("executing action {} on entity {}", action.id, action.entity);
        if let Err(e) = action::execute(&mut self.state, &action) {
            warn!("action {} rejected: {e}", action.id);
            let _ = self.rejection_tx.send(ActionRejection {
                action_id: action.id,
                entity: action.entity,
                reason: e.to_string(),
            });
        }
    }
}
