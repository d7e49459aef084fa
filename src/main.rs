use log::{debug, info};

use orrery_engine::config::EngineConfig;
use orrery_engine::engine::Engine;
use orrery_engine::sim::{init, SimState};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = EngineConfig::load_or_default("config/engine.json");
    info!("config: {:?}", config);

    let mut state = SimState::new();
    init::setup_dev_world(&mut state);

    let (engine, handle) = Engine::new(state, config);

    // stand-in publication collaborator: drain snapshots off-thread
    std::thread::spawn(move || {
        while let Ok(snapshot) = handle.snapshots.recv() {
            debug!(
                "tick {} at t={:.1}s: {} frames",
                snapshot.tick,
                snapshot.world_time,
                snapshot.frames.len()
            );
        }
    });

    engine.run()
}
