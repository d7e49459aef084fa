use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tick: TickConfigData,
    pub physics: PhysicsConfigData,
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file with pretty formatting
    pub fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_else(|_| {
            let config = Self::default();
            let _ = config.save(path);
            config
        })
    }
}

/// Tick loop configuration (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfigData {
    /// Wall-clock target width of one simulation tick, seconds.
    pub target_seconds: f64,
    /// Maximum external actions drained per tick; a burst beyond the cap
    /// is deferred to the next tick, never dropped.
    pub max_actions_per_tick: usize,
    /// Capacity of the bounded action queue.
    pub action_queue_capacity: usize,
    /// Seed for the per-tick entity-order shuffle.
    pub world_seed: u64,
}

impl Default for TickConfigData {
    fn default() -> Self {
        Self {
            target_seconds: 1.0,
            max_actions_per_tick: 10,
            action_queue_capacity: 64,
            world_seed: 0,
        }
    }
}

/// Physics configuration (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfigData {
    /// Multiplicative velocity damping per second; 1.0 disables damping
    /// and conserves momentum.
    pub linear_damping: f64,
    pub angular_damping: f64,
}

impl Default for PhysicsConfigData {
    fn default() -> Self {
        Self { linear_damping: 1.0, angular_damping: 1.0 }
    }
}
