use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

const CONFIG_PATH: &str = "bench.ron";

const DEFAULT_ARENA_CAPACITY: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Arena capacity for the buddy run, in bytes. Rounded up to a power
    /// of two by the allocator. Must hold old + new buffer during one
    /// transform's buffer replacement.
    pub arena_capacity: usize,

    /// Rayon worker threads; `None` lets rayon pick one per core.
    pub worker_threads: Option<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            worker_threads: None,
        }
    }
}

impl BenchConfig {
    fn is_valid(&self) -> bool {
        self.arena_capacity > 0 && self.worker_threads != Some(0)
    }

    /// Load `bench.ron` from the working directory, falling back to
    /// defaults when it is absent or empty.
    pub fn load_if_exists() -> anyhow::Result<Self> {
        let path = Path::new(CONFIG_PATH);
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", CONFIG_PATH))?;
        if data.is_empty() {
            return Ok(Self::default());
        }

        let config: Self = ron::from_str(&data)
            .with_context(|| format!("Failed to parse config from {}", CONFIG_PATH))?;
        if !config.is_valid() {
            anyhow::bail!("Invalid config in {}", CONFIG_PATH);
        }
        Ok(config)
    }
}
