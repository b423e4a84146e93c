use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{num_sets_for, DEFAULT_TERMINAL_MISS_PENALTY};
use crate::error::{ConfigError, SimulatorError};
use crate::replacement_policies::ReplacementPolicy;

/// Default main memory latency, in cycles, used when computing AMAT
pub const DEFAULT_MEMORY_LATENCY: u64 = 200;

/// A cache hierarchy configuration, outermost level (L1) first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayeredCacheConfig {
    pub caches: Vec<CacheConfig>,
    /// Latency of main memory, used for the AMAT of the terminal level
    #[serde(default = "default_memory_latency")]
    pub memory_latency: u64,
    /// Penalty the terminal level folds into the cycles returned for its own misses
    #[serde(default = "default_terminal_miss_penalty")]
    pub terminal_miss_penalty: u64,
    /// Largest valid address, inclusive. Unbounded if absent
    #[serde(default)]
    pub address_bound: Option<u64>,
}

/// A configuration for a single cache level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub size_kb: u64,
    pub block_size: u64,
    pub associativity: u64,
    #[serde(default)]
    pub replacement_policy: ReplacementPolicy,
    pub access_latency: u64,
}

fn default_memory_latency() -> u64 {
    DEFAULT_MEMORY_LATENCY
}

fn default_terminal_miss_penalty() -> u64 {
    DEFAULT_TERMINAL_MISS_PENALTY
}

impl CacheConfig {
    /// The L1 a simulation starts with when no config is supplied: 32KB, 4-way, 64 byte blocks,
    /// LRU, 4 cycles
    pub fn default_l1() -> Self {
        Self {
            name: String::from("L1"),
            size_kb: 32,
            block_size: 64,
            associativity: 4,
            replacement_policy: ReplacementPolicy::Lru,
            access_latency: 4,
        }
    }

    /// The default L2: 256KB, 8-way, 64 byte blocks, LRU, 10 cycles
    pub fn default_l2() -> Self {
        Self {
            name: String::from("L2"),
            size_kb: 256,
            block_size: 64,
            associativity: 8,
            replacement_policy: ReplacementPolicy::Lru,
            access_latency: 10,
        }
    }
}

impl Default for LayeredCacheConfig {
    fn default() -> Self {
        Self {
            caches: vec![CacheConfig::default_l1(), CacheConfig::default_l2()],
            memory_latency: DEFAULT_MEMORY_LATENCY,
            terminal_miss_penalty: DEFAULT_TERMINAL_MISS_PENALTY,
            address_bound: None,
        }
    }
}

impl LayeredCacheConfig {
    /// Reads and validates a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self, SimulatorError> {
        let config_file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(config_file))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every level's geometry without building anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caches.is_empty() {
            return Err(ConfigError::EmptyHierarchy);
        }
        if self.address_bound == Some(0) {
            return Err(ConfigError::ZeroAddressBound);
        }
        for cache in &self.caches {
            num_sets_for(cache.size_kb, cache.block_size, cache.associativity)
                .map_err(|e| ConfigError::Invalid(format!("{}: {e}", cache.name)))?;
        }
        Ok(())
    }

    /// Keeps only the outermost level, as when L2 is disabled
    pub fn without_lower_levels(mut self) -> Self {
        self.caches.truncate(1);
        self
    }

    /// Returns a copy with the first level resized, for parameter sweeps
    pub fn with_l1_size(&self, size_kb: u64) -> Self {
        let mut config = self.clone();
        if let Some(l1) = config.caches.first_mut() {
            l1.size_kb = size_kb;
        }
        config
    }
}
