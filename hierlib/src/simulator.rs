use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::config::LayeredCacheConfig;
use crate::error::{AccessError, ConfigError, SimulatorError};
use crate::metrics;

/// The simulator builds a cache hierarchy from a configuration, feeds it addresses and collects
/// results.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// results accordingly
pub struct Simulator {
    hierarchy: Cache,
    names: Vec<String>,
    memory_latency: u64,
    address_bound: Option<u64>,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised to JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayeredCacheResult {
    /// Misses of the terminal level, i.e. the accesses that reached main memory
    pub main_memory_accesses: u64,
    pub caches: Vec<LevelResult>,
}

/// The result for an individual level. Ratios are percentages, derived figures are `None` for a
/// level that was never accessed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelResult {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub accesses: u64,
    pub hit_ratio: Option<f64>,
    pub miss_ratio: Option<f64>,
    /// This level's latency plus its miss rate times the next level's latency (main memory for
    /// the terminal level)
    pub amat: Option<f64>,
    /// As `amat`, but using the next level's own AMAT as the miss penalty
    pub hierarchical_amat: Option<f64>,
}

/// One run of an L1 size sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepResult {
    pub l1_size_kb: u64,
    pub result: LayeredCacheResult,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A hierarchy configuration, usually resulting from parsing JSON
    /// * `seed`: Seeds the Random policy of every level. Seeded from the OS if absent
    ///
    /// returns: Result<Simulator, ConfigError>
    pub fn new(config: &LayeredCacheConfig, seed: Option<u64>) -> Result<Self, ConfigError> {
        config.validate()?;
        let hierarchy = Self::build_hierarchy(config, seed)?;
        Ok(Self {
            hierarchy,
            names: config.caches.iter().map(|cache| cache.name.clone()).collect(),
            memory_latency: config.memory_latency,
            address_bound: config.address_bound,
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Builds the chain from the innermost level outwards, returning the outermost level
    fn build_hierarchy(config: &LayeredCacheConfig, seed: Option<u64>) -> Result<Cache, ConfigError> {
        let mut next: Option<Cache> = None;
        for (depth, level) in config.caches.iter().enumerate().rev() {
            let rng = match seed {
                Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(depth as u64)),
                None => SmallRng::from_os_rng(),
            };
            let mut cache = Cache::with_rng(
                level.size_kb,
                level.block_size,
                level.associativity,
                level.replacement_policy,
                level.access_latency,
                next.take(),
                rng,
            )
            .map_err(|e| ConfigError::Invalid(format!("{}: {e}", level.name)))?
            .with_terminal_miss_penalty(config.terminal_miss_penalty);
            if let Some(bound) = config.address_bound {
                cache = cache.with_address_bound(bound)?;
            }
            debug!("built {} with {} sets", level.name, cache.num_sets());
            next = Some(cache);
        }
        next.ok_or(ConfigError::EmptyHierarchy)
    }

    /// Feeds every address into the outermost level, in order
    ///
    /// The whole trace is checked against the address bound first, so an invalid trace is
    /// rejected without touching the hierarchy
    ///
    /// # Arguments
    ///
    /// * `addresses`: The address stream
    ///
    /// returns: Result<LayeredCacheResult, AccessError>
    pub fn simulate(&mut self, addresses: &[u64]) -> Result<LayeredCacheResult, AccessError> {
        if let Some(bound) = self.address_bound {
            if let Some(&address) = addresses.iter().find(|&&address| address > bound) {
                return Err(AccessError::AddressOutOfBounds { address, bound });
            }
        }
        let start = Instant::now();
        for &address in addresses {
            self.hierarchy.access(address)?;
        }
        self.simulation_time += start.elapsed();
        info!("simulated {} accesses in {:?}", addresses.len(), self.simulation_time);
        Ok(self.result())
    }

    /// Collects the counters of every level and derives the ratios and AMAT figures
    pub fn result(&self) -> LayeredCacheResult {
        let levels: Vec<&Cache> = self.hierarchy.levels().collect();
        // The hierarchical AMAT of each level depends on the one below it, so work bottom up
        let mut hierarchical = vec![None; levels.len()];
        let mut below = self.memory_latency as f64;
        for (index, level) in levels.iter().enumerate().rev() {
            hierarchical[index] = metrics::amat(level.access_latency(), level.misses(), level.accesses(), below);
            below = hierarchical[index].unwrap_or(level.access_latency() as f64);
        }

        let caches = levels
            .iter()
            .zip(&self.names)
            .zip(hierarchical)
            .map(|((level, name), hierarchical_amat)| {
                let next_latency = level
                    .next_level()
                    .map_or(self.memory_latency, |next| next.access_latency());
                LevelResult {
                    name: name.clone(),
                    hits: level.hits(),
                    misses: level.misses(),
                    accesses: level.accesses(),
                    hit_ratio: metrics::hit_ratio(level.hits(), level.accesses()),
                    miss_ratio: metrics::miss_ratio(level.hits(), level.accesses()),
                    amat: metrics::amat(level.access_latency(), level.misses(), level.accesses(), next_latency as f64),
                    hierarchical_amat,
                }
            })
            .collect();

        LayeredCacheResult {
            main_memory_accesses: levels.last().map_or(0, |terminal| terminal.misses()),
            caches,
        }
    }

    /// Zeroes the counters of every level, keeping their contents
    pub fn reset(&mut self) {
        self.hierarchy.reset_all_metrics();
        self.simulation_time = Duration::new(0, 0);
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of resident blocks for each level
    pub fn occupancy(&self) -> Vec<usize> {
        self.hierarchy.levels().map(Cache::resident_blocks).collect()
    }

    /// The outermost level, with the rest of the chain reachable through it
    pub fn hierarchy(&self) -> &Cache {
        &self.hierarchy
    }
}

/// Replays the same trace once per L1 size, on a freshly built hierarchy each time
pub fn sweep_l1_sizes(
    config: &LayeredCacheConfig,
    sizes_kb: &[u64],
    addresses: &[u64],
    seed: Option<u64>,
) -> Result<Vec<SweepResult>, SimulatorError> {
    if sizes_kb.is_empty() {
        return Err(ConfigError::Invalid(String::from("the sweep needs at least one L1 size")).into());
    }
    sizes_kb
        .iter()
        .map(|&l1_size_kb| {
            let mut simulator = Simulator::new(&config.with_l1_size(l1_size_kb), seed)?;
            let result = simulator.simulate(addresses)?;
            Ok(SweepResult { l1_size_kb, result })
        })
        .collect()
}
