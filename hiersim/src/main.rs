use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use hierlib::config::LayeredCacheConfig;
use hierlib::error::{ConfigError, SimulatorError};
use hierlib::replacement_policies::ReplacementPolicy;
use hierlib::simulator::{sweep_l1_sizes, Simulator};
use hierlib::trace::{generate, read_trace_file, TracePattern};
use log::info;
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Pattern {
    Random,
    Sequential,
}

#[derive(Parser, Debug)]
#[command(about = String::from("Multi-level set-associative cache hierarchy simulator"))]
struct Args {
    /// JSON hierarchy configuration. Defaults to a 32KB L1 over a 256KB L2
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only simulate the first level of the hierarchy
    #[arg(long)]
    no_l2: bool,

    /// L1 size in KB
    #[arg(long)]
    l1_size: Option<u64>,

    /// L1 ways per set
    #[arg(long)]
    l1_assoc: Option<u64>,

    /// L1 block size in bytes
    #[arg(long)]
    l1_block: Option<u64>,

    /// L1 replacement policy: lru, fifo or random
    #[arg(long)]
    l1_policy: Option<ReplacementPolicy>,

    /// L1 access time in cycles
    #[arg(long)]
    l1_cycles: Option<u64>,

    /// L2 size in KB
    #[arg(long)]
    l2_size: Option<u64>,

    /// L2 ways per set
    #[arg(long)]
    l2_assoc: Option<u64>,

    /// L2 block size in bytes
    #[arg(long)]
    l2_block: Option<u64>,

    /// L2 replacement policy: lru, fifo or random
    #[arg(long)]
    l2_policy: Option<ReplacementPolicy>,

    /// L2 access time in cycles
    #[arg(long)]
    l2_cycles: Option<u64>,

    /// Shape of the generated address stream
    #[arg(long, value_enum, default_value_t = Pattern::Random)]
    pattern: Pattern,

    /// Number of generated addresses
    #[arg(short = 'n', long, default_value_t = 5000)]
    accesses: usize,

    /// Distance between sequential addresses
    #[arg(long, default_value_t = 4)]
    stride: u64,

    /// Largest generated random address
    #[arg(long, value_parser = parse_number, default_value = "0xFFFFF")]
    address_bound: u64,

    /// Read addresses from a trace file instead of generating them
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Seeds trace generation and Random eviction
    #[arg(short, long)]
    seed: Option<u64>,

    /// Main memory latency used for AMAT
    #[arg(long)]
    memory_latency: Option<u64>,

    /// Cycles the last level charges for its own misses. Follows --memory-latency if not given
    #[arg(long)]
    terminal_penalty: Option<u64>,

    /// Run once per L1 size (KB), comma separated
    #[arg(long, value_delimiter = ',')]
    sweep_l1_sizes: Vec<u64>,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn parse_number(input: &str) -> Result<u64, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse::<u64>(),
    };
    parsed.map_err(|e| format!("Couldn't parse '{input}' as an address: {e}"))
}

/// Per-level overrides from the command line, applied on top of the loaded config
struct LevelOverrides {
    size_kb: Option<u64>,
    associativity: Option<u64>,
    block_size: Option<u64>,
    policy: Option<ReplacementPolicy>,
    access_latency: Option<u64>,
}

impl LevelOverrides {
    fn is_empty(&self) -> bool {
        self.size_kb.is_none()
            && self.associativity.is_none()
            && self.block_size.is_none()
            && self.policy.is_none()
            && self.access_latency.is_none()
    }

    fn apply(&self, config: &mut LayeredCacheConfig, index: usize) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }
        let level = config
            .caches
            .get_mut(index)
            .ok_or_else(|| ConfigError::Invalid(format!("--l{}-* given but the hierarchy has no level {}", index + 1, index + 1)))?;
        if let Some(size_kb) = self.size_kb {
            level.size_kb = size_kb;
        }
        if let Some(associativity) = self.associativity {
            level.associativity = associativity;
        }
        if let Some(block_size) = self.block_size {
            level.block_size = block_size;
        }
        if let Some(policy) = self.policy {
            level.replacement_policy = policy;
        }
        if let Some(access_latency) = self.access_latency {
            level.access_latency = access_latency;
        }
        Ok(())
    }
}

impl Args {
    fn level_overrides(&self) -> [LevelOverrides; 2] {
        [
            LevelOverrides {
                size_kb: self.l1_size,
                associativity: self.l1_assoc,
                block_size: self.l1_block,
                policy: self.l1_policy,
                access_latency: self.l1_cycles,
            },
            LevelOverrides {
                size_kb: self.l2_size,
                associativity: self.l2_assoc,
                block_size: self.l2_block,
                policy: self.l2_policy,
                access_latency: self.l2_cycles,
            },
        ]
    }
}

fn load_config(args: &Args) -> Result<LayeredCacheConfig, SimulatorError> {
    let mut config = match &args.config {
        Some(path) => LayeredCacheConfig::from_json_file(path)?,
        None => LayeredCacheConfig::default(),
    };
    let [l1, l2] = args.level_overrides();
    l1.apply(&mut config, 0)?;
    // L2 flags are moot once the second level is dropped
    if !args.no_l2 {
        l2.apply(&mut config, 1)?;
    }
    if args.no_l2 {
        config = config.without_lower_levels();
    }
    if let Some(latency) = args.memory_latency {
        config.memory_latency = latency;
        config.terminal_miss_penalty = latency;
    }
    if let Some(penalty) = args.terminal_penalty {
        config.terminal_miss_penalty = penalty;
    }
    config.validate()?;
    Ok(config)
}

fn load_trace(args: &Args) -> Result<Vec<u64>, SimulatorError> {
    if let Some(path) = &args.trace {
        return Ok(read_trace_file(path)?);
    }
    if args.pattern == Pattern::Sequential && args.stride == 0 {
        return Err(ConfigError::Invalid(String::from("stride must be positive")).into());
    }
    let mut rng = match args.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let pattern = match args.pattern {
        Pattern::Random => TracePattern::Random { bound: args.address_bound },
        Pattern::Sequential => TracePattern::Sequential { stride: args.stride },
    };
    Ok(generate(pattern, args.accesses, &mut rng))
}

fn main() -> Result<(), String> {
    env_logger::init();
    let start = Instant::now();
    let args = Args::parse();
    let config = load_config(&args).map_err(|e| e.to_string())?;
    let trace = load_trace(&args).map_err(|e| e.to_string())?;
    info!("loaded {} addresses", trace.len());

    if !args.sweep_l1_sizes.is_empty() {
        let results = sweep_l1_sizes(&config, &args.sweep_l1_sizes, &trace, args.seed).map_err(|e| e.to_string())?;
        println!("{}", serde_json::to_string_pretty(&results).map_err(|e| format!("Couldn't serialise the output {e}"))?);
        if args.performance {
            println!("Total execution time (includes trace generation, configuration, and output): {}s", start.elapsed().as_nanos() as f64 / 1e9);
        }
        return Ok(());
    }

    let mut simulator = Simulator::new(&config, args.seed).map_err(|e| SimulatorError::from(e).to_string())?;
    let result = simulator.simulate(&trace).map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    if args.performance {
        let simulation_time = simulator.get_execution_time();
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes trace generation, configuration, and output): {}s", start.elapsed().as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        let occupancy = simulator.occupancy();
        let formatted = config.caches
            .iter()
            .zip(simulator.hierarchy().levels())
            .zip(occupancy.iter())
            .map(|((c, level), count)| format!("{}: {count}/{}", c.name, level.num_sets() * level.associativity()))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Resident blocks by level: ({formatted})");
        println!("Total resident blocks: {}", occupancy.iter().sum::<usize>())
    }
    Ok(())
}
