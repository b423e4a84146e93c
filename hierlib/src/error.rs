use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the library
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't parse the config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raised when a cache or hierarchy is constructed with unusable parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache size must be positive")]
    ZeroSize,

    #[error("block size must be positive")]
    ZeroBlockSize,

    #[error("associativity must be positive")]
    ZeroAssociativity,

    #[error("{size_bytes} bytes cannot hold a single set of {associativity} x {block_size} byte blocks")]
    NoSets {
        size_bytes: u64,
        block_size: u64,
        associativity: u64,
    },

    #[error("{num_sets} sets exceeds the limit of {max}")]
    TooManySets { num_sets: u64, max: u64 },

    #[error("size of {size_kb}KB overflows a 64-bit byte count")]
    SizeOverflow { size_kb: u64 },

    #[error("the hierarchy needs at least one cache level")]
    EmptyHierarchy,

    #[error("address bound must be positive")]
    ZeroAddressBound,

    #[error("{0}")]
    Invalid(String),
}

/// Raised by a single access
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("address {address:#x} is outside the address space (max {bound:#x})")]
    AddressOutOfBounds { address: u64, bound: u64 },
}

/// Errors related to reading address traces
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read trace file '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Malformed address on line {line}: '{text}'")]
    Malformed { line: usize, text: String },

    #[error("Address on line {line} doesn't fit in 64 bits: '{text}'")]
    Overflow { line: usize, text: String },
}
