//! # HierLib
//!
//! Hierlib is a library for simulating multi-level set-associative cache hierarchies
//!
//! It provides a cache level which can be chained to the level below it, with LRU, FIFO and
//! Random replacement, and a simulator which builds a hierarchy from a JSON configuration, feeds
//! it an address stream, and reports hit/miss ratios and average memory access time
//!
//! Only tags are modelled. No data is stored and every access is a read

/// Contains the cache level and its address decomposition
pub mod cache;

/// Contains definitions for the JSON input format
pub mod config;

/// Contains the error types for configuration, accesses and traces
pub mod error;

/// Contains the hit ratio, miss ratio and AMAT calculations over raw counters
pub mod metrics;

/// Contains the replacement policies and the randomness source used by the Random policy
pub mod replacement_policies;

/// Contains the simulator used to drive a hierarchy with an address stream
pub mod simulator;

/// Contains address stream generators and the trace file reader
pub mod trace;

#[cfg(test)]
mod test;
