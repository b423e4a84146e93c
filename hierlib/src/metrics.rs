//! Metrics derived from a level's raw counters
//!
//! The cache itself only counts. Everything here returns `None` for a level that was never
//! accessed instead of dividing by zero

/// Percentage of accesses that hit
pub fn hit_ratio(hits: u64, accesses: u64) -> Option<f64> {
    (accesses > 0).then(|| hits as f64 / accesses as f64 * 100.0)
}

/// Percentage of accesses that missed, `100 - hit_ratio`
pub fn miss_ratio(hits: u64, accesses: u64) -> Option<f64> {
    hit_ratio(hits, accesses).map(|ratio| 100.0 - ratio)
}

/// Average memory access time of a single level
///
/// `access_latency + misses / accesses * next_latency`, where `next_latency` is the next level's
/// access latency, or the main memory latency for the terminal level
pub fn amat(access_latency: u64, misses: u64, accesses: u64, next_latency: f64) -> Option<f64> {
    (accesses > 0).then(|| access_latency as f64 + misses as f64 / accesses as f64 * next_latency)
}
