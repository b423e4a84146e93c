use std::fmt;
use std::str::FromStr;

use rand::rngs::{SmallRng, StdRng};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The block replacement policy of a cache level. Defaults to LRU.
///
/// The set of policies is closed, so the cache dispatches on this with a `match` in its hit and
/// eviction paths rather than going through a strategy object
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// Least recently used. Hits move the block to the most recently used end of its set
    #[default]
    #[serde(rename = "LRU", alias = "lru", alias = "Lru")]
    Lru,
    /// First in, first out. Hits leave the insertion order alone
    #[serde(rename = "FIFO", alias = "fifo", alias = "Fifo")]
    Fifo,
    /// Evicts a uniformly chosen resident block. Hits leave the order alone
    #[serde(rename = "Random", alias = "random", alias = "RANDOM")]
    Random,
}

impl ReplacementPolicy {
    /// Whether a hit promotes the block to the most recently used end of its way list
    pub fn promotes_on_hit(self) -> bool {
        matches!(self, ReplacementPolicy::Lru)
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplacementPolicy::Lru => "LRU",
            ReplacementPolicy::Fifo => "FIFO",
            ReplacementPolicy::Random => "Random",
        })
    }
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(ReplacementPolicy::Lru),
            "fifo" => Ok(ReplacementPolicy::Fifo),
            "random" | "rand" => Ok(ReplacementPolicy::Random),
            other => Err(format!("Unknown replacement policy '{other}', expected lru, fifo or random")),
        }
    }
}

/// Source of victim choices for the Random policy
///
/// Kept as a capability the cache is handed at construction, so tests can script exactly which
/// way is evicted while normal runs use a seeded or OS-seeded generator
pub trait RandomSource {
    /// Picks an index in `0..len`. Only called with `len >= 1`
    fn pick(&mut self, len: usize) -> usize;
}

impl RandomSource for SmallRng {
    fn pick(&mut self, len: usize) -> usize {
        self.random_range(0..len)
    }
}

impl RandomSource for StdRng {
    fn pick(&mut self, len: usize) -> usize {
        self.random_range(0..len)
    }
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn pick(&mut self, len: usize) -> usize {
        (**self).pick(len)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn parses_policy_names() {
        assert_eq!("LRU".parse::<ReplacementPolicy>(), Ok(ReplacementPolicy::Lru));
        assert_eq!("fifo".parse::<ReplacementPolicy>(), Ok(ReplacementPolicy::Fifo));
        assert_eq!("Random".parse::<ReplacementPolicy>(), Ok(ReplacementPolicy::Random));
        assert!("mru".parse::<ReplacementPolicy>().is_err());
    }

    #[test]
    fn deserialises_original_and_lowercase_names() {
        let policies: Vec<ReplacementPolicy> = serde_json::from_str(r#"["LRU", "fifo", "Random", "random"]"#).unwrap();
        assert_eq!(policies, vec![
            ReplacementPolicy::Lru,
            ReplacementPolicy::Fifo,
            ReplacementPolicy::Random,
            ReplacementPolicy::Random,
        ]);
    }

    #[test]
    fn only_lru_promotes() {
        assert!(ReplacementPolicy::Lru.promotes_on_hit());
        assert!(!ReplacementPolicy::Fifo.promotes_on_hit());
        assert!(!ReplacementPolicy::Random.promotes_on_hit());
    }

    #[test]
    fn picks_stay_in_range() {
        let mut rng = SmallRng::seed_from_u64(42);
        for len in 1..20 {
            for _ in 0..50 {
                assert!(rng.pick(len) < len);
            }
        }
    }
}
