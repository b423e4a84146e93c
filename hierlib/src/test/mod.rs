mod end_to_end;

use crate::cache::Cache;
use crate::replacement_policies::{RandomSource, ReplacementPolicy};

/// Replays a fixed list of victim choices, so Random eviction can be asserted exactly
pub(crate) struct ScriptedSource {
    picks: Vec<usize>,
    next: usize,
}

impl ScriptedSource {
    pub(crate) fn new(picks: Vec<usize>) -> Self {
        Self { picks, next: 0 }
    }
}

impl RandomSource for ScriptedSource {
    fn pick(&mut self, len: usize) -> usize {
        let pick = self.picks[self.next % self.picks.len()];
        self.next += 1;
        assert!(pick < len, "scripted pick {pick} out of range for {len} ways");
        pick
    }
}

/// A single 1KB level with 64 byte blocks. With 4 ways that gives 4 sets, so addresses
/// `k * 256` all land in set 0 with tag `k`
pub(crate) fn small_cache(policy: ReplacementPolicy, picks: Vec<usize>) -> Cache<ScriptedSource> {
    Cache::with_rng(1, 64, 4, policy, 1, None, ScriptedSource::new(picks)).unwrap()
}

pub(crate) const SET_STRIDE: u64 = 256;

pub(crate) const POLICIES: [ReplacementPolicy; 3] = [
    ReplacementPolicy::Lru,
    ReplacementPolicy::Fifo,
    ReplacementPolicy::Random,
];
