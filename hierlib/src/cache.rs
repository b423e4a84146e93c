use std::collections::VecDeque;
use std::iter;

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::error::{AccessError, ConfigError};
use crate::replacement_policies::{RandomSource, ReplacementPolicy};

/// Cycles a terminal level charges for its own misses unless told otherwise
///
/// This is the penalty folded into the value `access` returns. The main memory latency used for
/// AMAT is configured separately, see [`crate::config::LayeredCacheConfig::memory_latency`]
pub const DEFAULT_TERMINAL_MISS_PENALTY: u64 = 200;

/// Largest number of sets a level may have. Every set gets a way list up front, so a geometry
/// beyond this is rejected instead of attempting the allocation
pub const MAX_SETS: u64 = 1 << 24;

/// Validates a geometry and returns the number of sets it yields
///
/// `num_sets = size_kb * 1024 / (block_size * associativity)`, which must be at least one and at
/// most [`MAX_SETS`]
pub fn num_sets_for(size_kb: u64, block_size: u64, associativity: u64) -> Result<u64, ConfigError> {
    if size_kb == 0 {
        return Err(ConfigError::ZeroSize);
    }
    if block_size == 0 {
        return Err(ConfigError::ZeroBlockSize);
    }
    if associativity == 0 {
        return Err(ConfigError::ZeroAssociativity);
    }
    let size_bytes = size_kb.checked_mul(1024).ok_or(ConfigError::SizeOverflow { size_kb })?;
    // An overflowing set size is necessarily bigger than the whole cache
    let num_sets = block_size
        .checked_mul(associativity)
        .map_or(0, |set_bytes| size_bytes / set_bytes);
    if num_sets == 0 {
        return Err(ConfigError::NoSets { size_bytes, block_size, associativity });
    }
    if num_sets > MAX_SETS {
        return Err(ConfigError::TooManySets { num_sets, max: MAX_SETS });
    }
    Ok(num_sets)
}

/// One level of a set-associative cache hierarchy
///
/// Each set is a way list of resident tags, oldest at the front. Under LRU a hit moves the tag to
/// the back, so the front is always the least recently used block; FIFO and Random never reorder
/// on a hit. On a miss with a full set, LRU and FIFO both evict the front, and Random evicts a way
/// chosen by the cache's [`RandomSource`]
///
/// A level exclusively owns the level below it. Misses are forwarded down the chain inline, and
/// the cycles charged by the lower level become this level's miss penalty
///
/// Only tags are tracked, no data is stored
pub struct Cache<R: RandomSource = SmallRng> {
    size_bytes: u64,
    block_size: u64,
    associativity: u64,
    num_sets: u64,
    policy: ReplacementPolicy,
    access_latency: u64,
    terminal_miss_penalty: u64,
    address_bound: Option<u64>,
    sets: Vec<VecDeque<u64>>,
    next_level: Option<Box<Cache<R>>>,
    rng: R,
    hits: u64,
    misses: u64,
    accesses: u64,
}

impl Cache<SmallRng> {
    /// Creates a cache level which seeds its Random policy generator from the OS
    ///
    /// # Arguments
    ///
    /// * `size_kb`: Total capacity in kilobytes
    /// * `block_size`: Bytes per block
    /// * `associativity`: Ways per set
    /// * `policy`: The replacement policy
    /// * `access_latency`: Cycles charged whenever this level is reached
    /// * `next_level`: The level misses are forwarded to, `None` for the terminal level
    ///
    /// returns: Result<Cache, ConfigError>
    pub fn new(
        size_kb: u64,
        block_size: u64,
        associativity: u64,
        policy: ReplacementPolicy,
        access_latency: u64,
        next_level: Option<Cache<SmallRng>>,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(size_kb, block_size, associativity, policy, access_latency, next_level, SmallRng::from_os_rng())
    }
}

impl<R: RandomSource> Cache<R> {
    /// Creates a cache level using `rng` to choose Random policy victims
    ///
    /// Fails if any of the size, block size or associativity is zero, or if the capacity can't
    /// hold at least one full set
    pub fn with_rng(
        size_kb: u64,
        block_size: u64,
        associativity: u64,
        policy: ReplacementPolicy,
        access_latency: u64,
        next_level: Option<Cache<R>>,
        rng: R,
    ) -> Result<Self, ConfigError> {
        let num_sets = num_sets_for(size_kb, block_size, associativity)?;
        let size_bytes = size_kb * 1024;
        debug!(
            "new {policy} cache: {size_bytes} bytes, {num_sets} sets of {associativity} x {block_size} byte blocks, {access_latency} cycles"
        );
        Ok(Self {
            size_bytes,
            block_size,
            associativity,
            num_sets,
            policy,
            access_latency,
            terminal_miss_penalty: DEFAULT_TERMINAL_MISS_PENALTY,
            address_bound: None,
            sets: vec![VecDeque::new(); num_sets as usize],
            next_level: next_level.map(Box::new),
            rng,
            hits: 0,
            misses: 0,
            accesses: 0,
        })
    }

    /// Sets the penalty this level charges for its own misses when it has no next level
    pub fn with_terminal_miss_penalty(mut self, cycles: u64) -> Self {
        self.terminal_miss_penalty = cycles;
        self
    }

    /// Rejects accesses above `max_address` (inclusive) instead of letting them alias into the
    /// cache
    pub fn with_address_bound(mut self, max_address: u64) -> Result<Self, ConfigError> {
        if max_address == 0 {
            return Err(ConfigError::ZeroAddressBound);
        }
        self.address_bound = Some(max_address);
        Ok(self)
    }

    /// Converts an address into a set index and a tag for this level's geometry
    ///
    /// # Arguments
    ///
    /// * `address`: The byte address
    ///
    /// returns: (u64, u64)
    pub fn address_to_set_and_tag(&self, address: u64) -> (u64, u64) {
        let set = (address / self.block_size) % self.num_sets;
        let tag = address / (self.block_size * self.num_sets);
        (set, tag)
    }

    /// Serves one memory reference, returning the cycles it cost
    ///
    /// A hit costs this level's access latency. A miss costs the access latency plus the miss
    /// penalty, which is whatever the next level charged for the same address, or the terminal
    /// miss penalty at the bottom of the chain
    ///
    /// The address is checked against every level's bound before anything changes, so a rejected
    /// access leaves the whole hierarchy untouched
    pub fn access(&mut self, address: u64) -> Result<u64, AccessError> {
        self.check_address(address)?;
        Ok(self.access_checked(address))
    }

    fn check_address(&self, address: u64) -> Result<(), AccessError> {
        for level in self.levels() {
            if let Some(bound) = level.address_bound {
                if address > bound {
                    return Err(AccessError::AddressOutOfBounds { address, bound });
                }
            }
        }
        Ok(())
    }

    fn access_checked(&mut self, address: u64) -> u64 {
        self.accesses += 1;
        let (set_index, tag) = self.address_to_set_and_tag(address);
        let set = &mut self.sets[set_index as usize];

        if let Some(position) = set.iter().position(|&resident| resident == tag) {
            self.hits += 1;
            if self.policy.promotes_on_hit() {
                if let Some(resident) = set.remove(position) {
                    set.push_back(resident);
                }
            }
            return self.access_latency;
        }

        self.misses += 1;
        let miss_penalty = match self.next_level.as_deref_mut() {
            Some(next) => next.access_checked(address),
            None => self.terminal_miss_penalty,
        };

        let set = &mut self.sets[set_index as usize];
        if set.len() as u64 >= self.associativity {
            let victim = match self.policy {
                ReplacementPolicy::Lru | ReplacementPolicy::Fifo => 0,
                ReplacementPolicy::Random => self.rng.pick(set.len()),
            };
            if let Some(evicted) = set.remove(victim) {
                trace!("set {set_index}: evicted tag {evicted:#x} for {tag:#x} ({})", self.policy);
            }
        }
        set.push_back(tag);
        self.access_latency.saturating_add(miss_penalty)
    }

    /// Zeroes this level's counters. Resident blocks are kept
    pub fn reset_metrics(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.accesses = 0;
    }

    /// Zeroes the counters of this level and every level below it
    pub fn reset_all_metrics(&mut self) {
        self.reset_metrics();
        if let Some(next) = self.next_level.as_deref_mut() {
            next.reset_all_metrics();
        }
    }

    /// Whether the block holding `address` is resident at this level
    pub fn contains(&self, address: u64) -> bool {
        let (set, tag) = self.address_to_set_and_tag(address);
        self.sets[set as usize].contains(&tag)
    }

    /// The tags resident in a set, least recently inserted (or used, under LRU) first
    pub fn resident_tags(&self, set_index: u64) -> Option<Vec<u64>> {
        self.sets.get(set_index as usize).map(|set| set.iter().copied().collect())
    }

    /// Number of blocks currently resident at this level
    pub fn resident_blocks(&self) -> usize {
        self.sets.iter().map(VecDeque::len).sum()
    }

    /// This level followed by every level below it
    pub fn levels(&self) -> impl Iterator<Item = &Cache<R>> {
        iter::successors(Some(self), |level| level.next_level())
    }

    pub fn next_level(&self) -> Option<&Cache<R>> {
        self.next_level.as_deref()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    pub fn access_latency(&self) -> u64 {
        self.access_latency
    }

    pub fn terminal_miss_penalty(&self) -> u64 {
        self.terminal_miss_penalty
    }

    pub fn address_bound(&self) -> Option<u64> {
        self.address_bound
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn associativity(&self) -> u64 {
        self.associativity
    }

    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }
}
