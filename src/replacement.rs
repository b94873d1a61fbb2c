//! Pluggable replacement policies (`spec.md` §4.1).
//!
//! Grounded in `CacheReplacement.h`/`.cpp` from the original sources: three
//! concrete policies (FIFO, LRU, Pseudo-LRU) sharing one `access`/`victim`
//! shape. Design Notes §9 asks for a tagged variant rather than a trait
//! object so the fetch cache's fast path dispatches once per access instead
//! of through a vtable; `ReplacementPolicy` below is that enum.

/// Per-set replacement policy state for a cache with a fixed way count.
#[derive(Debug, Clone)]
pub enum ReplacementPolicy {
    Fifo(Fifo),
    Lru(Lru),
    PseudoLru(PseudoLru),
}

impl ReplacementPolicy {
    #[must_use]
    pub fn fifo(ways: usize, sets: usize) -> Self {
        Self::Fifo(Fifo::new(ways, sets))
    }

    #[must_use]
    pub fn lru(ways: usize, sets: usize) -> Self {
        Self::Lru(Lru::new(ways, sets))
    }

    /// # Errors
    /// Returns an error message if `ways` is not one of 2, 4, 8, 16, 32.
    pub fn pseudo_lru(ways: usize, sets: usize) -> Result<Self, String> {
        PseudoLru::new(ways, sets).map(Self::PseudoLru)
    }

    /// Updates the policy's state after a way in `set` has been accessed.
    pub fn access(&mut self, set: usize, way: usize) {
        match self {
            Self::Fifo(p) => p.access(set, way),
            Self::Lru(p) => p.access(set, way),
            Self::PseudoLru(p) => p.access(set, way),
        }
    }

    /// Selects (without mutating state) the next way that should be
    /// replaced within `set`.
    #[must_use]
    pub fn victim(&self, set: usize) -> usize {
        match self {
            Self::Fifo(p) => p.victim(set),
            Self::Lru(p) => p.victim(set),
            Self::PseudoLru(p) => p.victim(set),
        }
    }
}

/// FIFO: each set remembers only the next way to evict; `access` is a
/// no-op because FIFO does not take recency into account.
#[derive(Debug, Clone)]
pub struct Fifo {
    ways: usize,
    next: Vec<usize>,
}

impl Fifo {
    #[must_use]
    pub fn new(ways: usize, sets: usize) -> Self {
        assert!(ways > 0 && sets > 0);
        Self {
            ways,
            next: vec![0; sets],
        }
    }

    pub fn access(&mut self, _set: usize, _way: usize) {}

    #[must_use]
    pub fn victim(&self, set: usize) -> usize {
        self.next[set]
    }

    /// Advances the FIFO pointer for `set`. Callers invoke this once the
    /// chosen victim has actually been replaced.
    pub fn advance(&mut self, set: usize) {
        self.next[set] = (self.next[set] + 1) % self.ways;
    }
}

/// LRU: each set keeps a full access-order list, head = most recently used.
#[derive(Debug, Clone)]
pub struct Lru {
    ways: usize,
    order: Vec<Vec<usize>>,
}

impl Lru {
    #[must_use]
    pub fn new(ways: usize, sets: usize) -> Self {
        assert!(ways > 0 && sets > 0);
        Self {
            ways,
            order: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }

    pub fn access(&mut self, set: usize, way: usize) {
        let order = &mut self.order[set];
        if let Some(pos) = order.iter().position(|&w| w == way) {
            if pos != 0 {
                order.remove(pos);
                order.insert(0, way);
            }
        }
    }

    #[must_use]
    pub fn victim(&self, set: usize) -> usize {
        self.order[set][self.ways - 1]
    }
}

/// Pseudo-LRU: a binary tree of one-bit nodes per set, each bit pointing at
/// the subtree to evict next (`spec.md` §4.1). Ways must be a power of two
/// in `{2,4,8,16,32}`.
#[derive(Debug, Clone)]
pub struct PseudoLru {
    ways: usize,
    depth: u32,
    /// One tree of `ways - 1` bits per set, 1-indexed (`bits[0]` unused).
    bits: Vec<Vec<bool>>,
}

impl PseudoLru {
    /// # Errors
    /// Returns an error message if `ways` is not a supported power of two.
    pub fn new(ways: usize, sets: usize) -> Result<Self, String> {
        if !matches!(ways, 2 | 4 | 8 | 16 | 32) {
            return Err(format!(
                "pseudo-LRU requires ways in {{2,4,8,16,32}}, got {ways}"
            ));
        }
        assert!(sets > 0);
        Ok(Self {
            ways,
            depth: ways.trailing_zeros(),
            bits: (0..sets).map(|_| vec![false; ways]).collect(),
        })
    }

    pub fn access(&mut self, set: usize, way: usize) {
        let tree = &mut self.bits[set];
        let mut index = way + self.ways;
        while index > 1 {
            let parent = index / 2;
            tree[parent] = index % 2 == 0;
            index = parent;
        }
    }

    #[must_use]
    pub fn victim(&self, set: usize) -> usize {
        let tree = &self.bits[set];
        let mut node = 1;
        for _ in 0..self.depth {
            node = 2 * node + usize::from(tree[node]);
        }
        node - self.ways
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_fairness_after_four_way_sequence() {
        // spec.md §8: ways=4, access order [0,1,2,3,0] => victim is 1.
        let mut lru = Lru::new(4, 1);
        for way in [0, 1, 2, 3, 0] {
            lru.access(0, way);
        }
        assert_eq!(lru.victim(0), 1);
    }

    #[test]
    fn fifo_cycles_through_ways() {
        let mut fifo = Fifo::new(4, 1);
        assert_eq!(fifo.victim(0), 0);
        fifo.advance(0);
        assert_eq!(fifo.victim(0), 1);
        fifo.advance(0);
        fifo.advance(0);
        fifo.advance(0);
        assert_eq!(fifo.victim(0), 0);
    }

    #[test]
    fn pseudo_lru_rejects_unsupported_way_counts() {
        assert!(PseudoLru::new(3, 1).is_err());
        assert!(PseudoLru::new(8, 1).is_ok());
    }

    #[test]
    fn pseudo_lru_never_picks_the_most_recently_accessed_of_two() {
        let mut plru = PseudoLru::new(2, 1).unwrap();
        plru.access(0, 0);
        assert_eq!(plru.victim(0), 1);
        plru.access(0, 1);
        assert_eq!(plru.victim(0), 0);
    }

    #[test]
    fn pseudo_lru_eight_way_converges() {
        let mut plru = PseudoLru::new(8, 1).unwrap();
        for way in 0..8 {
            plru.access(0, way);
        }
        // the last-accessed way (7) must not be picked immediately after.
        assert_ne!(plru.victim(0), 7);
    }
}
