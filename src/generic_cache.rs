//! Generic set-associative cache (`spec.md` §4.2).
//!
//! Grounded in `CacheTemplate.h` (`bmoCacheTemplate<ADDRTYP>`) from the
//! original sources and in the teacher's `gpgpusim::TagArray` sketch: a
//! ways × sets tag/valid file with constant-time 32-bit word access given
//! `(way, set)`, plus a pluggable [`ReplacementPolicy`].

use crate::address::{Address, AddressLayout};
use crate::error::{CacheError, Result};
use crate::replacement::ReplacementPolicy;

/// One `(way, set)` slot's tag-file entry. The fetch cache (`crate::fetch_cache`)
/// extends this with reservation/dirty/mask bookkeeping; the generic cache
/// only needs tag, validity, and the line's bytes.
#[derive(Debug, Clone)]
pub struct Line {
    pub tag: u64,
    pub valid: bool,
    pub data: Vec<u8>,
}

impl Line {
    fn empty(line_size: usize) -> Self {
        Self {
            tag: 0,
            valid: false,
            data: vec![0u8; line_size],
        }
    }
}

/// A ways × sets set-associative cache of fixed-size lines.
#[derive(Debug)]
pub struct GenericCache<A: Address> {
    pub layout: AddressLayout,
    ways: usize,
    /// `lines[way][set]`.
    lines: Vec<Vec<Line>>,
    policy: Option<ReplacementPolicy>,
    _marker: std::marker::PhantomData<A>,
}

impl<A: Address> GenericCache<A> {
    /// # Errors
    /// Returns [`CacheError::Construction`] if `ways == 0`, `lines == 0`, or
    /// `line_size`/`sets` are not powers of two (`spec.md` §7).
    pub fn new(
        ways: usize,
        total_lines: usize,
        line_size: u32,
        policy: Option<ReplacementPolicy>,
    ) -> Result<Self> {
        if ways == 0 {
            return Err(CacheError::Construction("ways must be >= 1".into()));
        }
        if total_lines == 0 {
            return Err(CacheError::Construction(
                "lines must be > 0 (numLines == 0 is a construction error, not a special case)"
                    .into(),
            ));
        }
        if total_lines % ways != 0 {
            return Err(CacheError::Construction(
                "total lines must be evenly divisible by the way count".into(),
            ));
        }
        let sets = u32::try_from(total_lines / ways)
            .map_err(|_| CacheError::Construction("too many sets".into()))?;
        if !sets.is_power_of_two() {
            return Err(CacheError::Construction("sets must be a power of two".into()));
        }

        let layout = AddressLayout::new(line_size, sets);
        let lines = (0..ways)
            .map(|_| (0..sets).map(|_| Line::empty(line_size as usize)).collect())
            .collect();

        Ok(Self {
            layout,
            ways,
            lines,
            policy,
            _marker: std::marker::PhantomData,
        })
    }

    #[must_use]
    pub fn ways(&self) -> usize {
        self.ways
    }

    #[must_use]
    pub fn line(&self, way: usize, set: usize) -> &Line {
        &self.lines[way][set]
    }

    fn line_mut(&mut self, way: usize, set: usize) -> &mut Line {
        &mut self.lines[way][set]
    }

    /// Searches for `address`; returns `(hit, way, set)`. Search is allowed
    /// to stop at the first hit (`spec.md` §3 invariant 3: at most one slot
    /// per set shares a given tag).
    #[must_use]
    pub fn search(&self, address: A) -> (bool, usize, usize) {
        let set = self.layout.set(address);
        let tag = self.layout.tag(address);
        for way in 0..self.ways {
            let line = &self.lines[way][set];
            if line.valid && line.tag == tag {
                return (true, way, set);
            }
        }
        (false, 0, set)
    }

    /// Reads a 32-bit word at `address`. Returns `false` (a miss) without
    /// modifying anything; this is a transient failure, not a panic,
    /// because the generic cache makes no promise about residency.
    pub fn read(&mut self, address: A, data: &mut u32) -> bool {
        let (hit, way, set) = self.search(address);
        if !hit {
            return false;
        }
        let offset = self.layout.offset(address) as usize;
        let bytes = &self.lines[way][set].data[offset..offset + 4];
        *data = u32::from_le_bytes(bytes.try_into().unwrap());
        if let Some(policy) = &mut self.policy {
            policy.access(set, way);
        }
        true
    }

    pub fn write(&mut self, address: A, data: u32) -> bool {
        let (hit, way, set) = self.search(address);
        if !hit {
            return false;
        }
        let offset = self.layout.offset(address) as usize;
        self.lines[way][set].data[offset..offset + 4].copy_from_slice(&data.to_le_bytes());
        if let Some(policy) = &mut self.policy {
            policy.access(set, way);
        }
        true
    }

    /// Chooses a victim way within `address`'s set: an invalid slot if one
    /// exists, otherwise whatever the replacement policy picks.
    ///
    /// # Panics
    /// Panics if every slot in the set is valid and no policy was attached
    /// (`spec.md` §4.2: "fails loudly if no policy is attached and no
    /// invalid slot exists").
    #[must_use]
    pub fn select_victim(&self, address: A) -> usize {
        let set = self.layout.set(address);
        if let Some(way) = (0..self.ways).find(|&w| !self.lines[w][set].valid) {
            return way;
        }
        self.policy
            .as_ref()
            .map(|p| p.victim(set))
            .expect("no replacement policy attached and no invalid slot in set")
    }

    /// Installs `address`'s tag at `way` (tag-only replace: data is stale
    /// until a subsequent `fill`).
    ///
    /// # Errors
    /// Returns [`CacheError::Construction`] if `way` is out of range.
    pub fn replace(&mut self, address: A, way: usize) -> Result<()> {
        let set = self.layout.set(address);
        if way >= self.ways {
            return Err(CacheError::Construction(format!(
                "way {way} out of range (ways = {})",
                self.ways
            )));
        }
        let tag = self.layout.tag(address);
        let line = self.line_mut(way, set);
        line.tag = tag;
        line.valid = true;
        if let Some(policy) = &mut self.policy {
            policy.access(set, way);
        }
        Ok(())
    }

    /// Installs `address`'s tag and data at `way`.
    ///
    /// # Errors
    /// Returns [`CacheError::Construction`] if `way` is out of range.
    pub fn replace_with_data(&mut self, address: A, way: usize, data: &[u8]) -> Result<()> {
        self.replace(address, way)?;
        let set = self.layout.set(address);
        let line = self.line_mut(way, set);
        debug_assert_eq!(data.len(), line.data.len());
        line.data.copy_from_slice(data);
        Ok(())
    }

    /// Copies `data` into an already-resident line.
    ///
    /// # Panics
    /// Panics if `address` is not resident (`spec.md` §4.2: "calling fill
    /// on a non-resident line is fatal").
    pub fn fill(&mut self, address: A, data: &[u8]) {
        let (hit, way, set) = self.search(address);
        assert!(hit, "fill called on a non-resident line");
        let line = self.line_mut(way, set);
        debug_assert_eq!(data.len(), line.data.len());
        line.data.copy_from_slice(data);
    }

    /// Clears `valid` for `address` if resident; a no-op otherwise.
    pub fn invalidate(&mut self, address: A) {
        let (hit, way, set) = self.search(address);
        if hit {
            self.lines[way][set].valid = false;
        }
    }

    /// Clears `valid` on every slot.
    pub fn reset(&mut self) {
        for way in &mut self.lines {
            for line in way.iter_mut() {
                line.valid = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replacement::ReplacementPolicy;

    fn cache() -> GenericCache<u64> {
        GenericCache::new(4, 256, 64, Some(ReplacementPolicy::lru(4, 64))).unwrap()
    }

    #[test]
    fn rejects_zero_lines() {
        let err = GenericCache::<u64>::new(4, 0, 64, None).unwrap_err();
        assert!(matches!(err, CacheError::Construction(_)));
    }

    #[test]
    fn replace_then_read_write_round_trips() {
        let mut cache = cache();
        let addr = 0x1000u64;
        let way = cache.select_victim(addr);
        cache.replace(addr, way).unwrap();
        cache.fill(addr, &[0u8; 64]);
        assert!(cache.write(addr, 0xdead_beef));
        let mut out = 0u32;
        assert!(cache.read(addr, &mut out));
        assert_eq!(out, 0xdead_beef);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let mut cache = cache();
        let addr = 0x2000u64;
        let way = cache.select_victim(addr);
        cache.replace(addr, way).unwrap();
        cache.invalidate(addr);
        cache.invalidate(addr);
        let (hit, ..) = cache.search(addr);
        assert!(!hit);
    }

    #[test]
    #[should_panic(expected = "non-resident")]
    fn fill_on_non_resident_line_panics() {
        let mut cache = cache();
        cache.fill(0x3000u64, &[0u8; 64]);
    }
}
