//! Fetch cache: reserve/fetch/read-or-write/unreserve protocol (`spec.md` §4.3).
//!
//! Grounded in `cmFetchCache64.h`/`.cpp`. Unlike [`crate::generic_cache::GenericCache`]
//! a fetch cache line carries its own reservation, dirty and write-mask state
//! and victim selection is entirely its own algorithm (a ring of the last
//! `MAX_LRU` accessed ways plus a rotating search start pointer), so this
//! does not build on top of the generic cache at all.

use std::collections::VecDeque;

use bitvec::vec::BitVec;
use log::{debug, trace, warn};

use crate::address::{Address, AddressLayout};
use crate::error::{CacheError, Result};
use crate::stats::{StatKey, StatSink};

/// Last N accesses remembered per set when picking a victim (`spec.md` §4.3).
const MAX_LRU: usize = 4;

/// One `(way, set)` slot's full fetch-cache state.
#[derive(Debug, Clone)]
struct FetchLine {
    tag: u64,
    valid: bool,
    reserve: u32,
    dirty: bool,
    masked: bool,
    /// Set while a fill for this line is outstanding; reads/writes fail
    /// rather than block while this is true (`spec.md` §4.3 state machine).
    replacing: bool,
    write_mask: BitVec,
    data: Vec<u8>,
}

impl FetchLine {
    fn empty(line_size: usize) -> Self {
        Self {
            tag: 0,
            valid: false,
            reserve: 0,
            dirty: false,
            masked: false,
            replacing: false,
            write_mask: BitVec::repeat(false, line_size),
            data: vec![0u8; line_size],
        }
    }

    /// A masked line is only actually readable once every byte in it has
    /// been written (`spec.md` §3 invariant 4).
    fn fully_written(&self) -> bool {
        self.write_mask.all()
    }
}

/// A single outstanding memory request queued by this cache
/// (`spec.md` §3, "Request entry").
#[derive(Debug, Clone)]
pub struct RequestEntry {
    pub in_address: u64,
    pub out_address: u64,
    pub set: usize,
    pub way: usize,
    pub spill: bool,
    pub fill: bool,
    pub masked: bool,
    pub source: u64,
}

impl RequestEntry {
    /// Whether this entry still represents live work (`spec.md` §3: "a
    /// request entry is live while spill or fill is true").
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.spill || self.fill
    }
}

/// Outcome of a successful [`FetchCache::fetch`] or [`FetchCache::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub way: usize,
    pub set: usize,
    pub miss: bool,
    /// `true` once the line's data is actually available (no fill pending).
    pub ready: bool,
}

/// Why a [`FetchCache::fetch`] or [`FetchCache::allocate`] call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// Every way in the set is reserved by somebody else.
    AllWaysReserved,
    /// The request queue has no free entry to record the fill/spill with.
    RequestQueueFull,
    /// The call asked to fail rather than allocate on a miss, and missed.
    MissNotAllowed,
}

/// A ways × sets fetch cache (`spec.md` §4.3).
#[derive(Debug)]
pub struct FetchCache<A: Address> {
    layout: AddressLayout,
    ways: usize,
    /// `lines[way][set]`.
    lines: Vec<Vec<FetchLine>>,
    /// Ring of the last `max_lru` ways touched per set; `victim_ring[set][0]`
    /// is the oldest remembered access.
    victim_ring: Vec<Vec<usize>>,
    max_lru: usize,
    /// Rotates across every `nextVictim` call, independent of set
    /// (`cmFetchCache64.cpp::nextVictim`).
    first_way: usize,

    request_queue: Vec<RequestEntry>,
    free_requests: VecDeque<usize>,
    active_requests: VecDeque<usize>,
    /// Cursor into `lines` used by [`FetchCache::flush`] so it can be
    /// called repeatedly across cycles without rescanning from the start.
    flush_way: usize,
    flush_set: usize,

    _marker: std::marker::PhantomData<A>,
}

impl<A: Address> FetchCache<A> {
    /// # Errors
    /// Returns [`CacheError::Construction`] if `ways == 0`, `lines == 0`,
    /// `request_queue_size == 0`, or `line_size`/sets are not powers of two.
    pub fn new(ways: usize, total_lines: usize, line_size: u32, request_queue_size: usize) -> Result<Self> {
        if ways == 0 {
            return Err(CacheError::Construction("ways must be >= 1".into()));
        }
        if total_lines == 0 {
            return Err(CacheError::Construction(
                "lines must be > 0 (numLines == 0 is a construction error)".into(),
            ));
        }
        if total_lines % ways != 0 {
            return Err(CacheError::Construction(
                "total lines must be evenly divisible by the way count".into(),
            ));
        }
        if request_queue_size == 0 {
            return Err(CacheError::Construction("request queue size must be >= 1".into()));
        }
        let sets = u32::try_from(total_lines / ways)
            .map_err(|_| CacheError::Construction("too many sets".into()))?;
        if !sets.is_power_of_two() {
            return Err(CacheError::Construction("sets must be a power of two".into()));
        }

        let layout = AddressLayout::new(line_size, sets);
        let sets = sets as usize;
        let max_lru = MAX_LRU.min(ways);
        let lines = (0..ways)
            .map(|_| (0..sets).map(|_| FetchLine::empty(line_size as usize)).collect())
            .collect();

        let mut cache = Self {
            layout,
            ways,
            lines,
            victim_ring: vec![Vec::new(); sets],
            max_lru,
            first_way: 0,
            request_queue: (0..request_queue_size)
                .map(|_| RequestEntry {
                    in_address: 0,
                    out_address: 0,
                    set: 0,
                    way: 0,
                    spill: false,
                    fill: false,
                    masked: false,
                    source: 0,
                })
                .collect(),
            free_requests: VecDeque::new(),
            active_requests: VecDeque::new(),
            flush_way: 0,
            flush_set: 0,
            _marker: std::marker::PhantomData,
        };
        cache.reset();
        Ok(cache)
    }

    #[must_use]
    pub fn ways(&self) -> usize {
        self.ways
    }

    #[must_use]
    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    fn search(&self, address: A) -> (bool, usize, usize) {
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

    /// Updates the victim ring for `set` with a fresh access at `way`
    /// (`cmFetchCache64.cpp::access`). The ring is a recency list with the
    /// oldest remembered access at the front.
    fn touch(&mut self, set: usize, way: usize) {
        let ring = &mut self.victim_ring[set];
        if let Some(pos) = ring.iter().position(|&w| w == way) {
            ring.remove(pos);
        } else if ring.len() >= self.max_lru {
            ring.remove(0);
        }
        ring.push(way);
    }

    /// Picks the next way to replace in `set` (`cmFetchCache64.cpp::nextVictim`).
    ///
    /// Prefers a way outside the recency ring that is unreserved; failing
    /// that, the oldest unreserved way remembered by the ring; failing that,
    /// way 0 (every way is reserved, the caller must recheck before using it).
    fn next_victim(&mut self, set: usize) -> usize {
        self.first_way = (self.first_way + 1) % self.ways;
        let ring = &self.victim_ring[set];

        for offset in 0..self.ways {
            let way = (self.first_way + offset) % self.ways;
            if self.lines[way][set].reserve == 0 && !ring.contains(&way) {
                return way;
            }
        }
        for &way in ring {
            if self.lines[way][set].reserve == 0 {
                return way;
            }
        }
        0
    }

    fn enqueue(
        &mut self,
        way: usize,
        set: usize,
        in_address: u64,
        out_address: u64,
        spill: bool,
        fill: bool,
        masked: bool,
        source: u64,
    ) -> bool {
        let Some(slot) = self.free_requests.pop_front() else {
            return false;
        };
        self.request_queue[slot] = RequestEntry {
            in_address,
            out_address,
            set,
            way,
            spill,
            fill,
            masked,
            source,
        };
        self.active_requests.push_back(slot);
        true
    }

    /// Reserve-and-fetch-on-miss. Merges the original's three C overloads
    /// (plain, probe-with-ready-flag, fail-rather-than-allocate) into one
    /// call: pass `probe_only = true` to get the "don't allocate on miss"
    /// behavior.
    ///
    /// # Errors
    /// Returns [`FetchFailure`] describing why the reservation could not be
    /// made; this is a transient condition, not a caller bug.
    pub fn fetch(&mut self, address: A, source: u64, probe_only: bool, stats: &mut dyn StatSink) -> std::result::Result<FetchOutcome, FetchFailure> {
        let (hit, way, set) = self.search(address);
        let hit = hit && (!self.lines[way][set].masked || self.lines[way][set].fully_written());

        if hit {
            self.lines[way][set].reserve += 1;
            stats.increment(StatKey::HitsFetch, 1);
            trace!("fetch hit way={way} set={set}");
            return Ok(FetchOutcome {
                way,
                set,
                miss: false,
                ready: !self.lines[way][set].replacing,
            });
        }

        stats.increment(StatKey::MissesFetch, 1);
        if probe_only {
            stats.increment(StatKey::MissFailFetch, 1);
            stats.increment(StatKey::MissFailMissFetch, 1);
            return Err(FetchFailure::MissNotAllowed);
        }

        let way = self.next_victim(set);
        if self.lines[way][set].reserve != 0 {
            stats.increment(StatKey::MissFailFetch, 1);
            stats.increment(StatKey::MissFailReserveFetch, 1);
            debug!("fetch miss: all ways reserved in set {set}");
            return Err(FetchFailure::AllWaysReserved);
        }

        let old_line = &self.lines[way][set];
        let out_address: A = self.layout.line_address(old_line.tag, set);
        let spill = old_line.valid && old_line.dirty;
        let in_address = self.layout.line_address::<A>(self.layout.tag(address), set);

        let queued = self.enqueue(
            way,
            set,
            in_address.as_u64(),
            out_address.as_u64(),
            spill,
            true,
            old_line.masked,
            source,
        );
        if !queued {
            stats.increment(StatKey::MissFailFetch, 1);
            stats.increment(StatKey::MissFailReqQueueFetch, 1);
            debug!("fetch miss: request queue full");
            return Err(FetchFailure::RequestQueueFull);
        }

        let line = &mut self.lines[way][set];
        line.tag = self.layout.tag(address);
        line.reserve += 1;
        line.replacing = true;
        line.valid = true;
        line.masked = false;
        line.dirty = false;
        stats.increment(StatKey::MissOkFetch, 1);
        debug!("fetch miss ok: way={way} set={set} spill={spill}");
        Ok(FetchOutcome { way, set, miss: true, ready: false })
    }

    /// Write-buffer mode reservation: like [`FetchCache::fetch`] but never
    /// schedules a fill, only (when necessary) a spill of the victim it
    /// displaces (`cmFetchCache64.cpp::allocate`).
    ///
    /// # Errors
    /// Returns [`FetchFailure::AllWaysReserved`] or
    /// [`FetchFailure::RequestQueueFull`]; `MissNotAllowed` never applies.
    pub fn allocate(&mut self, address: A, source: u64, stats: &mut dyn StatSink) -> std::result::Result<FetchOutcome, FetchFailure> {
        let (hit, way, set) = self.search(address);
        if hit {
            self.lines[way][set].reserve += 1;
            stats.increment(StatKey::HitsAlloc, 1);
            return Ok(FetchOutcome { way, set, miss: false, ready: true });
        }

        stats.increment(StatKey::MissesAlloc, 1);
        let way = self.next_victim(set);
        if self.lines[way][set].reserve != 0 {
            stats.increment(StatKey::MissFailAlloc, 1);
            stats.increment(StatKey::MissFailReserveAlloc, 1);
            return Err(FetchFailure::AllWaysReserved);
        }

        let old_line = &self.lines[way][set];
        if old_line.valid && old_line.dirty {
            let out_address: A = self.layout.line_address(old_line.tag, set);
            let queued = self.enqueue(way, set, 0, out_address.as_u64(), true, false, old_line.masked, source);
            if !queued {
                stats.increment(StatKey::MissFailAlloc, 1);
                stats.increment(StatKey::MissFailReqQueueAlloc, 1);
                return Err(FetchFailure::RequestQueueFull);
            }
            let line = &mut self.lines[way][set];
            line.tag = self.layout.tag(address);
            line.replacing = true;
            line.reserve += 1;
            line.valid = true;
            line.masked = true;
            line.dirty = false;
        } else {
            let line = &mut self.lines[way][set];
            line.tag = self.layout.tag(address);
            line.write_mask.fill(false);
            line.reserve += 1;
            line.valid = true;
            line.masked = true;
            line.dirty = false;
        }
        stats.increment(StatKey::MissOkAlloc, 1);
        Ok(FetchOutcome { way, set, miss: true, ready: !self.lines[way][set].replacing })
    }

    fn bounds_check(&self, address: A, way: usize, set: usize, size: u32) {
        let offset = self.layout.offset(address) & !0x3;
        assert!(size % 4 == 0, "size must be a multiple of 4 bytes");
        assert!(size <= self.layout.line_size, "trying to access more than a cache line");
        assert!(
            offset + size <= self.layout.line_size,
            "trying to access beyond the cache line"
        );
        assert_eq!(self.lines[way][set].tag, self.layout.tag(address), "address was not previously fetched");
    }

    /// # Panics
    /// Panics on any precondition violation (`spec.md` §4.3: unfetched
    /// address, misaligned or oversized access).
    pub fn read(&mut self, address: A, way: usize, set: usize, size: u32, data: &mut [u8], stats: &mut dyn StatSink) -> bool {
        self.bounds_check(address, way, set, size);
        if self.lines[way][set].replacing {
            stats.increment(StatKey::ReadsFail, 1);
            return false;
        }
        let offset = (self.layout.offset(address) & !0x3) as usize;
        data[..size as usize].copy_from_slice(&self.lines[way][set].data[offset..offset + size as usize]);
        self.touch(set, way);
        stats.increment(StatKey::ReadsOk, 1);
        stats.increment(StatKey::ReadBytes, u64::from(size));
        true
    }

    /// # Panics
    /// Panics on any precondition violation, mirroring [`FetchCache::read`].
    pub fn write(&mut self, address: A, way: usize, set: usize, size: u32, data: &[u8], stats: &mut dyn StatSink) -> bool {
        self.bounds_check(address, way, set, size);
        if self.lines[way][set].replacing {
            stats.increment(StatKey::WritesFail, 1);
            return false;
        }
        let offset = (self.layout.offset(address) & !0x3) as usize;
        let line = &mut self.lines[way][set];
        line.data[offset..offset + size as usize].copy_from_slice(&data[..size as usize]);
        line.dirty = true;
        if line.reserve > 0 {
            line.reserve -= 1;
        }
        self.touch(set, way);
        stats.increment(StatKey::WritesOk, 1);
        stats.increment(StatKey::WriteBytes, u64::from(size));
        true
    }

    /// Masked write variant used by write-buffer (`allocate`) mode: only
    /// bytes with `mask[i] == true` are written, and those positions are
    /// recorded in the line's own write mask.
    pub fn write_masked(
        &mut self,
        address: A,
        way: usize,
        set: usize,
        size: u32,
        data: &[u8],
        mask: &[bool],
        stats: &mut dyn StatSink,
    ) -> bool {
        assert!(size <= self.layout.line_size, "trying to write more than a cache line");
        assert_eq!(self.lines[way][set].tag, self.layout.tag(address), "address was not previously fetched");
        if self.lines[way][set].replacing {
            stats.increment(StatKey::WritesFail, 1);
            return false;
        }
        let offset = self.layout.offset(address) as usize;
        let line = &mut self.lines[way][set];
        let mut any_write = false;
        for i in 0..size as usize {
            if mask[i] {
                line.data[offset + i] = data[i];
                line.write_mask.set(offset + i, true);
                any_write = true;
            }
        }
        line.dirty = line.dirty || any_write;
        if line.reserve > 0 {
            line.reserve -= 1;
        }
        self.touch(set, way);
        stats.increment(StatKey::WritesOk, 1);
        stats.increment(StatKey::WriteBytes, u64::from(size));
        true
    }

    /// Reads an entire line's bytes, bypassing the reservation/replacing
    /// checks (`cmFetchCache64.cpp::readLine`): used by memory controller
    /// spill handling, not by ordinary clients.
    pub fn read_line(&self, way: usize, set: usize) -> &[u8] {
        &self.lines[way][set].data
    }

    /// Installs an entire line's bytes and clears its dirty bit
    /// (`cmFetchCache64.cpp::writeLine`), returning the line address it now
    /// backs.
    pub fn write_line(&mut self, way: usize, set: usize, data: &[u8], stats: &mut dyn StatSink) -> A {
        let line = &mut self.lines[way][set];
        line.data.copy_from_slice(data);
        line.dirty = false;
        stats.increment(StatKey::WriteBytes, u64::from(self.layout.line_size));
        self.layout.line_address(line.tag, set)
    }

    #[must_use]
    pub fn read_mask(&self, way: usize, set: usize) -> &bitvec::slice::BitSlice {
        &self.lines[way][set].write_mask
    }

    pub fn reset_mask(&mut self, way: usize, set: usize) {
        self.lines[way][set].write_mask.fill(false);
    }

    /// Liberates one reservation on `(way, set)`; a no-op if nothing is
    /// reserved there, since double-unreserve is a transient bookkeeping
    /// slip rather than a caller bug (`spec.md` §4.3).
    pub fn unreserve(&mut self, way: usize, set: usize, stats: &mut dyn StatSink) {
        if self.lines[way][set].reserve > 0 {
            self.lines[way][set].reserve -= 1;
        }
        stats.increment(StatKey::Unreserves, 1);
    }

    /// Enqueues a spill for every still-valid line, one request-queue slot
    /// at a time, so it can be called once per cycle until it returns
    /// `true` (the queue was entirely empty when this call began, meaning
    /// every line has now been flushed).
    pub fn flush(&mut self) -> bool {
        while self.flush_way < self.ways {
            while self.flush_set < self.lines[self.flush_way].len() {
                let set = self.flush_set;
                let way = self.flush_way;
                self.flush_set += 1;
                if !self.lines[way][set].valid {
                    continue;
                }
                let out_address: A = self.layout.line_address(self.lines[way][set].tag, set);
                let masked = self.lines[way][set].masked;
                if !self.enqueue(way, set, 0, out_address.as_u64(), true, false, masked, 0) {
                    self.flush_set -= 1;
                    return false;
                }
                self.lines[way][set].valid = false;
            }
            self.flush_set = 0;
            self.flush_way += 1;
        }
        self.flush_way = 0;
        self.free_requests.len() == self.request_queue.len()
    }

    /// Pops the next queued memory request, if any (`cmFetchCache64.cpp::getRequest`).
    #[must_use]
    pub fn get_request(&mut self) -> Option<(usize, RequestEntry)> {
        let slot = self.active_requests.pop_front()?;
        Some((slot, self.request_queue[slot].clone()))
    }

    /// Marks the spill and/or fill side of request `id` as complete; once
    /// both are clear the line is no longer `replacing` and the slot
    /// returns to the free list (`cmFetchCache64.cpp::freeRequest`).
    pub fn free_request(&mut self, id: usize, free_spill: bool, free_fill: bool) {
        let entry = &mut self.request_queue[id];
        entry.spill = entry.spill && !free_spill;
        entry.fill = entry.fill && !free_fill;
        if !entry.spill && !entry.fill {
            let (way, set) = (entry.way, entry.set);
            self.lines[way][set].replacing = false;
            self.lines[way][set].write_mask.fill(false);
            self.free_requests.push_back(id);
        }
    }

    /// Clears every line, victim ring, and the request queue to the state
    /// a freshly constructed cache would have.
    pub fn reset(&mut self) {
        for way in &mut self.lines {
            for line in way.iter_mut() {
                *line = FetchLine::empty(line.data.len());
            }
        }
        for ring in &mut self.victim_ring {
            ring.clear();
        }
        self.first_way = 0;
        self.flush_way = 0;
        self.flush_set = 0;
        self.active_requests.clear();
        self.free_requests = (0..self.request_queue.len()).collect();
        for entry in self.request_queue.iter_mut() {
            *entry = RequestEntry {
                in_address: 0,
                out_address: 0,
                set: 0,
                way: 0,
                spill: false,
                fill: false,
                masked: false,
                source: 0,
            };
        }
        warn!("fetch cache reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{CountingSink, NullSink};

    fn cache() -> FetchCache<u64> {
        FetchCache::new(4, 256, 64, 4).unwrap()
    }

    #[test]
    fn cold_miss_then_fetch_then_read() {
        let mut cache = cache();
        let mut sink = CountingSink::new("");
        let addr = 0x1000u64;

        let outcome = cache.fetch(addr, 0, false, &mut sink).unwrap();
        assert!(outcome.miss);
        assert!(!outcome.ready);
        assert_eq!(sink.get(StatKey::MissesFetch), 1);
        assert_eq!(sink.get(StatKey::MissOkFetch), 1);

        let (id, request) = cache.get_request().unwrap();
        assert!(request.fill);
        assert!(!request.spill);
        cache.free_request(id, false, true);

        let mut data = vec![0u8; 4];
        assert!(cache.read(addr, outcome.way, outcome.set, 4, &mut data, &mut sink));
        assert_eq!(sink.get(StatKey::ReadsOk), 1);
    }

    #[test]
    fn hit_increases_reserve_count_without_enqueueing() {
        let mut cache = cache();
        let mut sink = NullSink;
        let addr = 0x2000u64;
        let first = cache.fetch(addr, 0, false, &mut sink).unwrap();
        let (id, _) = cache.get_request().unwrap();
        cache.free_request(id, false, true);

        let second = cache.fetch(addr, 0, false, &mut sink).unwrap();
        assert!(!second.miss);
        assert_eq!(second.way, first.way);
        assert!(cache.get_request().is_none());
    }

    #[test]
    fn dirty_eviction_enqueues_spill_then_fill() {
        let mut cache = cache();
        let mut sink = NullSink;

        let line_size = cache.layout.line_size;
        for way in 0..4 {
            let addr = (way as u64) << cache.layout.tag_shift;
            let outcome = cache.fetch(addr, 0, false, &mut sink).unwrap();
            let (id, _) = cache.get_request().unwrap();
            cache.free_request(id, false, true);
            let data = vec![0xABu8; line_size as usize];
            assert!(cache.write(addr, outcome.way, outcome.set, line_size, &data, &mut sink));
            cache.unreserve(outcome.way, outcome.set, &mut sink);
        }

        let evicting_addr = 4u64 << cache.layout.tag_shift;
        let outcome = cache.fetch(evicting_addr, 0, false, &mut sink).unwrap();
        assert!(outcome.miss);
        let (_, request) = cache.get_request().unwrap();
        assert!(request.spill);
        assert!(request.fill);
    }

    #[test]
    fn all_reserved_fails_with_reserve_failure() {
        let mut cache = FetchCache::<u64>::new(2, 128, 64, 4).unwrap();
        let mut sink = NullSink;
        for way in 0..2 {
            let addr = (way as u64) << cache.layout.tag_shift;
            cache.fetch(addr, 0, false, &mut sink).unwrap();
        }
        let addr = 2u64 << cache.layout.tag_shift;
        let err = cache.fetch(addr, 0, false, &mut sink).unwrap_err();
        assert_eq!(err, FetchFailure::AllWaysReserved);
    }

    #[test]
    fn probe_only_fails_rather_than_allocating_on_miss() {
        let mut cache = cache();
        let mut sink = CountingSink::new("");
        let err = cache.fetch(0x5000, 0, true, &mut sink).unwrap_err();
        assert_eq!(err, FetchFailure::MissNotAllowed);
        assert_eq!(sink.get(StatKey::MissFailMissFetch), 1);
        assert!(cache.get_request().is_none());
    }

    #[test]
    fn allocate_never_reports_miss_not_allowed() {
        let mut cache = cache();
        let mut sink = NullSink;
        let outcome = cache.allocate(0x6000, 0, &mut sink).unwrap();
        assert!(outcome.miss);
        assert!(outcome.ready);
    }

    #[test]
    fn reset_clears_reservations_and_queue() {
        let mut cache = cache();
        let mut sink = NullSink;
        cache.fetch(0x7000, 0, false, &mut sink).unwrap();
        assert!(cache.get_request().is_some());
        cache.reset();
        assert!(cache.get_request().is_none());
        let outcome = cache.fetch(0x7000, 0, false, &mut sink).unwrap();
        assert!(outcome.miss);
    }
}
