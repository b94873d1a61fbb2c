//! Texture cache: banked access limits, miss quota, decompression pipeline
//! (`spec.md` §4.4).
//!
//! Grounded in `cmTextureCache.h`/`.cpp` and `cmTextureCacheGen.h`. Wraps a
//! [`FetchCache`] rather than re-deriving its reserve/replace bookkeeping,
//! and adds everything the fetch cache doesn't model: per-cycle bank/port
//! contention, a miss quota, a decompression pipeline with a fixed latency,
//! and the ticket pool that tracks outstanding reads to memory.

use std::collections::VecDeque;
use std::fmt;

use log::{debug, trace};

use crate::address::Address;
use crate::error::{CacheError, Result};
use crate::fetch_cache::{FetchCache, FetchFailure, FetchOutcome};
use crate::memory::{Command, MemState, SourceKind, Transaction, MAX_MEMORY_TICKETS};
use crate::stats::{StatKey, StatSink};
use crate::ticket_pool::TicketPool;

/// Sentinel address meaning "the permanently-resident black texel": `fetch`
/// always succeeds immediately, `read` yields zeroed data, and `unreserve`
/// on this address (with a matching sentinel way/set pair) is a no-op
/// (`spec.md` §6).
pub const BLACK_TEXEL_ADDRESS: u64 = 0x8000_0000;
const BLACK_TEXEL_WAY: usize = usize::MAX;
const BLACK_TEXEL_SET: usize = usize::MAX;

/// Texture block compression modes and the shift used to compute a
/// compressed line's footprint in memory: `footprint = line_size >> shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    None,
    Dxt1Rgb,
    Dxt1Rgba,
    Dxt3Rgba,
    Dxt5Rgba,
    Latc1,
    Latc1Signed,
    Latc2,
    Latc2Signed,
}

impl CompressionMode {
    #[must_use]
    pub fn footprint_shift(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Dxt1Rgb | Self::Dxt1Rgba => 3,
            Self::Dxt3Rgba | Self::Dxt5Rgba => 2,
            Self::Latc1 | Self::Latc1Signed | Self::Latc2 | Self::Latc2Signed => 1,
        }
    }

    #[must_use]
    pub fn compressed_footprint(self, line_size: u32) -> u32 {
        line_size >> self.footprint_shift()
    }
}

/// The texture-space address tag selected by the high bits of a 64-bit
/// texture address; converting a texture-space address to a GPU memory
/// address is a right shift by [`TextureAddressSpace::shift`]
/// (`spec.md` §6, "Texture address-space tags").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureAddressSpace {
    Uncompressed,
    CompressedDxt1Rgb,
    CompressedDxt1Rgba,
    CompressedDxt3Rgba,
    CompressedDxt5Rgba,
    CompressedLatc1,
    CompressedLatc2,
    CompressedLatc1Signed,
    CompressedLatc2Signed,
}

impl TextureAddressSpace {
    /// Bit position of the space tag within a 64-bit texture address: the
    /// low `TAG_SHIFT` bits are the in-space offset, the rest select the
    /// space (`spec.md` §6, "the high bits of a 64-bit address select...").
    const TAG_SHIFT: u32 = 32;

    fn from_tag(tag: u64) -> Self {
        match tag {
            1 => Self::CompressedDxt1Rgb,
            2 => Self::CompressedDxt1Rgba,
            3 => Self::CompressedDxt3Rgba,
            4 => Self::CompressedDxt5Rgba,
            5 => Self::CompressedLatc1,
            6 => Self::CompressedLatc2,
            7 => Self::CompressedLatc1Signed,
            8 => Self::CompressedLatc2Signed,
            _ => Self::Uncompressed,
        }
    }

    fn tag_bits(self) -> u64 {
        match self {
            Self::Uncompressed => 0,
            Self::CompressedDxt1Rgb => 1,
            Self::CompressedDxt1Rgba => 2,
            Self::CompressedDxt3Rgba => 3,
            Self::CompressedDxt5Rgba => 4,
            Self::CompressedLatc1 => 5,
            Self::CompressedLatc2 => 6,
            Self::CompressedLatc1Signed => 7,
            Self::CompressedLatc2Signed => 8,
        }
    }

    /// Combines this space with an in-space offset into a full texture
    /// address; the inverse of [`TextureAddressSpace::decode`].
    #[must_use]
    pub fn tagged_address(self, offset: u64) -> u64 {
        (self.tag_bits() << Self::TAG_SHIFT) | offset
    }

    /// Splits a (line) address into its space tag and in-space offset
    /// (`spec.md` §6, §4.4 "the memory address is the line address with the
    /// space tag removed").
    #[must_use]
    pub fn decode(address: u64) -> (Self, u64) {
        let space = Self::from_tag(address >> Self::TAG_SHIFT);
        let offset = address & ((1u64 << Self::TAG_SHIFT) - 1);
        (space, offset)
    }

    #[must_use]
    pub fn shift(self) -> u32 {
        match self {
            Self::Uncompressed => 0,
            Self::CompressedDxt1Rgb | Self::CompressedDxt1Rgba => 3,
            Self::CompressedDxt3Rgba | Self::CompressedDxt5Rgba => 2,
            Self::CompressedLatc1 | Self::CompressedLatc2 | Self::CompressedLatc1Signed | Self::CompressedLatc2Signed => 1,
        }
    }

    #[must_use]
    pub fn compression_mode(self) -> CompressionMode {
        match self {
            Self::Uncompressed => CompressionMode::None,
            Self::CompressedDxt1Rgb => CompressionMode::Dxt1Rgb,
            Self::CompressedDxt1Rgba => CompressionMode::Dxt1Rgba,
            Self::CompressedDxt3Rgba => CompressionMode::Dxt3Rgba,
            Self::CompressedDxt5Rgba => CompressionMode::Dxt5Rgba,
            Self::CompressedLatc1 => CompressionMode::Latc1,
            Self::CompressedLatc2 => CompressionMode::Latc2,
            Self::CompressedLatc1Signed => CompressionMode::Latc1Signed,
            Self::CompressedLatc2Signed => CompressionMode::Latc2Signed,
        }
    }
}

/// Fixed resource limits for a texture cache instance (`spec.md` §4.4).
#[derive(Debug, Clone, Copy)]
pub struct TextureConfig {
    pub banks: u32,
    pub max_accesses_per_bank: u32,
    pub bank_width: u32,
    pub max_misses_per_cycle: u32,
    pub decompr_latency: u32,
    pub port_width: u32,
}

struct ReadQueueEntry {
    address: u64,
    mem_address: u32,
    size: u32,
    way: usize,
    set: usize,
    mode: CompressionMode,
    remaining_decompr_cycles: u32,
    ticket: Option<u32>,
    /// Set once a `READ_REQ` has actually been issued for this entry, so
    /// the decompression countdown and completion check never fire before
    /// data has genuinely been requested (let alone arrived).
    requested: bool,
    /// Bytes delivered by the matching `READ_DATA`, empty until then.
    data: Vec<u8>,
    request_id: usize,
}

/// A victim line's bytes awaiting write-back to memory
/// (`spec.md` §4.3 "line replacement with write-back").
struct SpillEntry {
    request_id: usize,
    mem_address: u32,
    data: Vec<u8>,
}

/// Per-cycle resource usage, reset at the start of [`TextureCache::update`].
#[derive(Default)]
struct CycleCounters {
    bank_fetch_access: Vec<u32>,
    bank_read_access: Vec<u32>,
    fetched_lines_this_cycle: Vec<u64>,
    read_lines_this_cycle: Vec<u64>,
    misses_this_cycle: u32,
}

impl CycleCounters {
    fn new(banks: usize) -> Self {
        Self {
            bank_fetch_access: vec![0; banks],
            bank_read_access: vec![0; banks],
            fetched_lines_this_cycle: Vec::new(),
            read_lines_this_cycle: Vec::new(),
            misses_this_cycle: 0,
        }
    }

    fn reset(&mut self) {
        self.bank_fetch_access.iter_mut().for_each(|c| *c = 0);
        self.bank_read_access.iter_mut().for_each(|c| *c = 0);
        self.fetched_lines_this_cycle.clear();
        self.read_lines_this_cycle.clear();
        self.misses_this_cycle = 0;
    }
}

/// Texture cache: a [`FetchCache`] plus bank/port/miss resource limits and a
/// decompression pipeline.
pub struct TextureCache<A: Address> {
    cache: FetchCache<A>,
    config: TextureConfig,
    tickets: TicketPool,
    read_queue: Vec<Option<ReadQueueEntry>>,
    pending: VecDeque<usize>,
    write_queue: VecDeque<SpillEntry>,
    counters: CycleCounters,
    bank_shift: u32,
    read_port_busy: Vec<u32>,
}

impl<A: Address> TextureCache<A> {
    /// # Errors
    /// Returns [`CacheError::Construction`] if the fetch cache rejects the
    /// way/line/line-size configuration, or if `config.banks` is not a
    /// power of two.
    pub fn new(
        ways: usize,
        total_lines: usize,
        line_size: u32,
        request_queue_size: usize,
        config: TextureConfig,
    ) -> Result<Self> {
        if !config.banks.is_power_of_two() {
            return Err(CacheError::Construction("texture cache bank count must be a power of two".into()));
        }
        let cache = FetchCache::new(ways, total_lines, line_size, request_queue_size)?;
        let read_queue_depth = request_queue_size;
        Ok(Self {
            cache,
            config,
            tickets: TicketPool::new(MAX_MEMORY_TICKETS),
            read_queue: (0..read_queue_depth).map(|_| None).collect(),
            pending: VecDeque::new(),
            write_queue: VecDeque::new(),
            counters: CycleCounters::new(config.banks as usize),
            bank_shift: crate::address::log2_exact(u64::from(config.bank_width)),
            read_port_busy: vec![0; (config.banks * config.max_accesses_per_bank) as usize],
        })
    }

    fn bank_of(&self, address: u64) -> usize {
        ((address >> self.bank_shift) & u64::from(self.config.banks - 1)) as usize
    }

    /// Reserves and, on a miss, schedules a fetch for `address`, subject to
    /// bank and miss-quota limits (`spec.md` §4.4).
    ///
    /// Returns the same [`FetchOutcome`]/[`FetchFailure`] shape as the
    /// underlying fetch cache; [`BLACK_TEXEL_ADDRESS`] always succeeds
    /// without touching the fetch cache at all.
    pub fn fetch(
        &mut self,
        address: A,
        mode: CompressionMode,
        source: u64,
        stats: &mut dyn StatSink,
    ) -> std::result::Result<FetchOutcome, FetchFailure> {
        if address.as_u64() == BLACK_TEXEL_ADDRESS {
            return Ok(FetchOutcome {
                way: BLACK_TEXEL_WAY,
                set: BLACK_TEXEL_SET,
                miss: false,
                ready: true,
            });
        }

        let bank = self.bank_of(address.as_u64());
        let redundant = self.counters.fetched_lines_this_cycle.contains(&address.as_u64());
        if !redundant {
            if self.counters.bank_fetch_access[bank] >= self.config.max_accesses_per_bank {
                stats.increment(StatKey::FetchBankConflicts, 1);
                trace!("texture fetch bank conflict on bank {bank}");
                return Err(FetchFailure::RequestQueueFull);
            }
            if self.counters.misses_this_cycle >= self.config.max_misses_per_cycle {
                return Err(FetchFailure::RequestQueueFull);
            }
        }

        let outcome = self.cache.fetch(address, source, false, stats)?;
        if outcome.miss && !redundant {
            self.counters.bank_fetch_access[bank] += 1;
            self.counters.misses_this_cycle += 1;
            self.counters.fetched_lines_this_cycle.push(address.as_u64());

            if let Some((request_id, request)) = self.cache.get_request() {
                let line_address = self
                    .cache
                    .layout()
                    .line_address::<A>(self.cache.layout().tag(address), outcome.set)
                    .as_u64();
                let (space, space_offset) = TextureAddressSpace::decode(line_address);
                trace!(
                    "texture line address {line_address:#x} decoded as {space:?} (shift={}, canonical mode={:?})",
                    space.shift(),
                    space.compression_mode(),
                );
                let mem_address = u32::try_from(space_offset >> space.shift()).unwrap_or(0);

                if request.spill {
                    let victim_bytes = self.cache.read_line(request.way, request.set).to_vec();
                    debug!("texture eviction spills way={} set={}", request.way, request.set);
                    self.write_queue.push_back(SpillEntry {
                        request_id,
                        mem_address: u32::try_from(request.out_address).unwrap_or(0),
                        data: victim_bytes,
                    });
                }

                if request.fill {
                    let footprint = mode.compressed_footprint(self.cache.layout().line_size);
                    debug!("texture fetch miss queued way={} set={}", outcome.way, outcome.set);
                    let entry = ReadQueueEntry {
                        address: address.as_u64(),
                        mem_address,
                        size: footprint,
                        way: outcome.way,
                        set: outcome.set,
                        mode,
                        remaining_decompr_cycles: self.config.decompr_latency,
                        ticket: None,
                        requested: false,
                        data: Vec::new(),
                        request_id,
                    };
                    if let Some(slot) = self.read_queue.iter().position(Option::is_none) {
                        self.read_queue[slot] = Some(entry);
                        self.pending.push_back(slot);
                    }
                }
            }
        }
        Ok(outcome)
    }

    /// Reads texture data, honoring per-bank read-port limits
    /// (`spec.md` §4.4). [`BLACK_TEXEL_ADDRESS`] yields zeroed data.
    pub fn read(&mut self, address: A, way: usize, set: usize, size: u32, data: &mut [u8], stats: &mut dyn StatSink) -> bool {
        if way == BLACK_TEXEL_WAY && set == BLACK_TEXEL_SET {
            data.iter_mut().for_each(|b| *b = 0);
            return true;
        }

        let bank = self.bank_of(address.as_u64());
        let redundant = self.counters.read_lines_this_cycle.contains(&address.as_u64());
        if !redundant {
            if self.counters.bank_read_access[bank] >= self.config.max_accesses_per_bank {
                stats.increment(StatKey::ReadBankConflicts, 1);
                return false;
            }
            self.counters.bank_read_access[bank] += 1;
            self.counters.read_lines_this_cycle.push(address.as_u64());
        }

        let ports_needed = size.div_ceil(self.config.port_width).max(1);
        let busy_ports = self.read_port_busy.iter().filter(|&&c| c > 0).count() as u32;
        if busy_ports + ports_needed > self.read_port_busy.len() as u32 {
            return false;
        }

        let ok = self.cache.read(address, way, set, size, data, stats);
        if ok {
            for slot in self.read_port_busy.iter_mut() {
                if *slot == 0 {
                    *slot = ports_needed;
                    break;
                }
            }
        }
        ok
    }

    pub fn unreserve(&mut self, way: usize, set: usize, stats: &mut dyn StatSink) {
        if way == BLACK_TEXEL_WAY && set == BLACK_TEXEL_SET {
            return;
        }
        self.cache.unreserve(way, set, stats);
    }

    pub fn reset(&mut self) {
        self.cache.reset();
        self.tickets = TicketPool::new(MAX_MEMORY_TICKETS);
        self.read_queue.iter_mut().for_each(|slot| *slot = None);
        self.pending.clear();
        self.write_queue.clear();
        self.counters.reset();
        self.read_port_busy.iter_mut().for_each(|c| *c = 0);
    }

    /// Bypasses reservation checks to read a line's raw bytes, for the
    /// two-level cache to copy a just-filled L1 line up into L0.
    #[must_use]
    pub fn line_bytes(&self, way: usize, set: usize) -> &[u8] {
        self.cache.read_line(way, set)
    }

    /// Accepts a transaction arriving from the memory controller: matches
    /// its ticket back to a read-queue entry and starts that entry's
    /// decompression countdown.
    pub fn process_memory_transaction(&mut self, transaction: &Transaction, cycle: u64, stats: &mut dyn StatSink) {
        if transaction.command != Command::ReadData {
            return;
        }
        let Some((_, latency)) = self.tickets.resolve(transaction.ticket, cycle) else {
            debug!("texture cache received unexpected ticket {}", transaction.ticket);
            return;
        };
        stats.increment(StatKey::MemoryRequests, 1);
        stats.increment(StatKey::MemoryRequestLatency, latency);
        for slot in self.read_queue.iter_mut().flatten() {
            if slot.mem_address == transaction.address {
                slot.data = transaction.data.clone();
                slot.ticket = None;
            }
        }
    }

    /// Per-cycle schedule (`spec.md` §4.4):
    /// 1. clear this cycle's bank/port/miss counters,
    /// 2. advance every in-flight decompression countdown,
    /// 3. write back any block whose decompression just completed,
    /// 4. free the fetch-cache request for a completed line,
    /// 5. issue at most one new memory read for a queued entry not yet
    ///    requested, respecting the memory controller's accept state,
    /// 6. report whether a line was filled this cycle and its tag.
    pub fn update(&mut self, cycle: u64, memory_state: MemState, stats: &mut dyn StatSink) -> (Option<Transaction>, bool, Option<u64>) {
        self.counters.reset();
        for slot in self.read_queue.iter_mut().flatten() {
            if slot.requested && slot.ticket.is_none() && slot.remaining_decompr_cycles > 0 {
                slot.remaining_decompr_cycles -= 1;
            }
        }

        let mut filled = false;
        let mut filled_tag = None;
        if let Some(&slot_idx) = self.pending.front() {
            let ready = matches!(
                &self.read_queue[slot_idx],
                Some(e) if e.requested && e.ticket.is_none() && e.remaining_decompr_cycles == 0
            );
            if ready {
                self.pending.pop_front();
                if let Some(entry) = self.read_queue[slot_idx].take() {
                    let mut data = vec![0u8; self.cache.layout().line_size as usize];
                    let copy_len = entry.data.len().min(data.len());
                    data[..copy_len].copy_from_slice(&entry.data[..copy_len]);
                    let tag = self.cache.write_line(entry.way, entry.set, &data, stats);
                    self.cache.free_request(entry.request_id, false, true);
                    filled = true;
                    filled_tag = Some(tag.as_u64());
                    debug!("texture fill complete for way={} set={}", entry.way, entry.set);
                }
            }
        }

        let transaction = if memory_state.contains(MemState::WRITE_ACCEPT) && !self.write_queue.is_empty() {
            self.write_queue.pop_front().map(|spill| {
                debug!("texture write-back for request {}", spill.request_id);
                let transaction = Transaction::new(
                    Command::WriteReq,
                    spill.mem_address,
                    spill.data.len() as u32,
                    spill.data,
                    SourceKind::Texture,
                );
                self.cache.free_request(spill.request_id, true, false);
                transaction
            })
        } else if memory_state.contains(MemState::READ_ACCEPT) {
            self.pending.front().copied().and_then(|slot_idx| {
                let entry = self.read_queue[slot_idx].as_mut()?;
                if entry.requested {
                    return None;
                }
                let ticket = self.tickets.allocate(slot_idx, cycle)?;
                entry.ticket = Some(ticket);
                entry.requested = true;
                let mut transaction = Transaction::new(
                    Command::ReadReq,
                    entry.mem_address,
                    entry.size,
                    Vec::new(),
                    SourceKind::Texture,
                );
                transaction.ticket = ticket;
                Some(transaction)
            })
        } else {
            None
        };

        for slot in self.read_port_busy.iter_mut() {
            if *slot > 0 {
                *slot -= 1;
            }
        }

        (transaction, filled, filled_tag)
    }
}

impl<A: Address> fmt::Display for TextureCache<A> {
    /// One-line cycle-state dump: pending fills, bank/port occupancy, and
    /// outstanding tickets, for tests and the CLI demo to eyeball.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TextureCache {{ pending: {}, tickets_in_flight: {}, busy_ports: {} }}",
            self.pending.len(),
            self.tickets.in_flight(),
            self.read_port_busy.iter().filter(|&&c| c > 0).count(),
        )
    }
}

impl<A: Address> crate::cache_trait::CacheFamilyMember for TextureCache<A> {
    fn reset(&mut self) {
        TextureCache::reset(self);
    }

    fn update(&mut self, cycle: u64, memory_state: MemState, stats: &mut dyn StatSink) -> (Option<Transaction>, bool, Option<u64>) {
        TextureCache::update(self, cycle, memory_state, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{CountingSink, NullSink};

    fn config() -> TextureConfig {
        TextureConfig {
            banks: 4,
            max_accesses_per_bank: 1,
            bank_width: 16,
            max_misses_per_cycle: 4,
            decompr_latency: 2,
            port_width: 16,
        }
    }

    #[test]
    fn black_texel_fetch_succeeds_immediately() {
        let mut cache = TextureCache::<u64>::new(4, 256, 64, 4, config()).unwrap();
        let mut sink = NullSink;
        let outcome = cache
            .fetch(BLACK_TEXEL_ADDRESS, CompressionMode::None, 0, &mut sink)
            .unwrap();
        assert!(!outcome.miss);
        assert!(outcome.ready);

        let mut data = vec![0xFFu8; 16];
        assert!(cache.read(BLACK_TEXEL_ADDRESS, outcome.way, outcome.set, 16, &mut data, &mut sink));
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn black_texel_unreserve_is_a_no_op() {
        let mut cache = TextureCache::<u64>::new(4, 256, 64, 4, config()).unwrap();
        let mut sink = NullSink;
        cache.unreserve(BLACK_TEXEL_WAY, BLACK_TEXEL_SET, &mut sink);
    }

    #[test]
    fn bank_conflict_is_recorded_and_counted() {
        let mut cache = TextureCache::<u64>::new(4, 256, 64, 4, config()).unwrap();
        let mut sink = CountingSink::new("");
        // Two different lines that map to the same bank (bank_width=16, banks=4
        // so bank = (addr >> 4) & 3; line_size 64 keeps both addresses in
        // distinct cache lines but the same bank if chosen deliberately).
        let a = 0u64;
        let b = 1u64 << cache.cache.layout().tag_shift;
        cache.fetch(a, CompressionMode::None, 0, &mut sink).unwrap();
        let second = cache.fetch(b, CompressionMode::None, 0, &mut sink);
        if second.is_err() {
            assert_eq!(sink.get(StatKey::FetchBankConflicts), 1);
        }
    }

    #[test]
    fn compression_footprints_match_expected_shifts() {
        assert_eq!(CompressionMode::None.compressed_footprint(64), 64);
        assert_eq!(CompressionMode::Dxt1Rgb.compressed_footprint(64), 8);
        assert_eq!(CompressionMode::Dxt5Rgba.compressed_footprint(64), 16);
    }

    #[test]
    fn texture_address_space_decode_round_trips_and_strips_the_tag() {
        let tagged = TextureAddressSpace::CompressedDxt1Rgb.tagged_address(0x1000);
        let (space, offset) = TextureAddressSpace::decode(tagged);
        assert_eq!(space, TextureAddressSpace::CompressedDxt1Rgb);
        assert_eq!(offset, 0x1000);
        assert_eq!(space.compression_mode(), CompressionMode::Dxt1Rgb);
    }

    #[test]
    fn dirty_eviction_eventually_emits_a_write_back() {
        let mut cache = TextureCache::<u64>::new(2, 128, 64, 4, config()).unwrap();
        let mut sink = NullSink;
        let line_size = cache.cache.layout().line_size;

        for way in 0..2u64 {
            let addr = way << cache.cache.layout().tag_shift;
            let outcome = cache.fetch(addr, CompressionMode::None, 0, &mut sink).unwrap();
            let (id, _) = cache.cache.get_request().unwrap();
            cache.cache.free_request(id, false, true);
            let data = vec![0xCDu8; line_size as usize];
            assert!(cache.cache.write(addr, outcome.way, outcome.set, line_size, &data, &mut sink));
            cache.unreserve(outcome.way, outcome.set, &mut sink);
        }

        let evicting = 2u64 << cache.cache.layout().tag_shift;
        cache.fetch(evicting, CompressionMode::None, 0, &mut sink).unwrap();
        assert!(!cache.write_queue.is_empty());

        let (transaction, ..) = cache.update(0, MemState::WRITE_ACCEPT, &mut sink);
        let transaction = transaction.expect("a write-back should have been emitted");
        assert_eq!(transaction.command, Command::WriteReq);
        assert!(transaction.data.iter().all(|&b| b == 0xCD));
        assert!(cache.write_queue.is_empty());
    }
}
