//! Input cache: the simplest fetch-cache family member (`spec.md` §4.6).
//!
//! Grounded in `cmInputCache.h`/`.cpp`: no decompression, no bank model,
//! just a [`FetchCache`] plus a fixed number of read ports and the ticket
//! pool/transaction plumbing shared with [`crate::texture::TextureCache`].

use std::collections::VecDeque;

use log::debug;

use crate::address::Address;
use crate::error::Result;
use crate::fetch_cache::{FetchCache, FetchFailure, FetchOutcome};
use crate::memory::{Command, MemState, SourceKind, Transaction, MAX_MEMORY_TICKETS};
use crate::stats::{StatKey, StatSink};
use crate::ticket_pool::TicketPool;

struct PendingFill {
    request_id: usize,
    way: usize,
    set: usize,
    mem_address: u32,
    size: u32,
    ticket: Option<u32>,
    /// Set once a `READ_REQ` has actually been issued, so completion never
    /// fires before data has genuinely been requested (`spec.md` §4.2).
    requested: bool,
    /// Bytes delivered by the matching `READ_DATA`, empty until then.
    data: Vec<u8>,
}

/// A victim line's bytes awaiting write-back to memory.
struct SpillEntry {
    request_id: usize,
    mem_address: u32,
    data: Vec<u8>,
}

/// An input cache: one [`FetchCache`] plus `read_ports` independent read
/// ports (no bank contention, unlike the texture cache).
pub struct InputCache<A: Address> {
    cache: FetchCache<A>,
    read_ports: usize,
    ports_used_this_cycle: usize,
    tickets: TicketPool,
    fills: Vec<PendingFill>,
    write_queue: VecDeque<SpillEntry>,
}

impl<A: Address> InputCache<A> {
    /// # Errors
    /// Returns [`CacheError::Construction`](crate::error::CacheError::Construction)
    /// if the underlying fetch cache rejects its configuration.
    pub fn new(ways: usize, total_lines: usize, line_size: u32, request_queue_size: usize, read_ports: usize) -> Result<Self> {
        let cache = FetchCache::new(ways, total_lines, line_size, request_queue_size)?;
        Ok(Self {
            cache,
            read_ports: read_ports.max(1),
            ports_used_this_cycle: 0,
            tickets: TicketPool::new(MAX_MEMORY_TICKETS),
            fills: Vec::new(),
            write_queue: VecDeque::new(),
        })
    }

    pub fn fetch(&mut self, address: A, source: u64, stats: &mut dyn StatSink) -> std::result::Result<FetchOutcome, FetchFailure> {
        let outcome = self.cache.fetch(address, source, false, stats)?;
        if outcome.miss {
            if let Some((id, request)) = self.cache.get_request() {
                if request.spill {
                    let victim_bytes = self.cache.read_line(request.way, request.set).to_vec();
                    debug!("input cache eviction spills way={} set={}", request.way, request.set);
                    self.write_queue.push_back(SpillEntry {
                        request_id: id,
                        mem_address: u32::try_from(request.out_address).unwrap_or(0),
                        data: victim_bytes,
                    });
                }
                if request.fill {
                    self.fills.push(PendingFill {
                        request_id: id,
                        way: outcome.way,
                        set: outcome.set,
                        mem_address: u32::try_from(
                            self.cache
                                .layout()
                                .line_address::<A>(self.cache.layout().tag(address), outcome.set)
                                .as_u64(),
                        )
                        .unwrap_or(0),
                        size: self.cache.layout().line_size,
                        ticket: None,
                        requested: false,
                        data: Vec::new(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Reads through one of the cache's independent read ports, failing
    /// once all `read_ports` are claimed for the cycle.
    pub fn read(&mut self, address: A, way: usize, set: usize, size: u32, data: &mut [u8], stats: &mut dyn StatSink) -> bool {
        if self.ports_used_this_cycle >= self.read_ports {
            return false;
        }
        let ok = self.cache.read(address, way, set, size, data, stats);
        if ok {
            self.ports_used_this_cycle += 1;
        }
        ok
    }

    pub fn unreserve(&mut self, way: usize, set: usize, stats: &mut dyn StatSink) {
        self.cache.unreserve(way, set, stats);
    }

    pub fn reset(&mut self) {
        self.cache.reset();
        self.ports_used_this_cycle = 0;
        self.tickets = TicketPool::new(MAX_MEMORY_TICKETS);
        self.fills.clear();
        self.write_queue.clear();
    }

    /// Matches an inbound `READ_DATA` back to its fill by memory address,
    /// buffers its bytes, and clears the fill's ticket so [`InputCache::update`]
    /// knows data has actually arrived (`spec.md` §4.2).
    pub fn process_memory_transaction(&mut self, transaction: &Transaction, cycle: u64, stats: &mut dyn StatSink) {
        if transaction.command != Command::ReadData {
            return;
        }
        let Some((_, latency)) = self.tickets.resolve(transaction.ticket, cycle) else {
            debug!("input cache received unexpected ticket {}", transaction.ticket);
            return;
        };
        stats.increment(StatKey::MemoryRequests, 1);
        stats.increment(StatKey::MemoryRequestLatency, latency);
        for fill in &mut self.fills {
            if fill.mem_address == transaction.address {
                fill.data = transaction.data.clone();
                fill.ticket = None;
            }
        }
    }

    /// Clears the per-cycle read-port counter, emits at most one pending
    /// write-back (ahead of reads), then issues at most one new memory read
    /// for the oldest still-unrequested fill.
    pub fn update(&mut self, cycle: u64, memory_state: MemState, stats: &mut dyn StatSink) -> (Option<Transaction>, bool, Option<u64>) {
        self.ports_used_this_cycle = 0;

        let mut filled = false;
        let mut filled_tag = None;
        if let Some(pos) = self.fills.iter().position(|f| f.requested && f.ticket.is_none()) {
            let fill = self.fills.remove(pos);
            let mut data = vec![0u8; self.cache.layout().line_size as usize];
            let copy_len = fill.data.len().min(data.len());
            data[..copy_len].copy_from_slice(&fill.data[..copy_len]);
            let tag = self.cache.write_line(fill.way, fill.set, &data, stats);
            self.cache.free_request(fill.request_id, false, true);
            filled = true;
            filled_tag = Some(tag.as_u64());
            debug!("input cache fill complete way={} set={}", fill.way, fill.set);
        }

        let transaction = if memory_state.contains(MemState::WRITE_ACCEPT) && !self.write_queue.is_empty() {
            self.write_queue.pop_front().map(|spill| {
                debug!("input cache write-back for request {}", spill.request_id);
                let transaction = Transaction::new(Command::WriteReq, spill.mem_address, spill.data.len() as u32, spill.data, SourceKind::Input);
                self.cache.free_request(spill.request_id, true, false);
                transaction
            })
        } else if memory_state.contains(MemState::READ_ACCEPT) {
            self.fills.iter_mut().find(|f| !f.requested).and_then(|fill| {
                let ticket = self.tickets.allocate(0, cycle)?;
                fill.ticket = Some(ticket);
                fill.requested = true;
                let mut transaction = Transaction::new(Command::ReadReq, fill.mem_address, fill.size, Vec::new(), SourceKind::Input);
                transaction.ticket = ticket;
                Some(transaction)
            })
        } else {
            None
        };

        (transaction, filled, filled_tag)
    }
}

impl<A: Address> crate::cache_trait::CacheFamilyMember for InputCache<A> {
    fn reset(&mut self) {
        InputCache::reset(self);
    }

    fn update(&mut self, cycle: u64, memory_state: MemState, stats: &mut dyn StatSink) -> (Option<Transaction>, bool, Option<u64>) {
        InputCache::update(self, cycle, memory_state, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::NullSink;

    #[test]
    fn read_ports_cap_concurrent_reads_per_cycle() {
        let mut cache = InputCache::<u64>::new(4, 256, 64, 4, 1).unwrap();
        let mut sink = NullSink;
        let a = cache.fetch(0x1000, 0, &mut sink).unwrap();
        let (id, _) = cache.cache.get_request().unwrap();
        cache.cache.free_request(id, false, true);

        let mut data = [0u8; 4];
        assert!(cache.read(0x1000, a.way, a.set, 4, &mut data, &mut sink));
        assert!(!cache.read(0x1000, a.way, a.set, 4, &mut data, &mut sink));
    }
}
