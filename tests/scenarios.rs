//! End-to-end scenarios exercising the public API across module
//! boundaries (`spec.md` §8).

use fetchcache::{
    CompressionMode, CountingSink, FetchCache, FetchFailure, NullSink, StatKey, TextureCache, TextureConfig,
    TicketPool, BLACK_TEXEL_ADDRESS,
};

fn texture_config() -> TextureConfig {
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
fn cold_miss_fetches_and_then_reads() {
    let mut cache = FetchCache::<u64>::new(4, 256, 64, 4).unwrap();
    let mut stats = CountingSink::new("");

    let outcome = cache.fetch(0x4000, 0, false, &mut stats).unwrap();
    assert!(outcome.miss);
    assert!(!outcome.ready);

    let (id, request) = cache.get_request().unwrap();
    assert!(request.fill);
    cache.free_request(id, false, true);

    let mut out = vec![0u8; 4];
    assert!(cache.read(0x4000, outcome.way, outcome.set, 4, &mut out, &mut stats));
    assert_eq!(stats.get(StatKey::ReadsOk), 1);
}

#[test]
fn a_hit_increments_reserve_rather_than_enqueueing() {
    let mut cache = FetchCache::<u64>::new(4, 256, 64, 4).unwrap();
    let mut stats = NullSink;

    let first = cache.fetch(0x5000, 0, false, &mut stats).unwrap();
    let (id, _) = cache.get_request().unwrap();
    cache.free_request(id, false, true);

    let second = cache.fetch(0x5000, 0, false, &mut stats).unwrap();
    assert!(!second.miss);
    assert_eq!(second.way, first.way);
    assert!(cache.get_request().is_none());
}

#[test]
fn evicting_a_dirty_line_spills_before_it_fills() {
    let mut cache = FetchCache::<u64>::new(2, 128, 64, 4).unwrap();
    let mut stats = NullSink;
    let line_size = cache.layout().line_size;

    for way in 0..2u64 {
        let addr = way << cache.layout().tag_shift;
        let outcome = cache.fetch(addr, 0, false, &mut stats).unwrap();
        let (id, _) = cache.get_request().unwrap();
        cache.free_request(id, false, true);
        let data = vec![0xCDu8; line_size as usize];
        assert!(cache.write(addr, outcome.way, outcome.set, line_size, &data, &mut stats));
        cache.unreserve(outcome.way, outcome.set, &mut stats);
    }

    let evicting = 2u64 << cache.layout().tag_shift;
    let outcome = cache.fetch(evicting, 0, false, &mut stats).unwrap();
    assert!(outcome.miss);
    let (_, request) = cache.get_request().unwrap();
    assert!(request.spill, "a dirty victim must be spilled before it is refilled");
    assert!(request.fill);
}

#[test]
fn all_ways_reserved_fails_cleanly() {
    let mut cache = FetchCache::<u64>::new(2, 128, 64, 4).unwrap();
    let mut stats = CountingSink::new("");
    for way in 0..2u64 {
        let addr = way << cache.layout().tag_shift;
        cache.fetch(addr, 0, false, &mut stats).unwrap();
    }
    let addr = 2u64 << cache.layout().tag_shift;
    let failure = cache.fetch(addr, 0, false, &mut stats).unwrap_err();
    assert_eq!(failure, FetchFailure::AllWaysReserved);
    assert_eq!(stats.get(StatKey::MissFailReserveFetch), 1);
}

#[test]
fn dxt1_fill_carries_the_compressed_footprint() {
    let mut cache = TextureCache::<u64>::new(4, 256, 64, 4, texture_config()).unwrap();
    let mut stats = NullSink;

    let outcome = cache
        .fetch(0x1000, CompressionMode::Dxt1Rgb, 0, &mut stats)
        .unwrap();
    assert!(outcome.miss);
    assert_eq!(CompressionMode::Dxt1Rgb.compressed_footprint(64), 8);
}

#[test]
fn black_texel_sentinel_never_touches_the_cache() {
    let mut cache = TextureCache::<u64>::new(4, 256, 64, 4, texture_config()).unwrap();
    let mut stats = NullSink;

    let outcome = cache
        .fetch(BLACK_TEXEL_ADDRESS, CompressionMode::None, 0, &mut stats)
        .unwrap();
    assert!(!outcome.miss);
    assert!(outcome.ready);

    let mut data = vec![0xFFu8; 8];
    assert!(cache.read(BLACK_TEXEL_ADDRESS, outcome.way, outcome.set, 8, &mut data, &mut stats));
    assert!(data.iter().all(|&b| b == 0));

    cache.unreserve(outcome.way, outcome.set, &mut stats);
}

#[test]
fn ticket_pool_round_trips_every_ticket_it_hands_out() {
    let mut pool = TicketPool::new(8);
    let mut issued = Vec::new();
    for i in 0..8 {
        issued.push(pool.allocate(i, 0).unwrap());
    }
    assert_eq!(pool.free_tickets(), 0);

    for ticket in issued {
        assert!(pool.resolve(ticket, 3).is_some());
    }
    assert_eq!(pool.free_tickets(), pool.capacity());
}
