//! A shared capability surface across the fetch-cache family
//! (Design Notes §9, bullet 1).
//!
//! The three concrete caches ([`crate::fetch_cache::FetchCache`],
//! [`crate::texture::TextureCache`], [`crate::input_cache::InputCache`])
//! don't share a common base class the way the original sources do
//! (`TextureCache : public TextureCacheGen`), since their `fetch`/`read`
//! signatures diverge just enough (compression mode, read-port counts) that
//! forcing one method signature would mean padding every call site with
//! unused parameters. This trait instead captures only the lifecycle
//! operations that really are identical: reset and the per-cycle update
//! hook a host simulator drives every cache through uniformly.

use crate::memory::{MemState, Transaction};
use crate::stats::StatSink;

/// Operations every fetch-cache family member exposes uniformly to a host
/// simulator's scheduler, independent of each cache's specialized
/// fetch/read contract.
pub trait CacheFamilyMember {
    /// Clears all cache state back to empty, as at construction.
    fn reset(&mut self);

    /// Advances this cache by one cycle, returning at most one outbound
    /// memory transaction, whether a line completed its fill this cycle,
    /// and that line's tag if so.
    fn update(&mut self, cycle: u64, memory_state: MemState, stats: &mut dyn StatSink) -> (Option<Transaction>, bool, Option<u64>);
}
