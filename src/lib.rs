//! Cycle-accurate functional simulator for a GPU fetch-cache family:
//! texture, input, color and Z caches all built on the same reserve →
//! fetch-on-miss → read/write → unreserve protocol.
//!
//! A host simulator drives a cache by calling its `fetch`/`read`/`write`
//! methods from whatever stage needs the data, and calls `update` once per
//! cycle to let the cache talk to the memory controller. None of the
//! operations here block: every failure mode is either a `bool`/`Result`
//! the caller is expected to retry, or a panic for a precondition the
//! caller itself violated.

pub mod address;
pub mod cache_trait;
pub mod config;
pub mod error;
pub mod fetch_cache;
pub mod generic_cache;
pub mod input_cache;
pub mod memory;
pub mod replacement;
pub mod stats;
pub mod texture;
pub mod texture_l2;
pub mod ticket_pool;

pub use address::{Address, AddressLayout};
pub use cache_trait::CacheFamilyMember;
pub use config::{FetchCacheConfig, TextureCacheConfig};
pub use error::{CacheError, Result};
pub use fetch_cache::{FetchCache, FetchFailure, FetchOutcome, RequestEntry};
pub use generic_cache::GenericCache;
pub use input_cache::InputCache;
pub use memory::{Command, MemState, MemoryController, SourceKind, Transaction, MAX_MEMORY_TICKETS, MAX_TRANSACTION_SIZE};
pub use replacement::ReplacementPolicy;
pub use stats::{CountingSink, NullSink, StatKey, StatSink};
pub use texture::{CompressionMode, TextureAddressSpace, TextureCache, TextureConfig, BLACK_TEXEL_ADDRESS};
pub use texture_l2::TwoLevelTextureCache;
pub use ticket_pool::TicketPool;
