//! Error taxonomy for the fetch-cache family (`spec.md` §7).
//!
//! Construction errors and external failures are recoverable at the type
//! level (`Result`); precondition violations are caller bugs and panic via
//! `debug_assert!`/`assert!` at the call site instead, matching the
//! teacher's use of `debug_assert_eq!` for the same class of condition.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A construction-time invariant was violated (non-power-of-two sizes,
    /// non-positive sizes, an unsupported way count for Pseudo-LRU, ...).
    #[error("invalid cache configuration: {0}")]
    Construction(String),

    /// A failure originating outside this crate's trust boundary: an
    /// unsupported transaction kind, an unsupported texture compression
    /// mode, or a compressed block with uninitialized-looking contents.
    #[error("external failure: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
