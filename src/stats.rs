//! Statistics sink (`spec.md` §6, "Statistics keys").
//!
//! The original simulator used a process-wide singleton
//! (`cmStatisticsManager`) mapping string keys to counters, registered once
//! per cache instance with a name postfix. Design Notes §9 asks for this to
//! become an injected trait object instead, so tests can supply a no-op
//! sink and production code can supply a real collector. This also sidesteps
//! the original's duplicate-registration bug where `MissFailMissAlloc`
//! silently overwrote `MissFailReserveAlloc` in one constructor — every key
//! below is a distinct enum variant, so a duplicate can't happen again.

use std::fmt;

/// One of the named counters a fetch cache (or its variants) updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKey {
    MissesFetch,
    HitsFetch,
    MissOkFetch,
    MissFailFetch,
    MissFailReqQueueFetch,
    MissFailReserveFetch,
    MissFailMissFetch,
    MissesAlloc,
    HitsAlloc,
    MissOkAlloc,
    MissFailAlloc,
    MissFailReqQueueAlloc,
    MissFailReserveAlloc,
    ReadsOk,
    ReadsFail,
    WritesOk,
    WritesFail,
    ReadBytes,
    WriteBytes,
    Unreserves,
    FetchBankConflicts,
    ReadBankConflicts,
    MemoryRequests,
    MemoryRequestLatency,
}

impl StatKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissesFetch => "MissesFetch",
            Self::HitsFetch => "HitsFetch",
            Self::MissOkFetch => "MissOKFetch",
            Self::MissFailFetch => "MissFailFetch",
            Self::MissFailReqQueueFetch => "MissFailReqQueueFetch",
            Self::MissFailReserveFetch => "MissFailReserveFetch",
            Self::MissFailMissFetch => "MissFailMissFetch",
            Self::MissesAlloc => "MissesAlloc",
            Self::HitsAlloc => "HitsAlloc",
            Self::MissOkAlloc => "MissOKAlloc",
            Self::MissFailAlloc => "MissFailAlloc",
            Self::MissFailReqQueueAlloc => "MissFailReqQueueAlloc",
            Self::MissFailReserveAlloc => "MissFailReserveAlloc",
            Self::ReadsOk => "ReadsOK",
            Self::ReadsFail => "ReadsFail",
            Self::WritesOk => "WritesOK",
            Self::WritesFail => "WritesFail",
            Self::ReadBytes => "ReadBytes",
            Self::WriteBytes => "WriteBytes",
            Self::Unreserves => "Unreserves",
            Self::FetchBankConflicts => "FetchBankConflicts",
            Self::ReadBankConflicts => "ReadBankConflicts",
            Self::MemoryRequests => "MemoryRequests",
            Self::MemoryRequestLatency => "MemoryRequestLatency",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sink for monotonic counter increments (`spec.md` §5: "accepts only
/// monotonic counter increments; its implementation must tolerate any call
/// order").
pub trait StatSink: fmt::Debug + Send + Sync {
    fn increment(&mut self, key: StatKey, amount: u64);
}

/// A sink that discards every increment; the default for tests and for
/// configurations that don't care about statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatSink for NullSink {
    fn increment(&mut self, _key: StatKey, _amount: u64) {}
}

/// A simple in-memory collector, keyed by `{key}{instance postfix}` exactly
/// as `spec.md` §6 describes.
#[derive(Debug, Default, Clone)]
pub struct CountingSink {
    postfix: String,
    counters: indexmap::IndexMap<String, u64>,
}

impl CountingSink {
    #[must_use]
    pub fn new(postfix: impl Into<String>) -> Self {
        Self {
            postfix: postfix.into(),
            counters: indexmap::IndexMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: StatKey) -> u64 {
        self.counters
            .get(&format!("{key}{}", self.postfix))
            .copied()
            .unwrap_or(0)
    }
}

impl StatSink for CountingSink {
    fn increment(&mut self, key: StatKey, amount: u64) {
        *self
            .counters
            .entry(format!("{key}{}", self.postfix))
            .or_insert(0) += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_sink_accumulates_per_instance_key() {
        let mut sink = CountingSink::new("_L1");
        sink.increment(StatKey::HitsFetch, 3);
        sink.increment(StatKey::HitsFetch, 4);
        assert_eq!(sink.get(StatKey::HitsFetch), 7);
        assert_eq!(sink.get(StatKey::MissesFetch), 0);
    }

    #[test]
    fn null_sink_tolerates_any_order() {
        let mut sink = NullSink;
        sink.increment(StatKey::Unreserves, 1);
        sink.increment(StatKey::MemoryRequestLatency, 100);
    }
}
