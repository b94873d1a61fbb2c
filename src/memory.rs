//! Memory controller contract (`spec.md` §6).
//!
//! The memory controller itself is out of scope (`spec.md` §1): this module
//! only fixes the wire shape of a transaction and the trait a cache uses to
//! talk to whatever controller the host simulator wires in, so tests can
//! supply a scripted fake in place of a real one.

/// `spec.md` §6: "Invariant: size ≤ MAX_TRANSACTION_SIZE."
pub const MAX_TRANSACTION_SIZE: u32 = 256;

/// Number of outstanding memory requests a single cache instance may have
/// in flight at once (`spec.md` §3, ticket pool).
pub const MAX_MEMORY_TICKETS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadReq,
    ReadData,
    WriteReq,
    WriteData,
}

/// Identifies which fetch-cache family member issued a transaction, purely
/// for tracing; the memory controller is not expected to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Texture,
    Input,
    Color,
    Z,
}

/// A value-typed transaction record passed by move between a cache and the
/// memory controller (Design Notes §9: "break by value").
#[derive(Debug, Clone)]
pub struct Transaction {
    pub command: Command,
    pub address: u32,
    pub size: u32,
    pub data: Vec<u8>,
    pub source: SourceKind,
    pub requester: u32,
    pub ticket: u32,
    pub bus_cycles: u32,
    /// Opaque caller-defined cookies carried through for tracing, e.g. the
    /// `source: DynamicObject*` pointer of the original sources.
    pub cookies: Vec<u64>,
}

impl Transaction {
    /// # Panics
    /// Panics if `data.len()` exceeds [`MAX_TRANSACTION_SIZE`].
    #[must_use]
    pub fn new(
        command: Command,
        address: u32,
        size: u32,
        data: Vec<u8>,
        source: SourceKind,
    ) -> Self {
        assert!(
            size <= MAX_TRANSACTION_SIZE,
            "transaction size {size} exceeds MAX_TRANSACTION_SIZE"
        );
        Self {
            command,
            address,
            size,
            data,
            source,
            requester: 0,
            ticket: 0,
            bus_cycles: 0,
            cookies: Vec::new(),
        }
    }
}

bitflags::bitflags! {
    /// Memory controller status bits (`spec.md` §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemState: u32 {
        const READ_ACCEPT = 0b0000_0001;
        const WRITE_ACCEPT = 0b0000_0010;
    }
}

/// The out-of-scope collaborator: whatever services read/write transactions
/// and eventually hands back `MT_READ_DATA`. A cache only ever sees this
/// through the trait below.
pub trait MemoryController {
    fn state(&self) -> MemState;

    /// Attempts to submit `transaction`; returns `false` if the controller
    /// has no room for it this cycle.
    fn submit(&mut self, transaction: Transaction) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_accept_gates_emission() {
        let accepting = MemState::READ_ACCEPT;
        assert!(accepting.contains(MemState::READ_ACCEPT));
        assert!(!accepting.contains(MemState::WRITE_ACCEPT));
    }

    #[test]
    #[should_panic(expected = "MAX_TRANSACTION_SIZE")]
    fn oversized_transaction_panics() {
        Transaction::new(
            Command::ReadReq,
            0,
            MAX_TRANSACTION_SIZE + 1,
            Vec::new(),
            SourceKind::Texture,
        );
    }
}
