//! Address word abstraction.
//!
//! The original simulator duplicated its cache family for 32-bit
//! (`CacheRequest`) and 64-bit (`Cache64Request`) addresses via near
//! identical headers. Here the generic cache and fetch cache are generic
//! over any unsigned integer word via [`Address`], following the teacher's
//! `address` type alias but made parametric instead of fixed to one width.

use std::fmt;
use std::hash::Hash;

/// An address word a cache can be addressed with (`u32` or `u64`).
pub trait Address:
    Copy + Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Number of bits in the address word.
    fn bits() -> u32;

    fn as_u64(self) -> u64;

    fn from_u64(value: u64) -> Self;

    fn shr(self, amount: u32) -> Self {
        Self::from_u64(self.as_u64().checked_shr(amount).unwrap_or(0))
    }

    fn bitand_u64(self, mask: u64) -> Self {
        Self::from_u64(self.as_u64() & mask)
    }
}

impl Address for u32 {
    fn bits() -> u32 {
        32
    }

    fn as_u64(self) -> u64 {
        u64::from(self)
    }

    fn from_u64(value: u64) -> Self {
        value as u32
    }
}

impl Address for u64 {
    fn bits() -> u32 {
        64
    }

    fn as_u64(self) -> u64 {
        self
    }

    fn from_u64(value: u64) -> Self {
        value
    }
}

/// Returns `log2(x)` for a power of two `x`, panicking otherwise.
///
/// Mirrors `GPUMath::calculateShift` from the original sources: every
/// caller already validated `x` is a power of two at construction time.
#[must_use]
pub fn log2_exact(x: u64) -> u32 {
    debug_assert!(x.is_power_of_two(), "{x} is not a power of two");
    x.trailing_zeros()
}

/// Derived addressing fields for a set-associative cache, computed once at
/// construction (`spec.md` §3).
#[derive(Debug, Clone, Copy)]
pub struct AddressLayout {
    pub line_size: u32,
    pub sets: u32,
    pub byte_mask: u64,
    pub line_shift: u32,
    pub line_mask: u64,
    pub tag_shift: u32,
    pub fully_associative: bool,
}

impl AddressLayout {
    #[must_use]
    pub fn new(line_size: u32, sets: u32) -> Self {
        assert!(line_size.is_power_of_two(), "line size must be a power of two");
        assert!(sets.is_power_of_two(), "set count must be a power of two");
        assert!(sets > 0, "cache must have at least one set");

        let line_shift = log2_exact(u64::from(line_size));
        let fully_associative = sets == 1;
        let tag_shift = if fully_associative {
            line_shift
        } else {
            line_shift + log2_exact(u64::from(sets))
        };

        Self {
            line_size,
            sets,
            byte_mask: u64::from(line_size) - 1,
            line_shift,
            line_mask: u64::from(sets) - 1,
            tag_shift,
            fully_associative,
        }
    }

    pub fn offset<A: Address>(&self, address: A) -> u32 {
        (address.as_u64() & self.byte_mask) as u32
    }

    pub fn set<A: Address>(&self, address: A) -> usize {
        if self.fully_associative {
            0
        } else {
            ((address.as_u64() >> self.line_shift) & self.line_mask) as usize
        }
    }

    pub fn tag<A: Address>(&self, address: A) -> u64 {
        address.as_u64() >> self.tag_shift
    }

    /// Reconstructs the line address (tag and set recombined, offset zeroed)
    /// of whatever is resident at `(tag, set)`.
    pub fn line_address<A: Address>(&self, tag: u64, set: usize) -> A {
        let set_bits = if self.fully_associative {
            0
        } else {
            (set as u64) << self.line_shift
        };
        A::from_u64((tag << self.tag_shift) | set_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_direct_mapped() {
        let layout = AddressLayout::new(64, 64);
        assert_eq!(layout.line_shift, 6);
        assert_eq!(layout.tag_shift, 12);
        assert_eq!(layout.byte_mask, 63);
        assert_eq!(layout.line_mask, 63);
    }

    #[test]
    fn fully_associative_uses_set_zero() {
        let layout = AddressLayout::new(64, 1);
        assert_eq!(layout.set::<u64>(0xdead_beef), 0);
        assert_eq!(layout.tag_shift, layout.line_shift);
    }

    #[test]
    fn round_trip_line_address() {
        let layout = AddressLayout::new(64, 64);
        let addr: u64 = 0x1_2345_6780;
        let set = layout.set(addr);
        let tag = layout.tag(addr);
        let reconstructed: u64 = layout.line_address(tag, set);
        assert_eq!(reconstructed, addr & !layout.byte_mask);
    }
}
