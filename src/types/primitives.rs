//! Newtype primitives used across the local chain state and the Event Store.
//!
//! Addresses, hashes, blooms, and big integers are represented with
//! `alloy_primitives` types directly rather than bespoke wrappers: they
//! already round-trip losslessly through decimal/hex strings, which is the
//! property the persisted schema needs for values that exceed `i64::MAX`.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use alloy::primitives::{Address, B256, Bloom, U256};

/// A block height.
///
/// Thin wrapper over `u64` so call sites read `BlockNumber` instead of a bare
/// integer at API boundaries, and so `next`/`prev` saturate instead of
/// silently wrapping at the chain tip or at genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Construct from a raw height.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw `u64` height.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The next height, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The previous height, saturating at `0`.
    #[must_use]
    pub const fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// `self - count`, saturating at `0`.
    #[must_use]
    pub const fn saturating_sub(self, count: u64) -> Self {
        Self(self.0.saturating_sub(count))
    }

    /// `self + count`, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, count: u64) -> Self {
        Self(self.0.saturating_add(count))
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<BlockNumber> for u64 {
    fn from(value: BlockNumber) -> Self {
        value.0
    }
}

impl From<BlockNumber> for i64 {
    fn from(value: BlockNumber) -> Self {
        // Block heights stay far below i64::MAX for the lifetime of any real chain.
        value.0 as i64
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_and_prev_saturate() {
        assert_eq!(BlockNumber::new(0).prev(), BlockNumber::new(0));
        assert_eq!(BlockNumber::new(5).next(), BlockNumber::new(6));
        assert_eq!(BlockNumber::new(u64::MAX).next(), BlockNumber::new(u64::MAX));
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(BlockNumber::new(10) < BlockNumber::new(11));
    }

    #[test]
    fn conversions_round_trip() {
        let n: BlockNumber = 42u64.into();
        let back: u64 = n.into();
        assert_eq!(back, 42);
    }
}
