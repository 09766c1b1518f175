//! Hypervector layer.
//!
//! Facts, atoms and graph results are all fixed-dimension hypervectors. The
//! knowledge base only relies on the contract in [`ops::VsaOps`] (bind,
//! bundle, similarity, positional encoding, top-k search), so the packed
//! dense-binary strategy here can be swapped without touching the store.
//!
//! - [`HyperVec`]: packed bits plus their dimension and strategy
//! - [`ops::VsaOps`]: the algebra over one dimension/strategy pair
//! - [`vocabulary::Vocabulary`]: deterministic atom-name cache

pub mod ops;
pub mod vocabulary;

use serde::{Deserialize, Serialize};

/// Number of bits in every vector of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension(pub usize);

impl Dimension {
    pub const DEFAULT: Self = Self(10_000);

    /// Used by tests and benches.
    pub const TEST: Self = Self(1_024);

    /// Bytes in a packed vector of this many bits.
    pub fn packed_len(self) -> usize {
        self.0.div_ceil(8)
    }
}

/// Vector strategy. Only one ships; the config field keeps room for more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// Bind is XOR, bundle is majority vote, similarity is 1 - Hamming/dim.
    #[default]
    DenseBinary,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::DenseBinary => "dense-binary",
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `dim` bits packed little-endian within each byte: bit `i` lives in byte
/// `i / 8` at position `i % 8`. Trailing bits of the last byte are zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperVec {
    bits: Vec<u8>,
    dim: Dimension,
    encoding: Encoding,
}

impl HyperVec {
    /// Wrap already-packed bytes. `bytes.len()` must equal `dim.packed_len()`.
    pub fn from_bytes(bytes: Vec<u8>, dim: Dimension, encoding: Encoding) -> Self {
        debug_assert_eq!(bytes.len(), dim.packed_len());
        Self {
            bits: bytes,
            dim,
            encoding,
        }
    }

    pub fn zero(dim: Dimension, encoding: Encoding) -> Self {
        Self::from_bytes(vec![0; dim.packed_len()], dim, encoding)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn dim(&self) -> Dimension {
        self.dim
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// True for the all-zero vector `induce` binds when nothing is shared.
    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Number of set bits.
    pub fn ones(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    pub fn bit(&self, index: usize) -> bool {
        debug_assert!(index < self.dim.0);
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn assign_bit(&mut self, index: usize, on: bool) {
        debug_assert!(index < self.dim.0);
        let mask = 1 << (index % 8);
        let byte = &mut self.bits[index / 8];
        *byte = if on { *byte | mask } else { *byte & !mask };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_length_rounds_up() {
        assert_eq!(Dimension(1).packed_len(), 1);
        assert_eq!(Dimension(17).packed_len(), 3);
        assert_eq!(Dimension::DEFAULT.packed_len(), 1250);
    }

    #[test]
    fn bits_round_trip_through_packing() {
        let mut v = HyperVec::zero(Dimension(20), Encoding::DenseBinary);
        assert!(v.is_zero());
        v.assign_bit(3, true);
        v.assign_bit(19, true);
        assert_eq!(v.bytes(), &[0b0000_1000, 0, 0b0000_1000]);
        assert_eq!(v.ones(), 2);
        v.assign_bit(3, false);
        assert!(!v.bit(3) && v.bit(19));
    }

    #[test]
    fn encoding_names_match_config_spelling() {
        let parsed: Encoding = toml::from_str::<std::collections::BTreeMap<String, Encoding>>(
            "encoding = \"dense-binary\"",
        )
        .unwrap()["encoding"];
        assert_eq!(parsed, Encoding::DenseBinary);
        assert_eq!(parsed.to_string(), "dense-binary");
    }
}
