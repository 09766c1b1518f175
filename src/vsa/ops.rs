//! VSA operations: bind, bundle, permute, positional encoding, similarity.
//!
//! These are the algebraic operations the knowledge base drives. For the
//! dense-binary strategy `bind` is XOR and therefore its own inverse:
//! `bind(bind(a, b), b) == a`.

use serde::{Deserialize, Serialize};

use crate::error::VsaError;

use super::{Dimension, Encoding, HyperVec};

/// Result type for VSA operations.
pub type VsaResult<T> = std::result::Result<T, VsaError>;

/// A named candidate scored against a query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub name: String,
    pub similarity: f32,
}

fn check_compatible(a: &HyperVec, b: &HyperVec) -> VsaResult<()> {
    if a.dim() != b.dim() {
        return Err(VsaError::DimensionMismatch {
            expected: a.dim().0,
            actual: b.dim().0,
        });
    }
    Ok(())
}

/// VSA operations for one dimension/encoding pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsaOps {
    dim: Dimension,
    encoding: Encoding,
}

impl VsaOps {
    /// Create VSA operations with the given dimension and encoding.
    pub fn new(dim: Dimension, encoding: Encoding) -> Self {
        Self { dim, encoding }
    }

    /// The dimension these ops work with.
    pub fn dim(&self) -> Dimension {
        self.dim
    }

    /// The encoding these ops work with.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Generate a random hypervector using the given RNG.
    pub fn random(&self, rng: &mut impl rand::Rng) -> HyperVec {
        let mut data = vec![0u8; self.dim.packed_len()];
        rng.fill_bytes(&mut data);
        // Mask out unused trailing bits
        let used_bits = self.dim.0 % 8;
        if used_bits != 0 {
            if let Some(last) = data.last_mut() {
                *last &= (1u8 << used_bits) - 1;
            }
        }
        HyperVec::from_bytes(data, self.dim, self.encoding)
    }

    /// Bind two hypervectors (XOR).
    ///
    /// The result is dissimilar to both inputs; it is the role-filler pairing
    /// of the algebra.
    pub fn bind(&self, a: &HyperVec, b: &HyperVec) -> VsaResult<HyperVec> {
        check_compatible(a, b)?;
        let out = a
            .bytes()
            .iter()
            .zip(b.bytes())
            .map(|(&x, &y)| x ^ y)
            .collect();
        Ok(HyperVec::from_bytes(out, a.dim(), a.encoding()))
    }

    /// Unbind (same as bind for XOR).
    pub fn unbind(&self, bound: &HyperVec, key: &HyperVec) -> VsaResult<HyperVec> {
        self.bind(bound, key)
    }

    /// Flip every bit. Similarity to the input becomes `1 - s`.
    pub fn complement(&self, v: &HyperVec) -> HyperVec {
        let mut out: Vec<u8> = v.bytes().iter().map(|b| !b).collect();
        let spare = (out.len() * 8).saturating_sub(v.dim().0);
        if spare > 0 {
            if let Some(last) = out.last_mut() {
                *last &= 0xFF >> spare;
            }
        }
        HyperVec::from_bytes(out, v.dim(), v.encoding())
    }

    /// Bundle hypervectors by majority vote.
    ///
    /// Ties are broken by bit-position parity so the result is deterministic
    /// and independent of input order.
    pub fn bundle(&self, vectors: &[&HyperVec]) -> VsaResult<HyperVec> {
        let first = vectors.first().ok_or(VsaError::EmptyBundle)?;
        if vectors.len() == 1 {
            return Ok((*first).clone());
        }
        let dim = first.dim();
        for v in &vectors[1..] {
            check_compatible(first, v)?;
        }

        let mut acc = vec![0i32; dim.0];
        for v in vectors {
            for (i, slot) in acc.iter_mut().enumerate() {
                *slot += if v.bit(i) { 1 } else { -1 };
            }
        }

        let mut result = HyperVec::zero(dim, first.encoding());
        for (i, &count) in acc.iter().enumerate() {
            result.assign_bit(i, count > 0 || (count == 0 && i % 2 == 0));
        }
        Ok(result)
    }

    /// Circularly shift a hypervector by `shift` bit positions.
    pub fn permute(&self, v: &HyperVec, shift: usize) -> HyperVec {
        let n = v.dim().0;
        let mut out = HyperVec::zero(v.dim(), v.encoding());
        if n == 0 {
            return out;
        }
        let shift = shift % n;
        for i in 0..n {
            if v.bit(i) {
                out.assign_bit((i + shift) % n, true);
            }
        }
        out
    }

    /// Tag a vector with argument position `n`.
    pub fn with_position(&self, n: usize, v: &HyperVec) -> HyperVec {
        self.permute(v, n)
    }

    /// Exact inverse of [`Self::with_position`].
    pub fn remove_position(&self, n: usize, v: &HyperVec) -> HyperVec {
        let dim = v.dim().0;
        if dim == 0 {
            return v.clone();
        }
        self.permute(v, dim - (n % dim))
    }

    /// Normalized Hamming similarity in `[0.0, 1.0]`; 0.5 means uncorrelated.
    pub fn similarity(&self, a: &HyperVec, b: &HyperVec) -> VsaResult<f32> {
        check_compatible(a, b)?;
        if a.dim().0 == 0 {
            return Ok(1.0);
        }
        let hamming: u32 = a
            .bytes()
            .iter()
            .zip(b.bytes())
            .map(|(&x, &y)| (x ^ y).count_ones())
            .sum();
        Ok(1.0 - (hamming as f32 / a.dim().0 as f32))
    }

    /// Score every candidate against `query` and return the best `k`,
    /// sorted by descending similarity (ties keep candidate order).
    pub fn top_k_similar<'a, I>(&self, query: &HyperVec, candidates: I, k: usize) -> VsaResult<Vec<SimilarityHit>>
    where
        I: IntoIterator<Item = (&'a str, &'a HyperVec)>,
    {
        let mut hits = Vec::new();
        for (name, vec) in candidates {
            hits.push(SimilarityHit {
                name: name.to_string(),
                similarity: self.similarity(query, vec)?,
            });
        }
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }

    /// Serialize a vector to bytes (bincode).
    pub fn serialize(&self, v: &HyperVec) -> VsaResult<Vec<u8>> {
        bincode::serialize(v).map_err(|e| VsaError::Serialization {
            message: e.to_string(),
        })
    }

    /// Deserialize a vector produced by [`Self::serialize`], checking its dimension.
    pub fn deserialize(&self, bytes: &[u8]) -> VsaResult<HyperVec> {
        let v: HyperVec = bincode::deserialize(bytes).map_err(|e| VsaError::Serialization {
            message: e.to_string(),
        })?;
        if v.dim() != self.dim || v.bytes().len() != self.dim.packed_len() {
            return Err(VsaError::DimensionMismatch {
                expected: self.dim.0,
                actual: v.dim().0,
            });
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_ops() -> VsaOps {
        VsaOps::new(Dimension::TEST, Encoding::DenseBinary)
    }

    fn seeded_rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    #[test]
    fn random_vectors_are_roughly_uncorrelated() {
        let ops = test_ops();
        let mut rng = seeded_rng();
        let a = ops.random(&mut rng);
        let b = ops.random(&mut rng);
        let sim = ops.similarity(&a, &b).unwrap();
        assert!(sim > 0.4 && sim < 0.6, "similarity was {sim}, expected ~0.5");
    }

    #[test]
    fn self_similarity_is_one() {
        let ops = test_ops();
        let a = ops.random(&mut seeded_rng());
        assert!((ops.similarity(&a, &a).unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn bind_is_its_own_inverse() {
        let ops = test_ops();
        let mut rng = seeded_rng();
        let a = ops.random(&mut rng);
        let b = ops.random(&mut rng);
        let bound = ops.bind(&a, &b).unwrap();
        assert_eq!(ops.unbind(&bound, &b).unwrap(), a);
    }

    #[test]
    fn bundle_is_similar_to_inputs_and_order_independent() {
        let ops = test_ops();
        let mut rng = seeded_rng();
        let a = ops.random(&mut rng);
        let b = ops.random(&mut rng);
        let c = ops.random(&mut rng);
        let abc = ops.bundle(&[&a, &b, &c]).unwrap();
        let cba = ops.bundle(&[&c, &b, &a]).unwrap();
        assert_eq!(abc, cba);
        for v in [&a, &b, &c] {
            let sim = ops.similarity(&abc, v).unwrap();
            assert!(sim > 0.55, "sim={sim}");
        }
    }

    #[test]
    fn bundle_empty_is_error() {
        assert!(matches!(test_ops().bundle(&[]), Err(VsaError::EmptyBundle)));
    }

    #[test]
    fn position_roundtrip_is_exact() {
        let ops = test_ops();
        let a = ops.random(&mut seeded_rng());
        let placed = ops.with_position(3, &a);
        let sim = ops.similarity(&a, &placed).unwrap();
        assert!(sim > 0.4 && sim < 0.6, "sim={sim}");
        assert_eq!(ops.remove_position(3, &placed), a);
    }

    #[test]
    fn top_k_sorts_descending() {
        let ops = test_ops();
        let mut rng = seeded_rng();
        let a = ops.random(&mut rng);
        let b = ops.random(&mut rng);
        let noisy_a = ops.bundle(&[&a, &a, &b]).unwrap();
        let hits = ops
            .top_k_similar(&noisy_a, [("a", &a), ("b", &b)], 1)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a");
    }

    #[test]
    fn serialize_roundtrip_checks_dimension() {
        let ops = test_ops();
        let a = ops.random(&mut seeded_rng());
        let bytes = ops.serialize(&a).unwrap();
        assert_eq!(ops.deserialize(&bytes).unwrap(), a);

        let other = VsaOps::new(Dimension(64), Encoding::DenseBinary);
        assert!(matches!(
            other.deserialize(&bytes),
            Err(VsaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_detected() {
        let ops = test_ops();
        let a = HyperVec::zero(Dimension(64), Encoding::DenseBinary);
        let b = HyperVec::zero(Dimension(128), Encoding::DenseBinary);
        assert!(matches!(ops.bind(&a, &b), Err(VsaError::DimensionMismatch { .. })));
    }

    #[test]
    fn complement_inverts_similarity() {
        let ops = VsaOps::new(Dimension(100), Encoding::DenseBinary);
        let a = ops.random(&mut seeded_rng());
        let not_a = ops.complement(&a);
        assert_eq!(ops.similarity(&a, &not_a).unwrap(), 0.0);
        assert_eq!(ops.complement(&not_a), a);
    }
}
