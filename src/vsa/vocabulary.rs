//! Vocabulary: deterministic name → hypervector cache with reverse lookup.
//!
//! The same name always maps to the same vector for a given dimension, so two
//! sessions created with the same configuration agree on every atom.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use rand::SeedableRng;

use super::HyperVec;
use super::ops::{SimilarityHit, VsaOps, VsaResult};

/// Derive a stable seed from a name.
///
/// The high bit is forced so name seeds never collide with the small seeds
/// used by tests and benches.
fn seed_for_name(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() | (1u64 << 63)
}

/// Encode a single name into a hypervector.
pub fn encode_name(ops: &VsaOps, name: &str) -> HyperVec {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed_for_name(name));
    ops.random(&mut rng)
}

/// Name ↔ vector registry owned by a session.
///
/// Cloning produces an independent copy; checkpoints rely on this.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ops: VsaOps,
    atoms: BTreeMap<String, HyperVec>,
    reverse: HashMap<HyperVec, String>,
}

impl Vocabulary {
    pub fn new(ops: VsaOps) -> Self {
        Self {
            ops,
            atoms: BTreeMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// The ops this vocabulary encodes with.
    pub fn ops(&self) -> &VsaOps {
        &self.ops
    }

    /// Get the vector for `name`, creating it on first access.
    pub fn get_or_create(&mut self, name: &str) -> HyperVec {
        if let Some(v) = self.atoms.get(name) {
            return v.clone();
        }
        let v = encode_name(&self.ops, name);
        self.atoms.insert(name.to_string(), v.clone());
        self.reverse.entry(v.clone()).or_insert_with(|| name.to_string());
        v
    }

    /// Register an explicit vector under `name` (replacing any previous one).
    pub fn insert(&mut self, name: &str, vector: HyperVec) {
        if let Some(old) = self.atoms.insert(name.to_string(), vector.clone()) {
            if self.reverse.get(&old).is_some_and(|n| n == name) {
                self.reverse.remove(&old);
            }
        }
        self.reverse.insert(vector, name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&HyperVec> {
        self.atoms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.atoms.contains_key(name)
    }

    /// Exact reverse lookup.
    pub fn name_of(&self, vector: &HyperVec) -> Option<&str> {
        self.reverse.get(vector).map(String::as_str)
    }

    /// All atom names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.atoms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The `k` atoms most similar to `query`.
    pub fn nearest(&self, query: &HyperVec, k: usize) -> VsaResult<Vec<SimilarityHit>> {
        self.ops.top_k_similar(
            query,
            self.atoms.iter().map(|(n, v)| (n.as_str(), v)),
            k,
        )
    }
}
