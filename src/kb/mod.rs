//! Fact store: immutable facts, exact-match indices and the component KB.
//!
//! - [`Fact`]: one stored assertion with its vector and canonical metadata
//! - [`index::FactIndex`]: by-operator / by-binary / by-n-ary lookups
//! - [`component::ComponentKb`]: edge lists and alias closure for reasoning
//! - [`store::FactStore`]: the append-only log the indices are derived from

pub mod component;
pub mod index;
pub mod store;

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::dsl::SourceLoc;
use crate::vsa::HyperVec;

pub use store::FactStore;

/// Unique, monotonically increasing fact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FactId(NonZeroU64);

impl FactId {
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(FactId)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact:{}", self.0)
    }
}

/// Provenance partition of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactKind {
    /// Asserted by the user or derived at runtime.
    Truth,
    /// Loaded from a theory pack.
    Theory,
}

/// Structured description of a fact.
///
/// `Not` facts always carry `inner_operator`/`inner_args`, and their `args`
/// are `[inner_operator, inner_args...]`. `Implies`/`And`/`Or` keep their
/// sub-formulas in `parts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactMetadata {
    pub operator: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<FactMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLoc>,
}

impl FactMetadata {
    pub fn new(operator: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            operator: operator.into(),
            args,
            inner_operator: None,
            inner_args: None,
            parts: Vec::new(),
            source: None,
        }
    }

    /// Negation of `inner`, normalized to the flat `Not op args...` shape.
    pub fn negation(inner_operator: &str, inner_args: Vec<String>) -> Self {
        let mut args = Vec::with_capacity(inner_args.len() + 1);
        args.push(inner_operator.to_string());
        args.extend(inner_args.iter().cloned());
        Self {
            operator: "Not".into(),
            args,
            inner_operator: Some(inner_operator.to_string()),
            inner_args: Some(inner_args),
            parts: Vec::new(),
            source: None,
        }
    }

    /// Negation of an arbitrary metadata value. Formula operands keep their
    /// structure in `parts`; atomic ones are flattened.
    pub fn negation_of(inner: FactMetadata) -> Self {
        let mut out = Self::negation(&inner.operator, inner.args.clone());
        if !inner.parts.is_empty() {
            out.parts = vec![inner];
        }
        out
    }

    /// A structural formula (`Implies`, `And`, `Or`) over sub-formulas.
    pub fn formula(operator: &str, parts: Vec<FactMetadata>) -> Self {
        Self {
            operator: operator.to_string(),
            args: parts.iter().map(|p| format!("({p})")).collect(),
            inner_operator: None,
            inner_args: None,
            parts,
            source: None,
        }
    }

    pub fn with_source(mut self, source: SourceLoc) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_negation(&self) -> bool {
        self.operator == "Not"
    }

    /// `(subject, object)` of a two-argument fact.
    pub fn binary(&self) -> Option<(&str, &str)> {
        match self.args.as_slice() {
            [a, b] => Some((a.as_str(), b.as_str())),
            _ => None,
        }
    }

    /// True if no argument (recursively) is a `?hole`.
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(|a| !a.starts_with('?'))
            && self.parts.iter().all(FactMetadata::is_ground)
    }
}

impl fmt::Display for FactMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// One stored assertion. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub vector: HyperVec,
    pub name: Option<String>,
    pub metadata: FactMetadata,
    pub kind: FactKind,
}

impl Fact {
    pub fn operator(&self) -> &str {
        &self.metadata.operator
    }

    pub fn args(&self) -> &[String] {
        &self.metadata.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_id_rejects_zero() {
        assert!(FactId::new(0).is_none());
        assert_eq!(FactId::new(7).map(FactId::get), Some(7));
        assert_eq!(FactId::new(3).unwrap().to_string(), "fact:3");
    }

    #[test]
    fn negation_is_flat() {
        let neg = FactMetadata::negation("hasProperty", vec!["Penguin".into(), "CanFly".into()]);
        assert_eq!(neg.args, vec!["hasProperty", "Penguin", "CanFly"]);
        assert_eq!(neg.inner_operator.as_deref(), Some("hasProperty"));
        assert_eq!(neg.to_string(), "Not hasProperty Penguin CanFly");
        assert!(neg.is_negation());
    }

    #[test]
    fn formula_renders_parts() {
        let p = FactMetadata::new("isA", vec!["?x".into(), "Dog".into()]);
        let c = FactMetadata::new("isA", vec!["?x".into(), "Animal".into()]);
        let rule = FactMetadata::formula("Implies", vec![p, c]);
        assert_eq!(rule.to_string(), "Implies (isA ?x Dog) (isA ?x Animal)");
        assert!(!rule.is_ground());
        assert!(rule.binary().is_some());
    }
}
