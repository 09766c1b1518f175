//! Proof records shared by the reasoners and the contradiction engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kb::FactId;

/// How a goal was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofMethod {
    Direct,
    Reflexive,
    SymmetricReflexive,
    SymmetricDirect,
    SymmetricChain,
    TransitiveDirect,
    TransitiveChain,
    Inverse,
    Inheritance,
    Rule,
}

impl ProofMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ProofMethod::Direct => "direct",
            ProofMethod::Reflexive => "reflexive",
            ProofMethod::SymmetricReflexive => "symmetric_reflexive",
            ProofMethod::SymmetricDirect => "symmetric_direct",
            ProofMethod::SymmetricChain => "symmetric_chain",
            ProofMethod::TransitiveDirect => "transitive_direct",
            ProofMethod::TransitiveChain => "transitive_chain",
            ProofMethod::Inverse => "inverse",
            ProofMethod::Inheritance => "inheritance",
            ProofMethod::Rule => "rule",
        }
    }
}

impl fmt::Display for ProofMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One justification step: a stored or derived fact and how it was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub operation: String,
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<FactId>,
}

impl ProofStep {
    pub fn new(operation: &str, fact: impl Into<String>, fact_id: Option<FactId>) -> Self {
        Self {
            operation: operation.to_string(),
            fact: fact.into(),
            fact_id,
        }
    }
}

/// Audit structure attached to contradictions and proofs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofObject {
    pub goal: String,
    pub valid: bool,
    pub method: Option<ProofMethod>,
    pub steps: Vec<ProofStep>,
}

/// Outcome of a proof attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub valid: bool,
    pub method: Option<ProofMethod>,
    pub confidence: f64,
    pub steps: Vec<ProofStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Proof {
    pub fn success(method: ProofMethod, confidence: f64, steps: Vec<ProofStep>) -> Self {
        Self {
            valid: true,
            method: Some(method),
            confidence,
            steps,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            method: None,
            confidence: 0.0,
            steps: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn to_object(&self, goal: &str) -> ProofObject {
        ProofObject {
            goal: goal.to_string(),
            valid: self.valid,
            method: self.method,
            steps: self.steps.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_match_serde() {
        let json = serde_json::to_string(&ProofMethod::TransitiveChain).unwrap();
        assert_eq!(json, "\"transitive_chain\"");
        assert_eq!(ProofMethod::SymmetricReflexive.to_string(), "symmetric_reflexive");
    }

    #[test]
    fn failure_has_reason() {
        let p = Proof::failure("Cycle detected");
        assert!(!p.valid);
        assert_eq!(p.reason.as_deref(), Some("Cycle detected"));
        assert!(p.to_object("isA a c").steps.is_empty());
    }
}
