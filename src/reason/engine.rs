//! The backward-chaining proof engine.
//!
//! Strategy order for a binary goal: direct fact, reflexive, symmetric,
//! transitive, inverse relation, `isA` inheritance, then `Implies` rules.
//! The first strategy to succeed wins.

use tracing::debug;

use crate::config::ProofLimits;
use crate::contradiction::IS_A;
use crate::kb::FactStore;
use crate::proof::{Proof, ProofMethod, ProofStep};
use crate::semantic::SemanticIndex;

use super::rules::{Rule, RuleReasoner};
use super::symmetric::SymmetricReasoner;
use super::transitive::TransitiveReasoner;
use super::{Goal, ProofContext, ReasonResult, RelationReasoner, inherited_value};

/// Confidence multiplier when a goal is proved through its inverse.
pub const INVERSE_DECAY: f64 = 0.98;

/// Confidence multiplier per `isA` hop of an inherited property.
pub const INHERITANCE_DECAY: f64 = 0.95;

/// Read-only proof engine over one session's store, index and rules.
#[derive(Debug, Clone, Copy)]
pub struct ProofEngine<'a> {
    store: &'a FactStore,
    semantic: &'a SemanticIndex,
    rules: &'a [Rule],
    limits: &'a ProofLimits,
    inheritance_max_depth: usize,
}

impl<'a> ProofEngine<'a> {
    pub fn new(
        store: &'a FactStore,
        semantic: &'a SemanticIndex,
        rules: &'a [Rule],
        limits: &'a ProofLimits,
        inheritance_max_depth: usize,
    ) -> Self {
        Self {
            store,
            semantic,
            rules,
            limits,
            inheritance_max_depth,
        }
    }

    pub fn store(&self) -> &'a FactStore {
        self.store
    }

    pub fn semantic(&self) -> &'a SemanticIndex {
        self.semantic
    }

    pub fn rules(&self) -> &'a [Rule] {
        self.rules
    }

    /// Prove a goal with a fresh context. Timeouts become failed proofs.
    pub fn prove(&self, goal: &Goal) -> Proof {
        if self
            .store
            .is_negated(&goal.operator, &[goal.subject.clone(), goal.object.clone()])
        {
            return Proof::failure("Explicitly negated");
        }
        let mut ctx = ProofContext::new(self.limits.clone());
        let proof = match self.prove_goal(goal, 0, &mut ctx) {
            Ok(Some(proof)) => proof,
            Ok(None) => Proof::failure(ctx.failure_reason()),
            Err(e) => Proof::failure(e.to_string()),
        };
        debug!(
            goal = %goal,
            valid = proof.valid,
            method = ?proof.method,
            steps = ctx.steps(),
            "proof attempt"
        );
        proof
    }

    /// Prove a fact of any arity. Non-binary facts are only checked directly.
    pub fn prove_fact(&self, operator: &str, args: &[String]) -> Proof {
        if let [s, o] = args {
            return self.prove(&Goal::new(operator, s, o));
        }
        if self.store.is_negated(operator, args) {
            return Proof::failure("Explicitly negated");
        }
        match self.store.find(operator, args) {
            Some(fact) => Proof::success(
                ProofMethod::Direct,
                1.0,
                vec![ProofStep::new("direct", fact.metadata.to_string(), Some(fact.id))],
            ),
            None => Proof::failure("No proof found"),
        }
    }

    /// One level of backward chaining. `Ok(None)` fails this branch only.
    pub fn prove_goal(
        &self,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        ctx.check_timeout()?;
        if !ctx.enter(depth) {
            return Ok(None);
        }

        if let Some(fact) = self.store.find_binary(&goal.operator, &goal.subject, &goal.object) {
            return Ok(Some(Proof::success(
                ProofMethod::Direct,
                1.0,
                vec![ProofStep::new("direct", goal.to_string(), Some(fact.id))],
            )));
        }

        if goal.subject == goal.object && self.semantic.is_reflexive(&goal.operator) {
            return Ok(Some(Proof::success(
                ProofMethod::Reflexive,
                1.0,
                vec![ProofStep::new("reflexive", goal.to_string(), None)],
            )));
        }

        let reasoners: [&dyn RelationReasoner; 2] = [&SymmetricReasoner, &TransitiveReasoner];
        for reasoner in reasoners {
            if reasoner.applies(self, goal) {
                if let Some(proof) = reasoner.try_prove(self, goal, depth, ctx)? {
                    return Ok(Some(proof));
                }
            }
        }

        if let Some(proof) = self.try_inverse(goal, depth, ctx)? {
            return Ok(Some(proof));
        }

        if let Some(proof) = self.try_inheritance(goal) {
            return Ok(Some(proof));
        }

        let rules = RuleReasoner;
        if rules.applies(self, goal) {
            return rules.try_prove(self, goal, depth, ctx);
        }
        Ok(None)
    }

    fn try_inverse(
        &self,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        let Some(inverse) = self.semantic.inverse_relation(&goal.operator) else {
            return Ok(None);
        };
        let flipped = Goal::new(inverse, &goal.object, &goal.subject);
        // One key for a goal and its flipped form: returning to it from the
        // flipped proof is a dead end, not a cycle in the data.
        let key = format!("inv:{}", goal.to_string().min(flipped.to_string()));
        if ctx.is_held(&key) {
            return Ok(None);
        }
        let Some(mut guard) = ctx.guard(key) else {
            return Ok(None);
        };
        if let Some(fact) = self.store.find_binary(inverse, &goal.object, &goal.subject) {
            return Ok(Some(Proof::success(
                ProofMethod::Inverse,
                1.0,
                vec![ProofStep::new("inverse", flipped.to_string(), Some(fact.id))],
            )));
        }
        Ok(self
            .prove_goal(&flipped, depth + 1, &mut guard)?
            .map(|child| {
                let mut steps = child.steps;
                steps.push(ProofStep::new("inverse", goal.to_string(), None));
                Proof::success(ProofMethod::Inverse, child.confidence * INVERSE_DECAY, steps)
            }))
    }

    fn try_inheritance(&self, goal: &Goal) -> Option<Proof> {
        if !self.semantic.is_inheritable_property(&goal.operator) {
            return None;
        }
        let found = inherited_value(
            self.store,
            &goal.operator,
            &goal.subject,
            &goal.object,
            self.inheritance_max_depth,
        )?;
        let mut steps: Vec<ProofStep> = found
            .chain
            .windows(2)
            .map(|pair| {
                let id = self.store.find_binary(IS_A, &pair[0], &pair[1]).map(|f| f.id);
                ProofStep::new("isA_hop", format!("{IS_A} {} {}", pair[0], pair[1]), id)
            })
            .collect();
        let owner = found.chain.last().map(String::as_str).unwrap_or(&goal.subject);
        steps.push(ProofStep::new(
            "inherited_property",
            format!("{} {owner} {}", goal.operator, goal.object),
            Some(found.fact_id),
        ));
        let hops = i32::try_from(found.chain.len().saturating_sub(1)).unwrap_or(i32::MAX);
        Some(Proof::success(
            ProofMethod::Inheritance,
            INHERITANCE_DECAY.powi(hops),
            steps,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{FactKind, FactMetadata};
    use crate::semantic::{DeclSource, PropertyKind};
    use crate::vsa::{Dimension, Encoding, HyperVec};

    fn push(store: &mut FactStore, meta: FactMetadata) {
        store.push(
            HyperVec::zero(Dimension(8), Encoding::DenseBinary),
            None,
            meta,
            FactKind::Truth,
        );
    }

    fn fact(op: &str, a: &str, b: &str) -> FactMetadata {
        FactMetadata::new(op, vec![a.into(), b.into()])
    }

    #[test]
    fn strategy_order_prefers_direct() {
        let mut store = FactStore::new();
        push(&mut store, fact("isA", "a", "b"));
        push(&mut store, fact("isA", "b", "c"));
        push(&mut store, fact("isA", "a", "c"));
        let mut semantic = SemanticIndex::new();
        semantic.declare(PropertyKind::Transitive, "isA", DeclSource::default());
        let limits = ProofLimits::default();
        let engine = ProofEngine::new(&store, &semantic, &[], &limits, 8);
        assert_eq!(engine.prove(&Goal::new("isA", "a", "c")).method, Some(ProofMethod::Direct));
    }

    #[test]
    fn inverse_relation() {
        let mut store = FactStore::new();
        push(&mut store, fact("parentOf", "Ann", "Bob"));
        let mut semantic = SemanticIndex::new();
        semantic.add_inverse("childOf", "parentOf", DeclSource::default());
        let limits = ProofLimits::default();
        let engine = ProofEngine::new(&store, &semantic, &[], &limits, 8);
        let proof = engine.prove(&Goal::new("childOf", "Bob", "Ann"));
        assert_eq!(proof.method, Some(ProofMethod::Inverse));
        let proof = engine.prove(&Goal::new("childOf", "Ann", "Bob"));
        assert!(!proof.valid);
        assert_eq!(proof.reason.as_deref(), Some("No proof found"));
    }

    #[test]
    fn inheritance_and_exception() {
        let mut store = FactStore::new();
        push(&mut store, fact("isA", "Tweety", "Bird"));
        push(&mut store, fact("isA", "Pingu", "Bird"));
        push(&mut store, fact("can", "Bird", "Fly"));
        push(&mut store, FactMetadata::negation("can", vec!["Pingu".into(), "Fly".into()]));
        let mut semantic = SemanticIndex::new();
        semantic.declare(PropertyKind::Inheritable, "can", DeclSource::default());
        let limits = ProofLimits::default();
        let engine = ProofEngine::new(&store, &semantic, &[], &limits, 8);

        let proof = engine.prove(&Goal::new("can", "Tweety", "Fly"));
        assert_eq!(proof.method, Some(ProofMethod::Inheritance));
        assert_eq!(proof.steps[0].fact, "isA Tweety Bird");

        let proof = engine.prove(&Goal::new("can", "Pingu", "Fly"));
        assert!(!proof.valid);
        assert_eq!(proof.reason.as_deref(), Some("Explicitly negated"));
    }

    #[test]
    fn timeout_is_a_failed_proof() {
        let mut store = FactStore::new();
        push(&mut store, fact("isA", "a", "b"));
        let mut semantic = SemanticIndex::new();
        semantic.declare(PropertyKind::Transitive, "isA", DeclSource::default());
        let limits = ProofLimits {
            timeout_ms: 0,
            ..ProofLimits::default()
        };
        let engine = ProofEngine::new(&store, &semantic, &[], &limits, 8);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let proof = engine.prove(&Goal::new("isA", "a", "z"));
        assert!(!proof.valid);
        assert!(proof.reason.unwrap().contains("timed out"));
    }

    #[test]
    fn nary_direct() {
        let mut store = FactStore::new();
        push(&mut store, FactMetadata::new("between", vec!["a".into(), "b".into(), "c".into()]));
        let semantic = SemanticIndex::new();
        let limits = ProofLimits::default();
        let engine = ProofEngine::new(&store, &semantic, &[], &limits, 8);
        let args: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert!(engine.prove_fact("between", &args).valid);
        assert!(!engine.prove_fact("between", &args[..1]).valid);
    }
}
