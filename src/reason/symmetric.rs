//! Symmetric relations: `op(a, b)` ⊢ `op(b, a)`.

use crate::proof::{Proof, ProofMethod, ProofStep};

use super::{Goal, ProofContext, ProofEngine, ReasonResult, RelationReasoner};

/// Confidence multiplier applied when a reversed proof is flipped.
pub const SYMMETRIC_DECAY: f64 = 0.95;

#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricReasoner;

impl SymmetricReasoner {
    /// `op(a, a)` is trivially true. Otherwise use the stored reverse fact or
    /// prove the reversed goal through the engine. The guard covers the
    /// unordered pair, so the reversed goal skips this step instead of
    /// coming back to it; that return is not a cycle in the data.
    pub fn try_symmetric(
        &self,
        engine: &ProofEngine<'_>,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        ctx.check_timeout()?;
        if goal.subject == goal.object {
            return Ok(Some(Proof::success(
                ProofMethod::SymmetricReflexive,
                1.0,
                vec![ProofStep::new("symmetric_reflexive", goal.to_string(), None)],
            )));
        }
        let (lo, hi) = if goal.subject <= goal.object {
            (&goal.subject, &goal.object)
        } else {
            (&goal.object, &goal.subject)
        };
        let key = format!("sym:{}:{lo}:{hi}", goal.operator);
        if ctx.is_held(&key) {
            return Ok(None);
        }
        if !ctx.enter(depth) {
            return Ok(None);
        }
        let Some(mut guard) = ctx.guard(key) else {
            return Ok(None);
        };

        let reversed = goal.reversed();
        if let Some(fact) = engine
            .store()
            .find_binary(&reversed.operator, &reversed.subject, &reversed.object)
        {
            return Ok(Some(Proof::success(
                ProofMethod::SymmetricDirect,
                1.0,
                vec![ProofStep::new("symmetric_flip", reversed.to_string(), Some(fact.id))],
            )));
        }

        if let Some(child) = engine.prove_goal(&reversed, depth + 1, &mut guard)? {
            let mut steps = child.steps;
            steps.push(ProofStep::new("symmetric_flip", goal.to_string(), None));
            return Ok(Some(Proof::success(
                ProofMethod::SymmetricChain,
                child.confidence * SYMMETRIC_DECAY,
                steps,
            )));
        }
        Ok(None)
    }
}

impl RelationReasoner for SymmetricReasoner {
    fn name(&self) -> &'static str {
        "symmetric"
    }

    fn applies(&self, engine: &ProofEngine<'_>, goal: &Goal) -> bool {
        engine.semantic().is_symmetric(&goal.operator)
    }

    fn try_prove(
        &self,
        engine: &ProofEngine<'_>,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        self.try_symmetric(engine, goal, depth, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProofLimits;
    use crate::kb::{FactKind, FactMetadata, FactStore};
    use crate::semantic::{DeclSource, PropertyKind, SemanticIndex};
    use crate::vsa::{Dimension, Encoding, HyperVec};

    fn fixture() -> (FactStore, SemanticIndex) {
        let mut store = FactStore::new();
        let mut push = |op: &str, a: &str, b: &str| {
            store.push(
                HyperVec::zero(Dimension(8), Encoding::DenseBinary),
                None,
                FactMetadata::new(op, vec![a.into(), b.into()]),
                FactKind::Truth,
            );
        };
        push("marriedTo", "Ann", "Bob");
        push("near", "X", "Y");
        push("near", "Y", "Z");
        let mut semantic = SemanticIndex::new();
        semantic.declare(PropertyKind::Symmetric, "marriedTo", DeclSource::default());
        semantic.declare(PropertyKind::Symmetric, "near", DeclSource::default());
        semantic.declare(PropertyKind::Transitive, "near", DeclSource::default());
        (store, semantic)
    }

    fn run(goal: Goal) -> (Option<Proof>, ProofContext) {
        let (store, semantic) = fixture();
        let limits = ProofLimits::default();
        let engine = ProofEngine::new(&store, &semantic, &[], &limits, 8);
        let mut ctx = ProofContext::new(ProofLimits::default());
        let proof = SymmetricReasoner.try_symmetric(&engine, &goal, 0, &mut ctx).unwrap();
        (proof, ctx)
    }

    #[test]
    fn reflexive_shortcut_takes_no_guard() {
        let (proof, ctx) = run(Goal::new("marriedTo", "Ann", "Ann"));
        assert_eq!(proof.unwrap().method, Some(ProofMethod::SymmetricReflexive));
        assert_eq!(ctx.guards_taken(), 0);
    }

    #[test]
    fn reverse_fact_is_direct() {
        let (proof, ctx) = run(Goal::new("marriedTo", "Bob", "Ann"));
        let proof = proof.unwrap();
        assert_eq!(proof.method, Some(ProofMethod::SymmetricDirect));
        assert_eq!(proof.confidence, 1.0);
        assert_eq!(ctx.held_count(), 0);
    }

    #[test]
    fn reversed_goal_is_proved_and_flipped() {
        let (proof, _) = run(Goal::new("near", "Z", "X"));
        let proof = proof.unwrap();
        assert_eq!(proof.method, Some(ProofMethod::SymmetricChain));
        assert!(proof.confidence < 1.0);
        assert_eq!(proof.steps.last().unwrap().fact, "near Z X");
    }

    #[test]
    fn unrelated_pair_fails() {
        let (proof, ctx) = run(Goal::new("marriedTo", "Ann", "Carl"));
        assert!(proof.is_none());
        assert_eq!(ctx.held_count(), 0);
        assert_eq!(ctx.failure_reason(), "No proof found");
    }
}
