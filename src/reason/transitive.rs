//! Transitive chaining: `op(a, b)`, `op(b, c)` ⊢ `op(a, c)`.

use crate::proof::{Proof, ProofMethod, ProofStep};

use super::{Goal, ProofContext, ProofEngine, RESERVED_WORDS, ReasonResult, RelationReasoner};

/// Confidence multiplier per chained hop.
pub const TRANSITIVE_DECAY: f64 = 0.98;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitiveReasoner;

impl TransitiveReasoner {
    /// Prove `goal` by walking `op` edges from the subject.
    ///
    /// Succeeds with `transitive_direct` when the object is a one-hop
    /// neighbour, else recurses through each neighbour holding the guard
    /// `op:from:to` for the duration of the sub-proof.
    pub fn try_transitive_chain(
        &self,
        engine: &ProofEngine<'_>,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        ctx.check_timeout()?;
        if !ctx.enter(depth) {
            return Ok(None);
        }
        let op = goal.operator.as_str();
        let key = format!("{op}:{}:{}", goal.subject, goal.object);
        let Some(mut guard) = ctx.guard(key) else {
            return Ok(None);
        };

        let store = engine.store();
        let neighbours: Vec<&String> = store
            .component()
            .edges_from(op, &goal.subject)
            .iter()
            .filter(|n| {
                !RESERVED_WORDS.contains(&n.as_str()) && **n != goal.subject && n.as_str() != op
            })
            .collect();

        if neighbours.iter().any(|n| **n == goal.object) {
            let id = store.find_binary(op, &goal.subject, &goal.object).map(|f| f.id);
            return Ok(Some(Proof::success(
                ProofMethod::TransitiveDirect,
                1.0,
                vec![ProofStep::new("transitive_hop", goal.to_string(), id)],
            )));
        }

        for next in neighbours {
            let sub = Goal::new(op, next, &goal.object);
            if let Some(child) = self.try_transitive_chain(engine, &sub, depth + 1, &mut guard)? {
                let id = store.find_binary(op, &goal.subject, next).map(|f| f.id);
                let mut steps = vec![ProofStep::new(
                    "transitive_hop",
                    format!("{op} {} {next}", goal.subject),
                    id,
                )];
                steps.extend(child.steps);
                return Ok(Some(Proof::success(
                    ProofMethod::TransitiveChain,
                    child.confidence * TRANSITIVE_DECAY,
                    steps,
                )));
            }
        }
        Ok(None)
    }
}

impl RelationReasoner for TransitiveReasoner {
    fn name(&self) -> &'static str {
        "transitive"
    }

    fn applies(&self, engine: &ProofEngine<'_>, goal: &Goal) -> bool {
        engine.semantic().is_transitive(&goal.operator)
    }

    fn try_prove(
        &self,
        engine: &ProofEngine<'_>,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        self.try_transitive_chain(engine, goal, depth, ctx)
    }
}
