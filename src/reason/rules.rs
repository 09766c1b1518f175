//! `Implies` rules and backward chaining over them.
//!
//! A rule's conclusion is unified with the goal, then its premise is proved
//! with the resulting bindings. Unbound premise variables are enumerated from
//! stored facts; ground binary premises recurse into the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::kb::{FactId, FactMetadata};
use crate::proof::{Proof, ProofMethod, ProofStep};

use super::{Goal, ProofContext, ProofEngine, ReasonResult, RelationReasoner};

/// Confidence multiplier for one rule application.
pub const RULE_DECAY: f64 = 0.9;

/// Cap on premise solutions enumerated per rule application.
const MAX_BINDINGS: usize = 256;

pub type Bindings = HashMap<String, String>;

/// Premise/conclusion structure of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Formula {
    Atom { operator: String, args: Vec<String> },
    And { parts: Vec<Formula> },
    Or { parts: Vec<Formula> },
    Not { inner: Box<Formula> },
}

impl Formula {
    /// Read a formula from stored metadata. `ForAll`/`Exists` are not supported.
    pub fn from_metadata(meta: &FactMetadata) -> Option<Self> {
        match meta.operator.as_str() {
            "And" | "Or" => {
                let parts = meta
                    .parts
                    .iter()
                    .map(Formula::from_metadata)
                    .collect::<Option<Vec<_>>>()?;
                if parts.is_empty() {
                    return None;
                }
                Some(if meta.operator == "And" {
                    Formula::And { parts }
                } else {
                    Formula::Or { parts }
                })
            }
            "Not" => {
                let inner = match (meta.parts.first(), &meta.inner_operator, &meta.inner_args) {
                    (Some(part), _, _) => Formula::from_metadata(part)?,
                    (None, Some(op), Some(args)) => Formula::Atom {
                        operator: op.clone(),
                        args: args.clone(),
                    },
                    _ => return None,
                };
                Some(Formula::Not {
                    inner: Box::new(inner),
                })
            }
            "Implies" | "ForAll" | "Exists" => None,
            _ => Some(Formula::Atom {
                operator: meta.operator.clone(),
                args: meta.args.clone(),
            }),
        }
    }

    fn substitute_args(args: &[String], bindings: &Bindings) -> Vec<String> {
        args.iter()
            .map(|a| bindings.get(a).cloned().unwrap_or_else(|| a.clone()))
            .collect()
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::Atom { operator, args } => {
                write!(f, "{operator}")?;
                for a in args {
                    write!(f, " {a}")?;
                }
                Ok(())
            }
            Formula::And { parts } | Formula::Or { parts } => {
                let op = if matches!(self, Formula::And { .. }) { "And" } else { "Or" };
                write!(f, "{op}")?;
                for p in parts {
                    write!(f, " ({p})")?;
                }
                Ok(())
            }
            Formula::Not { inner } => write!(f, "Not ({inner})"),
        }
    }
}

fn is_var(token: &str) -> bool {
    token.starts_with('?')
}

/// A registered `Implies premise conclusion` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub premise: Formula,
    /// Always an atom.
    pub conclusion: Formula,
    pub fact_id: Option<FactId>,
    pub text: String,
}

impl Rule {
    /// Build from `Implies` metadata whose parts are `[premise, conclusion]`.
    pub fn from_metadata(meta: &FactMetadata, fact_id: Option<FactId>) -> Option<Self> {
        if meta.operator != "Implies" {
            return None;
        }
        let [premise, conclusion] = meta.parts.as_slice() else {
            return None;
        };
        let conclusion = Formula::from_metadata(conclusion)?;
        if !matches!(conclusion, Formula::Atom { .. }) {
            return None;
        }
        Some(Self {
            premise: Formula::from_metadata(premise)?,
            conclusion,
            fact_id,
            text: meta.to_string(),
        })
    }

    pub fn concludes(&self, operator: &str) -> bool {
        matches!(&self.conclusion, Formula::Atom { operator: op, .. } if op == operator)
    }

    /// Unify the conclusion with ground `args`.
    pub fn unify_conclusion(&self, args: &[String]) -> Option<Bindings> {
        let Formula::Atom { args: pattern, .. } = &self.conclusion else {
            return None;
        };
        unify(pattern, args, &Bindings::new())
    }
}

fn unify(pattern: &[String], ground: &[String], bindings: &Bindings) -> Option<Bindings> {
    if pattern.len() != ground.len() {
        return None;
    }
    let mut out = bindings.clone();
    for (p, g) in pattern.iter().zip(ground) {
        if is_var(p) {
            match out.get(p) {
                Some(bound) if bound != g => return None,
                Some(_) => {}
                None => {
                    out.insert(p.clone(), g.clone());
                }
            }
        } else if p != g {
            return None;
        }
    }
    Some(out)
}

/// One way the premise holds.
#[derive(Debug, Clone)]
struct Solution {
    bindings: Bindings,
    steps: Vec<ProofStep>,
    confidence: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleReasoner;

impl RuleReasoner {
    fn solve(
        &self,
        engine: &ProofEngine<'_>,
        formula: &Formula,
        seed: Solution,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Vec<Solution>> {
        ctx.check_timeout()?;
        match formula {
            Formula::Atom { operator, args } => self.solve_atom(engine, operator, args, seed, depth, ctx),
            Formula::And { parts } => {
                let mut frontier = vec![seed];
                for part in parts {
                    let mut next = Vec::new();
                    for partial in frontier {
                        next.extend(self.solve(engine, part, partial, depth, ctx)?);
                        if next.len() >= MAX_BINDINGS {
                            break;
                        }
                    }
                    if next.is_empty() {
                        return Ok(next);
                    }
                    frontier = next;
                }
                Ok(frontier)
            }
            Formula::Or { parts } => {
                let mut out = Vec::new();
                for part in parts {
                    out.extend(self.solve(engine, part, seed.clone(), depth, ctx)?);
                }
                Ok(out)
            }
            Formula::Not { inner } => {
                if let Formula::Atom { operator, args } = inner.as_ref() {
                    let ground = Formula::substitute_args(args, &seed.bindings);
                    if ground.iter().any(|a| is_var(a)) {
                        return Ok(Vec::new());
                    }
                    if engine.store().is_negated(operator, &ground) {
                        let mut sol = seed;
                        sol.steps.push(ProofStep::new(
                            "explicit_negation",
                            format!("Not {operator} {}", ground.join(" ")),
                            None,
                        ));
                        return Ok(vec![sol]);
                    }
                }
                let inner_holds = !self.solve(engine, inner, seed.clone(), depth, ctx)?.is_empty();
                if inner_holds {
                    Ok(Vec::new())
                } else {
                    let mut sol = seed;
                    sol.steps.push(ProofStep::new("negation_as_failure", format!("Not ({inner})"), None));
                    Ok(vec![sol])
                }
            }
        }
    }

    fn solve_atom(
        &self,
        engine: &ProofEngine<'_>,
        operator: &str,
        args: &[String],
        seed: Solution,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Vec<Solution>> {
        let ground = Formula::substitute_args(args, &seed.bindings);
        let store = engine.store();

        if ground.iter().all(|a| !is_var(a)) {
            if let [s, o] = ground.as_slice() {
                let goal = Goal::new(operator, s, o);
                return Ok(match engine.prove_goal(&goal, depth + 1, ctx)? {
                    Some(proof) => {
                        let mut sol = seed;
                        sol.steps.extend(proof.steps);
                        sol.confidence = sol.confidence.min(proof.confidence);
                        vec![sol]
                    }
                    None => Vec::new(),
                });
            }
            return Ok(match store.find(operator, &ground) {
                Some(fact) => {
                    let mut sol = seed;
                    sol.steps
                        .push(ProofStep::new("direct", fact.metadata.to_string(), Some(fact.id)));
                    vec![sol]
                }
                None => Vec::new(),
            });
        }

        let mut out = Vec::new();
        for fact in store.by_operator(operator) {
            if fact.metadata.is_negation() {
                continue;
            }
            if let Some(bindings) = unify(&ground, fact.args(), &seed.bindings) {
                let mut steps = seed.steps.clone();
                steps.push(ProofStep::new("direct", fact.metadata.to_string(), Some(fact.id)));
                out.push(Solution {
                    bindings,
                    steps,
                    confidence: seed.confidence,
                });
                if out.len() >= MAX_BINDINGS {
                    break;
                }
            }
        }
        Ok(out)
    }
}

impl RelationReasoner for RuleReasoner {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn applies(&self, engine: &ProofEngine<'_>, goal: &Goal) -> bool {
        engine.rules().iter().any(|r| r.concludes(&goal.operator))
    }

    fn try_prove(
        &self,
        engine: &ProofEngine<'_>,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>> {
        let args = [goal.subject.clone(), goal.object.clone()];
        for (i, rule) in engine.rules().iter().enumerate() {
            if !rule.concludes(&goal.operator) {
                continue;
            }
            let Some(bindings) = rule.unify_conclusion(&args) else {
                continue;
            };
            ctx.check_timeout()?;
            if !ctx.enter(depth) {
                return Ok(None);
            }
            let Some(mut guard) = ctx.guard(format!("rule:{i}:{goal}")) else {
                continue;
            };
            let seed = Solution {
                bindings,
                steps: Vec::new(),
                confidence: 1.0,
            };
            let solutions = self.solve(engine, &rule.premise, seed, depth, &mut guard)?;
            if let Some(best) = solutions.into_iter().next() {
                tracing::debug!(rule = %rule.text, goal = %goal, "rule applied");
                let mut steps = best.steps;
                steps.push(ProofStep::new("rule", rule.text.clone(), rule.fact_id));
                return Ok(Some(Proof::success(
                    ProofMethod::Rule,
                    best.confidence * RULE_DECAY,
                    steps,
                )));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProofLimits;
    use crate::kb::{FactKind, FactStore};
    use crate::semantic::SemanticIndex;
    use crate::vsa::{Dimension, Encoding, HyperVec};

    fn atom(op: &str, args: &[&str]) -> FactMetadata {
        FactMetadata::new(op, args.iter().map(|s| s.to_string()).collect())
    }

    fn store_with(facts: &[FactMetadata]) -> FactStore {
        let mut store = FactStore::new();
        for meta in facts {
            store.push(
                HyperVec::zero(Dimension(8), Encoding::DenseBinary),
                None,
                meta.clone(),
                FactKind::Truth,
            );
        }
        store
    }

    fn prove(store: &FactStore, rules: &[Rule], goal: Goal) -> Option<Proof> {
        let semantic = SemanticIndex::new();
        let limits = ProofLimits::default();
        let engine = ProofEngine::new(store, &semantic, rules, &limits, 8);
        let mut ctx = ProofContext::new(ProofLimits::default());
        RuleReasoner.try_prove(&engine, &goal, 0, &mut ctx).unwrap()
    }

    #[test]
    fn conjunctive_rule_binds_intermediate_variable() {
        // parent ?x ?y And parent ?y ?z => grandparent ?x ?z
        let implies = FactMetadata::formula(
            "Implies",
            vec![
                FactMetadata::formula(
                    "And",
                    vec![atom("parent", &["?x", "?y"]), atom("parent", &["?y", "?z"])],
                ),
                atom("grandparent", &["?x", "?z"]),
            ],
        );
        let rule = Rule::from_metadata(&implies, None).unwrap();
        let store = store_with(&[atom("parent", &["Ann", "Bob"]), atom("parent", &["Bob", "Cy"])]);

        let proof = prove(&store, &[rule.clone()], Goal::new("grandparent", "Ann", "Cy")).unwrap();
        assert_eq!(proof.method, Some(ProofMethod::Rule));
        assert!(proof.confidence < 1.0);
        assert_eq!(proof.steps.last().unwrap().operation, "rule");

        assert!(prove(&store, &[rule], Goal::new("grandparent", "Bob", "Ann")).is_none());
    }

    #[test]
    fn negated_premise_uses_failure_and_explicit_not() {
        let implies = FactMetadata::formula(
            "Implies",
            vec![
                FactMetadata::formula(
                    "And",
                    vec![
                        atom("isA", &["?x", "Bird"]),
                        FactMetadata::negation("can", vec!["?x".into(), "Swim".into()]),
                    ],
                ),
                atom("can", &["?x", "Fly"]),
            ],
        );
        let rule = Rule::from_metadata(&implies, None).unwrap();
        let store = store_with(&[
            atom("isA", &["Tweety", "Bird"]),
            atom("isA", &["Pingu", "Bird"]),
            atom("can", &["Pingu", "Swim"]),
        ]);
        assert!(prove(&store, &[rule.clone()], Goal::new("can", "Tweety", "Fly")).is_some());
        assert!(prove(&store, &[rule], Goal::new("can", "Pingu", "Fly")).is_none());
    }

    #[test]
    fn non_atom_conclusion_is_not_a_rule() {
        let implies = FactMetadata::formula(
            "Implies",
            vec![
                atom("a", &["?x", "y"]),
                FactMetadata::formula("And", vec![atom("b", &["?x", "y"])]),
            ],
        );
        assert!(Rule::from_metadata(&implies, None).is_none());
    }

    #[test]
    fn self_referential_rule_terminates() {
        let implies = FactMetadata::formula(
            "Implies",
            vec![atom("likes", &["?y", "?x"]), atom("likes", &["?x", "?y"])],
        );
        let rule = Rule::from_metadata(&implies, None).unwrap();
        let store = store_with(&[]);
        assert!(prove(&store, &[rule], Goal::new("likes", "a", "b")).is_none());
    }
}
