//! Pattern queries with `?hole` variables.
//!
//! Direct matches come from the fact index in insertion order. Binary
//! patterns over relations with derivable instances (transitive, symmetric,
//! reflexive, inheritable, inverse or rule-concluded) are then completed by
//! proving candidate goals over the known entities.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsl::{Expr, Statement};
use crate::exec::metadata::arg_text;
use crate::exec::state::KbState;
use crate::proof::ProofMethod;
use crate::reason::Goal;

/// One pattern position.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Const(String),
    Var(String),
}

impl Term {
    fn from_expr(expr: &Expr) -> Self {
        match expr {
            Expr::Hole { name } => Term::Var(name.clone()),
            other => Term::Const(arg_text(other)),
        }
    }
}

pub type Bindings = BTreeMap<String, String>;

/// One answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Hole name (without `?`) to value.
    pub bindings: Bindings,
    /// The instantiated pattern.
    pub fact: String,
    pub method: ProofMethod,
    pub confidence: f64,
}

fn unify(pattern: &[Term], args: &[String]) -> Option<Bindings> {
    if pattern.len() != args.len() {
        return None;
    }
    let mut bindings = Bindings::new();
    for (term, value) in pattern.iter().zip(args) {
        match term {
            Term::Const(c) if c == value => {}
            Term::Const(_) => return None,
            Term::Var(v) => match bindings.get(v) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => {
                    bindings.insert(v.clone(), value.clone());
                }
            },
        }
    }
    Some(bindings)
}

fn instantiate(pattern: &[Term], bindings: &Bindings) -> Option<Vec<String>> {
    pattern
        .iter()
        .map(|t| match t {
            Term::Const(c) => Some(c.clone()),
            Term::Var(v) => bindings.get(v).cloned(),
        })
        .collect()
}

fn render(op: &str, args: &[String]) -> String {
    std::iter::once(op).chain(args.iter().map(String::as_str)).collect::<Vec<_>>().join(" ")
}

/// Relations whose true instances may not all be stored.
fn is_derivable(state: &KbState, op: &str) -> bool {
    let semantic = &state.semantic;
    semantic.is_transitive(op)
        || semantic.is_symmetric(op)
        || semantic.is_reflexive(op)
        || semantic.is_inheritable_property(op)
        || semantic.inverse_relation(op).is_some()
        || state.rules.iter().any(|r| r.concludes(op))
}

/// Answer `statement` against the KB, capped at `max_query_results`.
pub fn run_query(state: &KbState, statement: &Statement) -> Vec<QueryMatch> {
    let op = statement.operator.as_str();
    let pattern: Vec<Term> = statement.args.iter().map(Term::from_expr).collect();
    let limit = state.config.max_query_results;
    let engine = state.proof_engine();

    if pattern.iter().all(|t| matches!(t, Term::Const(_))) {
        let args: Vec<String> = pattern
            .iter()
            .filter_map(|t| match t {
                Term::Const(c) => Some(c.clone()),
                Term::Var(_) => None,
            })
            .collect();
        let proof = engine.prove_fact(op, &args);
        return match (proof.valid, proof.method) {
            (true, Some(method)) => vec![QueryMatch {
                bindings: Bindings::new(),
                fact: render(op, &args),
                method,
                confidence: proof.confidence,
            }],
            _ => Vec::new(),
        };
    }

    let mut seen: HashSet<Bindings> = HashSet::new();
    let mut results = Vec::new();

    for fact in state.store.by_operator(op) {
        if results.len() >= limit {
            break;
        }
        if let Some(bindings) = unify(&pattern, fact.args()) {
            if seen.insert(bindings.clone()) {
                results.push(QueryMatch {
                    bindings,
                    fact: fact.metadata.to_string(),
                    method: ProofMethod::Direct,
                    confidence: 1.0,
                });
            }
        }
    }

    if pattern.len() == 2 && is_derivable(state, op) {
        let entities = state.store.component().entities();
        let candidates = |term: &Term| -> Vec<String> {
            match term {
                Term::Const(c) => vec![c.clone()],
                Term::Var(_) => entities.iter().cloned().collect(),
            }
        };
        'outer: for subject in candidates(&pattern[0]) {
            for object in candidates(&pattern[1]) {
                if results.len() >= limit {
                    break 'outer;
                }
                let Some(bindings) = unify(&pattern, &[subject.clone(), object.clone()]) else {
                    continue;
                };
                if seen.contains(&bindings) {
                    continue;
                }
                let proof = engine.prove(&Goal::new(op, &subject, &object));
                if let (true, Some(method)) = (proof.valid, proof.method) {
                    seen.insert(bindings.clone());
                    let args = instantiate(&pattern, &bindings).unwrap_or_default();
                    results.push(QueryMatch {
                        bindings,
                        fact: render(op, &args),
                        method,
                        confidence: proof.confidence,
                    });
                }
            }
        }
    }

    debug!(pattern = %statement.fact_text(), results = results.len(), "query answered");
    results
}
