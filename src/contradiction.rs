//! Contradiction engine: consulted before every fact insertion.
//!
//! Detects:
//!
//! - **contradictsSameArgs**: `A x y` when `B x y` is stored or derivable
//!   through a transitive chain of `B` edges
//! - **mutuallyExclusive**: `op x v` when `op x v'` is stored, or inherited
//!   along the `isA` ancestry of `x` for an inheritable `op`
//!
//! Negations are never checked. Every positive result carries the full
//! derivation used to justify it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kb::{FactId, FactStore};
use crate::proof::{ProofMethod, ProofObject, ProofStep};
use crate::reason::{InheritedValue, inherited_value};
use crate::semantic::{DeclSource, SemanticIndex};

/// Relation walked for property inheritance.
pub const IS_A: &str = "isA";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ContradictionError {
    #[error("contradiction rejected: {}", .0.message)]
    #[diagnostic(
        code(hdkb::contradiction::rejected),
        help(
            "The new fact conflicts with stored or derivable knowledge. Inspect \
             `proof_nl` for the derivation, retract the conflicting assertion, or \
             add an explicit `Not` exception if the inherited value should not apply."
        )
    )]
    Rejected(Box<Contradiction>),
}

impl ContradictionError {
    pub fn contradiction(&self) -> &Contradiction {
        match self {
            ContradictionError::Rejected(c) => c,
        }
    }
}

// ---------------------------------------------------------------------------
// Contradiction types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContradictionKind {
    ContradictsSameArgs,
    MutuallyExclusive,
}

impl fmt::Display for ContradictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContradictionKind::ContradictsSameArgs => f.write_str("contradictsSameArgs"),
            ContradictionKind::MutuallyExclusive => f.write_str("mutuallyExclusive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Reject,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRef {
    pub operator: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingFact {
    pub operator: String,
    pub args: Vec<String>,
    /// `None` when the conflicting fact is derived rather than stored.
    pub fact_id: Option<FactId>,
}

/// Structured description of a detected contradiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contradiction {
    pub kind: ContradictionKind,
    pub severity: Severity,
    pub message: String,
    pub new_fact: FactRef,
    pub conflicting_fact: ConflictingFact,
    pub constraint: DeclSource,
    /// Natural-language derivation.
    #[serde(rename = "proof_nl")]
    pub proof_nl: String,
    pub proof_object: ProofObject,
}

fn render(op: &str, args: &[String]) -> String {
    let mut out = op.to_string();
    for a in args {
        out.push(' ');
        out.push_str(a);
    }
    out
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Read-only view used to test one proposed fact.
#[derive(Debug, Clone, Copy)]
pub struct ContradictionChecker<'a> {
    store: &'a FactStore,
    semantic: &'a SemanticIndex,
    max_hops: usize,
    max_depth: usize,
}

impl<'a> ContradictionChecker<'a> {
    pub fn new(store: &'a FactStore, semantic: &'a SemanticIndex, max_hops: usize, max_depth: usize) -> Self {
        Self {
            store,
            semantic,
            max_hops,
            max_depth,
        }
    }

    /// Return the first contradiction the proposed fact would introduce.
    pub fn check(&self, operator: &str, args: &[String]) -> Option<Contradiction> {
        if operator == "Not" {
            return None;
        }
        self.check_same_args(operator, args)
            .or_else(|| self.check_mutually_exclusive(operator, args))
    }

    // -- contradictsSameArgs ---------------------------------------------

    fn check_same_args(&self, operator: &str, args: &[String]) -> Option<Contradiction> {
        for other in self.semantic.contradicts_same_args_with(operator) {
            let constraint = self
                .semantic
                .contradicts_same_args_source(operator, other)
                .cloned()
                .unwrap_or_else(|| DeclSource {
                    file: None,
                    line: 0,
                    text: format!("contradictsSameArgs {operator} {other}"),
                });

            let stored = match args {
                [a, b] => self
                    .store
                    .find_binary(other, a, b)
                    .or_else(|| self.store.scan_binary(other, a, b)),
                _ => self.store.find(other, args),
            };
            if let Some(fact) = stored {
                let conflict = render(other, args);
                return Some(Contradiction {
                    kind: ContradictionKind::ContradictsSameArgs,
                    severity: Severity::Reject,
                    message: format!(
                        "{} contradicts existing fact {conflict}",
                        render(operator, args)
                    ),
                    new_fact: FactRef {
                        operator: operator.to_string(),
                        args: args.to_vec(),
                    },
                    conflicting_fact: ConflictingFact {
                        operator: other.to_string(),
                        args: args.to_vec(),
                        fact_id: Some(fact.id),
                    },
                    proof_nl: format!(
                        "{conflict} is asserted ({}). {} declares that {operator} and {other} \
                         cannot hold on the same arguments, so {} is rejected.",
                        fact.id,
                        constraint.text,
                        render(operator, args)
                    ),
                    proof_object: ProofObject {
                        goal: conflict.clone(),
                        valid: true,
                        method: Some(ProofMethod::Direct),
                        steps: vec![ProofStep::new("direct", conflict, Some(fact.id))],
                    },
                    constraint,
                });
            }

            if let [a, b] = args {
                if self.semantic.is_transitive(other) {
                    if let Some(chain) = self.transitive_path(other, a, b) {
                        return Some(self.derived_same_args(operator, other, a, b, &chain, constraint));
                    }
                }
            }
        }
        None
    }

    /// BFS over `op` edges from `from` to `to` within `max_hops`.
    /// Returns the visited nodes, `from` first and `to` last.
    fn transitive_path(&self, op: &str, from: &str, to: &str) -> Option<Vec<String>> {
        let component = self.store.component();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::from([from.to_string()]);
        let mut queue = VecDeque::from([(from.to_string(), 0usize)]);

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= self.max_hops {
                continue;
            }
            for next in component.edges_from(op, &node) {
                if !seen.insert(next.clone()) {
                    continue;
                }
                parent.insert(next.clone(), node.clone());
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(p) = parent.get(cursor) {
                        path.push(p.clone());
                        cursor = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back((next.clone(), depth + 1));
            }
        }
        None
    }

    fn derived_same_args(
        &self,
        operator: &str,
        other: &str,
        a: &str,
        b: &str,
        chain: &[String],
        constraint: DeclSource,
    ) -> Contradiction {
        let args = vec![a.to_string(), b.to_string()];
        let conflict = render(other, &args);
        let steps: Vec<ProofStep> = chain
            .windows(2)
            .map(|w| {
                let id = self.store.find_binary(other, &w[0], &w[1]).map(|f| f.id);
                ProofStep::new("transitive_hop", format!("{other} {} {}", w[0], w[1]), id)
            })
            .collect();
        let hops: Vec<&str> = steps.iter().map(|s| s.fact.as_str()).collect();
        Contradiction {
            kind: ContradictionKind::ContradictsSameArgs,
            severity: Severity::Reject,
            message: format!(
                "{} contradicts derived fact {conflict}",
                render(operator, &args)
            ),
            new_fact: FactRef {
                operator: operator.to_string(),
                args: args.clone(),
            },
            conflicting_fact: ConflictingFact {
                operator: other.to_string(),
                args,
                fact_id: None,
            },
            proof_nl: format!(
                "{conflict} is derivable because {other} is transitive: {}. {} forbids {operator} {a} {b}.",
                hops.join(", "),
                constraint.text
            ),
            proof_object: ProofObject {
                goal: conflict,
                valid: true,
                method: Some(ProofMethod::TransitiveChain),
                steps,
            },
            constraint,
        }
    }

    // -- mutuallyExclusive -----------------------------------------------

    fn check_mutually_exclusive(&self, operator: &str, args: &[String]) -> Option<Contradiction> {
        let [subject, value] = args else {
            return None;
        };
        for (counter, pair) in self.semantic.exclusive_counterparts(operator, value) {
            let constraint = self
                .semantic
                .mutually_exclusive_source(operator, &pair.0, &pair.1)
                .cloned()
                .unwrap_or_else(|| DeclSource {
                    file: None,
                    line: 0,
                    text: format!("mutuallyExclusive {operator} {} {}", pair.0, pair.1),
                });

            let direct = self
                .store
                .find_binary(operator, subject, counter)
                .or_else(|| self.store.scan_binary(operator, subject, counter));
            if let Some(fact) = direct {
                let conflict = format!("{operator} {subject} {counter}");
                return Some(Contradiction {
                    kind: ContradictionKind::MutuallyExclusive,
                    severity: Severity::Reject,
                    message: format!("{operator} {subject} {value} contradicts existing fact {conflict}"),
                    new_fact: FactRef {
                        operator: operator.to_string(),
                        args: args.to_vec(),
                    },
                    conflicting_fact: ConflictingFact {
                        operator: operator.to_string(),
                        args: vec![subject.clone(), counter.to_string()],
                        fact_id: Some(fact.id),
                    },
                    proof_nl: format!(
                        "{conflict} is asserted ({}). {} forbids {operator} {subject} {value}.",
                        fact.id, constraint.text
                    ),
                    proof_object: ProofObject {
                        goal: conflict.clone(),
                        valid: true,
                        method: Some(ProofMethod::Direct),
                        steps: vec![ProofStep::new("direct", conflict, Some(fact.id))],
                    },
                    constraint,
                });
            }

            if self.semantic.is_inheritable_property(operator) {
                if let Some(found) = inherited_value(self.store, operator, subject, counter, self.max_depth) {
                    return Some(self.inherited_conflict(operator, subject, value, counter, found, constraint));
                }
            }
        }
        None
    }

    fn inherited_conflict(
        &self,
        op: &str,
        subject: &str,
        value: &str,
        counter: &str,
        found: InheritedValue,
        constraint: DeclSource,
    ) -> Contradiction {
        let ancestor = found.chain.last().cloned().unwrap_or_default();
        let mut steps: Vec<ProofStep> = found
            .chain
            .windows(2)
            .map(|w| {
                let id = self.store.find_binary(IS_A, &w[0], &w[1]).map(|f| f.id);
                ProofStep::new("isA_hop", format!("{IS_A} {} {}", w[0], w[1]), id)
            })
            .collect();
        let owner = format!("{op} {ancestor} {counter}");
        steps.push(ProofStep::new("inherited_property", owner.clone(), Some(found.fact_id)));
        let conflict = format!("{op} {subject} {counter}");

        Contradiction {
            kind: ContradictionKind::MutuallyExclusive,
            severity: Severity::Reject,
            message: format!("{op} {subject} {value} contradicts inherited fact {conflict}"),
            new_fact: FactRef {
                operator: op.to_string(),
                args: vec![subject.to_string(), value.to_string()],
            },
            conflicting_fact: ConflictingFact {
                operator: op.to_string(),
                args: vec![subject.to_string(), counter.to_string()],
                fact_id: None,
            },
            proof_nl: format!(
                "{subject} inherits {counter} through the isA chain {}: {owner} is stored and \
                 {op} is inheritable. {} forbids {op} {subject} {value}.",
                found.chain.join(" -> "),
                constraint.text
            ),
            proof_object: ProofObject {
                goal: conflict,
                valid: true,
                method: Some(ProofMethod::Inheritance),
                steps,
            },
            constraint,
        }
    }
}
