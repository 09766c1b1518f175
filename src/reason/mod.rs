//! Backward-chaining proof search.
//!
//! [`ProofContext`] carries the cycle-guard set and the depth/step/time
//! budget through one proof attempt. Guards are RAII: [`ProofContext::guard`]
//! inserts a key and the returned [`CycleGuard`] removes it when dropped, so
//! a key is held exactly while its sub-proof is running.
//!
//! The relation reasoners ([`transitive::TransitiveReasoner`],
//! [`symmetric::SymmetricReasoner`]) share the [`RelationReasoner`] contract
//! and are dispatched by [`engine::ProofEngine`].

pub mod engine;
pub mod rules;
pub mod symmetric;
pub mod transitive;

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use crate::config::ProofLimits;
use crate::contradiction::IS_A;
use crate::error::ReasonError;
use crate::kb::{FactId, FactStore};
use crate::proof::Proof;

pub use engine::ProofEngine;

pub type ReasonResult<T> = std::result::Result<T, ReasonError>;

/// Words never treated as chain intermediates.
pub const RESERVED_WORDS: &[&str] = &[
    "Implies", "And", "Or", "Not", "ForAll", "Exists", "true", "false",
];

/// A binary proof goal `operator(subject, object)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Goal {
    pub operator: String,
    pub subject: String,
    pub object: String,
}

impl Goal {
    pub fn new(operator: &str, subject: &str, object: &str) -> Self {
        Self {
            operator: operator.to_string(),
            subject: subject.to_string(),
            object: object.to_string(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self::new(&self.operator, &self.object, &self.subject)
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.operator, self.subject, self.object)
    }
}

// ---------------------------------------------------------------------------
// Context and guards
// ---------------------------------------------------------------------------

/// Mutable state of one proof attempt.
#[derive(Debug)]
pub struct ProofContext {
    visited: HashSet<String>,
    steps: usize,
    started: Instant,
    limits: ProofLimits,
    guards_taken: usize,
    cycle_detected: bool,
    depth_exceeded: bool,
    steps_exceeded: bool,
}

impl ProofContext {
    pub fn new(limits: ProofLimits) -> Self {
        Self {
            visited: HashSet::new(),
            steps: 0,
            started: Instant::now(),
            limits,
            guards_taken: 0,
            cycle_detected: false,
            depth_exceeded: false,
            steps_exceeded: false,
        }
    }

    /// Fail the whole attempt once the wall-clock budget is spent.
    pub fn check_timeout(&self) -> ReasonResult<()> {
        let elapsed = self.started.elapsed();
        if elapsed > Duration::from_millis(self.limits.timeout_ms) {
            return Err(ReasonError::Timeout {
                elapsed_ms: elapsed.as_millis(),
            });
        }
        Ok(())
    }

    /// Count one search step and check the depth bound. False means the
    /// branch must be abandoned; siblings may continue.
    pub fn enter(&mut self, depth: usize) -> bool {
        if depth > self.limits.max_depth {
            self.depth_exceeded = true;
            return false;
        }
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            self.steps_exceeded = true;
            return false;
        }
        true
    }

    /// Hold `key` for the lifetime of the returned guard. `None` means the
    /// key is already held higher up the recursion: a cycle.
    pub fn guard(&mut self, key: String) -> Option<CycleGuard<'_>> {
        if self.visited.contains(&key) {
            self.cycle_detected = true;
            return None;
        }
        self.visited.insert(key.clone());
        self.guards_taken += 1;
        Some(CycleGuard { ctx: self, key })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    pub fn held_count(&self) -> usize {
        self.visited.len()
    }

    /// Total guards ever taken in this attempt.
    pub fn guards_taken(&self) -> usize {
        self.guards_taken
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn limits(&self) -> &ProofLimits {
        &self.limits
    }

    /// Why the attempt failed, from the flags raised during search.
    pub fn failure_reason(&self) -> &'static str {
        if self.cycle_detected {
            "Cycle detected"
        } else if self.depth_exceeded {
            "Depth limit exceeded"
        } else if self.steps_exceeded {
            "Step limit exceeded"
        } else {
            "No proof found"
        }
    }
}

/// Scoped cycle-guard entry. Derefs to the context for recursive calls.
pub struct CycleGuard<'a> {
    ctx: &'a mut ProofContext,
    key: String,
}

impl Deref for CycleGuard<'_> {
    type Target = ProofContext;

    fn deref(&self) -> &ProofContext {
        self.ctx
    }
}

impl DerefMut for CycleGuard<'_> {
    fn deref_mut(&mut self) -> &mut ProofContext {
        self.ctx
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.ctx.visited.remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Reasoner contract
// ---------------------------------------------------------------------------

/// A proof strategy for one kind of relation.
pub trait RelationReasoner {
    fn name(&self) -> &'static str;

    /// Whether this reasoner handles `goal`'s relation.
    fn applies(&self, engine: &ProofEngine<'_>, goal: &Goal) -> bool;

    /// Try to prove `goal`. `Ok(None)` fails the branch; `Err` aborts the attempt.
    fn try_prove(
        &self,
        engine: &ProofEngine<'_>,
        goal: &Goal,
        depth: usize,
        ctx: &mut ProofContext,
    ) -> ReasonResult<Option<Proof>>;
}

// ---------------------------------------------------------------------------
// Inheritance walk
// ---------------------------------------------------------------------------

/// An inherited property: the `isA` chain from subject to owner and the
/// owner's stored fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritedValue {
    /// Subject first, owning ancestor last.
    pub chain: Vec<String>,
    pub fact_id: FactId,
}

/// Breadth-first walk up the `isA` ancestry of `subject` for an ancestor
/// that directly has `op(ancestor, value)`.
///
/// A `Not op subject value` exception blocks everything. A `Not op anc value`
/// exception on an ancestor blocks that ancestor and the path above it;
/// other branches are still explored.
pub fn inherited_value(
    store: &FactStore,
    op: &str,
    subject: &str,
    value: &str,
    max_depth: usize,
) -> Option<InheritedValue> {
    let blocked = |node: &str| store.is_negated(op, &[node.to_string(), value.to_string()]);
    if blocked(subject) {
        return None;
    }
    let component = store.component();
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::from([subject.to_string()]);
    let mut queue = VecDeque::from([(subject.to_string(), 0usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in component.edges_from(IS_A, &node) {
            if !seen.insert(next.clone()) {
                continue;
            }
            parent.insert(next.clone(), node.clone());
            if blocked(next.as_str()) {
                tracing::debug!(op, ancestor = %next, value, "inherited edge blocked by exception");
                continue;
            }
            if let Some(fact) = store.find_binary(op, next, value) {
                let mut chain = vec![next.clone()];
                let mut cursor = next.as_str();
                while let Some(p) = parent.get(cursor) {
                    chain.push(p.clone());
                    cursor = p;
                }
                chain.reverse();
                return Some(InheritedValue {
                    chain,
                    fact_id: fact.id,
                });
            }
            queue.push_back((next.clone(), depth + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ProofLimits {
        ProofLimits {
            max_depth: 3,
            max_steps: 5,
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let mut ctx = ProofContext::new(limits());
        {
            let mut guard = ctx.guard("isA:a:c".into()).unwrap();
            assert!(guard.is_held("isA:a:c"));
            assert!(guard.guard("isA:a:c".into()).is_none());
            let inner = guard.guard("isA:b:c".into());
            assert!(inner.is_some());
        }
        assert_eq!(ctx.held_count(), 0);
        assert_eq!(ctx.guards_taken(), 2);
        assert_eq!(ctx.failure_reason(), "Cycle detected");
    }

    #[test]
    fn depth_and_step_limits() {
        let mut ctx = ProofContext::new(limits());
        assert!(!ctx.enter(4));
        assert_eq!(ctx.failure_reason(), "Depth limit exceeded");

        let mut ctx = ProofContext::new(limits());
        for _ in 0..5 {
            assert!(ctx.enter(0));
        }
        assert!(!ctx.enter(0));
        assert_eq!(ctx.failure_reason(), "Step limit exceeded");
    }

    #[test]
    fn zero_timeout_expires() {
        let ctx = ProofContext::new(ProofLimits {
            timeout_ms: 0,
            ..limits()
        });
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(ctx.check_timeout(), Err(ReasonError::Timeout { .. })));
    }
}
