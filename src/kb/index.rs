//! Exact-match indices over the fact log.
//!
//! The index stores positions into the log, never facts themselves, and can
//! be rebuilt from the log at any time.

use std::collections::HashMap;

use super::{Fact, FactKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactIndex {
    /// op → positions, insertion order.
    by_operator: HashMap<String, Vec<usize>>,
    /// (op, arg0, arg1) → first position.
    by_binary: HashMap<(String, String, String), usize>,
    /// [op, args...] → first position.
    by_nary: HashMap<Vec<String>, usize>,
    truth: Vec<usize>,
    theory: Vec<usize>,
}

fn nary_key(op: &str, args: &[String]) -> Vec<String> {
    let mut key = Vec::with_capacity(args.len() + 1);
    key.push(op.to_string());
    key.extend(args.iter().cloned());
    key
}

impl FactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index from scratch.
    pub fn rebuild(facts: &[Fact]) -> Self {
        let mut index = Self::new();
        for (pos, fact) in facts.iter().enumerate() {
            index.insert(pos, fact);
        }
        index
    }

    /// Index the fact stored at `pos`.
    pub fn insert(&mut self, pos: usize, fact: &Fact) {
        let meta = &fact.metadata;
        self.by_operator
            .entry(meta.operator.clone())
            .or_default()
            .push(pos);
        if let Some((a, b)) = meta.binary() {
            self.by_binary
                .entry((meta.operator.clone(), a.to_string(), b.to_string()))
                .or_insert(pos);
        }
        self.by_nary
            .entry(nary_key(&meta.operator, &meta.args))
            .or_insert(pos);
        match fact.kind {
            FactKind::Truth => self.truth.push(pos),
            FactKind::Theory => self.theory.push(pos),
        }
    }

    pub fn by_operator(&self, op: &str) -> &[usize] {
        self.by_operator.get(op).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn binary(&self, op: &str, a: &str, b: &str) -> Option<usize> {
        self.by_binary
            .get(&(op.to_string(), a.to_string(), b.to_string()))
            .copied()
    }

    pub fn nary(&self, op: &str, args: &[String]) -> Option<usize> {
        self.by_nary.get(&nary_key(op, args)).copied()
    }

    pub fn truth_positions(&self) -> &[usize] {
        &self.truth
    }

    pub fn theory_positions(&self) -> &[usize] {
        &self.theory
    }

    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.by_operator.keys().map(String::as_str)
    }
}
