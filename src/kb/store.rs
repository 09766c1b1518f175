//! Ordered fact log with derived indices.

use std::num::NonZeroU64;

use crate::vsa::HyperVec;

use super::component::ComponentKb;
use super::index::FactIndex;
use super::{Fact, FactId, FactKind, FactMetadata};

/// The fact log is the source of truth; `index` and `component` are derived
/// from it and rebuilt whenever the log is replaced or filtered.
#[derive(Debug, Clone)]
pub struct FactStore {
    facts: Vec<Fact>,
    next_id: NonZeroU64,
    index: FactIndex,
    component: ComponentKb,
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore {
    pub fn new() -> Self {
        Self {
            facts: Vec::new(),
            next_id: NonZeroU64::MIN,
            index: FactIndex::new(),
            component: ComponentKb::new(),
        }
    }

    /// Append a fact, assigning the next id. Callers check contradictions first.
    pub fn push(
        &mut self,
        vector: HyperVec,
        name: Option<String>,
        metadata: FactMetadata,
        kind: FactKind,
    ) -> FactId {
        let id = FactId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let fact = Fact {
            id,
            vector,
            name,
            metadata,
            kind,
        };
        let pos = self.facts.len();
        self.index.insert(pos, &fact);
        self.component.add_fact(&fact);
        self.facts.push(fact);
        id
    }

    /// Replace the log wholesale and rebuild derived state.
    pub fn restore(&mut self, facts: Vec<Fact>, next_id: u64) {
        self.facts = facts;
        self.next_id = NonZeroU64::new(next_id).unwrap_or(NonZeroU64::MIN);
        self.rebuild();
    }

    /// Keep only facts matching `keep`, then rebuild. Ids are not reused.
    pub fn retain(&mut self, keep: impl FnMut(&Fact) -> bool) -> usize {
        let before = self.facts.len();
        self.facts.retain(keep);
        self.rebuild();
        before - self.facts.len()
    }

    /// Rebuild index and component KB from the log.
    pub fn rebuild(&mut self) {
        self.index = FactIndex::rebuild(&self.facts);
        self.component = ComponentKb::rebuild(&self.facts);
    }

    /// True if rebuilding from scratch yields the live derived state.
    pub fn index_is_consistent(&self) -> bool {
        self.index == FactIndex::rebuild(&self.facts)
            && self.component == ComponentKb::rebuild(&self.facts)
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.get()
    }

    pub fn index(&self) -> &FactIndex {
        &self.index
    }

    pub fn component(&self) -> &ComponentKb {
        &self.component
    }

    pub fn get(&self, pos: usize) -> Option<&Fact> {
        self.facts.get(pos)
    }

    pub fn by_id(&self, id: FactId) -> Option<&Fact> {
        self.facts
            .binary_search_by_key(&id, |f| f.id)
            .ok()
            .map(|pos| &self.facts[pos])
    }

    pub fn find_binary(&self, op: &str, a: &str, b: &str) -> Option<&Fact> {
        self.index.binary(op, a, b).and_then(|pos| self.facts.get(pos))
    }

    pub fn find(&self, op: &str, args: &[String]) -> Option<&Fact> {
        self.index.nary(op, args).and_then(|pos| self.facts.get(pos))
    }

    /// Linear scan, independent of the index.
    pub fn scan_binary(&self, op: &str, a: &str, b: &str) -> Option<&Fact> {
        self.facts
            .iter()
            .find(|f| f.metadata.operator == op && f.metadata.binary() == Some((a, b)))
    }

    pub fn by_operator(&self, op: &str) -> impl Iterator<Item = &Fact> {
        self.index
            .by_operator(op)
            .iter()
            .filter_map(|&pos| self.facts.get(pos))
    }

    pub fn truth_facts(&self) -> impl Iterator<Item = &Fact> {
        self.index
            .truth_positions()
            .iter()
            .filter_map(|&pos| self.facts.get(pos))
    }

    pub fn theory_facts(&self) -> impl Iterator<Item = &Fact> {
        self.index
            .theory_positions()
            .iter()
            .filter_map(|&pos| self.facts.get(pos))
    }

    /// Is there a `Not op args...` fact blocking this exact assertion?
    pub fn is_negated(&self, op: &str, args: &[String]) -> bool {
        let mut key = Vec::with_capacity(args.len() + 1);
        key.push(op.to_string());
        key.extend(args.iter().cloned());
        self.index.nary("Not", &key).is_some()
    }
}
