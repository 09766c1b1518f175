//! Component KB: adjacency lists and the alias closure.
//!
//! Derived entirely from the fact log. Binary facts become edges; `synonym`
//! and `canonical` facts become aliases that `canonicalize_name` resolves.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::Fact;

/// Operators that declare aliases. Their own arguments are stored verbatim.
pub const ALIAS_OPERATORS: &[&str] = &["synonym", "canonical"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentKb {
    forward: HashMap<String, HashMap<String, Vec<String>>>,
    backward: HashMap<String, HashMap<String, Vec<String>>>,
    /// alias → target
    aliases: BTreeMap<String, String>,
    entities: BTreeSet<String>,
}

impl ComponentKb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(facts: &[Fact]) -> Self {
        let mut kb = Self::new();
        for fact in facts {
            kb.add_fact(fact);
        }
        kb
    }

    pub fn add_fact(&mut self, fact: &Fact) {
        let meta = &fact.metadata;
        if meta.is_negation() || !meta.parts.is_empty() {
            return;
        }
        let Some((a, b)) = meta.binary() else {
            return;
        };
        match meta.operator.as_str() {
            // `synonym A B`: B canonicalizes to A.
            "synonym" => self.add_alias(b, a),
            // `canonical Alias Target`
            "canonical" => self.add_alias(a, b),
            _ => {}
        }
        let op = meta.operator.clone();
        push_unique(
            self.forward.entry(op.clone()).or_default().entry(a.to_string()).or_default(),
            b,
        );
        push_unique(
            self.backward.entry(op).or_default().entry(b.to_string()).or_default(),
            a,
        );
        self.entities.insert(a.to_string());
        self.entities.insert(b.to_string());
    }

    fn add_alias(&mut self, alias: &str, target: &str) {
        if alias != target {
            self.aliases
                .entry(alias.to_string())
                .or_insert_with(|| target.to_string());
        }
    }

    /// Follow the alias chain to its root. A chain that closes into a cycle
    /// resolves to the smallest name on the cycle.
    pub fn canonicalize_name(&self, name: &str) -> String {
        let mut path: Vec<&str> = vec![name];
        let mut current = name;
        while let Some(next) = self.aliases.get(current).map(String::as_str) {
            if let Some(start) = path.iter().position(|&p| p == next) {
                return path[start..].iter().min().copied().unwrap_or(current).to_string();
            }
            path.push(next);
            current = next;
        }
        current.to_string()
    }

    pub fn has_aliases(&self) -> bool {
        !self.aliases.is_empty()
    }

    /// Objects `o` with `op(from, o)`, insertion order.
    pub fn edges_from(&self, op: &str, from: &str) -> &[String] {
        self.forward
            .get(op)
            .and_then(|m| m.get(from))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Subjects `s` with `op(s, to)`, insertion order.
    pub fn edges_to(&self, op: &str, to: &str) -> &[String] {
        self.backward
            .get(op)
            .and_then(|m| m.get(to))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_edge(&self, op: &str, a: &str, b: &str) -> bool {
        self.edges_from(op, a).iter().any(|o| o == b)
    }

    /// Every name appearing in a binary fact.
    pub fn entities(&self) -> &BTreeSet<String> {
        &self.entities
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{FactId, FactKind, FactMetadata};
    use crate::vsa::{Dimension, Encoding, HyperVec};

    fn fact(id: u64, meta: FactMetadata) -> Fact {
        Fact {
            id: FactId::new(id).unwrap(),
            vector: HyperVec::zero(Dimension(8), Encoding::DenseBinary),
            name: None,
            metadata: meta,
            kind: FactKind::Truth,
        }
    }

    fn bin(op: &str, a: &str, b: &str) -> FactMetadata {
        FactMetadata::new(op, vec![a.into(), b.into()])
    }

    #[test]
    fn edges_in_both_directions() {
        let kb = ComponentKb::rebuild(&[
            fact(1, bin("isA", "Poodle", "Dog")),
            fact(2, bin("isA", "Dog", "Animal")),
            fact(3, bin("isA", "Poodle", "Dog")),
        ]);
        assert_eq!(kb.edges_from("isA", "Poodle"), &["Dog".to_string()]);
        assert_eq!(kb.edges_to("isA", "Animal"), &["Dog".to_string()]);
        assert!(kb.has_edge("isA", "Dog", "Animal"));
        assert_eq!(kb.entities().len(), 3);
    }

    #[test]
    fn negations_are_not_edges() {
        let kb = ComponentKb::rebuild(&[fact(
            1,
            FactMetadata::negation("isA", vec!["Rex".into(), "Cat".into()]),
        )]);
        assert!(kb.edges_from("Not", "isA").is_empty());
        assert!(kb.entities().is_empty());
    }

    #[test]
    fn alias_closure_follows_chain_and_survives_cycles() {
        let kb = ComponentKb::rebuild(&[
            fact(1, bin("synonym", "Dog", "Canine")),
            fact(2, bin("canonical", "Hound", "Canine")),
            fact(3, bin("canonical", "X", "Y")),
            fact(4, bin("canonical", "Y", "X")),
        ]);
        assert_eq!(kb.canonicalize_name("Canine"), "Dog");
        assert_eq!(kb.canonicalize_name("Hound"), "Dog");
        assert_eq!(kb.canonicalize_name("Cat"), "Cat");
        assert_eq!(kb.canonicalize_name("X"), "X");
        assert_eq!(kb.canonicalize_name("Y"), "X");
    }

    #[test]
    fn cycle_entered_from_outside_resolves_to_its_smallest_member() {
        let kb = ComponentKb::rebuild(&[
            fact(1, bin("canonical", "Tail", "Zeta")),
            fact(2, bin("canonical", "Zeta", "Mid")),
            fact(3, bin("canonical", "Mid", "Beta")),
            fact(4, bin("canonical", "Beta", "Zeta")),
        ]);
        for name in ["Tail", "Zeta", "Mid", "Beta"] {
            assert_eq!(kb.canonicalize_name(name), "Beta", "{name}");
        }
    }
}
