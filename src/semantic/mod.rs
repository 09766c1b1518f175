//! Semantic index: which relations are transitive, symmetric, inheritable, ...
//!
//! Built once from theory text by matching fixed declaration shapes, then
//! extended live as declaration facts are asserted. Every entry remembers
//! where it was declared so contradictions can cite their constraint.

pub mod theory;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::kb::FactMetadata;

use self::theory::{TheoryResult, TheorySource, TheoryText};

// ---------------------------------------------------------------------------
// Declaration vocabulary
// ---------------------------------------------------------------------------

/// Relation-property markers recognised in theory text and as fact operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Relation,
    Assignment,
    Transitive,
    Symmetric,
    Reflexive,
    Inheritable,
    TypeMarker,
    MutuallyExclusive,
    Inverse,
    ContradictsSameArgs,
}

impl PropertyKind {
    /// Map a `__Marker` operator to its property.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "__Relation" => Some(Self::Relation),
            "__AssignmentRelation" => Some(Self::Assignment),
            "__TransitiveRelation" => Some(Self::Transitive),
            "__SymmetricRelation" => Some(Self::Symmetric),
            "__ReflexiveRelation" => Some(Self::Reflexive),
            "__InheritableProperty" => Some(Self::Inheritable),
            "__TypeMarker" => Some(Self::TypeMarker),
            _ => None,
        }
    }
}

/// Operators whose facts change the semantic index.
pub const DECLARATION_OPERATORS: &[&str] = &[
    "__Relation",
    "__AssignmentRelation",
    "__TransitiveRelation",
    "__SymmetricRelation",
    "__ReflexiveRelation",
    "__InheritableProperty",
    "__TypeMarker",
    "mutuallyExclusive",
    "inverseRelation",
    "contradictsSameArgs",
];

pub fn is_declaration_operator(op: &str) -> bool {
    DECLARATION_OPERATORS.contains(&op)
}

/// How an operator name was declared. Relation wins over graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorKind {
    Graph,
    Relation,
}

/// Where a declaration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclSource {
    pub file: Option<String>,
    pub line: usize,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Theory line shapes
// ---------------------------------------------------------------------------

const NAME: &str = r"[A-Za-z_][A-Za-z0-9_\-]*";

static RE_DEST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^@({NAME})(?::({NAME}))?\s+(__[A-Za-z]+)$")).expect("static regex")
});
static RE_MARKER_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:@\S+\s+)?(__[A-Za-z]+)\s+({NAME})$")).expect("static regex")
});
static RE_MUTEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@\S+\s+)?mutuallyExclusive\s+(\S+)\s+(\S+)\s+(\S+)$").expect("static regex")
});
static RE_INVERSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@\S+\s+)?inverseRelation\s+(\S+)\s+(\S+)$").expect("static regex")
});
static RE_CSA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@\S+\s+)?contradictsSameArgs\s+(\S+)\s+(\S+)$").expect("static regex")
});
static RE_GRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^@({NAME})(?::{NAME})?\s+graph\b")).expect("static regex")
});

fn strip_comment(line: &str) -> &str {
    let cut = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    line[..cut].trim()
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Registry of relation properties owned by one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticIndex {
    relations: BTreeSet<String>,
    assignment_relations: BTreeSet<String>,
    transitive: BTreeSet<String>,
    symmetric: BTreeSet<String>,
    reflexive: BTreeSet<String>,
    inheritable: BTreeSet<String>,
    type_markers: BTreeSet<String>,
    mutually_exclusive: BTreeMap<String, Vec<(String, String)>>,
    inverse: BTreeMap<String, String>,
    contradicts_same_args: BTreeMap<String, BTreeSet<String>>,
    operator_kinds: BTreeMap<String, OperatorKind>,
    sources: BTreeMap<(PropertyKind, String), DeclSource>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from every theory a source provides, in order.
    ///
    /// With `allow_fallback` the built-in default relation set is merged
    /// underneath the file-derived declarations.
    pub fn from_source(source: &dyn TheorySource, allow_fallback: bool) -> TheoryResult<Self> {
        let mut index = if allow_fallback {
            Self::fallback_defaults()
        } else {
            Self::new()
        };
        for theory in source.load_all()? {
            index.load_theory_text(&theory);
        }
        tracing::debug!(
            transitive = index.transitive.len(),
            symmetric = index.symmetric.len(),
            fallback = allow_fallback,
            "semantic index built"
        );
        Ok(index)
    }

    /// Default relation set used only when fallback is explicitly allowed.
    pub fn fallback_defaults() -> Self {
        let mut index = Self::new();
        let text = "\
__TransitiveRelation isA
__TransitiveRelation partOf
__TransitiveRelation locatedIn
__TransitiveRelation before
__TransitiveRelation after
__SymmetricRelation siblingOf
__SymmetricRelation marriedTo
__SymmetricRelation conflictsWith
__ReflexiveRelation equals
__InheritableProperty hasProperty
__InheritableProperty can
__AssignmentRelation hasState
inverseRelation parentOf childOf
contradictsSameArgs before after
";
        index.load_theory_text(&TheoryText {
            name: "fallback".into(),
            file: "<fallback>".into(),
            text: text.into(),
        });
        index
    }

    /// Apply every declaration line of one theory text.
    pub fn load_theory_text(&mut self, theory: &TheoryText) {
        for (i, raw) in theory.text.lines().enumerate() {
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            let src = DeclSource {
                file: Some(theory.file.clone()),
                line: i + 1,
                text: line.to_string(),
            };
            if !self.apply_declaration_line(line, &src) {
                let head = line
                    .split_whitespace()
                    .find(|t| !t.starts_with('@'))
                    .unwrap_or_default();
                if is_declaration_operator(head) {
                    tracing::warn!(
                        file = %theory.file,
                        line = i + 1,
                        text = line,
                        "malformed declaration line ignored"
                    );
                }
            }
        }
    }

    fn apply_declaration_line(&mut self, line: &str, src: &DeclSource) -> bool {
        if let Some(c) = RE_DEST_MARKER.captures(line) {
            if let Some(kind) = PropertyKind::from_marker(&c[3]) {
                let name = c.get(2).map_or(&c[1], |m| m.as_str());
                self.declare(kind, name, src.clone());
                return true;
            }
        }
        if let Some(c) = RE_MARKER_ARG.captures(line) {
            if let Some(kind) = PropertyKind::from_marker(&c[1]) {
                self.declare(kind, &c[2], src.clone());
                return true;
            }
        }
        if let Some(c) = RE_MUTEX.captures(line) {
            self.add_mutually_exclusive(&c[1], &c[2], &c[3], src.clone());
            return true;
        }
        if let Some(c) = RE_INVERSE.captures(line) {
            self.add_inverse(&c[1], &c[2], src.clone());
            return true;
        }
        if let Some(c) = RE_CSA.captures(line) {
            self.add_contradicts_same_args(&c[1], &c[2], src.clone());
            return true;
        }
        if let Some(c) = RE_GRAPH.captures(line) {
            self.declare_operator(&c[1], OperatorKind::Graph);
            return true;
        }
        false
    }

    // -- mutation ---------------------------------------------------------

    /// Record a relation-property marker for `name`.
    pub fn declare(&mut self, kind: PropertyKind, name: &str, src: DeclSource) {
        let set = match kind {
            PropertyKind::Relation => &mut self.relations,
            PropertyKind::Assignment => &mut self.assignment_relations,
            PropertyKind::Transitive => &mut self.transitive,
            PropertyKind::Symmetric => &mut self.symmetric,
            PropertyKind::Reflexive => &mut self.reflexive,
            PropertyKind::Inheritable => &mut self.inheritable,
            PropertyKind::TypeMarker => &mut self.type_markers,
            PropertyKind::MutuallyExclusive | PropertyKind::Inverse | PropertyKind::ContradictsSameArgs => {
                return;
            }
        };
        set.insert(name.to_string());
        if kind != PropertyKind::TypeMarker {
            self.relations.insert(name.to_string());
            self.declare_operator(name, OperatorKind::Relation);
        }
        self.sources.entry((kind, name.to_string())).or_insert(src);
    }

    /// Register an operator name. A relation declaration is never downgraded to a graph.
    pub fn declare_operator(&mut self, name: &str, kind: OperatorKind) {
        let entry = self.operator_kinds.entry(name.to_string()).or_insert(kind);
        if kind > *entry {
            *entry = kind;
        }
    }

    pub fn add_mutually_exclusive(&mut self, op: &str, a: &str, b: &str, src: DeclSource) {
        let pairs = self.mutually_exclusive.entry(op.to_string()).or_default();
        let pair = (a.to_string(), b.to_string());
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
        self.sources
            .entry((PropertyKind::MutuallyExclusive, mutex_key(op, a, b)))
            .or_insert(src);
    }

    /// `inverseRelation a b` also maps `b → a` unless `b` already has an inverse.
    pub fn add_inverse(&mut self, a: &str, b: &str, src: DeclSource) {
        self.inverse.insert(a.to_string(), b.to_string());
        self.sources
            .entry((PropertyKind::Inverse, a.to_string()))
            .or_insert_with(|| src.clone());
        if !self.inverse.contains_key(b) {
            self.inverse.insert(b.to_string(), a.to_string());
            self.sources
                .entry((PropertyKind::Inverse, b.to_string()))
                .or_insert(src);
        }
    }

    /// `contradictsSameArgs a b` inserts both directions.
    pub fn add_contradicts_same_args(&mut self, a: &str, b: &str, src: DeclSource) {
        self.contradicts_same_args
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.contradicts_same_args
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        self.sources
            .entry((PropertyKind::ContradictsSameArgs, pair_key(a, b)))
            .or_insert(src);
    }

    /// Extend the index from an asserted fact if it is a declaration.
    ///
    /// `name` is the fact's persist name; `@isA:isA __TransitiveRelation`
    /// declares `isA` through it. Returns true if the index changed shape.
    pub fn observe_fact(&mut self, name: Option<&str>, meta: &FactMetadata) -> bool {
        let src = DeclSource {
            file: meta.source.as_ref().and_then(|s| s.file.clone()),
            line: meta.source.as_ref().map_or(0, |s| s.line),
            text: meta.to_string(),
        };
        let args = &meta.args;
        if let Some(kind) = PropertyKind::from_marker(&meta.operator) {
            let target = args.first().map(String::as_str).or(name);
            return match target {
                Some(target) => {
                    self.declare(kind, target, src);
                    true
                }
                None => false,
            };
        }
        match (meta.operator.as_str(), args.as_slice()) {
            ("mutuallyExclusive", [op, a, b, ..]) => {
                self.add_mutually_exclusive(op, a, b, src);
                true
            }
            ("inverseRelation", [a, b, ..]) => {
                self.add_inverse(a, b, src);
                true
            }
            ("contradictsSameArgs", [a, b, ..]) => {
                self.add_contradicts_same_args(a, b, src);
                true
            }
            _ => false,
        }
    }

    // -- queries ----------------------------------------------------------

    pub fn is_relation(&self, name: &str) -> bool {
        self.relations.contains(name)
    }

    pub fn is_transitive(&self, name: &str) -> bool {
        self.transitive.contains(name)
    }

    pub fn is_symmetric(&self, name: &str) -> bool {
        self.symmetric.contains(name)
    }

    pub fn is_reflexive(&self, name: &str) -> bool {
        self.reflexive.contains(name)
    }

    pub fn is_inheritable_property(&self, name: &str) -> bool {
        self.inheritable.contains(name)
    }

    pub fn is_assignment_relation(&self, name: &str) -> bool {
        self.assignment_relations.contains(name)
    }

    pub fn is_type_marker(&self, name: &str) -> bool {
        self.type_markers.contains(name)
    }

    pub fn operator_kind(&self, name: &str) -> Option<OperatorKind> {
        self.operator_kinds.get(name).copied()
    }

    /// Every name declared as a relation or graph.
    pub fn declared_operators(&self) -> impl Iterator<Item = &str> {
        self.operator_kinds.keys().map(String::as_str)
    }

    pub fn mutually_exclusive_pairs(&self, op: &str) -> &[(String, String)] {
        self.mutually_exclusive
            .get(op)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The value exclusive with `value` under `op`, in declaration order.
    pub fn exclusive_counterparts(&self, op: &str, value: &str) -> Vec<(&str, &(String, String))> {
        self.mutually_exclusive_pairs(op)
            .iter()
            .filter_map(|pair| {
                if pair.0 == value {
                    Some((pair.1.as_str(), pair))
                } else if pair.1 == value {
                    Some((pair.0.as_str(), pair))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn inverse_relation(&self, op: &str) -> Option<&str> {
        self.inverse.get(op).map(String::as_str)
    }

    pub fn contradicts_same_args_with(&self, op: &str) -> impl Iterator<Item = &str> {
        self.contradicts_same_args
            .get(op)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn transitive_relations(&self) -> impl Iterator<Item = &str> {
        self.transitive.iter().map(String::as_str)
    }

    // -- sources ----------------------------------------------------------

    pub fn property_source(&self, kind: PropertyKind, name: &str) -> Option<&DeclSource> {
        self.sources.get(&(kind, name.to_string()))
    }

    pub fn transitive_source(&self, name: &str) -> Option<&DeclSource> {
        self.property_source(PropertyKind::Transitive, name)
    }

    pub fn inheritable_source(&self, name: &str) -> Option<&DeclSource> {
        self.property_source(PropertyKind::Inheritable, name)
    }

    pub fn inverse_source(&self, name: &str) -> Option<&DeclSource> {
        self.property_source(PropertyKind::Inverse, name)
    }

    pub fn mutually_exclusive_source(&self, op: &str, a: &str, b: &str) -> Option<&DeclSource> {
        self.sources
            .get(&(PropertyKind::MutuallyExclusive, mutex_key(op, a, b)))
            .or_else(|| self.sources.get(&(PropertyKind::MutuallyExclusive, mutex_key(op, b, a))))
    }

    pub fn contradicts_same_args_source(&self, a: &str, b: &str) -> Option<&DeclSource> {
        self.sources
            .get(&(PropertyKind::ContradictsSameArgs, pair_key(a, b)))
            .or_else(|| self.sources.get(&(PropertyKind::ContradictsSameArgs, pair_key(b, a))))
    }
}

fn mutex_key(op: &str, a: &str, b: &str) -> String {
    format!("{op}:{a}:{b}")
}

fn pair_key(a: &str, b: &str) -> String {
    format!("{a}:{b}")
}
