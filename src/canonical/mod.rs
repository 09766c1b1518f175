//! Canonicalization of names, expressions, statements and stored metadata.
//!
//! Every pass is idempotent: canonicalizing a canonical value returns it
//! unchanged. Name canonicalization applies Unicode NFC and then the alias
//! closure of the component KB, but only to plain identifiers that are not
//! reserved operators.

pub mod rewrite;

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::dsl::{Expr, Statement};
use crate::kb::FactMetadata;
use crate::kb::component::{ALIAS_OPERATORS, ComponentKb};

pub use rewrite::{CanonicalRewriteIndex, RewriteRule};

/// Operators never renamed by canonicalization.
pub const RESERVED_OPERATORS: &[&str] = &[
    "Implies", "And", "Or", "Not", "ForAll", "Exists", "Load", "Unload", "induce", "bundle",
];

/// Formula operators whose bodies may contain holes.
pub const FORMULA_OPERATORS: &[&str] = &["Implies", "And", "Or", "Not", "ForAll", "Exists"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_OPERATORS.contains(&name)
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("static regex"));

/// Canonicalizer bound to one component KB.
#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer<'a> {
    component: &'a ComponentKb,
    enabled: bool,
}

impl<'a> Canonicalizer<'a> {
    pub fn new(component: &'a ComponentKb, enabled: bool) -> Self {
        Self { component, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Canonical spelling of a single token.
    pub fn name(&self, token: &str) -> String {
        if !self.enabled {
            return token.to_string();
        }
        let normalized: String = token.nfc().collect();
        if is_reserved(&normalized) || !IDENTIFIER.is_match(&normalized) {
            return normalized;
        }
        self.component.canonicalize_name(&normalized)
    }

    pub fn expr(&self, expr: &Expr) -> Expr {
        if !self.enabled {
            return expr.clone();
        }
        match expr {
            Expr::Identifier { name } => Expr::Identifier {
                name: self.name(name),
            },
            Expr::Reference { .. } | Expr::Hole { .. } | Expr::Literal { .. } => expr.clone(),
            Expr::List { items } => Expr::List {
                items: items.iter().map(|e| self.expr(e)).collect(),
            },
            Expr::Compound { operator, args } => Expr::Compound {
                operator: self.name(operator),
                args: args.iter().map(|e| self.expr(e)).collect(),
            },
        }
    }

    /// Canonicalize operator and arguments. Alias declarations keep their
    /// arguments verbatim so they can still name non-canonical spellings.
    pub fn statement(&self, statement: &Statement) -> Statement {
        if !self.enabled {
            return statement.clone();
        }
        let mut out = statement.clone();
        out.operator = self.name(&statement.operator);
        if !ALIAS_OPERATORS.contains(&out.operator.as_str()) {
            out.args = statement.args.iter().map(|e| self.expr(e)).collect();
        }
        out
    }

    /// Canonicalize stored metadata, recursing into formulas and normalizing
    /// `Not` to always carry its inner operator and arguments.
    pub fn metadata(&self, meta: &FactMetadata) -> FactMetadata {
        let mut out = if meta.is_negation() {
            self.negation(meta)
        } else if !meta.parts.is_empty() {
            let parts = meta.parts.iter().map(|p| self.metadata(p)).collect();
            FactMetadata::formula(&meta.operator, parts)
        } else {
            let operator = self.name(&meta.operator);
            let args = if ALIAS_OPERATORS.contains(&operator.as_str()) {
                meta.args.clone()
            } else {
                meta.args.iter().map(|a| self.name(a)).collect()
            };
            FactMetadata::new(operator, args)
        };
        out.source = meta.source.clone();
        out
    }

    fn negation(&self, meta: &FactMetadata) -> FactMetadata {
        if let Some(inner) = meta.parts.first() {
            return FactMetadata::negation_of(self.metadata(inner));
        }
        let (inner_op, inner_args) = match (&meta.inner_operator, &meta.inner_args) {
            (Some(op), Some(args)) => (op.clone(), args.clone()),
            _ => match meta.args.split_first() {
                Some((op, rest)) => (op.clone(), rest.to_vec()),
                None => (String::new(), Vec::new()),
            },
        };
        FactMetadata::negation(
            &self.name(&inner_op),
            inner_args.iter().map(|a| self.name(a)).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse_statement;
    use crate::kb::{Fact, FactId, FactKind};
    use crate::vsa::{Dimension, Encoding, HyperVec};

    fn component_with_synonym() -> ComponentKb {
        ComponentKb::rebuild(&[Fact {
            id: FactId::new(1).unwrap(),
            vector: HyperVec::zero(Dimension(8), Encoding::DenseBinary),
            name: None,
            metadata: FactMetadata::new("synonym", vec!["Dog".into(), "Canine".into()]),
            kind: FactKind::Truth,
        }])
    }

    #[test]
    fn names_follow_alias_closure() {
        let kb = component_with_synonym();
        let canon = Canonicalizer::new(&kb, true);
        assert_eq!(canon.name("Canine"), "Dog");
        assert_eq!(canon.name("Not"), "Not");
        assert_eq!(canon.name("?x"), "?x");
        assert_eq!(canon.name("Canine"), canon.name(&canon.name("Canine")));
    }

    #[test]
    fn nfc_is_applied() {
        let kb = ComponentKb::new();
        let canon = Canonicalizer::new(&kb, true);
        // "e" + combining acute accent
        assert_eq!(canon.name("Cafe\u{301}"), "Caf\u{e9}");
    }

    #[test]
    fn disabled_is_identity() {
        let kb = component_with_synonym();
        let canon = Canonicalizer::new(&kb, false);
        assert_eq!(canon.name("Canine"), "Canine");
    }

    #[test]
    fn statement_is_idempotent_and_recursive() {
        let kb = component_with_synonym();
        let canon = Canonicalizer::new(&kb, true);
        let st = parse_statement("Implies (isA ?x Canine) (hasProperty ?x [Canine, Fur])")
            .unwrap()
            .unwrap();
        let once = canon.statement(&st);
        assert_eq!(
            once.fact_text(),
            "Implies (isA ?x Dog) (hasProperty ?x [Dog, Fur])"
        );
        assert_eq!(canon.statement(&once), once);
    }

    #[test]
    fn synonym_arguments_are_kept() {
        let kb = component_with_synonym();
        let canon = Canonicalizer::new(&kb, true);
        let st = parse_statement("synonym Dog Canine").unwrap().unwrap();
        assert_eq!(canon.statement(&st).fact_text(), "synonym Dog Canine");
    }

    #[test]
    fn negation_metadata_is_normalized() {
        let kb = component_with_synonym();
        let canon = Canonicalizer::new(&kb, true);
        let surface = FactMetadata::new("Not", vec!["isA".into(), "Canine".into(), "Cat".into()]);
        let out = canon.metadata(&surface);
        assert_eq!(out.inner_operator.as_deref(), Some("isA"));
        assert_eq!(out.inner_args, Some(vec!["Dog".to_string(), "Cat".to_string()]));
        assert_eq!(out.args, vec!["isA", "Dog", "Cat"]);
        assert_eq!(canon.metadata(&out), out);
    }

    #[test]
    fn formula_metadata_recurses() {
        let kb = component_with_synonym();
        let canon = Canonicalizer::new(&kb, true);
        let rule = FactMetadata::formula(
            "Implies",
            vec![
                FactMetadata::new("isA", vec!["?x".into(), "Canine".into()]),
                FactMetadata::new("can", vec!["?x".into(), "Bark".into()]),
            ],
        );
        let out = canon.metadata(&rule);
        assert_eq!(out.parts[0].args, vec!["?x", "Dog"]);
        assert_eq!(out.args[0], "(isA ?x Dog)");
        assert_eq!(canon.metadata(&out), out);
    }
}
