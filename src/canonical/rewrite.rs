//! Surface rewrite rules: `canonicalRewrite FROM TO "map" ["i=j" ...]`.
//!
//! A rule maps the arguments of a non-canonical operator onto a canonical
//! one. `map` lists, for each output position, the input position it takes
//! (0-based). Optional `i=j` equalities restrict when the rule applies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dsl::{SourceLoc, Statement};
use crate::kb::FactMetadata;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
    pub arg_map: Vec<usize>,
    pub equalities: Vec<(usize, usize)>,
    /// Declaration order; lower wins ties.
    pub order: usize,
    pub source: Option<SourceLoc>,
}

impl RewriteRule {
    fn applies_to(&self, args: &[String]) -> bool {
        self.arg_map.iter().all(|&i| i < args.len())
            && self
                .equalities
                .iter()
                .all(|&(i, j)| i < args.len() && j < args.len() && args[i] == args[j])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRewriteIndex {
    rules: BTreeMap<String, Vec<RewriteRule>>,
    next_order: usize,
}

fn parse_positions(text: &str) -> Option<Vec<usize>> {
    text.trim_matches(|c| c == '[' || c == ']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

fn parse_equality(text: &str) -> Option<(usize, usize)> {
    let (a, b) = text.split_once('=')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

impl CanonicalRewriteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(
        &mut self,
        from: &str,
        to: &str,
        arg_map: Vec<usize>,
        equalities: Vec<(usize, usize)>,
        source: Option<SourceLoc>,
    ) {
        let rule = RewriteRule {
            from: from.to_string(),
            to: to.to_string(),
            arg_map,
            equalities,
            order: self.next_order,
            source,
        };
        self.next_order += 1;
        self.rules.entry(from.to_string()).or_default().push(rule);
    }

    /// Register a rule from a `canonicalRewrite` fact. Returns true if one was added.
    pub fn observe_fact(&mut self, meta: &FactMetadata) -> bool {
        if meta.operator != "canonicalRewrite" {
            return false;
        }
        let [from, to, map, rest @ ..] = meta.args.as_slice() else {
            tracing::warn!(fact = %meta, "canonicalRewrite needs FROM TO \"map\"");
            return false;
        };
        let Some(arg_map) = parse_positions(map) else {
            tracing::warn!(fact = %meta, "unparseable canonicalRewrite position map");
            return false;
        };
        let equalities: Option<Vec<_>> = rest.iter().map(|e| parse_equality(e)).collect();
        let Some(equalities) = equalities else {
            tracing::warn!(fact = %meta, "unparseable canonicalRewrite equality");
            return false;
        };
        self.add_rule(from, to, arg_map, equalities, meta.source.clone());
        true
    }

    pub fn has_rules(&self, op: &str) -> bool {
        self.rules.get(op).is_some_and(|r| !r.is_empty())
    }

    pub fn rules_for(&self, op: &str) -> &[RewriteRule] {
        self.rules.get(op).map(Vec::as_slice).unwrap_or_default()
    }

    /// The applicable rule with the most equalities, earliest declared on ties.
    pub fn best_rule(&self, op: &str, args: &[String]) -> Option<&RewriteRule> {
        self.rules_for(op)
            .iter()
            .filter(|r| r.applies_to(args))
            .min_by_key(|r| (std::cmp::Reverse(r.equalities.len()), r.order))
    }

    /// Rewrite a statement if a rule matches, keeping source and comment.
    pub fn rewrite(&self, statement: &Statement) -> Option<Statement> {
        let atoms: Vec<String> = statement.args.iter().map(|a| a.atom_text()).collect();
        let rule = self.best_rule(&statement.operator, &atoms)?;
        let mut out = statement.clone();
        out.operator = rule.to.clone();
        out.args = rule.arg_map.iter().map(|&i| statement.args[i].clone()).collect();
        tracing::debug!(from = %rule.from, to = %rule.to, line = statement.line(), "canonical rewrite");
        Some(out)
    }
}
