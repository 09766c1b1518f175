//! Statement → stored metadata.
//!
//! `Not $ref` and `Not (op ...)` are inlined here so proof search never has
//! to dereference through the scope.

use std::collections::HashMap;

use crate::dsl::{Expr, Statement};
use crate::error::ExecutionError;
use crate::kb::FactMetadata;

use super::state::ReferenceEntry;

type Refs = HashMap<String, ReferenceEntry>;

/// Operators whose arguments are sub-formulas.
const STRUCTURAL: &[&str] = &["Implies", "And", "Or"];

/// Flat token for an argument. References name their destination.
pub fn arg_text(expr: &Expr) -> String {
    match expr {
        Expr::Reference { name } => name.clone(),
        other => other.atom_text(),
    }
}

/// Metadata for the statement's own operator and arguments.
pub fn extract(statement: &Statement, refs: &Refs) -> Result<FactMetadata, ExecutionError> {
    call_metadata(&statement.operator, &statement.args, statement, refs)
}

fn call_metadata(
    operator: &str,
    args: &[Expr],
    statement: &Statement,
    refs: &Refs,
) -> Result<FactMetadata, ExecutionError> {
    if operator == "Not" {
        return negation(args, statement, refs);
    }
    if STRUCTURAL.contains(&operator) {
        let parts = args
            .iter()
            .map(|a| part(a, statement, refs))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(FactMetadata::formula(operator, parts));
    }
    Ok(FactMetadata::new(operator, args.iter().map(arg_text).collect()))
}

fn part(expr: &Expr, statement: &Statement, refs: &Refs) -> Result<FactMetadata, ExecutionError> {
    match expr {
        Expr::Compound { operator, args } => call_metadata(operator, args, statement, refs),
        Expr::Reference { name } => resolve(name, statement, refs),
        Expr::Identifier { name } => Ok(FactMetadata::new(name.as_str(), Vec::new())),
        other => Err(ExecutionError::Malformed {
            message: format!("{} cannot be a formula operand", other.kind()),
            statement: statement.to_string(),
            line: statement.line(),
        }),
    }
}

fn resolve(name: &str, statement: &Statement, refs: &Refs) -> Result<FactMetadata, ExecutionError> {
    refs.get(name)
        .map(|r| r.metadata.clone())
        .ok_or_else(|| ExecutionError::UndefinedReference {
            name: name.to_string(),
            statement: statement.to_string(),
            line: statement.line(),
        })
}

fn negation(args: &[Expr], statement: &Statement, refs: &Refs) -> Result<FactMetadata, ExecutionError> {
    let invalid = |message: &str| ExecutionError::InvalidNegation {
        message: message.to_string(),
        line: statement.line(),
    };
    match args {
        [] => Err(invalid("`Not` needs an operand")),
        [Expr::Reference { name }] => Ok(FactMetadata::negation_of(resolve(name, statement, refs)?)),
        [Expr::Compound { operator, args }] => Ok(FactMetadata::negation_of(call_metadata(
            operator, args, statement, refs,
        )?)),
        [Expr::Identifier { name }] => Ok(FactMetadata::negation(name, Vec::new())),
        [single] => Err(invalid(&format!("cannot negate a {}", single.kind()))),
        [Expr::Identifier { name }, rest @ ..] => {
            Ok(FactMetadata::negation(name, rest.iter().map(arg_text).collect()))
        }
        [first, ..] => Err(invalid(&format!(
            "flat `Not` form must start with an operator, found {}",
            first.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse_statement;

    fn stmt(text: &str) -> Statement {
        parse_statement(text).unwrap().unwrap()
    }

    fn refs_with(name: &str, meta: FactMetadata) -> Refs {
        let mut refs = Refs::new();
        refs.insert(
            name.to_string(),
            ReferenceEntry {
                fact_text: meta.to_string(),
                metadata: meta,
            },
        );
        refs
    }

    #[test]
    fn not_forms_are_inlined() {
        let refs = refs_with("f", FactMetadata::new("can", vec!["Pingu".into(), "Fly".into()]));
        for text in ["Not $f", "Not (can Pingu Fly)", "Not can Pingu Fly"] {
            let m = extract(&stmt(text), &refs).unwrap();
            assert_eq!(m.inner_operator.as_deref(), Some("can"), "{text}");
            assert_eq!(m.args, vec!["can", "Pingu", "Fly"], "{text}");
        }
    }

    #[test]
    fn not_rejects_bad_operands() {
        let refs = Refs::new();
        assert!(matches!(
            extract(&stmt("Not \"x\""), &refs),
            Err(ExecutionError::InvalidNegation { .. })
        ));
        assert!(matches!(
            extract(&stmt("Not $missing"), &refs),
            Err(ExecutionError::UndefinedReference { .. })
        ));
    }

    #[test]
    fn implication_keeps_structure() {
        let m = extract(
            &stmt("Implies (And (parent ?x ?y) (parent ?y ?z)) (grandparent ?x ?z)"),
            &Refs::new(),
        )
        .unwrap();
        assert_eq!(m.parts.len(), 2);
        assert_eq!(m.parts[0].operator, "And");
        assert_eq!(m.parts[1].args, vec!["?x", "?z"]);
    }
}
