//! Canonical-declaration enforcement, run before any vector is built.

use crate::canonical::CanonicalRewriteIndex;
use crate::dsl::{Expr, Statement};
use crate::error::ExecutionError;
use crate::semantic::is_declaration_operator;

/// Constraint and alias operators that only make sense when stored.
const MUST_PERSIST: &[&str] = &["synonym", "canonical", "canonicalRewrite"];

/// `_name`: a surface primitive that must be rewritten before storage.
/// `__Marker` declarations and `___Builtin` primitives do not count.
pub fn is_non_canonical_primitive(op: &str) -> bool {
    op.starts_with('_') && !op.starts_with("__")
}

/// Reject statements whose shape cannot be stored canonically.
pub fn check(
    statement: &Statement,
    persist: bool,
    rewrites: &CanonicalRewriteIndex,
    enforce_canonical: bool,
) -> Result<(), ExecutionError> {
    let op = statement.operator.as_str();
    let line = statement.line();

    if !persist && (is_declaration_operator(op) || MUST_PERSIST.contains(&op)) {
        return Err(ExecutionError::NonPersistentDeclaration {
            operator: op.to_string(),
            line,
        });
    }

    if enforce_canonical && persist && is_non_canonical_primitive(op) && !rewrites.has_rules(op) {
        return Err(ExecutionError::NonCanonicalPrimitive {
            operator: op.to_string(),
            line,
        });
    }

    if op == "Not" {
        match statement.args.as_slice() {
            [] => {
                return Err(ExecutionError::InvalidNegation {
                    message: "`Not` needs an operand".into(),
                    line,
                });
            }
            [Expr::Reference { .. } | Expr::Compound { .. } | Expr::Identifier { .. }] => {}
            [single] => {
                return Err(ExecutionError::InvalidNegation {
                    message: format!("cannot negate a {}", single.kind()),
                    line,
                });
            }
            _ => {}
        }
    }
    Ok(())
}
