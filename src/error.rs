//! Rich diagnostic error types for the hdkb knowledge base.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong
//! and how to fix it. [`KbError`] wraps them all transparently.

use miette::Diagnostic;
use thiserror::Error;

use crate::contradiction::ContradictionError;
use crate::dsl::error::ParseError;
use crate::semantic::theory::TheoryError;
use crate::solve::SolveError;

/// Top-level error type for the knowledge base.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Vsa(#[from] VsaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Contradiction(#[from] ContradictionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Theory(#[from] TheoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl KbError {
    /// Stable diagnostic code, used when errors are reported as data.
    pub fn code_string(&self) -> String {
        self.code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "hdkb::unknown".to_string())
    }
}

// ---------------------------------------------------------------------------
// VSA errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum VsaError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(hdkb::vsa::dim_mismatch),
        help(
            "All hypervectors in an operation must share the same dimension. \
             Vectors from different sessions cannot be mixed unless both were \
             created with the same configured dimension."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("empty bundle: cannot bundle zero hypervectors")]
    #[diagnostic(
        code(hdkb::vsa::empty_bundle),
        help("Provide at least one hypervector to the bundle operation.")
    )]
    EmptyBundle,

    #[error("vector serialization failed: {message}")]
    #[diagnostic(
        code(hdkb::vsa::serde),
        help("The byte payload is not a serialized hypervector of this crate version.")
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Validation errors (raised before execution starts)
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("unknown operator \"{operator}\" at line {line}")]
    #[diagnostic(
        code(hdkb::validate::unknown_operator),
        help(
            "Strict operator mode only accepts operators declared in the theory \
             (`__Relation`, `__TransitiveRelation`, ...), defined graphs, builtins, \
             or operators already present in the knowledge base."
        )
    )]
    UnknownOperator { operator: String, line: usize },

    #[error("undeclared primitive \"{operator}\" at line {line}")]
    #[diagnostic(
        code(hdkb::validate::undeclared_operator),
        help(
            "Names starting with `__` must be relation-property markers and names \
             starting with `___` must be registered builtin primitives."
        )
    )]
    UndeclaredOperator { operator: String, line: usize },

    #[error("undefined reference ${name} at line {line}")]
    #[diagnostic(
        code(hdkb::validate::undefined_reference),
        help("Bind the name first with `@{name} ...` earlier in the program or in a previous call.")
    )]
    UndefinedReference { name: String, line: usize },

    #[error("hole ?{name} is not allowed here (line {line})")]
    #[diagnostic(
        code(hdkb::validate::disallowed_hole),
        help(
            "Query variables are only allowed in `query` patterns and inside rule \
             bodies (`Implies`, `And`, `Or`, `Not`)."
        )
    )]
    DisallowedHole { name: String, line: usize },

    #[error("\"{name}\" is defined twice in the same scope (line {line})")]
    #[diagnostic(
        code(hdkb::validate::duplicate_definition),
        help("Each `@name` destination may only be bound once per scope. Pick a new name.")
    )]
    DuplicateDefinition { name: String, line: usize },

    #[error("expected exactly one statement, found {count}")]
    #[diagnostic(
        code(hdkb::validate::statement_count),
        help("`query` and `prove` take a single statement.")
    )]
    StatementCount { count: usize },
}

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExecutionError {
    #[error("malformed statement at line {line}: {message} in `{statement}`")]
    #[diagnostic(
        code(hdkb::exec::malformed),
        help("Check the statement shape: `@dest:name operator arg1 arg2 ...`.")
    )]
    Malformed {
        message: String,
        statement: String,
        line: usize,
    },

    #[error("undefined reference ${name} at line {line} in `{statement}`")]
    #[diagnostic(
        code(hdkb::exec::undefined_reference),
        help("The referenced name is not bound in the current scope or any parent scope.")
    )]
    UndefinedReference {
        name: String,
        statement: String,
        line: usize,
    },

    #[error("\"{name}\" is already defined in this scope (line {line})")]
    #[diagnostic(
        code(hdkb::exec::duplicate_definition),
        help("Scope definitions are immutable within a frame; use a fresh destination name.")
    )]
    DuplicateDefinition { name: String, line: usize },

    #[error("declaration `{operator}` must be persistent (line {line})")]
    #[diagnostic(
        code(hdkb::exec::non_persistent_declaration),
        help(
            "Relation-property and constraint declarations change how later facts are \
             interpreted, so they must be stored: use `@name:name {operator}` or omit \
             the destination."
        )
    )]
    NonPersistentDeclaration { operator: String, line: usize },

    #[error("non-canonical primitive `{operator}` cannot be stored as a fact (line {line})")]
    #[diagnostic(
        code(hdkb::exec::non_canonical_primitive),
        help(
            "Single-underscore operators are surface forms. Declare a \
             `canonicalRewrite {operator} <target> \"<positions>\"` rule or use the \
             canonical operator directly."
        )
    )]
    NonCanonicalPrimitive { operator: String, line: usize },

    #[error("invalid negation at line {line}: {message}")]
    #[diagnostic(
        code(hdkb::exec::invalid_negation),
        help("`Not` must wrap a `$reference`, a `(compound ...)`, a bare atom, or a flat `Not op a b` form.")
    )]
    InvalidNegation { message: String, line: usize },

    #[error("unsupported expression {kind} in `{statement}` (line {line})")]
    #[diagnostic(
        code(hdkb::exec::unsupported_expression),
        help("Holes are only meaningful in queries and rule bodies.")
    )]
    UnsupportedExpression {
        kind: String,
        statement: String,
        line: usize,
    },

    #[error("graph \"{graph}\" expects {expected} argument(s), got {actual} (line {line})")]
    #[diagnostic(
        code(hdkb::exec::graph_arity),
        help("Call the graph with exactly as many arguments as it declares parameters.")
    )]
    GraphArity {
        graph: String,
        expected: usize,
        actual: usize,
        line: usize,
    },

    #[error("graph \"{graph}\" has no `return` statement")]
    #[diagnostic(
        code(hdkb::exec::graph_without_return),
        help("End the graph body with `return $name` to yield its result vector.")
    )]
    GraphWithoutReturn { graph: String },

    #[error("unknown setting \"{name}\" (line {line})")]
    #[diagnostic(
        code(hdkb::exec::unknown_setting),
        help(
            "Known settings: canonicalization, enforceCanonical, rejectContradictions, \
             strictOperators. Values are `true` or `false`."
        )
    )]
    UnknownSetting { name: String, line: usize },

    #[error("theory \"{name}\" is not available from the session theory source")]
    #[diagnostic(
        code(hdkb::exec::unknown_theory),
        help("Configure `theory_dir` or construct the session with a theory source that provides it.")
    )]
    UnknownTheory { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Vsa(#[from] VsaError),
}

// ---------------------------------------------------------------------------
// Reasoning errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ReasonError {
    #[error("proof search timed out after {elapsed_ms} ms")]
    #[diagnostic(
        code(hdkb::reason::timeout),
        help(
            "The backward-chaining search exceeded its wall-clock budget. Increase \
             `proof.timeout_ms` or simplify the theory (deep transitive chains, \
             many rules)."
        )
    )]
    Timeout { elapsed_ms: u128 },

    #[error("goal must be a binary or n-ary statement without holes")]
    #[diagnostic(
        code(hdkb::reason::invalid_goal),
        help("`prove` takes a ground statement such as `isA Poodle Animal`.")
    )]
    InvalidGoal,
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(hdkb::config::invalid), help("Check the SessionConfig fields. {message}"))]
    Invalid { message: String },

    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(hdkb::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(code(hdkb::config::parse), help("Check the TOML syntax of the config file."))]
    Parse { path: String, message: String },

    #[error("failed to write config file {path}")]
    #[diagnostic(
        code(hdkb::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning hdkb results.
pub type KbResult<T> = std::result::Result<T, KbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsa_error_converts_to_kb_error() {
        let err = VsaError::DimensionMismatch {
            expected: 1024,
            actual: 512,
        };
        let kb: KbError = err.into();
        assert!(matches!(kb, KbError::Vsa(VsaError::DimensionMismatch { .. })));
    }

    #[test]
    fn execution_error_wraps_vsa_error() {
        let exec: ExecutionError = VsaError::EmptyBundle.into();
        assert!(matches!(exec, ExecutionError::Vsa(VsaError::EmptyBundle)));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ExecutionError::NonCanonicalPrimitive {
            operator: "_isA".into(),
            line: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("_isA"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn code_string_is_stable() {
        let kb: KbError = ValidationError::StatementCount { count: 2 }.into();
        assert_eq!(kb.code_string(), "hdkb::validate::statement_count");
    }
}
