//! Diagnostics for the statement parser.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ParseError {
    #[error("unterminated string literal at {line}:{column}")]
    #[diagnostic(
        code(hdkb::parse::unterminated_string),
        help("Close the literal with a matching `\"`. Use `\\\"` for an embedded quote.")
    )]
    UnterminatedString { line: usize, column: usize },

    #[error("unexpected `{found}` at {line}:{column}")]
    #[diagnostic(
        code(hdkb::parse::unexpected_token),
        help("Statements have the shape `@dest:name operator arg1 arg2 ...`.")
    )]
    UnexpectedToken {
        found: String,
        line: usize,
        column: usize,
    },

    #[error("unclosed `{delimiter}` opened at {line}:{column}")]
    #[diagnostic(
        code(hdkb::parse::unbalanced),
        help("Compounds `( ... )` and lists `[ ... ]` must close on the same line.")
    )]
    Unbalanced {
        delimiter: char,
        line: usize,
        column: usize,
    },

    #[error("statement at line {line} has no operator")]
    #[diagnostic(
        code(hdkb::parse::missing_operator),
        help("A destination `@name` must be followed by an operator and its arguments.")
    )]
    MissingOperator { line: usize },

    #[error("invalid destination `{text}` at line {line}")]
    #[diagnostic(
        code(hdkb::parse::invalid_destination),
        help("Destinations are `@name` (scope only) or `@name:persistName` (stored).")
    )]
    InvalidDestination { text: String, line: usize },

    #[error("{kind} block `{name}` opened at line {line} is never closed")]
    #[diagnostic(
        code(hdkb::parse::unterminated_block),
        help("End `graph` and `solve` blocks with a line containing only `end`.")
    )]
    UnterminatedBlock {
        kind: String,
        name: String,
        line: usize,
    },

    #[error("`end` at line {line} does not close any block")]
    #[diagnostic(code(hdkb::parse::stray_end), help("Remove the extra `end`."))]
    StrayEnd { line: usize },

    #[error("`{kind}` block at line {line} needs a destination name")]
    #[diagnostic(
        code(hdkb::parse::anonymous_block),
        help("Write `@Name graph p1 p2` or `@relation solve csp`.")
    )]
    AnonymousBlock { kind: String, line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnterminatedString { line, .. }
            | ParseError::UnexpectedToken { line, .. }
            | ParseError::Unbalanced { line, .. }
            | ParseError::MissingOperator { line }
            | ParseError::InvalidDestination { line, .. }
            | ParseError::UnterminatedBlock { line, .. }
            | ParseError::StrayEnd { line }
            | ParseError::AnonymousBlock { line, .. } => *line,
        }
    }
}
