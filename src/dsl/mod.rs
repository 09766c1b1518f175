//! Statement AST and the minimal line-oriented parser that produces it.
//!
//! Expressions are a closed sum type matched exhaustively by every consumer
//! (canonicalizer, validator, executor).

pub mod error;
pub mod lexer;
pub mod parser;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use parser::parse_program;

/// Where a statement came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl SourceLoc {
    pub fn new(file: Option<&str>, line: usize, column: usize) -> Self {
        Self {
            file: file.map(str::to_string),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}:{}", self.line, self.column),
            None => write!(f, "<input>:{}:{}", self.line, self.column),
        }
    }
}

/// One argument expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    Identifier { name: String },
    /// `$name`, dereferenced through the scope.
    Reference { name: String },
    /// Quoted string or number, stored without quotes.
    Literal { value: String },
    /// `?name` query variable.
    Hole { name: String },
    List { items: Vec<Expr> },
    Compound { operator: String, args: Vec<Expr> },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    /// Short tag used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Identifier { .. } => "identifier",
            Expr::Reference { .. } => "reference",
            Expr::Literal { .. } => "literal",
            Expr::Hole { .. } => "hole",
            Expr::List { .. } => "list",
            Expr::Compound { .. } => "compound",
        }
    }

    /// Token used when this expression is flattened into fact metadata.
    pub fn atom_text(&self) -> String {
        match self {
            Expr::Identifier { name } => name.clone(),
            Expr::Reference { name } => format!("${name}"),
            Expr::Literal { value } => value.clone(),
            Expr::Hole { name } => format!("?{name}"),
            Expr::List { .. } | Expr::Compound { .. } => self.to_string(),
        }
    }

    /// True if this expression or any sub-expression is a hole.
    pub fn contains_hole(&self) -> bool {
        match self {
            Expr::Hole { .. } => true,
            Expr::List { items } => items.iter().any(Expr::contains_hole),
            Expr::Compound { args, .. } => args.iter().any(Expr::contains_hole),
            _ => false,
        }
    }
}

fn is_plain_number(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier { name } => write!(f, "{name}"),
            Expr::Reference { name } => write!(f, "${name}"),
            Expr::Literal { value } if is_plain_number(value) => write!(f, "{value}"),
            Expr::Literal { value } => write!(f, "\"{}\"", value.replace('"', "\\\"")),
            Expr::Hole { name } => write!(f, "?{name}"),
            Expr::List { items } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Expr::Compound { operator, args } => {
                write!(f, "({operator}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Nested statement bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    /// `@Name graph p1 p2 ... end`
    Graph { params: Vec<String>, body: Vec<Statement> },
    /// `@rel solve kind ... end`
    Solve { kind: String, body: Vec<Statement> },
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub destination: Option<String>,
    pub persist_name: Option<String>,
    pub is_persistent: bool,
    pub operator: String,
    pub args: Vec<Expr>,
    pub source: SourceLoc,
    /// Trailing comment text, kept through rewrites.
    pub comment: Option<String>,
    pub block: Option<Block>,
}

impl Statement {
    /// An anonymous persistent statement, mostly for programmatic construction.
    pub fn fact(operator: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            destination: None,
            persist_name: None,
            is_persistent: true,
            operator: operator.into(),
            args,
            source: SourceLoc::default(),
            comment: None,
            block: None,
        }
    }

    /// Persistence rule: no destination means persistent; `@d:p` is persistent.
    pub fn should_persist(&self) -> bool {
        self.destination.is_none() || self.is_persistent
    }

    pub fn line(&self) -> usize {
        self.source.line
    }

    /// Flattened `op a b` text, without destination.
    pub fn fact_text(&self) -> String {
        let mut out = self.operator.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string());
        }
        out
    }

    pub fn contains_hole(&self) -> bool {
        self.args.iter().any(Expr::contains_hole)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.destination, &self.persist_name) {
            (Some(dest), Some(p)) => write!(f, "@{dest}:{p} ")?,
            (Some(dest), None) => write!(f, "@{dest} ")?,
            _ => {}
        }
        write!(f, "{}", self.fact_text())
    }
}

/// A parsed program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
