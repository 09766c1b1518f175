//! Static checks run on a parsed program before anything executes.

use std::collections::HashSet;

use crate::canonical::FORMULA_OPERATORS;
use crate::dsl::{Block, Expr, Program, Statement};
use crate::error::ValidationError;
use crate::exec::builtins::is_builtin;
use crate::exec::state::KbState;
use crate::kb::component::ALIAS_OPERATORS;
use crate::semantic::{PropertyKind, is_declaration_operator};

/// Verbs and structural words that are always valid operators.
const CORE_OPERATORS: &[&str] = &[
    "Load",
    "Unload",
    "Set",
    "induce",
    "bundle",
    "solve",
    "graph",
    "return",
    "canonicalRewrite",
    "cspTuple",
    "planStep",
];

/// What the program is about to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Learn,
    Query,
    Prove,
}

pub fn validate(program: &Program, state: &KbState, mode: Mode) -> Result<(), ValidationError> {
    if matches!(mode, Mode::Query | Mode::Prove) && program.len() != 1 {
        return Err(ValidationError::StatementCount {
            count: program.len(),
        });
    }
    let mut checker = Checker {
        state,
        mode,
        graphs: HashSet::new(),
        declared: HashSet::new(),
    };
    checker.block(&program.statements, &HashSet::new())
}

struct Checker<'a> {
    state: &'a KbState,
    mode: Mode,
    /// Graphs defined earlier in this program.
    graphs: HashSet<String>,
    /// Operators declared or given rewrite rules earlier in this program.
    declared: HashSet<String>,
}

impl Checker<'_> {
    /// One statement list. `outer` holds names visible from enclosing lists
    /// and graph parameters; names defined here may not repeat.
    fn block(&mut self, statements: &[Statement], outer: &HashSet<String>) -> Result<(), ValidationError> {
        let mut visible = outer.clone();
        let mut defined = HashSet::new();
        for statement in statements {
            self.statement(statement, &visible)?;
            if let Some(dest) = &statement.destination {
                if !defined.insert(dest.clone()) {
                    return Err(ValidationError::DuplicateDefinition {
                        name: dest.clone(),
                        line: statement.line(),
                    });
                }
                visible.insert(dest.clone());
            }
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement, visible: &HashSet<String>) -> Result<(), ValidationError> {
        match &statement.block {
            Some(Block::Graph { params, body }) => {
                if let Some(name) = &statement.destination {
                    self.graphs.insert(name.clone());
                }
                let mut inner = visible.clone();
                inner.extend(params.iter().map(|p| p.trim_start_matches('$').to_string()));
                return self.block(body, &inner);
            }
            // Solve bodies use their own declaration vocabulary.
            Some(Block::Solve { .. }) => return Ok(()),
            None => {}
        }

        self.operator(&statement.operator, statement.line())?;
        self.args(&statement.args, statement, visible)?;
        self.holes(statement)?;
        self.record_declaration(statement);
        Ok(())
    }

    /// Mirror what storing `statement` will add to the operator vocabulary.
    fn record_declaration(&mut self, statement: &Statement) {
        if !statement.should_persist() {
            return;
        }
        let first = match statement.args.first() {
            Some(Expr::Identifier { name }) => Some(name.as_str()),
            _ => None,
        };
        let declared = match PropertyKind::from_marker(&statement.operator) {
            Some(PropertyKind::TypeMarker) => None,
            Some(_) => first.or(statement.persist_name.as_deref()),
            None if statement.operator == "canonicalRewrite" => first,
            None => None,
        };
        if let Some(name) = declared {
            self.declared.insert(name.to_string());
        }
    }

    fn operator(&self, op: &str, line: usize) -> Result<(), ValidationError> {
        if let Some(rest) = op.strip_prefix("___") {
            if !is_builtin(op) || rest.is_empty() {
                return Err(ValidationError::UndeclaredOperator {
                    operator: op.to_string(),
                    line,
                });
            }
            return Ok(());
        }
        if op.starts_with("__") && PropertyKind::from_marker(op).is_none() {
            return Err(ValidationError::UndeclaredOperator {
                operator: op.to_string(),
                line,
            });
        }
        if self.state.config.strict_operators && !self.is_known(op) {
            return Err(ValidationError::UnknownOperator {
                operator: op.to_string(),
                line,
            });
        }
        Ok(())
    }

    fn is_known(&self, op: &str) -> bool {
        let state = self.state;
        CORE_OPERATORS.contains(&op)
            || FORMULA_OPERATORS.contains(&op)
            || ALIAS_OPERATORS.contains(&op)
            || is_declaration_operator(op)
            || is_builtin(op)
            || self.graphs.contains(op)
            || self.declared.contains(op)
            || state.graphs.contains_key(op)
            || state.semantic.operator_kind(op).is_some()
            || state.rewrites.has_rules(op)
            || state.store.index().operators().any(|known| known == op)
    }

    fn args(&self, args: &[Expr], statement: &Statement, local: &HashSet<String>) -> Result<(), ValidationError> {
        for arg in args {
            match arg {
                Expr::Reference { name } => {
                    if !local.contains(name) && !self.state.scope.has(name) {
                        return Err(ValidationError::UndefinedReference {
                            name: name.clone(),
                            line: statement.line(),
                        });
                    }
                }
                Expr::List { items } => self.args(items, statement, local)?,
                Expr::Compound { operator, args } => {
                    self.operator(operator, statement.line())?;
                    self.args(args, statement, local)?;
                }
                Expr::Identifier { .. } | Expr::Literal { .. } | Expr::Hole { .. } => {}
            }
        }
        Ok(())
    }

    /// Holes are fine in queries, in scope-only statements and inside rule
    /// bodies. Stored facts and proof goals must be ground.
    fn holes(&self, statement: &Statement) -> Result<(), ValidationError> {
        let allowed = match self.mode {
            Mode::Query => true,
            Mode::Prove => false,
            Mode::Learn => {
                !statement.should_persist() || FORMULA_OPERATORS.contains(&statement.operator.as_str())
            }
        };
        if allowed {
            return Ok(());
        }
        match first_hole(&statement.args) {
            Some(name) => Err(ValidationError::DisallowedHole {
                name,
                line: statement.line(),
            }),
            None => Ok(()),
        }
    }
}

fn first_hole(args: &[Expr]) -> Option<String> {
    args.iter().find_map(|arg| match arg {
        Expr::Hole { name } => Some(name.clone()),
        Expr::List { items } => first_hole(items),
        Expr::Compound { args, .. } => first_hole(args),
        _ => None,
    })
}
