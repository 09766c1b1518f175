//! Triple-underscore vector primitives.

use crate::contradiction::IS_A;
use crate::dsl::{Expr, Statement};
use crate::error::{ExecutionError, KbResult};
use crate::vsa::HyperVec;

use super::metadata::arg_text;
use super::state::KbState;

pub const BUILTINS: &[&str] = &[
    "___NewVector",
    "___Bind",
    "___Bundle",
    "___Not",
    "___GetType",
    "___MostSimilar",
];

pub fn is_builtin(op: &str) -> bool {
    BUILTINS.contains(&op)
}

fn arity(statement: &Statement, op: &str, wanted: &str) -> ExecutionError {
    ExecutionError::Malformed {
        message: format!("{op} expects {wanted}"),
        statement: statement.to_string(),
        line: statement.line(),
    }
}

/// Evaluate a builtin. `vectors` are the already-evaluated `args`.
pub fn eval(
    state: &mut KbState,
    op: &str,
    args: &[Expr],
    vectors: &[HyperVec],
    statement: &Statement,
) -> KbResult<HyperVec> {
    let ops = state.ops();
    match op {
        "___NewVector" => Ok(match args.first() {
            Some(name) => state.vocab.get_or_create(&arg_text(name)),
            None => ops.random(&mut state.rng),
        }),
        "___Bind" => {
            let [first, rest @ ..] = vectors else {
                return Err(arity(statement, op, "at least two vectors").into());
            };
            if rest.is_empty() {
                return Err(arity(statement, op, "at least two vectors").into());
            }
            let mut acc = first.clone();
            for v in rest {
                acc = ops.bind(&acc, v)?;
            }
            Ok(acc)
        }
        "___Bundle" => {
            let refs: Vec<&HyperVec> = vectors.iter().collect();
            if refs.is_empty() {
                return Err(arity(statement, op, "at least one vector").into());
            }
            Ok(ops.bundle(&refs)?)
        }
        "___Not" => match vectors {
            [v] => Ok(ops.complement(v)),
            _ => Err(arity(statement, op, "exactly one vector").into()),
        },
        "___GetType" => {
            let Some(entity) = args.first().map(arg_text) else {
                return Err(arity(statement, op, "an entity").into());
            };
            let ty = state
                .store
                .component()
                .edges_from(IS_A, &entity)
                .first()
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            Ok(state.vocab.get_or_create(&ty))
        }
        "___MostSimilar" => {
            let Some(query) = vectors.first() else {
                return Err(arity(statement, op, "a query vector").into());
            };
            let best = state
                .vocab
                .nearest(query, 1)?
                .into_iter()
                .next()
                .and_then(|hit| state.vocab.get(&hit.name).cloned());
            Ok(best.unwrap_or_else(|| query.clone()))
        }
        other => Err(ExecutionError::Malformed {
            message: format!("unknown builtin {other}"),
            statement: statement.to_string(),
            line: statement.line(),
        }
        .into()),
    }
}
