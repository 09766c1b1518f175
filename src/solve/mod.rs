//! `solve` blocks: constraint problems and plans built from KB facts.
//!
//! ```text
//! @seating solve csp            @route solve plan
//!   variables from Guest          start Home
//!   domain from Table             goal Office
//!   noConflict conflictsWith      maxDepth 6
//!   allDifferent                  transition road
//! end                             guard closed
//!                               end
//! ```
//!
//! Solutions go back into the KB through the normal insertion path, so they
//! take part in queries and contradiction checks like any other fact.

pub mod csp;
pub mod plan;

use std::collections::BTreeSet;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::contradiction::IS_A;
use crate::dsl::{SourceLoc, Statement};
use crate::error::KbResult;
use crate::exec::metadata::arg_text;
use crate::exec::state::KbState;
use crate::kb::{FactId, FactMetadata};
use crate::vsa::HyperVec;

use csp::{BacktrackSolver, ConstraintSolver, SolveOptions, SolveStats};
use plan::{BfsPlanner, PlanProblem, Planner};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SolveError {
    #[error("unknown solve kind \"{kind}\"")]
    #[diagnostic(code(hdkb::solve::unknown_kind), help("Supported kinds: csp, plan."))]
    UnknownKind { kind: String },

    #[error("unknown solve declaration \"{name}\" (line {line})")]
    #[diagnostic(
        code(hdkb::solve::unknown_declaration),
        help(
            "csp blocks accept variables, domain, noConflict, allDifferent; plan blocks \
             accept start, goal, maxDepth, transition, guard."
        )
    )]
    UnknownDeclaration { name: String, line: usize },

    #[error("solve \"{relation}\" has no variables")]
    #[diagnostic(
        code(hdkb::solve::no_variables),
        help("`variables from Type` found no entities with a direct `isA x Type` fact.")
    )]
    NoVariables { relation: String },

    #[error("solve \"{relation}\" has an empty domain")]
    #[diagnostic(
        code(hdkb::solve::empty_domain),
        help("`domain from Type` found no entities with a direct `isA x Type` fact.")
    )]
    EmptyDomain { relation: String },

    #[error("constraint refers to unknown variable \"{name}\"")]
    #[diagnostic(code(hdkb::solve::unknown_variable))]
    UnknownVariable { name: String },

    #[error("plan needs both `start` and `goal`")]
    #[diagnostic(code(hdkb::solve::incomplete_plan))]
    IncompletePlan,

    #[error("solution {index} of \"{relation}\" violates {constraint}")]
    #[diagnostic(
        code(hdkb::solve::verification_failed),
        help("The solver returned an assignment that fails re-verification; this is a solver bug.")
    )]
    VerificationFailed {
        relation: String,
        index: usize,
        constraint: String,
    },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SolveKind {
    Csp,
    Plan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionRecord {
    /// `(entity, value)` in variable order; plan steps as `(from, to)`.
    pub assignments: Vec<(String, String)>,
    /// Human-readable verification trail.
    pub proof: String,
}

/// Everything a `solve` block produced, kept per relation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRecord {
    pub relation: String,
    pub kind: SolveKind,
    pub success: bool,
    pub solutions: Vec<SolutionRecord>,
    pub fact_ids: Vec<FactId>,
    pub stats: SolveStats,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CspSpec {
    variables: Vec<String>,
    domain: Vec<String>,
    no_conflict: Vec<String>,
    all_different: bool,
}

/// Entities `x` with a direct `isA x Type` fact, in fact order.
fn instances_of(state: &KbState, ty: &str) -> Vec<String> {
    state.store.component().edges_to(IS_A, ty).to_vec()
}

/// `from Type` resolves through `isA`; anything else is an explicit list.
fn entity_list(state: &KbState, statement: &Statement) -> Vec<String> {
    let args: Vec<String> = statement.args.iter().map(arg_text).collect();
    match args.as_slice() {
        [from, ty] if from == "from" => instances_of(state, ty),
        _ => args,
    }
}

/// Run a `solve` block. Returns the vector bound to the relation name.
pub fn run_solve(
    state: &mut KbState,
    relation: &str,
    kind: &str,
    body: &[Statement],
    source: &SourceLoc,
) -> KbResult<HyperVec> {
    let (record, vector) = match kind {
        "csp" => solve_csp(state, relation, body, source)?,
        "plan" | "planning" => solve_plan(state, relation, body, source)?,
        other => {
            return Err(SolveError::UnknownKind {
                kind: other.to_string(),
            }
            .into());
        }
    };
    info!(
        relation,
        kind,
        success = record.success,
        solutions = record.solutions.len(),
        "solve finished"
    );
    if !record.success {
        state
            .warnings
            .push(format!("solve \"{relation}\" found no solution"));
    }
    state.solves.insert(relation.to_string(), record);
    Ok(vector)
}

fn solve_csp(
    state: &mut KbState,
    relation: &str,
    body: &[Statement],
    source: &SourceLoc,
) -> KbResult<(SolveRecord, HyperVec)> {
    let mut spec = CspSpec::default();
    for decl in body {
        match decl.operator.as_str() {
            "variables" => spec.variables = entity_list(state, decl),
            "domain" => spec.domain = entity_list(state, decl),
            "noConflict" => spec.no_conflict.extend(decl.args.iter().map(arg_text)),
            "allDifferent" => spec.all_different = true,
            other => {
                return Err(SolveError::UnknownDeclaration {
                    name: other.to_string(),
                    line: decl.line(),
                }
                .into());
            }
        }
    }
    if spec.variables.is_empty() {
        return Err(SolveError::NoVariables {
            relation: relation.to_string(),
        }
        .into());
    }
    if spec.domain.is_empty() {
        return Err(SolveError::EmptyDomain {
            relation: relation.to_string(),
        }
        .into());
    }

    let mut solver = BacktrackSolver::new();
    for var in &spec.variables {
        solver.add_variable(var, spec.domain.clone());
    }
    let conflicts = conflict_pairs(state, &spec);
    for (a, b) in &conflicts {
        solver.add_predicate(&[a.as_str(), b.as_str()], Box::new(|v: &[&str]| v[0] != v[1]))?;
    }
    if spec.all_different {
        let vars: Vec<&str> = spec.variables.iter().map(String::as_str).collect();
        solver.add_all_different(&vars)?;
    }
    let outcome = solver.solve(SolveOptions {
        timeout_ms: state.config.solver.timeout_ms,
        max_solutions: state.config.solver.max_solutions,
    });

    let ops = state.ops();
    let rel_vec = state.vocab.get_or_create(relation);
    let mut solutions = Vec::new();
    let mut fact_ids = Vec::new();
    let mut first_vector = None;

    for (index, assignment) in outcome.solutions.iter().enumerate() {
        let proof = verify(relation, index, assignment, &conflicts, spec.all_different)?;

        let mut terms = Vec::with_capacity(assignment.len());
        for (entity, value) in assignment {
            let e = state.vocab.get_or_create(entity);
            let v = state.vocab.get_or_create(value);
            terms.push(state.encode_fact(&rel_vec, &[e, v])?);
        }
        let refs: Vec<&HyperVec> = terms.iter().collect();
        let bundled = ops.bundle(&refs)?;

        if index == 0 {
            for (entity, value) in assignment {
                let meta = FactMetadata::new(relation, vec![entity.clone(), value.clone()])
                    .with_source(source.clone());
                let v = state.encode_metadata(&meta)?;
                fact_ids.push(state.add_to_kb(v, None, meta)?);
            }
            first_vector = Some(bundled.clone());
        }

        let mut tuple_args = vec![relation.to_string()];
        tuple_args.extend(assignment.iter().map(|(_, v)| v.clone()));
        let tuple = FactMetadata::new("cspTuple", tuple_args).with_source(source.clone());
        fact_ids.push(state.add_to_kb(bundled, None, tuple)?);

        solutions.push(SolutionRecord {
            assignments: assignment.clone(),
            proof,
        });
    }

    let record = SolveRecord {
        relation: relation.to_string(),
        kind: SolveKind::Csp,
        success: outcome.success,
        solutions,
        fact_ids,
        stats: outcome.stats,
    };
    Ok((record, first_vector.unwrap_or(rel_vec)))
}

/// Explicit conflict pairs among the variables, from `noConflict` relations.
fn conflict_pairs(state: &KbState, spec: &CspSpec) -> Vec<(String, String)> {
    let vars: BTreeSet<&str> = spec.variables.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    let mut pairs = Vec::new();
    for rel in &spec.no_conflict {
        for fact in state.store.by_operator(rel) {
            let Some((a, b)) = fact.metadata.binary() else {
                continue;
            };
            if a == b || !vars.contains(a) || !vars.contains(b) {
                continue;
            }
            let key = if a < b { (a, b) } else { (b, a) };
            if seen.insert(key) {
                pairs.push((a.to_string(), b.to_string()));
            }
        }
    }
    pairs
}

/// Re-check a solution and render its proof trail.
fn verify(
    relation: &str,
    index: usize,
    assignment: &[(String, String)],
    conflicts: &[(String, String)],
    all_different: bool,
) -> Result<String, SolveError> {
    let value_of = |e: &str| assignment.iter().find(|(n, _)| n == e).map(|(_, v)| v.as_str());
    let mut parts: Vec<String> = assignment.iter().map(|(e, v)| format!("{e} at {v}")).collect();
    for (a, b) in conflicts {
        if value_of(a) == value_of(b) {
            return Err(SolveError::VerificationFailed {
                relation: relation.to_string(),
                index,
                constraint: format!("noConflict {a} {b}"),
            });
        }
        parts.push(format!("{a} apart from {b}"));
    }
    if all_different {
        let distinct: BTreeSet<&str> = assignment.iter().map(|(_, v)| v.as_str()).collect();
        if distinct.len() != assignment.len() {
            return Err(SolveError::VerificationFailed {
                relation: relation.to_string(),
                index,
                constraint: "allDifferent".into(),
            });
        }
        parts.push("values distinct".into());
    }
    Ok(parts.join(", "))
}

fn solve_plan(
    state: &mut KbState,
    relation: &str,
    body: &[Statement],
    source: &SourceLoc,
) -> KbResult<(SolveRecord, HyperVec)> {
    let mut problem = PlanProblem {
        max_depth: state.config.proof.max_depth,
        ..PlanProblem::default()
    };
    let mut transitions = Vec::new();
    let mut guards = Vec::new();
    for decl in body {
        let first = decl.args.first().map(arg_text).unwrap_or_default();
        match decl.operator.as_str() {
            "start" => problem.start = first,
            "goal" => problem.goal = first,
            "maxDepth" => {
                problem.max_depth = first.parse().unwrap_or(problem.max_depth);
            }
            "transition" => transitions.push(first),
            "guard" => guards.push(first),
            other => {
                return Err(SolveError::UnknownDeclaration {
                    name: other.to_string(),
                    line: decl.line(),
                }
                .into());
            }
        }
    }
    for rel in &transitions {
        for fact in state.store.by_operator(rel) {
            if let Some((a, b)) = fact.metadata.binary() {
                problem.add_transition(a, b);
            }
        }
    }
    for rel in &guards {
        for fact in state.store.by_operator(rel) {
            if let [x] = fact.args() {
                problem.forbidden.insert(x.clone());
            }
        }
    }

    let started = std::time::Instant::now();
    let found = BfsPlanner.plan(&problem)?;
    let stats = SolveStats {
        elapsed_ms: started.elapsed().as_millis(),
        ..SolveStats::default()
    };

    let ops = state.ops();
    let mut fact_ids = Vec::new();
    let mut solutions = Vec::new();
    let mut vector = state.vocab.get_or_create(relation);
    if let Some(plan) = &found {
        let mut step_vectors = Vec::with_capacity(plan.steps.len());
        for (i, step) in plan.steps.iter().enumerate() {
            let meta = FactMetadata::new(
                "planStep",
                vec![
                    relation.to_string(),
                    (i + 1).to_string(),
                    step.from.clone(),
                    step.to.clone(),
                ],
            )
            .with_source(source.clone());
            let v = state.encode_metadata(&meta)?;
            step_vectors.push(v.clone());
            fact_ids.push(state.add_to_kb(v, None, meta)?);
        }
        if !step_vectors.is_empty() {
            let refs: Vec<&HyperVec> = step_vectors.iter().collect();
            vector = ops.bundle(&refs)?;
        }
        solutions.push(SolutionRecord {
            assignments: plan
                .steps
                .iter()
                .map(|s| (s.from.clone(), s.to.clone()))
                .collect(),
            proof: plan.trail(&problem.start),
        });
    }

    let record = SolveRecord {
        relation: relation.to_string(),
        kind: SolveKind::Plan,
        success: found.is_some(),
        solutions,
        fact_ids,
        stats,
    };
    Ok((record, vector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_renders_trail() {
        let assignment = vec![
            ("Ann".to_string(), "T1".to_string()),
            ("Bob".to_string(), "T2".to_string()),
        ];
        let conflicts = vec![("Ann".to_string(), "Bob".to_string())];
        let proof = verify("seating", 0, &assignment, &conflicts, true).unwrap();
        assert_eq!(proof, "Ann at T1, Bob at T2, Ann apart from Bob, values distinct");

        let clash = vec![
            ("Ann".to_string(), "T1".to_string()),
            ("Bob".to_string(), "T1".to_string()),
        ];
        assert!(matches!(
            verify("seating", 0, &clash, &conflicts, false),
            Err(SolveError::VerificationFailed { .. })
        ));
    }
}
