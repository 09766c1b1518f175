//! Finite-domain constraint solving.
//!
//! [`ConstraintSolver`] is the contract the orchestrator drives;
//! [`BacktrackSolver`] is the default chronological backtracking strategy.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::SolveError;

/// Checks the values of a predicate's variables, in declaration order.
pub type Predicate = Box<dyn Fn(&[&str]) -> bool>;

/// One complete assignment, in variable declaration order.
pub type Assignment = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOptions {
    pub timeout_ms: u64,
    pub max_solutions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveStats {
    pub nodes: usize,
    pub backtracks: usize,
    pub elapsed_ms: u128,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutcome {
    pub success: bool,
    pub solutions: Vec<Assignment>,
    pub solution_count: usize,
    pub stats: SolveStats,
}

pub trait ConstraintSolver {
    fn add_variable(&mut self, name: &str, domain: Vec<String>);

    fn add_predicate(&mut self, vars: &[&str], predicate: Predicate) -> Result<(), SolveError>;

    fn add_all_different(&mut self, vars: &[&str]) -> Result<(), SolveError>;

    fn solve(&mut self, options: SolveOptions) -> SolveOutcome;
}

struct Constraint {
    vars: Vec<usize>,
    /// Highest variable index; the constraint is checked once it is assigned.
    last: usize,
    check: Predicate,
}

/// Chronological backtracking over variables in declaration order, values in
/// domain order.
#[derive(Default)]
pub struct BacktrackSolver {
    names: Vec<String>,
    domains: Vec<Vec<String>>,
    constraints: Vec<Constraint>,
}

impl fmt::Debug for BacktrackSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BacktrackSolver")
            .field("variables", &self.names)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

impl BacktrackSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&self, var: &str) -> Result<usize, SolveError> {
        self.names
            .iter()
            .position(|n| n == var)
            .ok_or_else(|| SolveError::UnknownVariable {
                name: var.to_string(),
            })
    }

    fn consistent(&self, depth: usize, values: &[usize]) -> bool {
        self.constraints.iter().filter(|c| c.last == depth).all(|c| {
            let args: Vec<&str> = c
                .vars
                .iter()
                .map(|&v| self.domains[v][values[v]].as_str())
                .collect();
            (c.check)(&args)
        })
    }
}

struct Search {
    deadline: Instant,
    max_solutions: usize,
    values: Vec<usize>,
    solutions: Vec<Assignment>,
    stats: SolveStats,
}

impl BacktrackSolver {
    fn search(&self, depth: usize, s: &mut Search) {
        if s.stats.timed_out || s.solutions.len() >= s.max_solutions {
            return;
        }
        if depth == self.names.len() {
            s.solutions.push(
                self.names
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (n.clone(), self.domains[i][s.values[i]].clone()))
                    .collect(),
            );
            return;
        }
        for choice in 0..self.domains[depth].len() {
            s.stats.nodes += 1;
            if Instant::now() > s.deadline {
                s.stats.timed_out = true;
                return;
            }
            s.values[depth] = choice;
            if self.consistent(depth, &s.values) {
                self.search(depth + 1, s);
                if s.stats.timed_out || s.solutions.len() >= s.max_solutions {
                    return;
                }
            } else {
                s.stats.backtracks += 1;
            }
        }
    }
}

impl ConstraintSolver for BacktrackSolver {
    fn add_variable(&mut self, name: &str, domain: Vec<String>) {
        self.names.push(name.to_string());
        self.domains.push(domain);
    }

    fn add_predicate(&mut self, vars: &[&str], predicate: Predicate) -> Result<(), SolveError> {
        let vars = vars
            .iter()
            .map(|v| self.index_of(v))
            .collect::<Result<Vec<_>, _>>()?;
        let last = vars.iter().copied().max().unwrap_or(0);
        self.constraints.push(Constraint {
            vars,
            last,
            check: predicate,
        });
        Ok(())
    }

    fn add_all_different(&mut self, vars: &[&str]) -> Result<(), SolveError> {
        for (i, a) in vars.iter().enumerate() {
            for b in &vars[i + 1..] {
                self.add_predicate(&[*a, *b], Box::new(|v: &[&str]| v[0] != v[1]))?;
            }
        }
        Ok(())
    }

    fn solve(&mut self, options: SolveOptions) -> SolveOutcome {
        let started = Instant::now();
        let mut search = Search {
            deadline: started + Duration::from_millis(options.timeout_ms),
            max_solutions: options.max_solutions,
            values: vec![0; self.names.len()],
            solutions: Vec::new(),
            stats: SolveStats::default(),
        };
        if self.domains.iter().all(|d| !d.is_empty()) {
            self.search(0, &mut search);
        }
        search.stats.elapsed_ms = started.elapsed().as_millis();
        SolveOutcome {
            success: !search.solutions.is_empty(),
            solution_count: search.solutions.len(),
            solutions: search.solutions,
            stats: search.stats,
        }
    }
}
