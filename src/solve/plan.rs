//! State-space planning over binary transition facts.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::SolveError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanProblem {
    pub start: String,
    pub goal: String,
    pub max_depth: usize,
    /// state → successor states, in fact order.
    pub transitions: HashMap<String, Vec<String>>,
    /// States the plan may never enter.
    pub forbidden: HashSet<String>,
}

impl PlanProblem {
    pub fn add_transition(&mut self, from: &str, to: &str) {
        let next = self.transitions.entry(from.to_string()).or_default();
        if !next.iter().any(|n| n == to) {
            next.push(to.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// `A -> B -> C`
    pub fn trail(&self, start: &str) -> String {
        let mut out = start.to_string();
        for step in &self.steps {
            out.push_str(" -> ");
            out.push_str(&step.to);
        }
        out
    }
}

pub trait Planner {
    /// Shortest plan from start to goal, or `None` if unreachable within the bound.
    fn plan(&self, problem: &PlanProblem) -> Result<Option<Plan>, SolveError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BfsPlanner;

impl Planner for BfsPlanner {
    fn plan(&self, problem: &PlanProblem) -> Result<Option<Plan>, SolveError> {
        if problem.start.is_empty() || problem.goal.is_empty() {
            return Err(SolveError::IncompletePlan);
        }
        if problem.forbidden.contains(&problem.start) {
            return Ok(None);
        }
        if problem.start == problem.goal {
            return Ok(Some(Plan { steps: Vec::new() }));
        }

        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::from([problem.start.as_str()]);
        let mut queue = VecDeque::from([(problem.start.as_str(), 0usize)]);

        while let Some((state, depth)) = queue.pop_front() {
            if depth >= problem.max_depth {
                continue;
            }
            let Some(next) = problem.transitions.get(state) else {
                continue;
            };
            for succ in next {
                let succ = succ.as_str();
                if problem.forbidden.contains(succ) || !seen.insert(succ) {
                    continue;
                }
                parent.insert(succ, state);
                if succ == problem.goal {
                    let mut steps = Vec::new();
                    let mut cursor = succ;
                    while let Some(&prev) = parent.get(cursor) {
                        steps.push(PlanStep {
                            from: prev.to_string(),
                            to: cursor.to_string(),
                        });
                        cursor = prev;
                    }
                    steps.reverse();
                    return Ok(Some(Plan { steps }));
                }
                queue.push_back((succ, depth + 1));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(edges: &[(&str, &str)], max_depth: usize) -> PlanProblem {
        let mut p = PlanProblem {
            start: "Home".into(),
            goal: "Office".into(),
            max_depth,
            ..PlanProblem::default()
        };
        for (a, b) in edges {
            p.add_transition(a, b);
        }
        p
    }

    #[test]
    fn shortest_path() {
        let p = problem(
            &[("Home", "A"), ("A", "B"), ("B", "Office"), ("Home", "C"), ("C", "Office")],
            5,
        );
        let plan = BfsPlanner.plan(&p).unwrap().unwrap();
        assert_eq!(plan.trail("Home"), "Home -> C -> Office");
    }

    #[test]
    fn guard_and_depth_bound() {
        let mut p = problem(&[("Home", "C"), ("C", "Office"), ("Home", "A"), ("A", "B"), ("B", "Office")], 5);
        p.forbidden.insert("C".into());
        assert_eq!(BfsPlanner.plan(&p).unwrap().unwrap().steps.len(), 3);

        p.max_depth = 2;
        assert!(BfsPlanner.plan(&p).unwrap().is_none());
    }

    #[test]
    fn missing_goal_is_error() {
        let p = PlanProblem {
            start: "Home".into(),
            ..PlanProblem::default()
        };
        assert!(matches!(BfsPlanner.plan(&p), Err(SolveError::IncompletePlan)));
    }
}
