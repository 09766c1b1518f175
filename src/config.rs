//! Session configuration, persisted as TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vsa::{Dimension, Encoding};

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Limits for backward-chaining proof search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLimits {
    #[serde(default = "default_proof_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_proof_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_proof_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_proof_max_depth() -> usize {
    10
}
fn default_proof_max_steps() -> usize {
    10_000
}
fn default_proof_timeout_ms() -> u64 {
    2_000
}

impl Default for ProofLimits {
    fn default() -> Self {
        Self {
            max_depth: default_proof_max_depth(),
            max_steps: default_proof_max_steps(),
            timeout_ms: default_proof_timeout_ms(),
        }
    }
}

/// Defaults handed to the constraint solver and planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverDefaults {
    #[serde(default = "default_solver_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_solutions")]
    pub max_solutions: usize,
}

fn default_solver_timeout_ms() -> u64 {
    5_000
}
fn default_max_solutions() -> usize {
    100
}

impl Default for SolverDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_solver_timeout_ms(),
            max_solutions: default_max_solutions(),
        }
    }
}

/// Per-session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hypervector dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub encoding: Encoding,
    /// Directory of theory files; each file is a named theory.
    #[serde(default)]
    pub theory_dir: Option<PathBuf>,
    /// Extension of theory files inside `theory_dir`.
    #[serde(default = "default_theory_extension")]
    pub theory_extension: String,
    /// Merge the built-in default relation set into the semantic index.
    /// Only meant for refactor validation; strict mode leaves it off.
    #[serde(default)]
    pub allow_semantic_fallback: bool,
    #[serde(default = "default_true")]
    pub canonicalization_enabled: bool,
    #[serde(default = "default_true")]
    pub enforce_canonical: bool,
    #[serde(default = "default_true")]
    pub reject_contradictions: bool,
    /// Reject operators that are neither declared, defined, builtin nor in use.
    #[serde(default)]
    pub strict_operators: bool,
    /// Hop bound for the transitive derivation search of the contradiction engine.
    #[serde(default = "default_max_hops")]
    pub contradiction_max_hops: usize,
    /// Depth bound for `isA` ancestry walks.
    #[serde(default = "default_max_hops")]
    pub inheritance_max_depth: usize,
    #[serde(default)]
    pub proof: ProofLimits,
    #[serde(default = "default_max_query_results")]
    pub max_query_results: usize,
    #[serde(default)]
    pub solver: SolverDefaults,
}

fn default_dimension() -> usize {
    Dimension::DEFAULT.0
}
fn default_theory_extension() -> String {
    "sys2".into()
}
fn default_true() -> bool {
    true
}
fn default_max_hops() -> usize {
    8
}
fn default_max_query_results() -> usize {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            encoding: Encoding::default(),
            theory_dir: None,
            theory_extension: default_theory_extension(),
            allow_semantic_fallback: false,
            canonicalization_enabled: true,
            enforce_canonical: true,
            reject_contradictions: true,
            strict_operators: false,
            contradiction_max_hops: default_max_hops(),
            inheritance_max_depth: default_max_hops(),
            proof: ProofLimits::default(),
            max_query_results: default_max_query_results(),
            solver: SolverDefaults::default(),
        }
    }
}

impl SessionConfig {
    /// Small-dimension config for tests and benches.
    pub fn for_testing() -> Self {
        Self {
            dimension: Dimension::TEST.0,
            ..Default::default()
        }
    }

    pub fn dim(&self) -> Dimension {
        Dimension(self.dimension)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> ConfigResult<()> {
        let zero_field = [
            ("dimension", self.dimension as u64),
            ("contradiction_max_hops", self.contradiction_max_hops as u64),
            ("inheritance_max_depth", self.inheritance_max_depth as u64),
            ("proof.max_depth", self.proof.max_depth as u64),
            ("proof.max_steps", self.proof.max_steps as u64),
            ("proof.timeout_ms", self.proof.timeout_ms),
            ("max_query_results", self.max_query_results as u64),
            ("solver.timeout_ms", self.solver.timeout_ms),
            ("solver.max_solutions", self.solver.max_solutions as u64),
        ]
        .into_iter()
        .find(|(_, v)| *v == 0);

        if let Some((field, _)) = zero_field {
            return Err(ConfigError::Invalid {
                message: format!("`{field}` must be greater than zero"),
            });
        }
        if self.theory_extension.is_empty() {
            return Err(ConfigError::Invalid {
                message: "`theory_extension` must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
