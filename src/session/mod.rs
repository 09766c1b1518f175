//! Session facade: the public surface for learning, querying and proving.
//!
//! A [`Session`] owns one [`KbState`] and the theory source it was built
//! from. `learn` is all-or-nothing per call: the program runs against a
//! [`Checkpoint`] and any failure restores it. `query` and `prove` never
//! mutate the knowledge base; only validation errors escape them, every
//! other failure is reported as data.

pub mod checkpoint;
pub mod query;
pub mod validate;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::canonical::Canonicalizer;
use crate::config::SessionConfig;
use crate::contradiction::Contradiction;
use crate::dsl::{Statement, parse_program};
use crate::error::{KbError, KbResult, ValidationError};
use crate::exec::Executor;
use crate::exec::metadata::arg_text;
use crate::exec::state::KbState;
use crate::kb::Fact;
use crate::proof::Proof;
use crate::semantic::SemanticIndex;
use crate::semantic::theory::{DirectoryTheory, InMemoryTheory, TheorySource};
use crate::solve::SolveRecord;

pub use checkpoint::Checkpoint;
pub use query::QueryMatch;
pub use validate::Mode;

/// A failure rendered as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Stable diagnostic code, e.g. `hdkb::contradiction::rejected`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contradiction: Option<Contradiction>,
}

impl From<&KbError> for ErrorReport {
    fn from(err: &KbError) -> Self {
        let contradiction = match err {
            KbError::Contradiction(c) => Some(c.contradiction().clone()),
            _ => None,
        };
        Self {
            code: err.code_string(),
            message: err.to_string(),
            help: err.help().map(|h| h.to_string()),
            contradiction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnOutcome {
    pub success: bool,
    /// Net facts added by the program.
    pub facts: usize,
    pub errors: Vec<ErrorReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub success: bool,
    pub results: Vec<QueryMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveOutcome {
    pub goal: String,
    #[serde(flatten)]
    pub proof: Proof,
}

impl ProveOutcome {
    pub fn valid(&self) -> bool {
        self.proof.valid
    }
}

/// One knowledge base plus the theory source it was built from.
#[derive(Debug)]
pub struct Session {
    state: KbState,
    theories: Box<dyn TheorySource>,
}

impl Session {
    /// Build a session from config. Theories come from `theory_dir` if set.
    pub fn new(config: SessionConfig) -> KbResult<Self> {
        let theories: Box<dyn TheorySource> = match &config.theory_dir {
            Some(dir) => Box::new(DirectoryTheory::new(dir, &config.theory_extension)?),
            None => Box::new(InMemoryTheory::new()),
        };
        Self::with_theory(config, theories)
    }

    /// Build a session over an explicit theory source.
    pub fn with_theory(config: SessionConfig, theories: Box<dyn TheorySource>) -> KbResult<Self> {
        config.validate()?;
        let semantic = SemanticIndex::from_source(theories.as_ref(), config.allow_semantic_fallback)?;
        info!(
            dimension = config.dimension,
            theories = theories.theory_names()?.len(),
            fallback = config.allow_semantic_fallback,
            "session created"
        );
        Ok(Self {
            state: KbState::new(config, semantic),
            theories,
        })
    }

    /// Execute a program atomically.
    pub fn learn(&mut self, text: &str) -> LearnOutcome {
        self.learn_from(text, None)
    }

    /// Like [`learn`](Self::learn), recording `file` as the facts' source.
    pub fn learn_from(&mut self, text: &str, file: Option<&str>) -> LearnOutcome {
        let warnings_before = self.state.warnings.len();
        let program = match parse_program(text, file) {
            Ok(p) => p,
            Err(e) => return self.failed(e.into(), Vec::new()),
        };
        if let Err(e) = validate::validate(&program, &self.state, Mode::Learn) {
            return self.failed(e.into(), Vec::new());
        }

        let checkpoint = Checkpoint::capture(&self.state);
        let result = Executor::new(&mut self.state, self.theories.as_ref()).execute_program(&program);
        let warnings = self.state.warnings.get(warnings_before..).unwrap_or_default().to_vec();
        match result {
            Ok(_) => {
                let facts = self.state.store.len().saturating_sub(checkpoint.fact_count());
                info!(statements = program.len(), facts, "learn committed");
                LearnOutcome {
                    success: true,
                    facts,
                    errors: Vec::new(),
                    warnings,
                }
            }
            Err(e) => {
                checkpoint.restore(&mut self.state);
                info!(statements = program.len(), error = %e, "learn rolled back");
                self.failed(e, warnings)
            }
        }
    }

    fn failed(&self, err: KbError, warnings: Vec<String>) -> LearnOutcome {
        LearnOutcome {
            success: false,
            facts: 0,
            errors: vec![ErrorReport::from(&err)],
            warnings,
        }
    }

    /// Parse and validate a single-statement program.
    fn single(&self, text: &str, mode: Mode) -> KbResult<Statement> {
        let program = parse_program(text, None)?;
        validate::validate(&program, &self.state, mode)?;
        let Some(statement) = program.statements.first() else {
            return Err(ValidationError::StatementCount { count: 0 }.into());
        };
        Ok(self.canonical_form(statement))
    }

    /// Canonical names plus the surface rewrite a stored fact would get.
    fn canonical_form(&self, statement: &Statement) -> Statement {
        let statement = Canonicalizer::new(
            self.state.store.component(),
            self.state.config.canonicalization_enabled,
        )
        .statement(statement);
        if self.state.config.enforce_canonical {
            if let Some(rewritten) = self.state.rewrites.rewrite(&statement) {
                return rewritten;
            }
        }
        statement
    }

    /// Match a pattern with `?holes`. Validation errors are returned as `Err`.
    pub fn query(&self, text: &str) -> KbResult<QueryOutcome> {
        let statement = self.single(text, Mode::Query)?;
        let results = query::run_query(&self.state, &statement);
        let reason = results.is_empty().then(|| "No matches".to_string());
        Ok(QueryOutcome {
            success: !results.is_empty(),
            results,
            reason,
        })
    }

    /// Prove a ground statement. Validation errors are returned as `Err`.
    pub fn prove(&self, text: &str) -> KbResult<ProveOutcome> {
        let statement = self.single(text, Mode::Prove)?;
        let args: Vec<String> = statement.args.iter().map(arg_text).collect();
        let proof = self
            .state
            .proof_engine()
            .prove_fact(&statement.operator, &args);
        Ok(ProveOutcome {
            goal: statement.fact_text(),
            proof,
        })
    }

    /// Execute a named theory from the session's source as theory facts.
    pub fn load_theory(&mut self, name: &str) -> LearnOutcome {
        self.learn(&format!("Load \"{name}\""))
    }

    /// Snapshot for a caller-managed transaction.
    pub fn begin_transaction(&self) -> Checkpoint {
        Checkpoint::capture(&self.state)
    }

    pub fn rollback_transaction(&mut self, checkpoint: Checkpoint) {
        let dropped = self.state.store.len().saturating_sub(checkpoint.fact_count());
        checkpoint.restore(&mut self.state);
        info!(dropped, "transaction rolled back");
    }

    pub fn facts(&self) -> &[Fact] {
        self.state.store.facts()
    }

    pub fn warnings(&self) -> &[String] {
        &self.state.warnings
    }

    pub fn config(&self) -> &SessionConfig {
        &self.state.config
    }

    pub fn semantic(&self) -> &SemanticIndex {
        &self.state.semantic
    }

    pub fn solve_record(&self, relation: &str) -> Option<&SolveRecord> {
        self.state.solves.get(relation)
    }

    /// Read-only view of the full state, for diagnostics and tests.
    pub fn state(&self) -> &KbState {
        &self.state
    }

    /// True if the live indices equal a from-scratch rebuild.
    pub fn index_is_consistent(&self) -> bool {
        self.state.store.index_is_consistent()
    }

    pub fn close(self) {
        info!(facts = self.state.store.len(), "session closed");
    }
}
