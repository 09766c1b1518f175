//! Statement executor.
//!
//! Each statement runs through a fixed pipeline: canonicalize, route verbs
//! and blocks, enforce canonical shape, rewrite surface primitives, build the
//! vector, store the fact, bind the destination. Nothing here rolls back; the
//! session wraps whole programs in a checkpoint.

pub mod builtins;
pub mod enforce;
pub mod metadata;
pub mod state;

use tracing::{debug, info};

use crate::canonical::Canonicalizer;
use crate::dsl::{Block, Expr, Program, Statement, parse_program};
use crate::error::{ExecutionError, KbResult};
use crate::kb::{FactId, FactMetadata};
use crate::semantic::OperatorKind;
use crate::semantic::theory::{TheoryError, TheorySource};
use crate::vsa::HyperVec;

use metadata::arg_text;
use state::{GraphDef, KbState, ReferenceEntry};

/// Nested graph invocations beyond this depth are treated as runaway recursion.
pub const MAX_GRAPH_DEPTH: usize = 32;

/// Result of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executed {
    pub vector: Option<HyperVec>,
    pub fact_id: Option<FactId>,
}

/// Drives statements against one [`KbState`].
pub struct Executor<'s> {
    state: &'s mut KbState,
    theories: &'s dyn TheorySource,
    graph_depth: usize,
}

fn malformed(statement: &Statement, message: impl Into<String>) -> ExecutionError {
    ExecutionError::Malformed {
        message: message.into(),
        statement: statement.to_string(),
        line: statement.line(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "on" | "yes" => Some(true),
        "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl<'s> Executor<'s> {
    pub fn new(state: &'s mut KbState, theories: &'s dyn TheorySource) -> Self {
        Self {
            state,
            theories,
            graph_depth: 0,
        }
    }

    /// Execute statements in order, stopping at the first failure.
    pub fn execute_program(&mut self, program: &Program) -> KbResult<Vec<Executed>> {
        program.statements.iter().map(|s| self.execute(s)).collect()
    }

    pub fn execute(&mut self, statement: &Statement) -> KbResult<Executed> {
        debug!(line = statement.line(), operator = %statement.operator, "execute statement");
        let statement = Canonicalizer::new(
            self.state.store.component(),
            self.state.config.canonicalization_enabled,
        )
        .statement(statement);

        match &statement.block {
            Some(Block::Graph { params, body }) => return self.define_graph(&statement, params, body),
            Some(Block::Solve { kind, body }) => return self.run_solve(&statement, kind, body),
            None => {}
        }
        match statement.operator.as_str() {
            "Load" => return self.load(&statement),
            "Unload" => return self.unload(&statement),
            "Set" => return self.set(&statement),
            "induce" => return self.induce(&statement),
            "bundle" => return self.bundle(&statement),
            "solve" => return Err(malformed(&statement, "`solve` needs a block ending in `end`").into()),
            "return" => return Err(malformed(&statement, "`return` outside a graph body").into()),
            _ => {}
        }

        let persist = statement.should_persist();
        let enforce_canonical = self.state.config.enforce_canonical;
        enforce::check(&statement, persist, &self.state.rewrites, enforce_canonical)?;

        let statement = if persist && enforce_canonical {
            self.state.rewrites.rewrite(&statement).unwrap_or(statement)
        } else {
            statement
        };
        if persist && enforce_canonical && enforce::is_non_canonical_primitive(&statement.operator) {
            return Err(ExecutionError::NonCanonicalPrimitive {
                operator: statement.operator.clone(),
                line: statement.line(),
            }
            .into());
        }

        let vector = self.statement_vector(&statement)?;

        let extracted = metadata::extract(&statement, &self.state.references);
        let metadata = match extracted {
            Ok(m) => m,
            Err(e) if persist => return Err(e.into()),
            Err(_) => FactMetadata::new(
                statement.operator.as_str(),
                statement.args.iter().map(arg_text).collect(),
            ),
        }
        .with_source(statement.source.clone());
        let metadata = Canonicalizer::new(
            self.state.store.component(),
            self.state.config.canonicalization_enabled,
        )
        .metadata(&metadata);

        let fact_id = if persist {
            let name = statement.persist_name.as_deref();
            Some(self.state.add_to_kb(vector.clone(), name, metadata.clone())?)
        } else {
            None
        };

        if let Some(dest) = &statement.destination {
            self.bind(dest, vector.clone(), statement.line())?;
            self.state.references.insert(
                dest.clone(),
                ReferenceEntry {
                    fact_text: metadata.to_string(),
                    metadata,
                },
            );
        }
        Ok(Executed {
            vector: Some(vector),
            fact_id,
        })
    }

    /// Root bindings may be rebound by later programs; graph frames may not.
    fn bind(&mut self, name: &str, vector: HyperVec, line: usize) -> KbResult<()> {
        if self.state.scope.depth() == 0 {
            self.state.scope.set(name, vector);
        } else {
            self.state.scope.define(name, vector, line)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Vectors
    // -----------------------------------------------------------------------

    fn statement_vector(&mut self, statement: &Statement) -> KbResult<HyperVec> {
        self.call_vector(&statement.operator, &statement.args, statement)
    }

    fn call_vector(&mut self, op: &str, args: &[Expr], statement: &Statement) -> KbResult<HyperVec> {
        let vectors = args
            .iter()
            .map(|a| self.expr_vector(a, statement))
            .collect::<KbResult<Vec<_>>>()?;

        if builtins::is_builtin(op) {
            return builtins::eval(self.state, op, args, &vectors, statement);
        }
        let op_vec = self.state.vocab.get_or_create(op);
        if let Some(graph) = self.state.graphs.get(op).cloned() {
            let result = self.invoke_graph(&graph, &vectors, statement)?;
            return Ok(self.state.ops().bind(&op_vec, &result)?);
        }
        Ok(self.state.encode_fact(&op_vec, &vectors)?)
    }

    fn expr_vector(&mut self, expr: &Expr, statement: &Statement) -> KbResult<HyperVec> {
        match expr {
            Expr::Identifier { name } | Expr::Literal { value: name } => {
                Ok(self.state.vocab.get_or_create(name))
            }
            Expr::Reference { name } => self.state.scope.lookup(name).cloned().ok_or_else(|| {
                ExecutionError::UndefinedReference {
                    name: name.clone(),
                    statement: statement.to_string(),
                    line: statement.line(),
                }
                .into()
            }),
            Expr::Hole { name } => Ok(self.state.vocab.get_or_create(&format!("?{name}"))),
            Expr::List { items } if items.is_empty() => Ok(self.state.vocab.get_or_create("[]")),
            Expr::List { items } => {
                let vectors = items
                    .iter()
                    .map(|e| self.expr_vector(e, statement))
                    .collect::<KbResult<Vec<_>>>()?;
                let refs: Vec<&HyperVec> = vectors.iter().collect();
                Ok(self.state.ops().bundle(&refs)?)
            }
            Expr::Compound { operator, args } => self.call_vector(operator, args, statement),
        }
    }

    // -----------------------------------------------------------------------
    // Graphs
    // -----------------------------------------------------------------------

    fn define_graph(&mut self, statement: &Statement, params: &[String], body: &[Statement]) -> KbResult<Executed> {
        let Some(name) = statement.destination.clone() else {
            return Err(malformed(statement, "graph definitions need a `@Name` destination").into());
        };
        let params = params
            .iter()
            .map(|p| p.trim_start_matches('$').to_string())
            .collect();
        self.state.graphs.insert(
            name.clone(),
            GraphDef {
                name: name.clone(),
                params,
                body: body.to_vec(),
                source: statement.source.clone(),
            },
        );
        self.state.semantic.declare_operator(&name, OperatorKind::Graph);
        debug!(graph = %name, line = statement.line(), "graph defined");
        Ok(Executed {
            vector: Some(self.state.vocab.get_or_create(&name)),
            fact_id: None,
        })
    }

    fn invoke_graph(&mut self, graph: &GraphDef, args: &[HyperVec], call: &Statement) -> KbResult<HyperVec> {
        if graph.params.len() != args.len() {
            return Err(ExecutionError::GraphArity {
                graph: graph.name.clone(),
                expected: graph.params.len(),
                actual: args.len(),
                line: call.line(),
            }
            .into());
        }
        if self.graph_depth >= MAX_GRAPH_DEPTH {
            return Err(malformed(
                call,
                format!("graph `{}` nested deeper than {MAX_GRAPH_DEPTH} calls", graph.name),
            )
            .into());
        }
        self.state.scope.push_child();
        self.graph_depth += 1;
        let result = self.run_graph_body(graph, args);
        self.graph_depth -= 1;
        self.state.scope.pop();
        result
    }

    fn run_graph_body(&mut self, graph: &GraphDef, args: &[HyperVec]) -> KbResult<HyperVec> {
        for (param, value) in graph.params.iter().zip(args) {
            self.state.scope.define(param, value.clone(), graph.source.line)?;
        }
        for statement in &graph.body {
            if statement.operator == "return" {
                let Some(expr) = statement.args.first() else {
                    return Err(malformed(statement, "`return` needs a value").into());
                };
                return self.expr_vector(expr, statement);
            }
            self.execute(statement)?;
        }
        Err(ExecutionError::GraphWithoutReturn {
            graph: graph.name.clone(),
        }
        .into())
    }

    // -----------------------------------------------------------------------
    // Verbs
    // -----------------------------------------------------------------------

    fn run_solve(&mut self, statement: &Statement, kind: &str, body: &[Statement]) -> KbResult<Executed> {
        let Some(relation) = statement.destination.clone() else {
            return Err(malformed(statement, "solve blocks need a `@relation` destination").into());
        };
        let vector = crate::solve::run_solve(self.state, &relation, kind, body, &statement.source)?;
        self.bind(&relation, vector.clone(), statement.line())?;
        Ok(Executed {
            vector: Some(vector),
            fact_id: None,
        })
    }

    fn theory_name(statement: &Statement) -> Result<String, ExecutionError> {
        statement
            .args
            .first()
            .map(arg_text)
            .ok_or_else(|| malformed(statement, format!("`{}` needs a theory name", statement.operator)))
    }

    fn load(&mut self, statement: &Statement) -> KbResult<Executed> {
        let name = Self::theory_name(statement)?;
        let theory = self.theories.load(&name).map_err(|e| match e {
            TheoryError::NotFound { name } => ExecutionError::UnknownTheory { name }.into(),
            other => crate::error::KbError::from(other),
        })?;
        self.state.theories.insert(name.clone(), theory.file.clone());
        let program = parse_program(&theory.text, Some(theory.file.as_str()))?;
        let before = self.state.store.len();
        self.execute_program(&program)?;
        info!(
            theory = %name,
            statements = program.len(),
            facts = self.state.store.len() - before,
            "theory loaded"
        );
        Ok(Executed::default())
    }

    fn unload(&mut self, statement: &Statement) -> KbResult<Executed> {
        let name = Self::theory_name(statement)?;
        let Some(file) = self.state.theories.remove(&name) else {
            return Err(ExecutionError::UnknownTheory { name }.into());
        };
        let removed = self
            .state
            .store
            .retain(|f| f.metadata.source.as_ref().and_then(|s| s.file.as_deref()) != Some(file.as_str()));
        self.state.rederive();
        info!(theory = %name, removed, "theory unloaded");
        Ok(Executed::default())
    }

    fn set(&mut self, statement: &Statement) -> KbResult<Executed> {
        let [flag, value] = statement.args.as_slice() else {
            return Err(malformed(statement, "`Set` takes a setting name and a value").into());
        };
        let value = parse_flag(&arg_text(value))
            .ok_or_else(|| malformed(statement, "setting values are `true` or `false`"))?;
        let config = &mut self.state.config;
        match arg_text(flag).as_str() {
            "canonicalization" => config.canonicalization_enabled = value,
            "enforceCanonical" => config.enforce_canonical = value,
            "rejectContradictions" => config.reject_contradictions = value,
            "strictOperators" => config.strict_operators = value,
            other => {
                return Err(ExecutionError::UnknownSetting {
                    name: other.to_string(),
                    line: statement.line(),
                }
                .into());
            }
        }
        debug!(setting = %arg_text(flag), value, "setting changed");
        Ok(Executed::default())
    }

    /// Bundle of the properties every argument entity shares. With a persist
    /// name the shared properties are also stored as facts about that name.
    fn induce(&mut self, statement: &Statement) -> KbResult<Executed> {
        let entities: Vec<String> = statement.args.iter().map(arg_text).collect();
        let Some((first, rest)) = entities.split_first() else {
            return Err(malformed(statement, "`induce` needs at least one entity").into());
        };
        let facts = self.state.store.facts();
        let props_of = |e: &str| -> Vec<(String, String)> {
            facts
                .iter()
                .filter(|f| !f.metadata.is_negation() && f.metadata.parts.is_empty())
                .filter_map(|f| match f.args() {
                    [subject, value] if subject == e => Some((f.operator().to_string(), value.clone())),
                    _ => None,
                })
                .collect()
        };
        let mut shared = props_of(first);
        for entity in rest {
            let theirs = props_of(entity);
            shared.retain(|p| theirs.contains(p));
        }
        shared.dedup();

        let ops = self.state.ops();
        let vector = if shared.is_empty() {
            self.state
                .warnings
                .push(format!("induce over {} found no shared properties", entities.join(", ")));
            HyperVec::zero(ops.dim(), ops.encoding())
        } else {
            let mut terms = Vec::with_capacity(shared.len());
            for (op, value) in &shared {
                let o = self.state.vocab.get_or_create(op);
                let v = self.state.vocab.get_or_create(value);
                terms.push(ops.bind(&o, &v)?);
            }
            let refs: Vec<&HyperVec> = terms.iter().collect();
            ops.bundle(&refs)?
        };

        if let (true, Some(concept)) = (statement.should_persist(), &statement.persist_name) {
            for (op, value) in &shared {
                let meta = FactMetadata::new(op.as_str(), vec![concept.clone(), value.clone()])
                    .with_source(statement.source.clone());
                let v = self.state.encode_metadata(&meta)?;
                self.state.add_to_kb(v, None, meta)?;
            }
        }
        if let Some(dest) = &statement.destination {
            self.bind(dest, vector.clone(), statement.line())?;
        }
        debug!(shared = shared.len(), "induced concept");
        Ok(Executed {
            vector: Some(vector),
            fact_id: None,
        })
    }

    fn bundle(&mut self, statement: &Statement) -> KbResult<Executed> {
        if statement.args.is_empty() {
            return Err(malformed(statement, "`bundle` needs at least one argument").into());
        }
        let vectors = statement
            .args
            .iter()
            .map(|a| self.expr_vector(a, statement))
            .collect::<KbResult<Vec<_>>>()?;
        let refs: Vec<&HyperVec> = vectors.iter().collect();
        let vector = self.state.ops().bundle(&refs)?;
        if let Some(dest) = &statement.destination {
            self.bind(dest, vector.clone(), statement.line())?;
        }
        Ok(Executed {
            vector: Some(vector),
            fact_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::KbError;
    use crate::kb::FactKind;
    use crate::semantic::SemanticIndex;
    use crate::semantic::theory::InMemoryTheory;

    fn state() -> KbState {
        KbState::new(SessionConfig::for_testing(), SemanticIndex::new())
    }

    fn run(state: &mut KbState, theories: &InMemoryTheory, text: &str) -> KbResult<Vec<Executed>> {
        let program = parse_program(text, None)?;
        Executor::new(state, theories).execute_program(&program)
    }

    #[test]
    fn persistence_forms() {
        let mut s = state();
        let none = InMemoryTheory::new();
        run(&mut s, &none, "isA Rex Dog\n@f isA Rex Cat\n@g:g isA Rex Pet").unwrap();
        assert_eq!(s.store.len(), 2);
        assert!(s.store.find_binary("isA", "Rex", "Cat").is_none());
        assert!(s.scope.has("f"));
        assert_eq!(s.store.facts()[1].name.as_deref(), Some("g"));
    }

    #[test]
    fn not_reference_is_inlined() {
        let mut s = state();
        let none = InMemoryTheory::new();
        run(&mut s, &none, "@f can Pingu Fly\nNot $f").unwrap();
        let fact = &s.store.facts()[0];
        assert!(fact.metadata.is_negation());
        assert_eq!(fact.metadata.inner_operator.as_deref(), Some("can"));
        assert!(s.store.is_negated("can", &["Pingu".into(), "Fly".into()]));
    }

    #[test]
    fn undefined_reference_fails() {
        let mut s = state();
        let none = InMemoryTheory::new();
        let err = run(&mut s, &none, "likes Ann $nobody").unwrap_err();
        assert!(matches!(
            err,
            KbError::Execution(ExecutionError::UndefinedReference { .. })
        ));
    }

    #[test]
    fn graph_invocation_binds_operator() {
        let mut s = state();
        let none = InMemoryTheory::new();
        let text = "@Pair graph a b\n  @p ___Bundle $a $b\n  return $p\nend\n@x Pair Rex Dog";
        let out = run(&mut s, &none, text).unwrap();
        let ops = s.ops();
        let rex = s.vocab.get_or_create("Rex");
        let dog = s.vocab.get_or_create("Dog");
        let pair = s.vocab.get_or_create("Pair");
        let expected = ops.bind(&pair, &ops.bundle(&[&rex, &dog]).unwrap()).unwrap();
        assert_eq!(out[1].vector.as_ref(), Some(&expected));
        assert_eq!(s.scope.depth(), 0);
        assert!(!s.scope.has("p"));
    }

    #[test]
    fn graph_errors() {
        let mut s = state();
        let none = InMemoryTheory::new();
        let err = run(&mut s, &none, "@G graph a\n  @p ___Bundle $a\nend\n@x G Rex").unwrap_err();
        assert!(matches!(
            err,
            KbError::Execution(ExecutionError::GraphWithoutReturn { .. })
        ));
        let err = run(&mut s, &none, "@H graph a\n  return $a\nend\n@y H Rex Dog").unwrap_err();
        assert!(matches!(err, KbError::Execution(ExecutionError::GraphArity { .. })));
        assert_eq!(s.scope.depth(), 0);
    }

    #[test]
    fn canonical_rewrite_before_storage() {
        let mut s = state();
        let none = InMemoryTheory::new();
        run(&mut s, &none, "canonicalRewrite _childOf parentOf \"1 0\"\n_childOf Alice Bob").unwrap();
        assert!(s.store.find_binary("parentOf", "Bob", "Alice").is_some());
        assert!(s.store.by_operator("_childOf").next().is_none());
    }

    #[test]
    fn load_and_unload_theory() {
        let mut s = state();
        let theories = InMemoryTheory::new().with("family", "__SymmetricRelation siblingOf\nsiblingOf Ann Bob");
        run(&mut s, &theories, "Load family\nlikes Ann Tea").unwrap();
        assert!(s.semantic.is_symmetric("siblingOf"));
        assert_eq!(s.store.theory_facts().count(), 2);
        assert_eq!(s.store.find_binary("likes", "Ann", "Tea").map(|f| f.kind), Some(FactKind::Truth));

        run(&mut s, &theories, "Unload family").unwrap();
        assert!(!s.semantic.is_symmetric("siblingOf"));
        assert_eq!(s.store.len(), 1);

        let err = run(&mut s, &theories, "Load nope").unwrap_err();
        assert!(matches!(err, KbError::Execution(ExecutionError::UnknownTheory { .. })));
    }

    #[test]
    fn set_toggles_config() {
        let mut s = state();
        let none = InMemoryTheory::new();
        run(&mut s, &none, "Set rejectContradictions off").unwrap();
        assert!(!s.config.reject_contradictions);
        let err = run(&mut s, &none, "Set turbo on").unwrap_err();
        assert!(matches!(err, KbError::Execution(ExecutionError::UnknownSetting { .. })));
    }

    #[test]
    fn induce_stores_shared_properties() {
        let mut s = state();
        let none = InMemoryTheory::new();
        let text = "hasColor Rex Brown\nhasColor Fido Brown\nhasSize Rex Big\n@c:Canine induce Rex Fido";
        run(&mut s, &none, text).unwrap();
        assert!(s.store.find_binary("hasColor", "Canine", "Brown").is_some());
        assert!(s.store.find_binary("hasSize", "Canine", "Big").is_none());
        assert!(s.scope.has("c"));
    }

    #[test]
    fn induce_without_shared_properties_warns() {
        let mut s = state();
        let none = InMemoryTheory::new();
        let out = run(&mut s, &none, "hasColor Rex Brown\nhasColor Tom Grey\n@c induce Rex Tom").unwrap();
        assert!(out[2].vector.as_ref().is_some_and(HyperVec::is_zero));
        assert_eq!(s.warnings.len(), 1);
    }

    #[test]
    fn stray_verbs_are_malformed() {
        let mut s = state();
        let none = InMemoryTheory::new();
        for text in ["return $x", "bundle"] {
            let err = run(&mut s, &none, text).unwrap_err();
            assert!(matches!(err, KbError::Execution(ExecutionError::Malformed { .. })), "{text}");
        }
    }
}
