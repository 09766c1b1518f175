//! Mutable knowledge-base state owned by one session.
//!
//! Everything a statement can change lives here, so a checkpoint is a copy of
//! this struct and `add_to_kb` is the single insertion path for facts.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::canonical::{CanonicalRewriteIndex, Canonicalizer};
use crate::config::SessionConfig;
use crate::contradiction::{ContradictionChecker, ContradictionError};
use crate::dsl::{SourceLoc, Statement};
use crate::error::KbResult;
use crate::kb::component::ALIAS_OPERATORS;
use crate::kb::{FactId, FactKind, FactMetadata, FactStore};
use crate::reason::ProofEngine;
use crate::reason::rules::Rule;
use crate::scope::ScopeTree;
use crate::semantic::SemanticIndex;
use crate::solve::SolveRecord;
use crate::vsa::ops::{VsaOps, VsaResult};
use crate::vsa::vocabulary::Vocabulary;
use crate::vsa::HyperVec;

/// Seed for `___NewVector` without a name. Fixed so sessions replay identically.
const SESSION_RNG_SEED: u64 = 0x5EED_0F_4B;

/// A `@Name graph p1 p2 ... end` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub source: SourceLoc,
}

/// What a destination name refers to, for later `$name` resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub fact_text: String,
    pub metadata: FactMetadata,
}

#[derive(Debug, Clone)]
pub struct KbState {
    pub config: SessionConfig,
    pub vocab: Vocabulary,
    pub scope: ScopeTree,
    pub store: FactStore,
    pub semantic: SemanticIndex,
    /// Index as built from the theory source, before any fact was observed.
    pub base_semantic: SemanticIndex,
    pub rewrites: CanonicalRewriteIndex,
    pub rules: Vec<Rule>,
    pub graphs: BTreeMap<String, GraphDef>,
    pub references: HashMap<String, ReferenceEntry>,
    /// Loaded theory name → file label its facts carry.
    pub theories: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub solves: BTreeMap<String, SolveRecord>,
    pub rng: StdRng,
}

impl KbState {
    pub fn new(config: SessionConfig, semantic: SemanticIndex) -> Self {
        let ops = VsaOps::new(config.dim(), config.encoding);
        Self {
            config,
            vocab: Vocabulary::new(ops),
            scope: ScopeTree::new(),
            store: FactStore::new(),
            base_semantic: semantic.clone(),
            semantic,
            rewrites: CanonicalRewriteIndex::new(),
            rules: Vec::new(),
            graphs: BTreeMap::new(),
            references: HashMap::new(),
            theories: BTreeMap::new(),
            warnings: Vec::new(),
            solves: BTreeMap::new(),
            rng: StdRng::seed_from_u64(SESSION_RNG_SEED),
        }
    }

    pub fn ops(&self) -> VsaOps {
        *self.vocab.ops()
    }

    /// Positional fact encoding: `bind(op, bundle(pos1(a1), pos2(a2), ...))`.
    pub fn encode_fact(&self, op: &HyperVec, args: &[HyperVec]) -> VsaResult<HyperVec> {
        if args.is_empty() {
            return Ok(op.clone());
        }
        let ops = self.ops();
        let positioned: Vec<HyperVec> = args
            .iter()
            .enumerate()
            .map(|(i, a)| ops.with_position(i + 1, a))
            .collect();
        let refs: Vec<&HyperVec> = positioned.iter().collect();
        ops.bind(op, &ops.bundle(&refs)?)
    }

    /// Encode a stored fact from its metadata alone.
    pub fn encode_metadata(&mut self, meta: &FactMetadata) -> VsaResult<HyperVec> {
        let op = self.vocab.get_or_create(&meta.operator);
        let args: Vec<HyperVec> = meta.args.iter().map(|a| self.vocab.get_or_create(a)).collect();
        self.encode_fact(&op, &args)
    }

    pub fn proof_engine(&self) -> ProofEngine<'_> {
        ProofEngine::new(
            &self.store,
            &self.semantic,
            &self.rules,
            &self.config.proof,
            self.config.inheritance_max_depth,
        )
    }

    /// Canonicalize, check for contradictions, store, and feed the
    /// declaration indices.
    ///
    /// On a contradiction a warning is always recorded; the fact is rejected
    /// when `reject_contradictions` is on and stored anyway otherwise.
    pub fn add_to_kb(
        &mut self,
        vector: HyperVec,
        name: Option<&str>,
        metadata: FactMetadata,
    ) -> KbResult<FactId> {
        let metadata = Canonicalizer::new(self.store.component(), self.config.canonicalization_enabled)
            .metadata(&metadata);

        if metadata.parts.is_empty() {
            if let Some(existing) = self.store.find(&metadata.operator, &metadata.args) {
                debug!(fact = %metadata, id = %existing.id, "fact already stored");
                return Ok(existing.id);
            }
        }

        let checker = ContradictionChecker::new(
            &self.store,
            &self.semantic,
            self.config.contradiction_max_hops,
            self.config.inheritance_max_depth,
        );
        if let Some(contradiction) = checker.check(&metadata.operator, &metadata.args) {
            warn!(
                kind = %contradiction.kind,
                fact = %metadata,
                rejected = self.config.reject_contradictions,
                "contradiction detected"
            );
            self.warnings.push(contradiction.message.clone());
            if self.config.reject_contradictions {
                return Err(ContradictionError::Rejected(Box::new(contradiction)).into());
            }
        }

        let kind = self.classify(&metadata);
        let id = self
            .store
            .push(vector, name.map(str::to_string), metadata.clone(), kind);
        self.observe(name, &metadata, Some(id));
        if self.config.canonicalization_enabled
            && ALIAS_OPERATORS.contains(&metadata.operator.as_str())
        {
            self.recanonicalize()?;
        }
        Ok(id)
    }

    /// Rewrite facts stored before the latest alias to their canonical
    /// spelling. Unnamed facts that collapse onto an earlier fact are dropped.
    fn recanonicalize(&mut self) -> KbResult<()> {
        let canon = Canonicalizer::new(self.store.component(), true);
        let respell = |meta: &FactMetadata| {
            let canonical = canon.metadata(meta);
            (canonical != *meta).then_some(canonical)
        };
        let rewritten: Vec<Option<FactMetadata>> =
            self.store.facts().iter().map(|f| respell(&f.metadata)).collect();
        let references: Vec<(String, FactMetadata)> = self
            .references
            .iter()
            .filter_map(|(name, entry)| respell(&entry.metadata).map(|m| (name.clone(), m)))
            .collect();
        if rewritten.iter().all(Option::is_none) {
            return Ok(());
        }

        let mut facts = self.store.facts().to_vec();
        for (fact, canonical) in facts.iter_mut().zip(rewritten) {
            let Some(canonical) = canonical else {
                continue;
            };
            debug!(from = %fact.metadata, to = %canonical, id = %fact.id, "respelled stored fact");
            if canonical.parts.is_empty() && !canonical.is_negation() {
                fact.vector = self.encode_metadata(&canonical)?;
            }
            fact.metadata = canonical;
        }
        let mut seen = HashSet::new();
        facts.retain(|f| f.name.is_some() || seen.insert(f.metadata.to_string()));

        for (name, metadata) in references {
            if let Some(entry) = self.references.get_mut(&name) {
                entry.fact_text = metadata.to_string();
                entry.metadata = metadata;
            }
        }
        let next_id = self.store.next_id();
        self.store.restore(facts, next_id);
        self.rederive();
        Ok(())
    }

    fn classify(&self, metadata: &FactMetadata) -> FactKind {
        let from_theory = metadata
            .source
            .as_ref()
            .and_then(|s| s.file.as_deref())
            .is_some_and(|file| self.theories.values().any(|f| f == file));
        if from_theory {
            FactKind::Theory
        } else {
            FactKind::Truth
        }
    }

    fn observe(&mut self, name: Option<&str>, metadata: &FactMetadata, id: Option<FactId>) {
        self.semantic.observe_fact(name, metadata);
        self.rewrites.observe_fact(metadata);
        if metadata.operator == "Implies" {
            match Rule::from_metadata(metadata, id) {
                Some(rule) => self.rules.push(rule),
                None => debug!(fact = %metadata, "implication not usable as a rule"),
            }
        }
    }

    /// Recompute semantic index, rewrite index and rules from the fact log.
    pub fn rederive(&mut self) {
        self.semantic = self.base_semantic.clone();
        self.rewrites = CanonicalRewriteIndex::new();
        self.rules.clear();
        let facts: Vec<_> = self
            .store
            .facts()
            .iter()
            .map(|f| (f.name.clone(), f.metadata.clone(), f.id))
            .collect();
        for (name, metadata, id) in facts {
            self.observe(name.as_deref(), &metadata, Some(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KbError;
    use crate::semantic::DeclSource;

    fn state() -> KbState {
        KbState::new(SessionConfig::for_testing(), SemanticIndex::new())
    }

    fn meta(op: &str, args: &[&str]) -> FactMetadata {
        FactMetadata::new(op, args.iter().map(|s| s.to_string()).collect())
    }

    fn add(state: &mut KbState, m: FactMetadata) -> KbResult<FactId> {
        let v = state.encode_metadata(&m).unwrap();
        state.add_to_kb(v, None, m)
    }

    #[test]
    fn duplicate_fact_returns_existing_id() {
        let mut s = state();
        let a = add(&mut s, meta("isA", &["Rex", "Dog"])).unwrap();
        let b = add(&mut s, meta("isA", &["Rex", "Dog"])).unwrap();
        assert_eq!(a, b);
        assert_eq!(s.store.len(), 1);
    }

    #[test]
    fn contradiction_rejects_or_warns() {
        let mut s = state();
        s.semantic
            .add_contradicts_same_args("before", "after", DeclSource::default());
        add(&mut s, meta("before", &["A", "B"])).unwrap();
        let err = add(&mut s, meta("after", &["A", "B"])).unwrap_err();
        assert!(matches!(err, KbError::Contradiction(_)));
        assert_eq!(s.store.len(), 1);
        assert_eq!(s.warnings.len(), 1);

        s.config.reject_contradictions = false;
        add(&mut s, meta("after", &["A", "B"])).unwrap();
        assert_eq!(s.store.len(), 2);
        assert_eq!(s.warnings.len(), 2);
    }

    #[test]
    fn declarations_take_effect_immediately() {
        let mut s = state();
        add(&mut s, meta("__TransitiveRelation", &["partOf"])).unwrap();
        assert!(s.semantic.is_transitive("partOf"));
        s.store.retain(|_| false);
        s.rederive();
        assert!(!s.semantic.is_transitive("partOf"));
    }

    #[test]
    fn alias_respells_facts_stored_before_it() {
        let mut s = state();
        let rex = add(&mut s, meta("isA", &["Rex", "Hound"])).unwrap();
        add(&mut s, meta("isA", &["Rex", "Dog"])).unwrap();
        add(&mut s, FactMetadata::negation("isA", vec!["Fido".into(), "Hound".into()])).unwrap();
        add(&mut s, meta("synonym", &["Dog", "Hound"])).unwrap();

        let texts: Vec<String> = s.store.facts().iter().map(|f| f.metadata.to_string()).collect();
        assert!(texts.iter().all(|t| !t.contains("Hound") || t.starts_with("synonym")));
        // The two spellings of the same fact collapse onto the first.
        assert_eq!(s.store.facts().iter().filter(|f| f.metadata.to_string() == "isA Rex Dog").count(), 1);
        assert_eq!(s.store.find_binary("isA", "Rex", "Dog").unwrap().id, rex);
        assert!(s.store.is_negated("isA", &["Fido".into(), "Dog".into()]));
        let stored = s.store.find_binary("isA", "Rex", "Dog").unwrap().vector.clone();
        let expected = s.encode_metadata(&meta("isA", &["Rex", "Dog"])).unwrap();
        assert_eq!(stored, expected);
        assert!(s.store.index_is_consistent());
    }

    #[test]
    fn alias_respelling_feeds_later_contradiction_checks() {
        let mut s = state();
        add(&mut s, meta("before", &["A", "Hound"])).unwrap();
        add(&mut s, meta("synonym", &["Dog", "Hound"])).unwrap();
        add(&mut s, meta("contradictsSameArgs", &["before", "after"])).unwrap();
        let err = add(&mut s, meta("after", &["A", "Dog"])).unwrap_err();
        assert!(matches!(err, KbError::Contradiction(_)));
    }

    #[test]
    fn encoding_is_positional() {
        let mut s = state();
        let ab = s.encode_metadata(&meta("near", &["a", "b"])).unwrap();
        let ba = s.encode_metadata(&meta("near", &["b", "a"])).unwrap();
        assert_ne!(ab, ba);
    }
}
