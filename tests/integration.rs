//! End-to-end tests over the `Session` surface: learning, contradiction
//! rejection, proofs, queries, solve blocks and theory loading.

use hdkb::config::SessionConfig;
use hdkb::contradiction::ContradictionKind;
use hdkb::kb::FactKind;
use hdkb::proof::ProofMethod;
use hdkb::session::Session;

fn session() -> Session {
    Session::new(SessionConfig::for_testing()).unwrap()
}

fn learned(session: &mut Session, text: &str) {
    let out = session.learn(text);
    assert!(out.success, "learn failed: {:?}", out.errors);
}

#[test]
fn same_args_contradiction_is_rejected_with_proof() {
    let mut s = session();
    learned(&mut s, "before A B\ncontradictsSameArgs before after");

    let out = s.learn("after A B");
    assert!(!out.success);
    assert_eq!(out.errors[0].code, "hdkb::contradiction::rejected");
    let c = out.errors[0].contradiction.as_ref().unwrap();
    assert_eq!(c.kind, ContradictionKind::ContradictsSameArgs);
    assert!(c.proof_nl.contains("before A B"));
    assert_eq!(s.facts().len(), 2);
}

#[test]
fn same_args_contradiction_is_symmetric() {
    for (x, y) in [("A", "B"), ("Lunch", "Dinner"), ("x1", "x2")] {
        let mut s = session();
        learned(&mut s, "contradictsSameArgs before after");
        learned(&mut s, &format!("after {x} {y}"));
        assert!(!s.learn(&format!("before {x} {y}")).success, "{x} {y}");
        // Swapped arguments are a different pair.
        assert!(s.learn(&format!("before {y} {x}")).success, "{y} {x}");
    }
}

#[test]
fn inherited_exclusive_property_is_rejected() {
    let mut s = session();
    learned(
        &mut s,
        "__InheritableProperty hasProperty\n\
         mutuallyExclusive hasProperty Warm Cold\n\
         isA Poodle Dog\n\
         isA Dog Animal\n\
         hasProperty Animal Warm",
    );

    let out = s.learn("hasProperty Poodle Cold");
    assert!(!out.success);
    let c = out.errors[0].contradiction.as_ref().unwrap();
    assert_eq!(c.kind, ContradictionKind::MutuallyExclusive);
    assert!(c.proof_nl.contains("Poodle -> Dog -> Animal"));
    assert!(s.learn("hasProperty Poodle Warm").success);
}

#[test]
fn exception_blocks_inheritance() {
    let mut s = session();
    learned(
        &mut s,
        "__InheritableProperty hasProperty\n\
         isA Penguin Bird\n\
         isA Robin Bird\n\
         hasProperty Bird CanFly\n\
         @n hasProperty Penguin CanFly\n\
         Not $n",
    );

    let robin = s.prove("hasProperty Robin CanFly").unwrap();
    assert!(robin.valid());
    assert_eq!(robin.proof.method, Some(ProofMethod::Inheritance));

    let penguin = s.prove("hasProperty Penguin CanFly").unwrap();
    assert!(!penguin.valid());
    assert_eq!(penguin.proof.reason.as_deref(), Some("Explicitly negated"));
}

#[test]
fn disabled_rejection_stores_with_warning() {
    let mut s = session();
    learned(&mut s, "contradictsSameArgs before after\nbefore A B\nSet rejectContradictions off");
    let out = s.learn("after A B");
    assert!(out.success);
    assert_eq!(out.facts, 1);
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn transitive_chain_is_sound() {
    let mut s = session();
    learned(&mut s, "__TransitiveRelation isA\nisA Poodle Dog\nisA Dog Animal");

    let direct = s.prove("isA Poodle Dog").unwrap();
    let chained = s.prove("isA Poodle Animal").unwrap();
    assert!(chained.valid());
    assert_eq!(chained.proof.method, Some(ProofMethod::TransitiveChain));
    assert!(chained.proof.confidence <= direct.proof.confidence);

    let facts: Vec<&str> = chained.proof.steps.iter().map(|st| st.fact.as_str()).collect();
    assert_eq!(facts, vec!["isA Poodle Dog", "isA Dog Animal"]);
    assert!(chained.proof.steps.iter().all(|st| st.fact_id.is_some()));

    assert!(!s.prove("isA Animal Poodle").unwrap().valid());
}

#[test]
fn symmetric_reflexive_shortcut() {
    let mut s = session();
    learned(&mut s, "__SymmetricRelation near\nnear Ann Bob");
    let same = s.prove("near Ann Ann").unwrap();
    assert!(same.valid());
    assert_eq!(same.proof.method, Some(ProofMethod::SymmetricReflexive));

    let flipped = s.prove("near Bob Ann").unwrap();
    assert_eq!(flipped.proof.method, Some(ProofMethod::SymmetricDirect));

    // An unknown pair on acyclic data is an ordinary miss.
    let missing = s.prove("near Ann Carl").unwrap();
    assert!(!missing.valid());
    assert_eq!(missing.proof.reason.as_deref(), Some("No proof found"));
}

#[test]
fn cyclic_graph_terminates() {
    let mut s = session();
    learned(&mut s, "__TransitiveRelation isA\nisA A B\nisA B A");
    let proof = s.prove("isA A C").unwrap();
    assert!(!proof.valid());
    assert!(proof.proof.reason.is_some());
    assert!(s.prove("isA A A").unwrap().valid());
}

#[test]
fn implies_rule_concludes_goal() {
    let mut s = session();
    learned(
        &mut s,
        "Implies (parentOf ?x ?y) (childOf ?y ?x)\nparentOf Ann Bob",
    );
    let proof = s.prove("childOf Bob Ann").unwrap();
    assert!(proof.valid());
    assert_eq!(proof.proof.method, Some(ProofMethod::Rule));
    assert!(!s.prove("childOf Ann Bob").unwrap().valid());
}

#[test]
fn synonyms_canonicalize_stored_facts_and_goals() {
    let mut s = session();
    learned(&mut s, "synonym Dog Hound\nisA Rex Hound");
    let last = s.facts().last().unwrap();
    assert_eq!(last.metadata.to_string(), "isA Rex Dog");
    assert!(s.prove("isA Rex Hound").unwrap().valid());
}

#[test]
fn synonym_declared_after_use_respells_earlier_facts() {
    let mut s = session();
    learned(&mut s, "isA Rex Hound
before A Hound");
    learned(&mut s, "synonym Dog Hound");

    assert!(s.prove("isA Rex Hound").unwrap().valid());
    assert!(s.prove("isA Rex Dog").unwrap().valid());
    let spellings: Vec<String> = s
        .facts()
        .iter()
        .filter(|f| f.metadata.operator != "synonym")
        .map(|f| f.metadata.to_string())
        .collect();
    assert_eq!(spellings, vec!["isA Rex Dog", "before A Dog"]);

    learned(&mut s, "contradictsSameArgs before after");
    let out = s.learn("after A Dog");
    assert!(!out.success);
    assert_eq!(out.errors[0].code, "hdkb::contradiction::rejected");
    assert!(s.index_is_consistent());
}

#[test]
fn alias_cycle_settles_on_one_spelling() {
    let mut s = session();
    learned(&mut s, "canonical Yak X
canonical X Yak
likes Ann Yak
likes Bob X");
    let objects: Vec<&str> = s
        .facts()
        .iter()
        .filter(|f| f.metadata.operator == "likes")
        .map(|f| f.metadata.args[1].as_str())
        .collect();
    assert_eq!(objects, vec!["X", "X"]);
    assert!(s.prove("likes Ann X").unwrap().valid());
}

#[test]
fn query_returns_direct_then_derived() {
    let mut s = session();
    learned(&mut s, "__TransitiveRelation isA\nisA Poodle Dog\nisA Dog Animal\nisA Cat Animal");

    let out = s.query("isA ?x Animal").unwrap();
    assert!(out.success);
    let found: Vec<&str> = out.results.iter().map(|m| m.bindings["x"].as_str()).collect();
    assert_eq!(&found[..2], &["Dog", "Cat"]);
    assert!(found.contains(&"Poodle"));

    let none = s.query("isA ?x Plant").unwrap();
    assert!(!none.success);
    assert_eq!(none.reason.as_deref(), Some("No matches"));
}

#[test]
fn csp_solve_stores_assignment_and_tuples() {
    let mut s = session();
    learned(
        &mut s,
        "isA Ann Guest\n\
         isA Bob Guest\n\
         isA T1 Table\n\
         isA T2 Table\n\
         conflictsWith Ann Bob\n\
         @seating solve csp\n\
         \x20 variables from Guest\n\
         \x20 domain from Table\n\
         \x20 noConflict conflictsWith\n\
         end",
    );

    let record = s.solve_record("seating").unwrap();
    assert!(record.success);
    assert_eq!(record.solutions.len(), 2);
    for solution in &record.solutions {
        let values: Vec<&str> = solution.assignments.iter().map(|(_, v)| v.as_str()).collect();
        assert_ne!(values[0], values[1]);
        assert!(solution.proof.contains("Ann apart from Bob"));
    }

    let (_, ann_table) = &record.solutions[0].assignments[0];
    assert!(s.prove(&format!("seating Ann {ann_table}")).unwrap().valid());
    assert_eq!(s.query("cspTuple seating ?a ?b").unwrap().results.len(), 2);
}

#[test]
fn plan_solve_avoids_guarded_states() {
    let mut s = session();
    learned(
        &mut s,
        "next S0 Sx\n\
         next Sx S2\n\
         next S0 S1\n\
         next S1 S2\n\
         blocked Sx\n\
         @route solve plan\n\
         \x20 start S0\n\
         \x20 goal S2\n\
         \x20 transition next\n\
         \x20 guard blocked\n\
         end",
    );

    let record = s.solve_record("route").unwrap();
    assert!(record.success);
    assert!(s.prove("planStep route 1 S0 S1").unwrap().valid());
    assert!(s.prove("planStep route 2 S1 S2").unwrap().valid());
    assert_eq!(s.query("planStep route ?i ?from ?to").unwrap().results.len(), 2);
}

#[test]
fn unsolvable_plan_is_a_warning() {
    let mut s = session();
    let out = s.learn("next S0 S1\n@route solve plan\n  start S0\n  goal S9\n  transition next\nend");
    assert!(out.success);
    assert!(!s.solve_record("route").unwrap().success);
    assert!(out.warnings.iter().any(|w| w.contains("route")));
}

#[test]
fn theory_directory_feeds_semantics_and_facts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("animals.sys2"),
        "__TransitiveRelation isA\nisA Dog Animal\n",
    )
    .unwrap();

    let config = SessionConfig {
        theory_dir: Some(dir.path().to_path_buf()),
        ..SessionConfig::for_testing()
    };
    let mut s = Session::new(config).unwrap();
    assert!(s.semantic().is_transitive("isA"));

    let out = s.load_theory("animals");
    assert!(out.success, "{:?}", out.errors);
    assert!(s.facts().iter().all(|f| f.kind == FactKind::Theory));

    learned(&mut s, "isA Rex Dog");
    assert_eq!(s.facts().last().unwrap().kind, FactKind::Truth);
    assert!(s.prove("isA Rex Animal").unwrap().valid());

    assert!(!s.load_theory("plants").success);
}

#[test]
fn indices_stay_consistent_across_commits_and_rollbacks() {
    let mut s = session();
    learned(&mut s, "contradictsSameArgs before after\nbefore A B\nisA Rex Dog");
    assert!(!s.learn("isA Fido Dog\nafter A B").success);
    learned(&mut s, "synonym Dog Hound\nisA Fido Hound");
    assert!(!s.learn("likes Ann $missing").success);
    assert!(s.index_is_consistent());
    assert_eq!(s.facts().len(), 5);
}

#[test]
fn learn_outcome_serializes_contradiction() {
    let mut s = session();
    learned(&mut s, "contradictsSameArgs before after\nbefore A B");
    let out = s.learn("after A B");
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"][0]["contradiction"]["kind"], "contradictsSameArgs");
}
