//! Benchmarks for vector primitives, fact insertion and proof search.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;

use hdkb::config::SessionConfig;
use hdkb::session::Session;
use hdkb::vsa::ops::VsaOps;
use hdkb::vsa::{Dimension, Encoding};

fn bench_bind_bundle(c: &mut Criterion) {
    let ops = VsaOps::new(Dimension::DEFAULT, Encoding::DenseBinary);
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let vecs: Vec<_> = (0..10).map(|_| ops.random(&mut rng)).collect();
    let refs: Vec<&_> = vecs.iter().collect();

    c.bench_function("bind_10k", |bench| {
        bench.iter(|| black_box(ops.bind(&vecs[0], &vecs[1]).unwrap()))
    });
    c.bench_function("bundle_10x10k", |bench| {
        bench.iter(|| black_box(ops.bundle(&refs).unwrap()))
    });
}

/// `isA N0 N1`, `isA N1 N2`, ... as one program.
fn chain_program(len: usize) -> String {
    let mut text = String::from("__TransitiveRelation isA\n");
    for i in 0..len {
        text.push_str(&format!("isA N{i} N{}\n", i + 1));
    }
    text
}

fn bench_learn(c: &mut Criterion) {
    let program = chain_program(200);
    c.bench_function("learn_200_facts", |bench| {
        bench.iter(|| {
            let mut session = Session::new(SessionConfig::for_testing()).unwrap();
            black_box(session.learn(&program))
        })
    });
}

fn bench_prove_chain(c: &mut Criterion) {
    let mut session = Session::new(SessionConfig::for_testing()).unwrap();
    session.learn(&chain_program(30));

    c.bench_function("prove_transitive_30", |bench| {
        bench.iter(|| black_box(session.prove("isA N0 N30").unwrap()))
    });
    c.bench_function("query_ancestors_30", |bench| {
        bench.iter(|| black_box(session.query("isA N0 ?x").unwrap()))
    });
}

criterion_group!(benches, bench_bind_bundle, bench_learn, bench_prove_chain);
criterion_main!(benches);
