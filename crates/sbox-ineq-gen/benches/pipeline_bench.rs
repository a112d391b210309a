use criterion::{criterion_group, criterion_main, Criterion};

use sbox_core::{catalog, TableKind, TransitionSet};
use sbox_ineq_gen::cover::{exact, greedy};
use sbox_ineq_gen::{augment, enumerate_facets, SolveLimits, TieBreak};

fn bench_hull(c: &mut Criterion) {
    let sbox = catalog::builtin("present").expect("present is built in");
    let mut group = c.benchmark_group("hull");
    group.sample_size(10);
    for kind in [TableKind::Difference, TableKind::Division] {
        let table = kind.generate(&sbox).expect("table");
        let transitions = TransitionSet::from_table(&table);
        group.bench_function(format!("present_{kind}"), |b| {
            b.iter(|| enumerate_facets(transitions.feasible(), None).expect("hull"));
        });
    }
    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let sbox = catalog::builtin("printcipher").expect("printcipher is built in");
    let table = TableKind::Difference.generate(&sbox).expect("table");
    let transitions = TransitionSet::from_table(&table);
    let mut candidates = enumerate_facets(transitions.feasible(), None)
        .expect("hull")
        .inequalities();
    let extra = augment(&candidates, &transitions, 2);
    candidates.extend(extra);

    let mut group = c.benchmark_group("selection");
    group.sample_size(20);
    group.bench_function("printcipher_greedy", |b| {
        b.iter(|| greedy(&candidates, &transitions, TieBreak::First).expect("greedy"));
    });
    group.bench_function("printcipher_exact", |b| {
        b.iter(|| exact(&candidates, &transitions, &SolveLimits::default()).expect("exact"));
    });
    group.finish();
}

criterion_group!(benches, bench_hull, bench_selection);
criterion_main!(benches);
