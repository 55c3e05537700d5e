//! Benchmarks for forest construction and editing.

use criterion::{criterion_group, criterion_main, Criterion};
use filament::prelude::*;
use nalgebra::Point3;

/// A trunk along x with a side branch every `spacing` samples, alternating
/// between +y and -y.
fn create_comb_skeleton(trunk: usize, spacing: usize, branch: usize) -> GeometryStore {
    let mut store = GeometryStore::new();

    for i in 0..trunk {
        store.push(Point3::new(i as f64, 0.0, 0.0));
    }

    for (k, root) in (spacing..trunk).step_by(spacing).enumerate() {
        let side = if k % 2 == 0 { 1.0 } else { -1.0 };
        for j in 1..=branch {
            store.push(Point3::new(root as f64, side * j as f64, 0.0));
        }
    }

    store
}

/// Short collinear runs separated by unit-and-a-half gaps.
fn create_broken_forest(runs: usize, run_length: usize) -> Forest {
    let mut forest = Forest::new();
    for r in 0..runs {
        let x0 = r as f64 * (run_length as f64 + 0.5);
        let bits = (0..run_length)
            .map(|i| {
                TraceBit::new(
                    Marker::new(r * run_length + i),
                    Point3::new(x0 + i as f64, 0.0, 0.0),
                    1.0,
                )
            })
            .collect();
        forest.add_root(bits).unwrap();
    }
    forest
}

fn bench_build(c: &mut Criterion) {
    let store = create_comb_skeleton(2000, 50, 60);
    let options = SkeletonOptions::default().with_edge_range(1.5);

    c.bench_function("build_forest_comb", |b| {
        b.iter(|| build_forest(&store, &options).unwrap());
    });

    let sequential = options.clone().with_parallel(false);
    c.bench_function("build_forest_comb_sequential", |b| {
        b.iter(|| build_forest(&store, &sequential).unwrap());
    });
}

fn bench_edits(c: &mut Criterion) {
    let store = create_comb_skeleton(2000, 50, 60);
    let forest = build_forest(&store, &SkeletonOptions::default().with_edge_range(1.5)).unwrap();

    c.bench_function("split_merge_trunk", |b| {
        b.iter(|| {
            let mut f = forest.clone();
            f.split(Marker::new(1025)).unwrap();
            f.merge(Marker::new(1025), Marker::new(1026)).unwrap();
            f
        });
    });

    c.bench_function("line_features", |b| {
        b.iter(|| forest.line_features());
    });
}

fn bench_gaps(c: &mut Criterion) {
    let forest = create_broken_forest(500, 20);
    let options = GapOptions::default().with_max_gap(5.0);

    c.bench_function("compute_gaps_500_runs", |b| {
        b.iter(|| compute_gaps(&forest, &[], &options).unwrap());
    });
}

criterion_group!(benches, bench_build, bench_edits, bench_gaps);
criterion_main!(benches);
