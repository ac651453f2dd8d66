//! Flow estimation benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use optiflow_rs::{
    DenseFlowEngine, FarnebackConfig, FlowEngine, Frame, LucasKanadeConfig, SparseFlowEngine,
};

/// Smooth blob frame used as synthetic video content.
fn blob_frame(size: usize, cx: f32, cy: f32) -> Frame {
    Frame::from_fn(size, size, move |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        150.0 * (-(dx * dx + dy * dy) / 200.0).exp()
    })
}

fn benchmark_dense_estimate_128(c: &mut Criterion) {
    let prev = blob_frame(128, 64.0, 64.0);
    let next = blob_frame(128, 66.0, 63.0);
    let config = FarnebackConfig {
        stride: 1,
        ..FarnebackConfig::default()
    };

    c.bench_function("dense_estimate_128", |b| {
        b.iter(|| {
            let mut engine = DenseFlowEngine::new(config.clone());
            engine.seed(black_box(&prev)).expect("seed");
            engine.estimate(1, black_box(&next)).expect("estimate")
        })
    });
}

fn benchmark_sparse_estimate_128(c: &mut Criterion) {
    let prev = blob_frame(128, 64.0, 64.0);
    let next = blob_frame(128, 66.0, 63.0);
    let config = LucasKanadeConfig {
        quality_level: 0.1,
        stride: 1,
        ..LucasKanadeConfig::default()
    };

    c.bench_function("sparse_estimate_128", |b| {
        b.iter(|| {
            let mut engine = SparseFlowEngine::new(config.clone());
            engine.seed(black_box(&prev)).expect("seed");
            engine.estimate(1, black_box(&next)).expect("estimate")
        })
    });
}

fn benchmark_sparse_seed_only(c: &mut Criterion) {
    let frame = blob_frame(128, 64.0, 64.0);
    let config = LucasKanadeConfig {
        quality_level: 0.1,
        stride: 1,
        ..LucasKanadeConfig::default()
    };

    c.bench_function("sparse_seed_128", |b| {
        b.iter(|| {
            let mut engine = SparseFlowEngine::new(config.clone());
            engine.seed(black_box(&frame)).expect("seed");
            engine.tracked_point_count()
        })
    });
}

criterion_group!(
    benches,
    benchmark_dense_estimate_128,
    benchmark_sparse_estimate_128,
    benchmark_sparse_seed_only
);
criterion_main!(benches);
