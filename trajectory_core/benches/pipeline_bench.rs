use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trajectory_core::pipeline::{Pipeline, PipelineConfig};
use trajectory_core::types::{FrameIndex, Observation};

/// A one-second straight delivery sampled at `n` frames (embedded timestamps
/// model a high-speed camera, so flight speed is independent of `n`).
fn make_delivery(n: u32) -> Vec<Observation> {
    let dv = 380.0 / f64::from(n);
    (0..n)
        .map(|i| Observation {
            frame: FrameIndex(i),
            timestamp: Some(f64::from(i) / f64::from(n)),
            position_px: Some([480.0, 100.0 + dv * f64::from(i)]),
            radius_px: None,
            depth_m: None,
            confidence: 1.0,
            detected: true,
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    let pipeline = Pipeline::new(PipelineConfig::default()).expect("default config is valid");
    for n in [30u32, 120, 480] {
        let observations = make_delivery(n);
        group.bench_function(format!("{n}_frames"), |b| {
            b.iter(|| black_box(pipeline.run(&observations).expect("delivery analyzes cleanly")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
