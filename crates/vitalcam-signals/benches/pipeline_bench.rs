use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vitalcam_signals::config::ExtractionConfig;
use vitalcam_signals::{Pipeline, PipelineConfig, PatchStack, RegionTrace, RegionTraceSet, RppgMethod};

const FS: f32 = 30.0;

fn recording(regions: usize, frames: usize, seed: u64) -> RegionTraceSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let traces = (0..regions)
        .map(|r| {
            let samples: Vec<[f32; 3]> = (0..frames)
                .map(|t| {
                    let p = (std::f32::consts::TAU * 1.2 * t as f32 / FS).sin();
                    [
                        120.0 + 0.3 * p + rng.gen_range(-0.5f32..0.5),
                        90.0 + p + rng.gen_range(-0.5f32..0.5),
                        70.0 + 0.2 * p + rng.gen_range(-0.5f32..0.5),
                    ]
                })
                .collect();
            let trace = RegionTrace::from_samples(r as u32, &samples);
            if r == 0 {
                let patches = Array4::from_shape_fn((frames, 32, 32, 3), |(t, y, x, c)| {
                    samples[t][c] + ((x * 7 + y * 3) % 5) as f32
                });
                trace
                    .with_patches(PatchStack::new(patches).expect("RGB patches"))
                    .expect("aligned patches")
            } else {
                trace
            }
        })
        .collect();
    RegionTraceSet::new(FS, traces).expect("valid trace set")
}

/// Benchmark: one extraction per method on a 10 s trace
fn benchmark_extract(c: &mut Criterion) {
    let set = recording(1, 300, 1);
    let trace = &set.traces()[0];
    let params = ExtractionConfig::default();

    let mut group = c.benchmark_group("extract");
    for method in RppgMethod::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(method), &method, |b, &m| {
            b.iter(|| m.extract(black_box(trace), FS, &params))
        });
    }
    group.finish();
}

/// Benchmark: full recording, 27 regions × 10 methods
fn benchmark_recording(c: &mut Criterion) {
    let set = recording(27, 900, 2);
    let pipeline = Pipeline::new(PipelineConfig::default()).expect("default config");

    c.bench_function("run_recording_27x10", |b| {
        b.iter(|| pipeline.run(black_box("bench"), black_box(&set)))
    });
}

criterion_group!(benches, benchmark_extract, benchmark_recording);
criterion_main!(benches);
