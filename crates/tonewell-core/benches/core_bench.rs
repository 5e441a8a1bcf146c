//! Criterion benchmarks for tonewell-core DSP primitives
//!
//! Run with: cargo bench -p tonewell-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tonewell_core::{
    AllpassFilter, Biquad, BiquadCoeffs, BiquadKind, CombFilter, Lr4, Oversampler, Smoother,
    hard_clip,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_biquad(c: &mut Criterion) {
    let mut group = c.benchmark_group("Biquad");
    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        group.bench_with_input(BenchmarkId::new("process", block_size), &block_size, |b, _| {
            let mut biquad = Biquad::new();
            biquad.design(BiquadKind::Lowpass, 1000.0, 0.707, 0.0, SAMPLE_RATE);
            b.iter(|| {
                for &sample in &input {
                    black_box(biquad.process(black_box(sample)));
                }
            });
        });
    }
    group.bench_function("design", |b| {
        b.iter(|| {
            black_box(BiquadCoeffs::design(
                BiquadKind::HighShelf,
                black_box(8000.0),
                0.707,
                black_box(6.0),
                SAMPLE_RATE,
            ))
        });
    });
    group.finish();
}

fn bench_reverb_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("ReverbUnits");
    let input = generate_test_signal(512);
    group.bench_function("comb_1116", |b| {
        let mut comb = CombFilter::new(1116);
        comb.set_feedback(0.84);
        comb.set_damping(0.2);
        b.iter(|| {
            for &sample in &input {
                black_box(comb.process(black_box(sample)));
            }
        });
    });
    group.bench_function("allpass_556", |b| {
        let mut ap = AllpassFilter::new(556);
        b.iter(|| {
            for &sample in &input {
                black_box(ap.process(black_box(sample)));
            }
        });
    });
    group.bench_function("lr4_split", |b| {
        let mut xo = Lr4::new(200.0, SAMPLE_RATE);
        b.iter(|| {
            for &sample in &input {
                black_box(xo.split(black_box(sample)));
            }
        });
    });
    group.finish();
}

fn bench_oversampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("Oversampler");
    let input = generate_test_signal(256);
    for factor in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::new("hard_clip", factor), &factor, |b, &factor| {
            let mut os = Oversampler::new(factor);
            os.prepare(SAMPLE_RATE);
            b.iter(|| {
                for &sample in &input {
                    black_box(os.process_sample(black_box(sample), |v| hard_clip(v * 4.0, 1.0)));
                }
            });
        });
    }
    group.finish();
}

fn bench_smoother(c: &mut Criterion) {
    c.bench_function("Smoother/next_1024", |b| {
        let mut s = Smoother::new(0.0);
        s.prepare(SAMPLE_RATE);
        b.iter(|| {
            for i in 0..1024 {
                black_box(s.next(if i & 256 == 0 { 1.0 } else { 0.0 }));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_biquad,
    bench_reverb_units,
    bench_oversampler,
    bench_smoother
);
criterion_main!(benches);
