//! Criterion benchmarks for tonewell effects
//!
//! Run with: cargo bench -p tonewell-effects
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tonewell_core::{AudioBlock, Engine};
use tonewell_effects::{
    BitCrusher, MultibandSaturator, Passthrough, PlateReverb, TubePreamp, WaveFolder,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn generate_test_signal(frames: usize) -> Vec<f32> {
    // stereo, channel-major
    let mono: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect();
    [mono.as_slice(), mono.as_slice()].concat()
}

fn bench_engine<E: Engine>(c: &mut Criterion, name: &str, mut engine: E) {
    let mut group = c.benchmark_group(name);

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        engine.prepare(SAMPLE_RATE, block_size);

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                let mut data = input.clone();
                b.iter(|| {
                    data.copy_from_slice(&input);
                    engine.process(&mut AudioBlock::new(black_box(&mut data), 2));
                    black_box(data[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_passthrough(c: &mut Criterion) {
    bench_engine(c, "Passthrough", Passthrough::new());
}

fn bench_plate_reverb(c: &mut Criterion) {
    let reverb = PlateReverb::new();
    reverb.update_parameters(&[
        (PlateReverb::SIZE, 0.8),
        (PlateReverb::EARLY, 0.5),
        (PlateReverb::PREDELAY, 0.2),
    ]);
    bench_engine(c, "PlateReverb", reverb);
}

fn bench_tube_preamp(c: &mut Criterion) {
    let tube = TubePreamp::new();
    tube.update_parameters(&[(TubePreamp::DRIVE, 0.7)]);
    bench_engine(c, "TubePreamp", tube);
}

fn bench_multiband(c: &mut Criterion) {
    let sat = MultibandSaturator::new();
    sat.update_parameters(&[
        (MultibandSaturator::LOW_DRIVE, 0.6),
        (MultibandSaturator::MID_SHAPE, 0.5),
        (MultibandSaturator::HIGH_SHAPE, 1.0),
    ]);
    bench_engine(c, "MultibandSaturator", sat);
}

fn bench_bitcrusher(c: &mut Criterion) {
    let crusher = BitCrusher::new();
    crusher.update_parameters(&[(BitCrusher::RATE, 0.3), (BitCrusher::DITHER, 0.5)]);
    bench_engine(c, "BitCrusher", crusher);
    bench_engine(c, "BitCrusher4x", BitCrusher::with_oversampling(4));
}

fn bench_wavefolder(c: &mut Criterion) {
    let folder = WaveFolder::new();
    folder.update_parameters(&[(WaveFolder::FOLD, 0.8), (WaveFolder::ASYMMETRY, 0.3)]);
    bench_engine(c, "WaveFolder", folder);
}

criterion_group!(
    benches,
    bench_passthrough,
    bench_plate_reverb,
    bench_tube_preamp,
    bench_multiband,
    bench_bitcrusher,
    bench_wavefolder,
);
criterion_main!(benches);
