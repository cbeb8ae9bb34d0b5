//! Performance benchmarks for audio analysis

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stem_analyzer::audio::{
    synth, types::TARGET_SAMPLE_RATE, AnalysisConfig, AudioAnalyzer, AudioData, KeyDetector,
    TempoDetector,
};

fn test_signal(seconds: f32) -> AudioData {
    let samples = synth::mix(
        &synth::click_track(120.0, seconds, TARGET_SAMPLE_RATE),
        &synth::chord(&synth::C_MAJOR_TRIAD, seconds, TARGET_SAMPLE_RATE, 0.15),
    );
    AudioData::from_samples(samples, TARGET_SAMPLE_RATE)
}

fn bench_full_analysis(c: &mut Criterion) {
    let audio = test_signal(30.0);
    let analyzer = AudioAnalyzer::new();

    c.bench_function("analyze_30s", |b| {
        b.iter(|| {
            let _ = analyzer.analyze(black_box(&audio));
        });
    });

    let fast = AudioAnalyzer::with_config(AnalysisConfig::fast());
    c.bench_function("analyze_30s_fast", |b| {
        b.iter(|| {
            let _ = fast.analyze(black_box(&audio));
        });
    });
}

fn bench_detectors(c: &mut Criterion) {
    let audio = test_signal(30.0);
    let key = KeyDetector::default();
    let tempo = TempoDetector::default();

    c.bench_function("key_30s", |b| {
        b.iter(|| {
            let _ = key.detect(black_box(&audio));
        });
    });

    c.bench_function("tempo_30s", |b| {
        b.iter(|| {
            let _ = tempo.detect(black_box(&audio));
        });
    });
}

criterion_group!(benches, bench_full_analysis, bench_detectors);
criterion_main!(benches);
