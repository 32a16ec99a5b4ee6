//! Pipeline stage benchmarks.
//!
//! Run with: cargo bench --package javelin-media

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

#[path = "../tests/common/mod.rs"]
mod common;

use common::ThrowScenario;
use javelin_media::calibration::calibrate;
use javelin_media::events::segment_events;
use javelin_media::smoothing::smooth_all;
use javelin_media::{AnalysisConfig, MediaError, MotionAnalyzer, ObservedProvider, SavitzkyGolay};
use javelin_models::{ClipParams, Handedness, ScaleMethod, ViewType};

fn params() -> ClipParams {
    ClipParams::new(ViewType::Side, Handedness::Right, ScaleMethod::Marker)
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Smoothing");
    let config = AnalysisConfig::default();
    let analyzer = MotionAnalyzer::new(config.clone()).unwrap();

    for &frames in &[150usize, 600, 2400] {
        let clip = ThrowScenario {
            frames,
            ..Default::default()
        }
        .build();
        let raw = analyzer
            .collect_tracks(
                clip.frames.iter().cloned().map(Ok::<_, MediaError>),
                frames,
                &ObservedProvider,
                &ObservedProvider,
                None,
            )
            .unwrap();

        group.throughput(Throughput::Elements(frames as u64));
        for &window in &[7usize, 15] {
            let filter = SavitzkyGolay::new(window, 2).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("window_{window}"), frames),
                &raw,
                |b, raw| b.iter(|| smooth_all(black_box(raw), &config, &filter)),
            );
        }
    }
    group.finish();
}

fn bench_segmentation(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let analyzer = MotionAnalyzer::new(config.clone()).unwrap();
    let clip = ThrowScenario::default().build();
    let raw = analyzer
        .collect_tracks(
            clip.frames.iter().cloned().map(Ok::<_, MediaError>),
            clip.meta.frame_count,
            &ObservedProvider,
            &ObservedProvider,
            None,
        )
        .unwrap();
    let filter = SavitzkyGolay::from_config(&config).unwrap();
    let tracks = smooth_all(&raw, &config, &filter);
    let calibration = calibrate(&raw, &params(), &config).unwrap();

    c.bench_function("segment_events_150", |b| {
        b.iter(|| {
            segment_events(
                black_box(&tracks),
                Handedness::Right,
                clip.meta.fps,
                &calibration,
                &config,
            )
        })
    });
}

fn bench_full_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("Full Analysis");
    group.measurement_time(Duration::from_secs(5));
    let analyzer = MotionAnalyzer::new(AnalysisConfig::default()).unwrap();

    for &frames in &[150usize, 600] {
        let clip = ThrowScenario {
            frames,
            ..Default::default()
        }
        .build();
        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::new("observed", frames), &clip, |b, clip| {
            b.iter(|| analyzer.analyze_observed(black_box(clip), &params(), None))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_smoothing, bench_segmentation, bench_full_analysis);
criterion_main!(benches);
