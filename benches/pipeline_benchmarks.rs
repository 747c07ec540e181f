use aqi_forecast::data::{Location, SyntheticSource};
use aqi_forecast::prelude::*;
use aqi_forecast::features::FeatureEngine;
use aqi_forecast::imputation::KnnImputer;
use aqi_forecast::models::{ForestParams, RandomForest, Regressor, StandardScaler};
use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use indexmap::IndexMap;

/// Benchmarks for the CPU-bound pipeline stages

fn history(days: u32) -> TimeSeriesFrame {
    let anchor = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let source = SyntheticSource::new(anchor);
    let location = Location::new("London", "United Kingdom", "GB");
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime
        .block_on(source.historical_series(&location, days))
        .unwrap()
}

fn benchmark_feature_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_building");
    let engine = FeatureEngine::new();

    for &days in &[7u32, 30, 90] {
        let frame = history(days);
        group.throughput(Throughput::Elements(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("build_features", days), &frame, |b, frame| {
            b.iter(|| black_box(engine.build_features(frame)));
        });
    }

    group.finish();
}

fn benchmark_imputation(c: &mut Criterion) {
    let mut group = c.benchmark_group("imputation");

    for &days in &[30u32, 90] {
        let frame = history(days);
        group.throughput(Throughput::Elements(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("knn_fit_transform", days), &frame, |b, frame| {
            b.iter(|| {
                let mut imputer = KnnImputer::new(5).unwrap();
                black_box(imputer.fit_transform(frame).unwrap())
            });
        });
    }

    group.finish();
}

fn benchmark_forest_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_training");
    group.sample_size(10);

    let frame = KnnImputer::new(5).unwrap().fit_transform(&history(30)).unwrap();
    let features = FeatureEngine::new().build_features(&frame);
    let columns = aqi_forecast::features::input_columns(Pollutant::Pm25);
    let rows: Vec<Vec<Option<f64>>> = features.iter().map(|f| f.select(&columns)).collect();
    let target: Vec<f64> = frame.column(Pollutant::Pm25).iter().map(|v| v.unwrap_or(0.0)).collect();
    let x = StandardScaler::new().fit_transform(&rows).unwrap();

    for &n_trees in &[10usize, 50] {
        group.bench_with_input(BenchmarkId::new("random_forest", n_trees), &n_trees, |b, &n_trees| {
            b.iter(|| {
                let mut forest = RandomForest::new(ForestParams { n_trees, ..ForestParams::default() });
                forest.fit(&x, &target).unwrap();
                black_box(forest)
            });
        });
    }

    group.finish();
}

fn benchmark_aqi(c: &mut Criterion) {
    let concentrations: IndexMap<Pollutant, f64> = [
        (Pollutant::Pm25, 42.0),
        (Pollutant::Pm10, 80.0),
        (Pollutant::O3, 0.066),
        (Pollutant::No2, 55.0),
        (Pollutant::So2, 12.0),
        (Pollutant::Co, 1.4),
    ]
    .into_iter()
    .collect();

    c.bench_function("compute_aqi", |b| {
        b.iter(|| black_box(compute_aqi(black_box(&concentrations)).unwrap()))
    });
}

criterion_group!(
    benches,
    benchmark_feature_building,
    benchmark_imputation,
    benchmark_forest_training,
    benchmark_aqi
);
criterion_main!(benches);
