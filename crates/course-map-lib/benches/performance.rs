//! Performance benchmarks for course-map-lib
//!
//! Run with: cargo bench --package course-map-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use course_map_lib::{
    Category, ClusterConfig, GeoBounds, GeoPoint, LatLng, MarkerLayer, PointSet, StatusTag,
    build_clusters, resolve_collisions,
};

/// Scatter courses over the continental US with a few dense metro areas
fn generate_points(count: usize) -> Vec<GeoPoint> {
    const METROS: [(f64, f64); 5] = [
        (40.71, -74.00),
        (41.88, -87.63),
        (33.45, -112.07),
        (27.95, -82.46),
        (47.61, -122.33),
    ];

    (0..count)
        .map(|i| {
            let t = i as f64;
            let (lat, lng) = if i % 3 == 0 {
                let (lat, lng) = METROS[i % METROS.len()];
                (lat + (t * 0.37).sin() * 0.3, lng + (t * 0.53).cos() * 0.3)
            } else {
                (
                    30.0 + (t * 12.9898).sin().abs() * 17.0,
                    -120.0 + (t * 78.233).cos().abs() * 45.0,
                )
            };
            let category = Category::all()[i % Category::all().len()];
            GeoPoint::new(format!("c{i}"), lat, lng, category, StatusTag::Unmarked)
        })
        .collect()
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    group.sample_size(20);

    let config = ClusterConfig::default();
    let points = generate_points(5_000);
    group.throughput(Throughput::Elements(points.len() as u64));

    for zoom in [4.0, 8.0, 12.0] {
        group.bench_with_input(BenchmarkId::new("5k_points", zoom), &zoom, |b, &zoom| {
            b.iter(|| build_clusters(&points, zoom, None, &config));
        });
    }

    // Detailed view around New York
    let viewport = GeoBounds::new(40.5, -74.3, 40.9, -73.7);
    group.bench_function("5k_points_viewport_z12", |b| {
        b.iter(|| build_clusters(&points, 12.0, Some(&viewport), &config));
    });

    group.finish();
}

fn bench_collisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("collisions");

    let config = ClusterConfig::default();
    let markers: Vec<(String, LatLng)> = (0..500)
        .map(|i| {
            let t = i as f64;
            (
                format!("m{i}"),
                LatLng::new(40.7 + (t * 0.1).sin() * 0.01, -74.0 + (t * 0.1).cos() * 0.01),
            )
        })
        .collect();

    group.throughput(Throughput::Elements(markers.len() as u64));
    group.bench_function("500_markers_z15", |b| {
        b.iter(|| {
            resolve_collisions(
                markers.iter().map(|(id, p)| (id.as_str(), *p)),
                15.0,
                &config,
            )
        });
    });

    group.finish();
}

fn bench_layer_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer");
    group.sample_size(20);

    let points = generate_points(2_000);
    group.bench_function("zoom_sweep_2k", |b| {
        b.iter(|| {
            let mut layer = MarkerLayer::new(ClusterConfig::default()).unwrap();
            layer.set_points(PointSet::from_points(points.clone()));
            for zoom in 3..=15 {
                layer.set_view(zoom as f64, None);
            }
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_clustering, bench_collisions, bench_layer_pass);

criterion_main!(benches);
