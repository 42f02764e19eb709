//! Benchmarks for voxelization under the fixed and adaptive scale policies

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use voxcrate_algorithms::{OriginPolicy, RotationAugmentation, ScalePolicy, Voxelizer, VoxelizerConfig};
use voxcrate_core::{OccupancyPolicy, Point3f, PointCloud};

/// Generate a spiral-shaped cloud roughly the size of a street object
fn generate_test_point_cloud(num_points: usize) -> PointCloud<Point3f> {
    (0..num_points)
        .map(|i| {
            let i = i as f32;
            Point3f::new((i * 0.1).sin() * 2.0, (i * 0.1).cos() * 2.0, i * 0.0005)
        })
        .collect()
}

fn bench_voxelize(c: &mut Criterion) {
    let sizes = [1_000, 10_000, 100_000];
    let policies = [
        (
            "fixed_centered",
            ScalePolicy::Fixed {
                cell_size: 0.2,
                origin: OriginPolicy::Centered,
            },
        ),
        ("adaptive", ScalePolicy::Adaptive),
    ];

    let mut group = c.benchmark_group("voxelize");

    for &size in &sizes {
        let cloud = generate_test_point_cloud(size);
        group.throughput(Throughput::Elements(size as u64));

        for (name, scale) in policies {
            let voxelizer = Voxelizer::new(
                VoxelizerConfig::default()
                    .with_scale(scale)
                    .with_occupancy(OccupancyPolicy::Count),
            )
            .unwrap();

            group.bench_with_input(BenchmarkId::new(name, size), &cloud, |b, cloud| {
                b.iter(|| black_box(voxelizer.voxelize(cloud).unwrap()))
            });
        }
    }

    group.finish();
}

fn bench_augmented_samples(c: &mut Criterion) {
    let cloud = generate_test_point_cloud(10_000);
    let voxelizer = Voxelizer::new(VoxelizerConfig::default()).unwrap();

    let mut group = c.benchmark_group("augmented_voxelize");
    for steps in [1usize, 4, 12] {
        let augmentation = RotationAugmentation::new(steps).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, _| {
            b.iter(|| {
                let clouds: Vec<_> = augmentation
                    .samples(&cloud)
                    .into_iter()
                    .map(|(_, c)| c)
                    .collect();
                black_box(voxelizer.voxelize_all(&clouds).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_voxelize, bench_augmented_samples);
criterion_main!(benches);
