// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Benchmarks for analytic volume estimation
//!
//! Compares single-shape volume cost across profiles and the batched path
//! used for bulk adds.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use prim_physics::shape::HollowShape;
use prim_physics::{ShapeDescriptor, VolumeMassCalculator};

fn shapes() -> Vec<(&'static str, ShapeDescriptor)> {
    vec![
        ("cube", ShapeDescriptor::cube()),
        ("hollow_cube", ShapeDescriptor::cube().with_hollow(HollowShape::Circle, 25_000)),
        ("cylinder", ShapeDescriptor::cylinder()),
        ("sphere", ShapeDescriptor::sphere()),
        ("torus", ShapeDescriptor::torus().with_path_cut(10_000, 40_000)),
        ("tube", ShapeDescriptor::tube().with_path_scale(150, 150)),
    ]
}

fn bench_single_volume(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_single");
    let size = DVec3::new(2.0, 3.0, 0.5);

    for (name, shape) in shapes() {
        group.bench_with_input(BenchmarkId::new("compute_volume", name), &shape, |b, shape| {
            b.iter(|| VolumeMassCalculator::compute_volume(black_box(shape), black_box(size)))
        });
    }

    group.finish();
}

fn bench_batch_volume(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_batch");
    let catalog = shapes();

    for n_shapes in [100, 1000, 10_000].iter() {
        let owned: Vec<(ShapeDescriptor, DVec3)> = (0..*n_shapes)
            .map(|i| {
                let shape = catalog[i % catalog.len()].1.clone();
                (shape, DVec3::splat(0.5 + (i % 7) as f64))
            })
            .collect();
        let items: Vec<(&ShapeDescriptor, DVec3)> =
            owned.iter().map(|(shape, size)| (shape, *size)).collect();

        group.bench_with_input(BenchmarkId::new("compute_volumes", n_shapes), &items, |b, items| {
            b.iter(|| VolumeMassCalculator::compute_volumes(black_box(items)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_volume, bench_batch_volume);
criterion_main!(benches);
