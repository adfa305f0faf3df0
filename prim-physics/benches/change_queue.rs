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
//! Benchmarks for the deferred change path
//!
//! Measures enqueue cost from several producers and the cost of a full
//! tick that applies a backlog of changes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use prim_physics::{
    BodyId, ChangeQueue, IdAllocator, PhysicsScene, PrimDescriptor, SandboxEngine, SceneConfig,
};
use std::sync::Arc;
use std::thread;

fn populated_scene(n_bodies: usize) -> (PhysicsScene<SandboxEngine>, Vec<BodyId>) {
    let mut scene = PhysicsScene::new(SandboxEngine::new(), SceneConfig::default())
        .expect("default config is valid");
    let sender = scene.sender();
    let ids = (0..n_bodies)
        .map(|i| {
            let x = 1.0 + (i % 250) as f64;
            let y = 1.0 + (i / 250) as f64 * 2.0;
            sender
                .add_prim(PrimDescriptor::new(DVec3::new(x, y, 30.0), DVec3::ONE).physical())
                .expect("queue open")
        })
        .collect();
    scene.step();
    (scene, ids)
}

fn bench_enqueue_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("change_enqueue");
    let queue = ChangeQueue::new(Arc::new(IdAllocator::new()), 0.02);
    let ids: Vec<BodyId> = (1..=100).map(BodyId::new).collect();

    for producers in [1usize, 4].iter() {
        group.bench_with_input(
            BenchmarkId::new("producers", producers),
            producers,
            |b, &producers| {
                b.iter(|| {
                    thread::scope(|s| {
                        for p in 0..producers {
                            let sender = queue.sender();
                            let ids = &ids;
                            s.spawn(move || {
                                for (i, id) in ids.iter().enumerate() {
                                    let velocity = DVec3::new(p as f64, i as f64, 0.0);
                                    let _ = sender.set_velocity(*id, black_box(velocity));
                                }
                            });
                        }
                    });
                    black_box(queue.drain())
                });
            },
        );
    }

    group.finish();
}

fn bench_tick_with_backlog(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_with_backlog");

    for n_bodies in [10, 100, 1000].iter() {
        let (mut scene, ids) = populated_scene(*n_bodies);
        let sender = scene.sender();

        group.bench_with_input(BenchmarkId::new("bodies", n_bodies), n_bodies, |b, _| {
            b.iter(|| {
                for id in &ids {
                    let _ = sender.add_force(*id, DVec3::new(0.0, 0.0, 50.0), false);
                }
                black_box(scene.step())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enqueue_and_drain, bench_tick_with_backlog);
criterion_main!(benches);
