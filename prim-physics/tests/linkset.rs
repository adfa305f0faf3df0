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
//! Linkset topology and the shared native body

use approx::assert_relative_eq;
use glam::DVec3;
use prim_physics::{PhysicsScene, PrimDescriptor, SandboxEngine, SceneConfig};

fn scene() -> PhysicsScene<SandboxEngine> {
    let _ = env_logger::builder().is_test(true).try_init();
    PhysicsScene::new(SandboxEngine::new(), SceneConfig::default()).unwrap()
}

fn part(x: f64) -> PrimDescriptor {
    PrimDescriptor::new(DVec3::new(x, 128.0, 40.0), DVec3::ONE).physical()
}

#[test]
fn test_link_then_delink_restores_own_body() {
    let mut scene = scene();
    let sender = scene.sender();
    let root = sender.add_prim(part(100.0)).unwrap();
    let child = sender.add_prim(part(102.0)).unwrap();
    scene.step();
    assert!(scene.body(child).unwrap().body_handle().is_some());

    sender.link(child, root).unwrap();
    scene.step();
    let root_body = scene.body(root).unwrap();
    assert_eq!(root_body.children(), &[child]);
    assert_relative_eq!(
        root_body.mass(),
        scene.body(root).unwrap().prim_mass() + scene.body(child).unwrap().prim_mass(),
        epsilon = 1e-9
    );
    let child_body = scene.body(child).unwrap();
    assert_eq!(child_body.parent(), Some(root));
    assert!(child_body.body_handle().is_none());
    assert_eq!(scene.engine().body_count(), 1);

    sender.delink(child).unwrap();
    scene.step();
    let child_body = scene.body(child).unwrap();
    assert!(child_body.parent().is_none());
    assert!(child_body.body_handle().is_some());
    assert!(!scene.body(root).unwrap().children().contains(&child));
    assert!(scene.body(root).unwrap().body_handle().is_some());
    assert_eq!(scene.engine().body_count(), 2);
}

#[test]
fn test_children_ride_with_root() {
    let mut scene = scene();
    let sender = scene.sender();
    let root = sender.add_prim(part(100.0)).unwrap();
    let child = sender.add_prim(part(101.5)).unwrap();
    sender.link(child, root).unwrap();
    scene.step();

    for _ in 0..10 {
        scene.step();
    }
    let root_pos = scene.body(root).unwrap().position();
    let child_pos = scene.body(child).unwrap().position();
    assert!(root_pos.z < 40.0);
    assert_relative_eq!(child_pos.x - root_pos.x, 1.5, epsilon = 1e-6);
    assert_relative_eq!(child_pos.z, root_pos.z, epsilon = 1e-6);
}

#[test]
fn test_removing_root_promotes_first_child() {
    let mut scene = scene();
    let sender = scene.sender();
    let root = sender.add_prim(part(100.0)).unwrap();
    let first = sender.add_prim(part(102.0)).unwrap();
    let second = sender.add_prim(part(104.0)).unwrap();
    sender.link(first, root).unwrap();
    sender.link(second, root).unwrap();
    scene.step();
    assert_eq!(scene.body(root).unwrap().children(), &[first, second]);

    sender.remove(root).unwrap();
    scene.step();
    assert!(scene.body(root).is_none());
    let promoted = scene.body(first).unwrap();
    assert!(promoted.parent().is_none());
    assert_eq!(promoted.children(), &[second]);
    assert!(promoted.body_handle().is_some());
    assert_eq!(scene.body(second).unwrap().parent(), Some(first));
    assert!(scene.bodies().is_active(first));
    assert_eq!(scene.engine().body_count(), 1);
}

#[test]
fn test_static_root_keeps_children_static() {
    let mut scene = scene();
    let sender = scene.sender();
    let root = sender
        .add_prim(PrimDescriptor::new(DVec3::new(100.0, 128.0, 40.0), DVec3::ONE))
        .unwrap();
    let child = sender.add_prim(part(102.0)).unwrap();
    sender.link(child, root).unwrap();
    scene.step();

    assert_eq!(scene.engine().body_count(), 0);
    assert!(scene.body(child).unwrap().body_handle().is_none());
    for _ in 0..5 {
        scene.step();
    }
    assert_eq!(scene.body(child).unwrap().position().z, 40.0);

    sender.set_physical(root, true).unwrap();
    scene.step();
    assert_eq!(scene.engine().body_count(), 1);
    assert!(scene.bodies().is_active(root));
}

#[test]
fn test_shape_change_of_child_rebuilds_root() {
    let mut scene = scene();
    let sender = scene.sender();
    let root = sender.add_prim(part(100.0)).unwrap();
    let child = sender.add_prim(part(102.0)).unwrap();
    sender.link(child, root).unwrap();
    scene.step();
    let before = scene.body(root).unwrap().mass();

    sender.set_size(child, DVec3::splat(2.0)).unwrap();
    scene.step();
    let after = scene.body(root).unwrap().mass();
    assert!(after > before);
    assert_relative_eq!(
        after,
        scene.body(root).unwrap().prim_mass() + scene.body(child).unwrap().prim_mass(),
        epsilon = 1e-9
    );
}
