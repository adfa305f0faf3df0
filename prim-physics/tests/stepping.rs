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
//! Whole-tick behavior through the public scene API

use approx::assert_relative_eq;
use glam::DVec3;
use prim_physics::{
    HoverKind, HoverSettings, PhysicsScene, PrimDescriptor, SandboxEngine, SceneConfig, SceneEvent,
    Terrain,
};

fn scene_with(engine: SandboxEngine) -> PhysicsScene<SandboxEngine> {
    let _ = env_logger::builder().is_test(true).try_init();
    PhysicsScene::new(engine, SceneConfig::default()).unwrap()
}

fn cube_at(position: DVec3) -> PrimDescriptor {
    PrimDescriptor::new(position, DVec3::ONE).physical()
}

fn run(scene: &mut PhysicsScene<SandboxEngine>, ticks: usize) {
    for _ in 0..ticks {
        scene.step();
    }
}

#[test]
fn test_step_reports_summary() {
    let mut scene = scene_with(SandboxEngine::new());
    let sender = scene.sender();
    sender.add_prim(cube_at(DVec3::new(10.0, 10.0, 50.0))).unwrap();
    sender.add_prim(cube_at(DVec3::new(20.0, 10.0, 50.0))).unwrap();

    let summary = scene.step();
    assert_eq!(summary.changes_applied, 2);
    assert_eq!(summary.bodies_updated, 2);
    assert_eq!(summary.contacts, 0);
    assert_eq!(scene.tick_count(), 1);
    assert_eq!(scene.engine().step_count(), 1);
}

#[test]
fn test_body_above_ceiling_is_parked() {
    let mut scene = scene_with(SandboxEngine::new());
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(128.0, 128.0, 150_000.0))).unwrap();
    scene.step();

    let body = scene.body(id).unwrap();
    assert_relative_eq!(body.position().z, 100_000.0);
    assert_eq!(body.velocity(), DVec3::ZERO);
    assert!(body.flags().out_of_bounds);
    let events = scene.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SceneEvent::OutOfBounds { body, position } if *body == id && position.z == 100_000.0
    )));

    // parked bodies are left alone
    run(&mut scene, 5);
    assert_relative_eq!(scene.body(id).unwrap().position().z, 100_000.0);
    assert!(scene.take_events().is_empty());
}

#[test]
fn test_crossing_failure_returns_body_to_region() {
    let mut scene = scene_with(SandboxEngine::new());
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(128.0, 128.0, 150_000.0))).unwrap();
    scene.step();
    assert!(scene.body(id).unwrap().flags().out_of_bounds);

    sender.crossing_failure(id).unwrap();
    scene.step();
    let body = scene.body(id).unwrap();
    assert!(!body.flags().out_of_bounds);
    assert!(body.position().z <= 50_000.0);
    assert!(body.position().z > 49_999.0);
    assert!(scene.bodies().is_active(id));
}

#[test]
fn test_landing_settles_and_goes_quiet() {
    let mut scene = scene_with(SandboxEngine::new().with_ground(0.0));
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(128.0, 128.0, 2.0))).unwrap();

    run(&mut scene, 200);
    let body = scene.body(id).unwrap();
    assert_relative_eq!(body.position().z, 0.5, epsilon = 1e-6);
    assert!(body.is_settled());
    scene.take_events();

    run(&mut scene, 10);
    assert!(!scene
        .take_events()
        .iter()
        .any(|e| matches!(e, SceneEvent::TerseUpdate { body, .. } if *body == id)));
}

#[test]
fn test_move_to_target_arrives() {
    let mut scene = scene_with(SandboxEngine::new());
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(100.0, 128.0, 40.0))).unwrap();
    let target = DVec3::new(110.0, 128.0, 40.0);
    sender.set_pid_target(id, target).unwrap();
    sender.set_pid_tau(id, 1.0).unwrap();
    sender.set_pid_active(id, true).unwrap();

    run(&mut scene, 400);
    let position = scene.body(id).unwrap().position();
    assert!((position - target).abs().max_element() < 0.02, "{:?}", position);
}

#[test]
fn test_hover_holds_height_over_terrain() {
    let mut scene = scene_with(SandboxEngine::new());
    scene.set_terrain(Terrain::from_heightmap(2, 2, vec![10.0; 4], 0.0).unwrap());
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(128.0, 128.0, 11.0))).unwrap();
    sender
        .set_hover(
            id,
            HoverSettings {
                height: 2.0,
                tau: 0.5,
                kind: HoverKind::Ground,
                active: true,
            },
        )
        .unwrap();

    run(&mut scene, 300);
    assert_relative_eq!(scene.body(id).unwrap().position().z, 12.0, epsilon = 0.02);
}

#[test]
fn test_collision_reports_through_scene() {
    let mut scene = scene_with(SandboxEngine::new().with_ground(0.0));
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(128.0, 128.0, 0.4))).unwrap();
    let quiet = sender.add_prim(cube_at(DVec3::new(64.0, 64.0, 0.4))).unwrap();
    sender.subscribe_collisions(id, 20).unwrap();

    let summary = scene.step();
    assert!(summary.contacts >= 2);
    let events = scene.take_events();
    let reports: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SceneEvent::Collisions { body, contacts } => Some((*body, contacts.len())),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, id);
    assert!(reports[0].1 >= 1);
    assert!(scene.body(quiet).unwrap().collision_score() >= 1.0);
}

#[test]
fn test_disabled_body_is_not_stepped() {
    let mut scene = scene_with(SandboxEngine::new());
    let sender = scene.sender();
    let id = sender.add_prim(cube_at(DVec3::new(128.0, 128.0, 40.0))).unwrap();
    sender.set_disabled(id, true).unwrap();
    run(&mut scene, 10);
    assert_eq!(scene.body(id).unwrap().position().z, 40.0);

    sender.set_disabled(id, false).unwrap();
    run(&mut scene, 2);
    assert!(scene.body(id).unwrap().position().z < 40.0);
}

#[test]
fn test_water_level_change_is_visible_to_terrain() {
    let mut scene = scene_with(SandboxEngine::new());
    scene.set_water_level(35.0);
    assert_eq!(scene.terrain().water_level(), 35.0);
    assert_eq!(scene.config().water_level, 35.0);
}
