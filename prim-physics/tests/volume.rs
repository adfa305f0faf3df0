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
//! Volume and mass estimation over the whole shape space

use approx::assert_relative_eq;
use glam::DVec3;
use prim_physics::config::DEFAULT_DENSITY;
use prim_physics::shape::{HollowShape, PathCurve, ProfileShape, ShapeDescriptor, MIN_SIZE};
use prim_physics::{PhysicsScene, PrimDescriptor, SandboxEngine, SceneConfig, VolumeMassCalculator};

const PROFILES: [ProfileShape; 6] = [
    ProfileShape::Circle,
    ProfileShape::Square,
    ProfileShape::IsometricTriangle,
    ProfileShape::EquilateralTriangle,
    ProfileShape::RightTriangle,
    ProfileShape::HalfCircle,
];

const PATHS: [PathCurve; 4] = [
    PathCurve::Straight,
    PathCurve::Curve1,
    PathCurve::Curve2,
    PathCurve::Flexible,
];

const HOLLOWS: [HollowShape; 4] = [
    HollowShape::Same,
    HollowShape::Circle,
    HollowShape::Square,
    HollowShape::Triangle,
];

fn shape(
    profile: ProfileShape,
    path: PathCurve,
    hollow: HollowShape,
    amount: u16,
) -> ShapeDescriptor {
    let mut shape = ShapeDescriptor::cube().with_hollow(hollow, amount);
    shape.profile_shape = profile;
    shape.path_curve = path;
    if path != PathCurve::Straight && path != PathCurve::Flexible {
        shape.path_scale_y = 175;
    }
    shape
}

#[test]
fn test_volume_positive_and_non_increasing_in_hollow() {
    let size = DVec3::new(1.5, 0.7, 2.0);
    for profile in PROFILES {
        for path in PATHS {
            for hollow in HOLLOWS {
                let mut previous = f64::INFINITY;
                for step in 0..=19u16 {
                    let amount = step * 2500;
                    let descriptor = shape(profile, path, hollow, amount);
                    let volume = VolumeMassCalculator::compute_volume(&descriptor, size);
                    assert!(
                        volume > 0.0,
                        "{:?}/{:?}/{:?} at {} gave {}",
                        profile,
                        path,
                        hollow,
                        amount,
                        volume
                    );
                    assert!(
                        volume <= previous + 1e-12,
                        "{:?}/{:?}/{:?} grew at {}: {} > {}",
                        profile,
                        path,
                        hollow,
                        amount,
                        volume,
                        previous
                    );
                    previous = volume;
                }
            }
        }
    }
}

#[test]
fn test_unit_box_volume_and_mass() {
    let volume = VolumeMassCalculator::compute_volume(&ShapeDescriptor::cube(), DVec3::ONE);
    assert_relative_eq!(volume, 1.0, epsilon = 1e-12);
    let mass = VolumeMassCalculator::mass_from_volume(10.0, volume, 0.0001, 10_000.01);
    assert_relative_eq!(mass, 10.0, epsilon = 1e-12);
}

#[test]
fn test_mass_hits_ceiling() {
    let volume = VolumeMassCalculator::compute_volume(&ShapeDescriptor::cube(), DVec3::splat(64.0));
    let mass = VolumeMassCalculator::mass_from_volume(DEFAULT_DENSITY, volume, 0.0001, 10_000.01);
    assert_eq!(mass, 10_000.01);
}

#[test]
fn test_circle_hollow_in_square_constant() {
    let shape = ShapeDescriptor::cube().with_hollow(HollowShape::Circle, 25_000);
    let volume = VolumeMassCalculator::compute_volume(&shape, DVec3::ONE);
    assert_relative_eq!(volume, 1.0 - 0.25 * 0.78539816339, epsilon = 1e-9);
}

#[test]
fn test_path_scale_tapers_box() {
    let shape = ShapeDescriptor::cube().with_path_scale(50, 100);
    let volume = VolumeMassCalculator::compute_volume(&shape, DVec3::ONE);
    // half the top edge: 0.5 * 1 + 0.5 * (0.5 * 0 + 0.5 * 1)
    assert_relative_eq!(volume, 0.75, epsilon = 1e-9);
}

#[test]
fn test_cuts_scale_volume() {
    let shape = ShapeDescriptor::cube()
        .with_path_cut(0, 25_000)
        .with_profile_cut(12_500, 0);
    let volume = VolumeMassCalculator::compute_volume(&shape, DVec3::ONE);
    assert_relative_eq!(volume, 0.5 * 0.75, epsilon = 1e-9);
}

#[test]
fn test_batch_matches_single() {
    let shapes: Vec<ShapeDescriptor> = PROFILES
        .iter()
        .flat_map(|p| PATHS.iter().map(move |c| shape(*p, *c, HollowShape::Same, 10_000)))
        .collect();
    let items: Vec<(&ShapeDescriptor, DVec3)> =
        shapes.iter().map(|s| (s, DVec3::new(2.0, 1.0, 0.5))).collect();
    let batch = VolumeMassCalculator::compute_volumes(&items);
    for ((shape, size), volume) in items.iter().zip(batch) {
        assert_eq!(volume, VolumeMassCalculator::compute_volume(shape, *size));
    }
}

#[test]
fn test_scene_body_gets_estimated_mass() {
    let mut scene = PhysicsScene::new(SandboxEngine::new(), SceneConfig::default()).unwrap();
    let sender = scene.sender();
    let id = sender
        .add_prim(
            PrimDescriptor::new(DVec3::new(128.0, 128.0, 30.0), DVec3::ONE).with_density(10.0),
        )
        .unwrap();
    scene.step();

    let body = scene.body(id).unwrap();
    assert_relative_eq!(body.volume(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(body.prim_mass(), 10.0, epsilon = 1e-12);
}

#[test]
fn test_thin_prim_mass_matches_built_size() {
    let mut scene = PhysicsScene::new(SandboxEngine::new(), SceneConfig::default()).unwrap();
    let sender = scene.sender();
    let id = sender
        .add_prim(PrimDescriptor::new(
            DVec3::new(128.0, 128.0, 30.0),
            DVec3::new(0.005, 10.0, 10.0),
        ))
        .unwrap();
    scene.step();

    let body = scene.body(id).unwrap();
    assert_eq!(body.size(), DVec3::new(MIN_SIZE, 10.0, 10.0));
    let expected = VolumeMassCalculator::compute_volume(body.shape(), body.size());
    assert_relative_eq!(body.volume(), expected, epsilon = 1e-12);
    assert_relative_eq!(body.volume(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(body.prim_mass(), DEFAULT_DENSITY, epsilon = 1e-9);
}

#[test]
fn test_sphere_prim_gets_ball_inertia() {
    let mut scene = PhysicsScene::new(SandboxEngine::new(), SceneConfig::default()).unwrap();
    let sender = scene.sender();
    let id = sender
        .add_prim(
            PrimDescriptor::new(DVec3::new(128.0, 128.0, 30.0), DVec3::splat(2.0))
                .with_shape(ShapeDescriptor::sphere())
                .with_density(1.0),
        )
        .unwrap();
    scene.step();

    let body = scene.body(id).unwrap();
    let props = body.own_mass_properties();
    let radius = 1.0;
    assert_relative_eq!(
        props.inertia.x_axis.x,
        0.4 * body.prim_mass() * radius * radius,
        epsilon = 1e-9
    );
}
