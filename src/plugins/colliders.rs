// Static trunk colliders for the physics collaborator.
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::plugins::radial_field::PlacedInstance;
use crate::plugins::trees::trunk_transform;

/// Marker for a trunk collider entity.
#[derive(Component, Debug, Clone, Copy)]
pub struct TrunkCollider;

const TRUNK_COLLIDER_HALF_HEIGHT: f32 = 1.5;
const TRUNK_COLLIDER_RADIUS: f32 = 0.3;

/// `(half_height, radius)` of the cylinder matching a trunk at its placed scale.
pub fn trunk_collider_extent(tree: &PlacedInstance) -> (f32, f32) {
    (
        TRUNK_COLLIDER_HALF_HEIGHT * tree.height_scale as f32,
        TRUNK_COLLIDER_RADIUS * tree.width_scale as f32,
    )
}

/// One fixed body per trunk. The scale is baked into the shape, not the transform.
pub fn spawn_trunk_colliders(commands: &mut Commands, trees: &[PlacedInstance]) -> Vec<Entity> {
    trees
        .iter()
        .map(|tree| {
            let t = trunk_transform(tree);
            let (half_height, radius) = trunk_collider_extent(tree);
            commands
                .spawn((
                    TransformBundle::from_transform(
                        Transform::from_translation(t.translation).with_rotation(t.rotation),
                    ),
                    RigidBody::Fixed,
                    Collider::cylinder(half_height, radius),
                    Friction {
                        coefficient: 0.8,
                        combine_rule: CoefficientCombineRule::Average,
                    },
                    TrunkCollider,
                ))
                .id()
        })
        .collect()
}
