//! Tree population: variant assignment, foliage/trunk instance data and the shared
//! trunk primitive.

use std::f32::consts::TAU;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use crate::error::Result;
use crate::plugins::foliage::{synthesize_foliage, FoliageMesh, FoliageParams};
use crate::plugins::instancing::InstanceRaw;
use crate::plugins::placement::{channel_random, foliage_seed, Channel, PlacementSeed};
use crate::plugins::radial_field::PlacedInstance;

const FOLIAGE_WIND_WEIGHT: f32 = 0.35;
const TRUNK_TOP_RADIUS: f32 = 0.2;
const TRUNK_BOTTOM_RADIUS: f32 = 0.3;
const TRUNK_HEIGHT: f32 = 3.0;
const TRUNK_SIDES: usize = 8;

/// `floor(r * variant_count)`, clamped into range.
pub fn assign_variant(seed: PlacementSeed, index: u64, variant_count: usize) -> usize {
    let r = channel_random(seed, Channel::Variant, index);
    ((r * variant_count as f64) as usize).min(variant_count.saturating_sub(1))
}

/// Tree placements bucketed by foliage variant. The groups partition the input.
#[derive(Clone, Debug, Default)]
pub struct VariantGroups {
    groups: Vec<Vec<PlacedInstance>>,
}

impl VariantGroups {
    pub fn assign(trees: &[PlacedInstance], variant_count: usize, seed: PlacementSeed) -> Self {
        let mut groups: Vec<Vec<PlacedInstance>> = (0..variant_count).map(|_| Vec::new()).collect();
        for tree in trees {
            groups[assign_variant(seed, tree.source_index, variant_count)].push(*tree);
        }
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, variant: usize) -> &[PlacedInstance] {
        self.groups.get(variant).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[PlacedInstance]> {
        self.groups.iter().map(Vec::as_slice)
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// Canopy transform; the non-uniform scale turns the unit foliage mesh into a canopy.
pub fn foliage_transform(tree: &PlacedInstance) -> Transform {
    let w = tree.width_scale as f32;
    let h = tree.height_scale as f32;
    Transform {
        translation: Vec3::new(tree.x as f32, 3.5 * h, tree.z as f32),
        rotation: Quat::from_rotation_y(tree.rotation_y as f32),
        scale: Vec3::new(3.2 * w, 2.6 * h, 3.2 * w),
    }
}

pub fn trunk_transform(tree: &PlacedInstance) -> Transform {
    let w = tree.width_scale as f32;
    let h = tree.height_scale as f32;
    Transform {
        translation: Vec3::new(tree.x as f32, 1.5 * h, tree.z as f32),
        rotation: Quat::from_rotation_y(tree.rotation_y as f32),
        scale: Vec3::new(w, h, w),
    }
}

pub fn foliage_color() -> LinearRgba {
    Color::srgb_u8(0x22, 0x8b, 0x22).to_linear()
}

pub fn trunk_color() -> LinearRgba {
    Color::srgb_u8(0x5c, 0x40, 0x33).to_linear()
}

pub fn foliage_instances(members: &[PlacedInstance], seed: PlacementSeed) -> Vec<InstanceRaw> {
    let color = foliage_color();
    members
        .iter()
        .map(|tree| {
            let shift = channel_random(seed, Channel::ColorShift, tree.source_index) as f32;
            InstanceRaw::new(&foliage_transform(tree), color, shift, FOLIAGE_WIND_WEIGHT)
        })
        .collect()
}

/// Trunks don't sway and carry a neutral color shift.
pub fn trunk_instances(trees: &[PlacedInstance]) -> Vec<InstanceRaw> {
    let color = trunk_color();
    trees
        .iter()
        .map(|tree| InstanceRaw::new(&trunk_transform(tree), color, 0.5, 0.0))
        .collect()
}

/// One foliage mesh per variant, each from its own seed. Any failure aborts the build.
pub fn build_foliage_variants(variant_count: usize, params: &FoliageParams) -> Result<Vec<FoliageMesh>> {
    (0..variant_count)
        .map(|v| synthesize_foliage(v, foliage_seed(v), params))
        .collect()
}

/// Tapered open cylinder centred on the origin; UV.y is the normalized height.
pub fn trunk_mesh() -> Mesh {
    let half = TRUNK_HEIGHT * 0.5;
    let slope = (TRUNK_BOTTOM_RADIUS - TRUNK_TOP_RADIUS) / TRUNK_HEIGHT;

    let mut positions: Vec<[f32; 3]> = Vec::with_capacity((TRUNK_SIDES + 1) * 2);
    let mut normals: Vec<[f32; 3]> = Vec::with_capacity((TRUNK_SIDES + 1) * 2);
    let mut uvs: Vec<[f32; 2]> = Vec::with_capacity((TRUNK_SIDES + 1) * 2);
    for i in 0..=TRUNK_SIDES {
        let u = i as f32 / TRUNK_SIDES as f32;
        let (sin, cos) = (u * TAU).sin_cos();
        let n = Vec3::new(cos, slope, sin).normalize();
        for (radius, y, v) in [(TRUNK_BOTTOM_RADIUS, -half, 0.0), (TRUNK_TOP_RADIUS, half, 1.0)] {
            positions.push([cos * radius, y, sin * radius]);
            normals.push(n.to_array());
            uvs.push([u, v]);
        }
    }

    let mut indices: Vec<u32> = Vec::with_capacity(TRUNK_SIDES * 6);
    for i in 0..TRUNK_SIDES as u32 {
        let (b0, t0, b1, t1) = (i * 2, i * 2 + 1, i * 2 + 2, i * 2 + 3);
        indices.extend_from_slice(&[b0, t0, b1, b1, t0, t1]);
    }

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}
