//! Grass sector partitioning and per-frame sector LOD.
//!
//! Placed grass is bucketed once into fixed angular sectors. Each sector owns one
//! instance buffer; per frame only its `visible` flag and `current_count` change, so
//! the update is O(sector count) no matter how many blades exist.

use std::f32::consts::TAU as TAU32;
use std::f64::consts::TAU;
use std::sync::Arc;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use serde::Deserialize;

use crate::error::{Result, VegetationError};
use crate::plugins::instancing::InstanceRaw;
use crate::plugins::placement::{channel_random, Channel, PlacementSeed};
use crate::plugins::radial_field::PlacedInstance;

/// Blades emitted per placement (light + dark tone).
pub const BLADES_PER_CLUMP: usize = 2;

/// Distance policy for sector visibility & density.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SectorPolicy {
    /// Sectors at or beyond this centroid distance are hidden.
    pub visibility_distance: f32,
    /// Sectors closer than this are always visible, whatever the camera faces.
    pub near_exempt_distance: f32,
    pub lod_near: f32,
    pub lod_far: f32,
    pub lod_min_ratio: f32,
    /// Sectors whose centroid is more than this far off the camera forward axis are hidden.
    pub facing_cutoff_degrees: f32,
}

impl Default for SectorPolicy {
    fn default() -> Self {
        Self {
            visibility_distance: 50.0,
            near_exempt_distance: 15.0,
            lod_near: 15.0,
            lod_far: 45.0,
            lod_min_ratio: 0.3,
            facing_cutoff_degrees: 90.0,
        }
    }
}

impl SectorPolicy {
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f32| v.is_finite() && v >= 0.0;
        if !positive(self.visibility_distance) || self.visibility_distance == 0.0 {
            return Err(VegetationError::invalid(
                "lod.visibility_distance",
                self.visibility_distance,
                "must be finite and positive",
            ));
        }
        if !positive(self.near_exempt_distance) {
            return Err(VegetationError::invalid(
                "lod.near_exempt_distance",
                self.near_exempt_distance,
                "must be finite and non-negative",
            ));
        }
        if !positive(self.lod_near) || !positive(self.lod_far) || self.lod_far <= self.lod_near {
            return Err(VegetationError::invalid(
                "lod.lod_far",
                self.lod_far,
                "LOD band must satisfy 0 <= lod_near < lod_far",
            ));
        }
        if !(0.0..=1.0).contains(&self.lod_min_ratio) {
            return Err(VegetationError::invalid(
                "lod.lod_min_ratio",
                self.lod_min_ratio,
                "must be in [0, 1]",
            ));
        }
        if !(0.0..=180.0).contains(&self.facing_cutoff_degrees) {
            return Err(VegetationError::invalid(
                "lod.facing_cutoff_degrees",
                self.facing_cutoff_degrees,
                "must be in [0, 180]",
            ));
        }
        Ok(())
    }

    pub fn facing_cosine(&self) -> f32 {
        self.facing_cutoff_degrees.to_radians().cos()
    }
}

/// Density ratio for a visible sector at `distance`.
///
/// 1.0 at or inside `lod_near`, falling linearly with the normalized band position and
/// clamped to `lod_min_ratio`, which it reaches no later than `lod_far`.
pub fn lod_ratio(policy: &SectorPolicy, distance: f32) -> f32 {
    if distance <= policy.lod_near {
        return 1.0;
    }
    if distance >= policy.lod_far {
        return policy.lod_min_ratio;
    }
    let t = (distance - policy.lod_near) / (policy.lod_far - policy.lod_near);
    (1.0 - t).clamp(policy.lod_min_ratio, 1.0)
}

/// Result of evaluating one sector against the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectorView {
    pub visible: bool,
    pub ratio: f32,
}

impl SectorView {
    pub const HIDDEN: SectorView = SectorView { visible: false, ratio: 0.0 };
}

/// Three-zone policy: hard cutoff outside `visibility_distance`, always-on inside
/// `near_exempt_distance`, facing test in between. All vectors are planar (x, z).
pub fn evaluate_sector(
    policy: &SectorPolicy,
    centroid: Vec2,
    camera: Vec2,
    forward: Vec2,
) -> SectorView {
    let to_centroid = centroid - camera;
    let d2 = to_centroid.length_squared();
    if d2 >= policy.visibility_distance * policy.visibility_distance {
        return SectorView::HIDDEN;
    }

    let distance = d2.sqrt();
    if d2 >= policy.near_exempt_distance * policy.near_exempt_distance {
        let fwd_len = forward.length();
        // looking straight up/down leaves no planar heading; keep the sector
        if fwd_len > 1e-6 && distance > 0.0 {
            let cos = to_centroid.dot(forward) / (distance * fwd_len);
            if cos < policy.facing_cosine() {
                return SectorView::HIDDEN;
            }
        }
    }

    SectorView {
        visible: true,
        ratio: lod_ratio(policy, distance),
    }
}

/// Rendered prefix length for `full` instances at `ratio`: `ceil(full * ratio)`.
/// `ratio` is an f32, so 0.3 is stored slightly above 0.3; the slack absorbs that
/// representation error before the ceiling.
#[inline]
pub fn lod_count(full: u32, ratio: f32) -> u32 {
    let exact = full as f64 * ratio as f64;
    let slack = full.max(1) as f64 * 1e-6;
    ((exact - slack).ceil().max(0.0) as u32).min(full)
}

/// Sector index for a world angle in `[0, 2π)`.
pub fn sector_index(angle: f64, sector_count: usize) -> usize {
    let width = TAU / sector_count as f64;
    ((angle / width).floor().max(0.0) as usize).min(sector_count - 1)
}

/// One angular wedge of grass.
#[derive(Clone, Debug)]
pub struct GrassSector {
    pub members: Vec<PlacedInstance>,
    pub instances: Arc<[InstanceRaw]>,
    pub centroid: Vec2,
    pub full_count: u32,
    pub current_count: u32,
    pub visible: bool,
}

impl GrassSector {
    /// Recompute `visible` / `current_count` for this frame.
    pub fn update(&mut self, policy: &SectorPolicy, camera: Vec2, forward: Vec2) -> SectorView {
        let view = if self.full_count == 0 {
            SectorView::HIDDEN
        } else {
            evaluate_sector(policy, self.centroid, camera, forward)
        };
        self.visible = view.visible;
        self.current_count = if view.visible {
            lod_count(self.full_count, view.ratio)
        } else {
            0
        };
        view
    }
}

/// Fixed array of sectors, addressed by sector index.
#[derive(Clone, Debug, Default)]
pub struct SectorArena {
    pub sectors: Vec<GrassSector>,
}

impl SectorArena {
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn total_members(&self) -> usize {
        self.sectors.iter().map(|s| s.members.len()).sum()
    }

    pub fn update(&mut self, policy: &SectorPolicy, camera: Vec2, forward: Vec2) {
        for sector in &mut self.sectors {
            sector.update(policy, camera, forward);
        }
    }
}

/// Bucket placements by world angle. Member order inside a sector follows input order.
pub fn partition_sectors(instances: &[PlacedInstance], sector_count: usize) -> Vec<Vec<PlacedInstance>> {
    let mut buckets: Vec<Vec<PlacedInstance>> = (0..sector_count).map(|_| Vec::new()).collect();
    for inst in instances {
        buckets[sector_index(inst.angle(), sector_count)].push(*inst);
    }
    buckets
}

/// Mean (x, z) of the members, or the origin for an empty sector.
pub fn centroid(members: &[PlacedInstance]) -> Vec2 {
    if members.is_empty() {
        return Vec2::ZERO;
    }
    let (sx, sz) = members.iter().fold((0.0, 0.0), |(sx, sz), m| (sx + m.x, sz + m.z));
    let n = members.len() as f64;
    Vec2::new((sx / n) as f32, (sz / n) as f32)
}

pub fn light_blade_color() -> LinearRgba {
    Color::srgb_u8(0x3c, 0xb3, 0x71).to_linear()
}

pub fn dark_blade_color() -> LinearRgba {
    Color::srgb_u8(0x22, 0x8b, 0x22).to_linear()
}

/// Two interleaved blades per placement so prefix truncation keeps clumps whole.
pub fn clump_instances(members: &[PlacedInstance], seed: PlacementSeed) -> Vec<InstanceRaw> {
    let light = light_blade_color();
    let dark = dark_blade_color();
    let mut out = Vec::with_capacity(members.len() * BLADES_PER_CLUMP);
    for m in members {
        let s = m.width_scale as f32;
        let h = m.height_scale as f32;
        let x = m.x as f32;
        let z = m.z as f32;
        let yaw = m.rotation_y as f32;
        let shift = channel_random(seed, Channel::ColorShift, m.source_index) as f32;

        let light_t = Transform {
            translation: Vec3::new(x, 0.15 * h, z),
            rotation: Quat::from_rotation_y(yaw),
            scale: Vec3::new(s, h * 1.5, s),
        };
        let dark_t = Transform {
            translation: Vec3::new(x + 0.1, 0.12 * h, z + 0.1),
            rotation: Quat::from_rotation_y(yaw + 0.5),
            scale: Vec3::new(s * 0.8, h * 1.2, s * 0.8),
        };
        out.push(InstanceRaw::new(&light_t, light, shift, 1.0));
        out.push(InstanceRaw::new(&dark_t, dark, 1.0 - shift, 1.0));
    }
    out
}

/// Partition `instances` and build one instance buffer per sector.
pub fn build_sectors(instances: &[PlacedInstance], sector_count: usize, seed: PlacementSeed) -> SectorArena {
    let sectors = partition_sectors(instances, sector_count)
        .into_iter()
        .map(|members| {
            let raw = clump_instances(&members, seed);
            let full_count = raw.len() as u32;
            GrassSector {
                centroid: centroid(&members),
                instances: raw.into(),
                full_count,
                current_count: full_count,
                visible: full_count > 0,
                members,
            }
        })
        .collect();
    SectorArena { sectors }
}

/// Four-sided blade (pyramid) centred on the origin, radius 0.15, height 0.5.
/// UV.y carries the normalized height used for wind weighting & color gradient.
pub fn blade_mesh() -> Mesh {
    const SIDES: usize = 4;
    const RADIUS: f32 = 0.15;
    const HEIGHT: f32 = 0.5;
    let tip = Vec3::new(0.0, HEIGHT * 0.5, 0.0);
    let ring: Vec<Vec3> = (0..SIDES)
        .map(|i| {
            let a = i as f32 / SIDES as f32 * TAU32;
            Vec3::new(a.cos() * RADIUS, -HEIGHT * 0.5, a.sin() * RADIUS)
        })
        .collect();

    let mut positions: Vec<[f32; 3]> = Vec::with_capacity(SIDES * 3);
    let mut normals: Vec<[f32; 3]> = Vec::with_capacity(SIDES * 3);
    let mut uvs: Vec<[f32; 2]> = Vec::with_capacity(SIDES * 3);
    for i in 0..SIDES {
        let a = ring[i];
        let b = ring[(i + 1) % SIDES];
        // (a, tip, b) is counter-clockwise seen from outside
        let n = (tip - a).cross(b - a).normalize_or_zero();
        let u = i as f32 / SIDES as f32;
        for (p, v) in [(a, 0.0), (tip, 1.0), (b, 0.0)] {
            positions.push(p.to_array());
            normals.push(n.to_array());
            uvs.push([u, v]);
        }
    }
    let indices: Vec<u32> = (0..positions.len() as u32).collect();

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}
