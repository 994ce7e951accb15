// Foliage mesh synthesis: blobs -> iso-surface -> weld -> detail -> normals.
//
// Steps (each a plain function over `IndexedMesh`):
//  - place_blobs / extract_surface (metaball.rs)
//  - weld_vertices  -> shared topology, triangle count unchanged
//  - compute_normals (area weighted)
//  - apply_detail   -> seeded subset of vertices pushed along their normals
//  - unshare        -> optional faceted look
//
// NOTE: detail runs after welding; on an unwelded soup the per-vertex offsets would
// tear the seams open.

use std::collections::HashMap;

use bevy::math::DVec3;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use serde::Deserialize;

use crate::error::{Result, VegetationError};
use crate::plugins::metaball::{extract_surface, place_blobs, vertical_bounds, SurfaceParams, TriangleSoup};
use crate::plugins::placement::{channel_random, Channel, PlacementSeed};

/// Smooth (shared vertices) or faceted (one normal per triangle).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum ShadingMode {
    Smooth,
    #[default]
    Flat,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FoliageParams {
    pub resolution: usize,
    pub iso_level: f64,
    pub max_triangles: usize,
    pub weld_epsilon: f64,
    /// Fraction of welded vertices that receive fine detail.
    pub detail_fraction: f64,
    pub shading: ShadingMode,
}

impl Default for FoliageParams {
    fn default() -> Self {
        let surface = SurfaceParams::default();
        Self {
            resolution: surface.resolution,
            iso_level: surface.iso_level,
            max_triangles: surface.max_triangles,
            weld_epsilon: 1e-5,
            detail_fraction: 0.55,
            shading: ShadingMode::Flat,
        }
    }
}

impl FoliageParams {
    pub const MIN_RESOLUTION: usize = 4;
    pub const MAX_RESOLUTION: usize = 96;

    pub fn validate(&self) -> Result<()> {
        if !(Self::MIN_RESOLUTION..=Self::MAX_RESOLUTION).contains(&self.resolution) {
            return Err(VegetationError::invalid(
                "foliage.resolution",
                self.resolution,
                "must be in 4..=96",
            ));
        }
        if !self.iso_level.is_finite() || self.iso_level <= 0.0 {
            return Err(VegetationError::invalid("foliage.iso_level", self.iso_level, "must be positive"));
        }
        if self.max_triangles == 0 {
            return Err(VegetationError::invalid("foliage.max_triangles", self.max_triangles, "must be non-zero"));
        }
        if !self.weld_epsilon.is_finite() || self.weld_epsilon <= 0.0 {
            return Err(VegetationError::invalid("foliage.weld_epsilon", self.weld_epsilon, "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.detail_fraction) {
            return Err(VegetationError::invalid(
                "foliage.detail_fraction",
                self.detail_fraction,
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }

    pub fn surface(&self) -> SurfaceParams {
        SurfaceParams {
            resolution: self.resolution,
            iso_level: self.iso_level,
            max_triangles: self.max_triangles,
        }
    }
}

/// Indexed triangle mesh in f64, used between synthesis passes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexedMesh {
    pub positions: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle(&self, t: usize) -> [usize; 3] {
        [
            self.indices[t * 3] as usize,
            self.indices[t * 3 + 1] as usize,
            self.indices[t * 3 + 2] as usize,
        ]
    }
}

type Cell = (i64, i64, i64);

fn cell_of(p: DVec3, eps: f64) -> Cell {
    ((p.x / eps).floor() as i64, (p.y / eps).floor() as i64, (p.z / eps).floor() as i64)
}

/// Merge vertices closer than `eps`. Every soup vertex joins the first kept vertex
/// within `eps` (27-cell neighbourhood search), so kept vertices end up pairwise
/// further apart than `eps`. Triangles are kept one-for-one, degenerate or not.
pub fn weld_vertices(soup: &TriangleSoup, eps: f64) -> IndexedMesh {
    let mut grid: HashMap<Cell, Vec<u32>> = HashMap::new();
    let mut positions: Vec<DVec3> = Vec::new();
    let mut indices: Vec<u32> = Vec::with_capacity(soup.positions.len());
    let eps2 = eps * eps;

    for &p in &soup.positions {
        let (cx, cy, cz) = cell_of(p, eps);
        let mut found = None;
        'search: for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if let Some(list) = grid.get(&(cx + dx, cy + dy, cz + dz)) {
                        if let Some(&id) = list.iter().find(|&&id| positions[id as usize].distance_squared(p) <= eps2) {
                            found = Some(id);
                            break 'search;
                        }
                    }
                }
            }
        }
        let id = match found {
            Some(id) => id,
            None => {
                let id = positions.len() as u32;
                positions.push(p);
                grid.entry((cx, cy, cz)).or_default().push(id);
                id
            }
        };
        indices.push(id);
    }

    let normals = vec![DVec3::Y; positions.len()];
    IndexedMesh { positions, normals, indices }
}

/// Area-weighted vertex normals (sum of unnormalized face cross products).
pub fn compute_normals(mesh: &mut IndexedMesh) {
    let mut acc = vec![DVec3::ZERO; mesh.positions.len()];
    for t in 0..mesh.triangle_count() {
        let [a, b, c] = mesh.triangle(t);
        let n = (mesh.positions[b] - mesh.positions[a]).cross(mesh.positions[c] - mesh.positions[a]);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    mesh.normals = acc.into_iter().map(|n| n.try_normalize().unwrap_or(DVec3::Y)).collect();
}

const DETAIL_LAYERS: [(f64, f64); 2] = [(11.0, 0.018), (29.0, 0.008)];

/// Two sine-product layers; the displacement along the normal for point `p`.
pub fn detail_offset(p: DVec3) -> f64 {
    DETAIL_LAYERS
        .iter()
        .map(|&(freq, amp)| amp * (p.x * freq).sin() * (p.y * freq).sin() * (p.z * freq).sin())
        .sum()
}

/// Whether vertex `index` of this variant receives fine detail.
pub fn detail_selected(seed: PlacementSeed, index: usize, fraction: f64) -> bool {
    channel_random(seed, Channel::Detail, index as u64) < fraction
}

/// Displace the selected subset along its normals. Returns how many moved.
pub fn apply_detail(mesh: &mut IndexedMesh, seed: PlacementSeed, fraction: f64) -> usize {
    let mut moved = 0;
    for i in 0..mesh.positions.len() {
        if !detail_selected(seed, i, fraction) {
            continue;
        }
        let p = mesh.positions[i];
        mesh.positions[i] = p + mesh.normals[i] * detail_offset(p);
        moved += 1;
    }
    moved
}

/// Give every triangle its own three vertices, each carrying the face normal.
pub fn unshare(mesh: &IndexedMesh) -> IndexedMesh {
    let tris = mesh.triangle_count();
    let mut positions = Vec::with_capacity(tris * 3);
    let mut normals = Vec::with_capacity(tris * 3);
    for t in 0..tris {
        let [a, b, c] = mesh.triangle(t);
        let (pa, pb, pc) = (mesh.positions[a], mesh.positions[b], mesh.positions[c]);
        let n = (pb - pa).cross(pc - pa).try_normalize().unwrap_or(DVec3::Y);
        positions.extend_from_slice(&[pa, pb, pc]);
        normals.extend_from_slice(&[n, n, n]);
    }
    IndexedMesh {
        positions,
        normals,
        indices: (0..(tris * 3) as u32).collect(),
    }
}

/// Immutable foliage mesh, centred in `[-0.5, 0.5]` local space.
#[derive(Clone, Debug)]
pub struct FoliageMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Normalized vertical position in `[0, 1]`, drives the color gradient.
    pub heights: Vec<f32>,
    pub indices: Vec<u32>,
    pub blob_count: usize,
}

impl FoliageMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn to_mesh(&self) -> Mesh {
        let uvs: Vec<[f32; 2]> = self.heights.iter().map(|&h| [0.5, h]).collect();
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh
    }
}

/// Build the mesh for one variant. Each call gets its own field and extraction state.
pub fn synthesize_foliage(variant: usize, seed: PlacementSeed, params: &FoliageParams) -> Result<FoliageMesh> {
    let blobs = place_blobs(seed);
    let soup = extract_surface(&blobs, &params.surface())
        .map_err(|e| VegetationError::SurfaceCapacity { variant, limit: e.limit })?;

    let mut mesh = weld_vertices(&soup, params.weld_epsilon);
    compute_normals(&mut mesh);
    apply_detail(&mut mesh, seed, params.detail_fraction);
    if params.shading == ShadingMode::Flat {
        mesh = unshare(&mesh);
    } else {
        compute_normals(&mut mesh);
    }

    let (lo, hi) = vertical_bounds(&mesh.positions);
    let height_span = if hi > lo { hi - lo } else { 1.0 };
    let center = DVec3::splat(0.5);

    Ok(FoliageMesh {
        positions: mesh.positions.iter().map(|p| (*p - center).as_vec3().to_array()).collect(),
        normals: mesh.normals.iter().map(|n| n.as_vec3().to_array()).collect(),
        heights: mesh.positions.iter().map(|p| ((p.y - lo) / height_span) as f32).collect(),
        indices: mesh.indices,
        blob_count: blobs.len(),
    })
}
