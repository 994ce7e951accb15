//! Metaball field and iso-surface extraction.
//!
//! `extract_surface` is a pure function: it samples the blob field over a regular
//! grid spanning the unit cube and polygonises it with marching tetrahedra (six Kuhn
//! tetrahedra per cell). The output is an unindexed triangle soup.

use std::f64::consts::TAU;

use bevy::math::DVec3;

use crate::plugins::placement::{channel_random, seeded_random, Channel, PlacementSeed};

pub const MIN_BLOBS: usize = 7;
pub const MAX_BLOBS: usize = 13;

const CLUSTER_RADIUS: f64 = 0.2;
const VERTICAL_SQUASH: f64 = 0.6;
const JITTER: f64 = 0.03;
// centre radius + jitter + max strength stays below 0.5, so the surface never
// touches the grid boundary and always closes
const STRENGTH_MIN: f64 = 0.14;
const STRENGTH_SPAN: f64 = 0.10;
/// Draws for blob `k` live at `BLOB_INDEX_BASE + k * BLOB_DRAWS + component`.
const BLOB_INDEX_BASE: u64 = 1000;
const BLOB_DRAWS: u64 = 8;

/// One field contributor. `strength` is its influence radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub center: DVec3,
    pub strength: f64,
}

impl Blob {
    /// `(1 - d²/R²)³` inside the influence radius, zero outside.
    #[inline]
    pub fn influence(&self, p: DVec3) -> f64 {
        let r2 = self.strength * self.strength;
        let d2 = p.distance_squared(self.center);
        if d2 >= r2 {
            return 0.0;
        }
        let k = 1.0 - d2 / r2;
        k * k * k
    }
}

pub fn field_value(blobs: &[Blob], p: DVec3) -> f64 {
    blobs.iter().map(|b| b.influence(p)).sum()
}

/// Seeded oblate cluster of blobs near the unit-cube center.
pub fn place_blobs(seed: PlacementSeed) -> Vec<Blob> {
    let span = (MAX_BLOBS - MIN_BLOBS + 1) as f64;
    let count = MIN_BLOBS + ((channel_random(seed, Channel::BlobCount, 0) * span) as usize).min(MAX_BLOBS - MIN_BLOBS);
    let draw = |k: usize, c: u64| seeded_random(seed, BLOB_INDEX_BASE + k as u64 * BLOB_DRAWS + c);

    (0..count)
        .map(|k| {
            // cube-root radius keeps the distribution uniform through the volume
            let r = CLUSTER_RADIUS * draw(k, 0).cbrt();
            let theta = draw(k, 1) * TAU;
            let phi = (1.0 - 2.0 * draw(k, 2)).clamp(-1.0, 1.0).acos();
            let dir = DVec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            let mut p = dir * r;
            p.y *= VERTICAL_SQUASH;
            p += DVec3::new(draw(k, 3) - 0.5, draw(k, 4) - 0.5, draw(k, 5) - 0.5) * (2.0 * JITTER);
            Blob {
                center: p + DVec3::splat(0.5),
                strength: STRENGTH_MIN + draw(k, 6) * STRENGTH_SPAN,
            }
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceParams {
    /// Cells per axis.
    pub resolution: usize,
    pub iso_level: f64,
    /// Hard triangle cap; exceeding it is an error, never a truncated mesh.
    pub max_triangles: usize,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            resolution: 32,
            iso_level: 0.35,
            max_triangles: 60_000,
        }
    }
}

/// Unindexed triangles: `positions.len()` is always a multiple of three.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleSoup {
    pub positions: Vec<DVec3>,
}

impl TriangleSoup {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub limit: usize,
}

// Cube corner c sits at offset (c & 1, (c >> 1) & 1, (c >> 2) & 1).
// All six tetrahedra share the 0-7 diagonal, which makes neighbouring cells conform.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 3, 2, 7],
    [0, 2, 6, 7],
    [0, 6, 4, 7],
    [0, 4, 5, 7],
    [0, 5, 1, 7],
];

/// Polygonise `blobs` at `params.iso_level`. Values above the level are inside.
pub fn extract_surface(blobs: &[Blob], params: &SurfaceParams) -> Result<TriangleSoup, CapacityExceeded> {
    let n = params.resolution.max(1);
    let stride = n + 1;
    let step = 1.0 / n as f64;
    let point = |i: usize, j: usize, k: usize| DVec3::new(i as f64, j as f64, k as f64) * step;
    let lin = |i: usize, j: usize, k: usize| i + j * stride + k * stride * stride;

    let mut values = vec![0.0f64; stride * stride * stride];
    for k in 0..stride {
        for j in 0..stride {
            for i in 0..stride {
                values[lin(i, j, k)] = field_value(blobs, point(i, j, k));
            }
        }
    }

    let mut soup = TriangleSoup::default();
    let iso = params.iso_level;

    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let corner_id = |c: usize| lin(i + (c & 1), j + ((c >> 1) & 1), k + ((c >> 2) & 1));
                let ids: [usize; 8] = std::array::from_fn(corner_id);
                let inside: [bool; 8] = std::array::from_fn(|c| values[ids[c]] > iso);
                if inside.iter().all(|&b| b) || inside.iter().all(|&b| !b) {
                    continue;
                }
                for tet in &TETRAHEDRA {
                    let g = tet.map(|c| ids[c]);
                    polygonise_tet(&g, &values, iso, stride, step, &mut soup);
                }
                if soup.triangle_count() > params.max_triangles {
                    return Err(CapacityExceeded { limit: params.max_triangles });
                }
            }
        }
    }

    Ok(soup)
}

fn grid_point(id: usize, stride: usize, step: f64) -> DVec3 {
    let i = id % stride;
    let j = (id / stride) % stride;
    let k = id / (stride * stride);
    DVec3::new(i as f64, j as f64, k as f64) * step
}

/// Crossing on edge (a, b). Endpoints are ordered by grid id first so both cells that
/// share an edge compute bit-identical vertices.
fn edge_vertex(a: usize, b: usize, values: &[f64], iso: f64, stride: usize, step: f64) -> DVec3 {
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    let (va, vb) = (values[a], values[b]);
    let t = if (vb - va).abs() < 1e-12 { 0.5 } else { ((iso - va) / (vb - va)).clamp(0.0, 1.0) };
    let pa = grid_point(a, stride, step);
    let pb = grid_point(b, stride, step);
    pa + (pb - pa) * t
}

fn polygonise_tet(g: &[usize; 4], values: &[f64], iso: f64, stride: usize, step: f64, soup: &mut TriangleSoup) {
    let (mut ins, mut outs) = ([0usize; 4], [0usize; 4]);
    let (mut ni, mut no) = (0, 0);
    for &id in g {
        if values[id] > iso {
            ins[ni] = id;
            ni += 1;
        } else {
            outs[no] = id;
            no += 1;
        }
    }
    let ev = |a: usize, b: usize| edge_vertex(a, b, values, iso, stride, step);
    let mean = |ids: &[usize]| {
        ids.iter().map(|&id| grid_point(id, stride, step)).sum::<DVec3>() / ids.len() as f64
    };

    match ni {
        1 => {
            let a = ins[0];
            let outward = mean(&outs[..3]) - grid_point(a, stride, step);
            emit(soup, [ev(a, outs[0]), ev(a, outs[1]), ev(a, outs[2])], outward);
        }
        3 => {
            let d = outs[0];
            let outward = grid_point(d, stride, step) - mean(&ins[..3]);
            emit(soup, [ev(d, ins[0]), ev(d, ins[1]), ev(d, ins[2])], outward);
        }
        2 => {
            let (a, b) = (ins[0], ins[1]);
            let (c, d) = (outs[0], outs[1]);
            let outward = mean(&outs[..2]) - mean(&ins[..2]);
            // ac, ad, bd, bc walk the quad's boundary in order
            let q = [ev(a, c), ev(a, d), ev(b, d), ev(b, c)];
            emit(soup, [q[0], q[1], q[2]], outward);
            emit(soup, [q[0], q[2], q[3]], outward);
        }
        _ => {}
    }
}

/// Push a triangle wound so its face normal agrees with `outward`.
fn emit(soup: &mut TriangleSoup, tri: [DVec3; 3], outward: DVec3) {
    let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
    if n.dot(outward) < 0.0 {
        soup.positions.extend_from_slice(&[tri[0], tri[2], tri[1]]);
    } else {
        soup.positions.extend_from_slice(&tri);
    }
}

/// Vertical extent of a point cloud, `(min_y, max_y)`.
pub fn vertical_bounds(points: &[DVec3]) -> (f64, f64) {
    points
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)))
}
