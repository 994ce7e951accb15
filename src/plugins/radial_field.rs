// Radial field sampler: places N items in an annulus around the origin.
//
// Pipeline per candidate index (all draws are pure functions of the index):
//  - angle  -> uniform in [0, 2π)
//  - radius -> uniform or outward-biased in [inner, outer]
//  - exclusion wedge test (drop, never replace)
//  - per-instance extras (scale, rotation)

use std::f64::consts::TAU;

use serde::Deserialize;

use crate::error::{Result, VegetationError};
use crate::plugins::placement::{channel_random, Channel, PlacementSeed};

/// Radius fraction of the wedge cutoff for grass.
pub const GRASS_EXCLUSION_RADIUS_FRACTION: f64 = 0.85;
/// Radius fraction of the wedge cutoff for trees.
pub const TREE_EXCLUSION_RADIUS_FRACTION: f64 = 0.9;

/// Angular lane kept clear of vegetation beyond `radius_fraction * inner_radius`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ExclusionWedge {
    pub start: f64,
    pub end: f64,
    pub radius_fraction: f64,
}

impl ExclusionWedge {
    /// Half-open `[start, end)` test on the angle normalized into `[0, 2π)`.
    /// Wedges may wrap past 2π.
    pub fn contains_angle(&self, angle: f64) -> bool {
        let span = self.end - self.start;
        (angle - self.start).rem_euclid(TAU) < span
    }

    pub fn excludes(&self, angle: f64, radius: f64, inner_radius: f64) -> bool {
        self.contains_angle(angle) && radius > inner_radius * self.radius_fraction
    }
}

/// Radial density profile.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub enum RadialBias {
    Uniform,
    /// `inner + (1 - (1 - t)^e) * (outer - inner)`; `e = 3` is the cubic ease-out.
    Outward(f64),
}

impl Default for RadialBias {
    fn default() -> Self {
        RadialBias::Uniform
    }
}

impl RadialBias {
    pub const CUBIC: RadialBias = RadialBias::Outward(3.0);

    pub fn radius(&self, t: f64, inner: f64, outer: f64) -> f64 {
        let shaped = match *self {
            RadialBias::Uniform => t,
            RadialBias::Outward(e) => 1.0 - (1.0 - t).powf(e),
        };
        inner + shaped * (outer - inner)
    }
}

/// Inputs for one population.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct FieldParams {
    pub count: usize,
    pub inner_radius: f64,
    pub outer_radius: f64,
    #[serde(default)]
    pub exclusion: Option<ExclusionWedge>,
    #[serde(default)]
    pub bias: RadialBias,
}

impl FieldParams {
    pub fn validate(&self, prefix: &str) -> Result<()> {
        let field = |name: &str| format!("{prefix}.{name}");
        if !self.inner_radius.is_finite() || self.inner_radius < 0.0 {
            return Err(VegetationError::invalid(
                field("inner_radius"),
                self.inner_radius,
                "must be finite and non-negative",
            ));
        }
        if !self.outer_radius.is_finite() || self.outer_radius < self.inner_radius {
            return Err(VegetationError::invalid(
                field("outer_radius"),
                self.outer_radius,
                "must be finite and not smaller than inner_radius",
            ));
        }
        if let Some(w) = self.exclusion {
            let span = w.end - w.start;
            if !w.start.is_finite() || !w.end.is_finite() || span <= 0.0 || span > TAU {
                return Err(VegetationError::invalid(
                    field("exclusion"),
                    format!("[{}, {})", w.start, w.end),
                    "angle range must satisfy start < end <= start + 2π",
                ));
            }
            if !w.radius_fraction.is_finite() || w.radius_fraction < 0.0 {
                return Err(VegetationError::invalid(
                    field("exclusion"),
                    w.radius_fraction,
                    "radius_fraction must be finite and non-negative",
                ));
            }
        }
        if let RadialBias::Outward(e) = self.bias {
            if !e.is_finite() || e <= 0.0 {
                return Err(VegetationError::invalid(
                    field("bias"),
                    e,
                    "outward bias exponent must be positive",
                ));
            }
        }
        Ok(())
    }
}

/// One surviving placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedInstance {
    pub x: f64,
    pub z: f64,
    pub rotation_y: f64,
    pub width_scale: f64,
    pub height_scale: f64,
    /// Candidate index this instance was drawn from; keys any further per-instance draws.
    pub source_index: u64,
}

impl PlacedInstance {
    /// World angle in `[0, 2π)` using the `atan2(z, x)` convention.
    pub fn angle(&self) -> f64 {
        planar_angle(self.x, self.z)
    }

    pub fn radius(&self) -> f64 {
        self.x.hypot(self.z)
    }
}

/// `atan2(z, x)` normalized into `[0, 2π)`.
#[inline]
pub fn planar_angle(x: f64, z: f64) -> f64 {
    let a = z.atan2(x).rem_euclid(TAU);
    // rem_euclid can round a tiny negative angle up to exactly TAU
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// Per-instance scale range `[base, base + span)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleRange {
    pub base: f64,
    pub span: f64,
}

pub const GRASS_SCALE: ScaleRange = ScaleRange { base: 0.3, span: 0.5 };
pub const TREE_SCALE: ScaleRange = ScaleRange { base: 0.7, span: 0.6 };

/// Output of one sampling pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSample {
    pub instances: Vec<PlacedInstance>,
    pub dropped: usize,
}

/// Place `params.count` candidates and drop the ones inside the exclusion wedge.
/// Surviving instances keep candidate order. An empty result is valid.
pub fn sample_field(seed: PlacementSeed, params: &FieldParams, scale: ScaleRange) -> FieldSample {
    let mut instances = Vec::with_capacity(params.count);
    let mut dropped = 0usize;

    for i in 0..params.count as u64 {
        let angle = channel_random(seed, Channel::Angle, i) * TAU;
        let t = channel_random(seed, Channel::Radius, i);
        let radius = params.bias.radius(t, params.inner_radius, params.outer_radius);
        let x = angle.cos() * radius;
        let z = angle.sin() * radius;

        if let Some(wedge) = &params.exclusion {
            // Re-derive the angle from the Cartesian point so the test uses the same
            // convention as sector partitioning.
            if wedge.excludes(planar_angle(x, z), radius, params.inner_radius) {
                dropped += 1;
                continue;
            }
        }

        let s = scale.base + channel_random(seed, Channel::Scale, i) * scale.span;
        instances.push(PlacedInstance {
            x,
            z,
            rotation_y: channel_random(seed, Channel::Rotation, i) * TAU,
            width_scale: s,
            height_scale: s,
            source_index: i,
        });
    }

    FieldSample { instances, dropped }
}
