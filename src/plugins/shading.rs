use std::f32::consts::TAU;

use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::render_resource::ShaderType;
use serde::Deserialize;

use crate::error::{Result, VegetationError};

pub const SHADER_PATH: &str = "shaders/vegetation.wgsl";

/// Tunables of the posterized vegetation shader.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// Number of discrete lighting bands.
    pub band_count: u32,
    pub wind_strength: f32,
    pub wind_frequency: f32,
    pub light_direction: [f32; 3],
    /// Max hue rotation (radians) applied from the per-instance color shift.
    pub hue_shift: f32,
    /// sRGB.
    pub fog_color: [f32; 3],
    pub fog_near: f32,
    pub fog_far: f32,
    pub ambient: f32,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            band_count: 4,
            wind_strength: 0.08,
            wind_frequency: 1.6,
            light_direction: [0.4, 1.0, 0.3],
            hue_shift: 0.35,
            fog_color: [0.62, 0.72, 0.80],
            fog_near: 30.0,
            fog_far: 90.0,
            ambient: 0.35,
        }
    }
}

impl ShadingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.band_count < 2 || self.band_count > 16 {
            return Err(VegetationError::invalid("shading.band_count", self.band_count, "must be in 2..=16"));
        }
        if !self.wind_frequency.is_finite() || self.wind_frequency <= 0.0 {
            return Err(VegetationError::invalid(
                "shading.wind_frequency",
                self.wind_frequency,
                "must be positive",
            ));
        }
        if !(self.fog_far > self.fog_near && self.fog_near >= 0.0) {
            return Err(VegetationError::invalid(
                "shading.fog_far",
                self.fog_far,
                "fog range must satisfy 0 <= fog_near < fog_far",
            ));
        }
        if Vec3::from_array(self.light_direction).length_squared() < 1e-8 {
            return Err(VegetationError::invalid(
                "shading.light_direction",
                format!("{:?}", self.light_direction),
                "must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Main-world shading state, mirrored into the render world every frame.
#[derive(Resource, ExtractResource, Clone, Debug, Default)]
pub struct ShadingSettings {
    pub config: ShadingConfig,
    /// Wind phase clock in seconds, wrapped to a whole number of wind periods.
    pub time: f32,
}

impl ShadingSettings {
    /// Advance the wind clock. Wrapping keeps f32 precision without a phase jump.
    pub fn advance(&mut self, delta: f32) {
        let wrap = TAU / self.config.wind_frequency * 256.0;
        self.time = (self.time + delta.max(0.0)).rem_euclid(wrap);
    }

    pub fn uniform(&self) -> ShadingUniform {
        let c = &self.config;
        let fog = Color::srgb(c.fog_color[0], c.fog_color[1], c.fog_color[2]).to_linear();
        ShadingUniform {
            time: self.time,
            wind_strength: c.wind_strength,
            wind_frequency: c.wind_frequency,
            band_count: c.band_count,
            light_direction: Vec3::from_array(c.light_direction).normalize_or_zero(),
            hue_shift: c.hue_shift,
            fog_color: Vec4::new(fog.red, fog.green, fog.blue, 1.0),
            fog_near: c.fog_near,
            fog_far: c.fog_far,
            ambient: c.ambient,
        }
    }
}

/// Matches `ShadingUniform` in vegetation.wgsl.
#[derive(Clone, Copy, Debug, Default, ShaderType)]
pub struct ShadingUniform {
    pub time: f32,
    pub wind_strength: f32,
    pub wind_frequency: f32,
    pub band_count: u32,
    pub light_direction: Vec3,
    pub hue_shift: f32,
    pub fog_color: Vec4,
    pub fog_near: f32,
    pub fog_far: f32,
    pub ambient: f32,
}
