//! Library entry for integration tests & external tooling.
//! Exposes plugin modules and a prelude for common types.

pub mod plugins {
    pub mod placement;
    pub mod radial_field;
    pub mod grass;
    pub mod metaball;
    pub mod foliage;
    pub mod trees;
    pub mod instancing;
    pub mod shading;
    pub mod colliders;
    pub mod config;
    pub mod camera;
    pub mod vegetation;
}
pub mod error;
pub mod prelude;
