//! Deterministic placement generator.
//!
//! A sinusoidal hash stands in for a random number generator: every draw is a pure
//! function of `(seed, index)`, so nothing stores RNG state and generation order is
//! decoupled from storage order.

/// Identifies one vegetation population. Different populations use different seeds
/// so their spatial patterns stay uncorrelated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementSeed {
    pub value: f64,
    /// Large odd multiplier applied to the index before hashing.
    pub multiplier: f64,
}

impl PlacementSeed {
    pub const fn new(value: f64, multiplier: f64) -> Self {
        Self { value, multiplier }
    }
}

pub const GRASS_SEED: PlacementSeed = PlacementSeed::new(54321.0, 7777.0);
pub const TREE_SEED: PlacementSeed = PlacementSeed::new(12345.0, 9999.0);

/// Seed for the foliage mesh of variant `variant`.
pub fn foliage_seed(variant: usize) -> PlacementSeed {
    PlacementSeed::new(777.0 + 131.0 * variant as f64, 4241.0)
}

/// `fract(sin(seed + index * k) * 10000)`, always in `[0, 1)`.
#[inline]
pub fn seeded_random(seed: PlacementSeed, index: u64) -> f64 {
    let x = (seed.value + index as f64 * seed.multiplier).sin() * 10000.0;
    let f = x - x.floor();
    // x - floor(x) rounds up to 1.0 for tiny negative x
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

/// Independent draw channels. Each maps an instance index onto a disjoint-ish slice of
/// the hash's index space via `index * stride + offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Angle,
    Radius,
    Scale,
    Rotation,
    Variant,
    ColorShift,
    Detail,
    BlobCount,
}

impl Channel {
    pub const fn stride_offset(self) -> (u64, u64) {
        match self {
            Channel::Angle => (2, 0),
            Channel::Radius => (2, 1),
            Channel::Scale => (3, 0),
            Channel::Rotation => (4, 0),
            Channel::Variant => (5, 0),
            Channel::ColorShift => (6, 0),
            Channel::Detail => (7, 3),
            Channel::BlobCount => (1, 0),
        }
    }
}

/// Draw channel `channel` for item `index`.
#[inline]
pub fn channel_random(seed: PlacementSeed, channel: Channel, index: u64) -> f64 {
    let (stride, offset) = channel.stride_offset();
    seeded_random(seed, index * stride + offset)
}
