use std::collections::BTreeSet;

use bevy::prelude::*;
use grove::plugins::grass::*;
use grove::plugins::placement::GRASS_SEED;
use grove::plugins::radial_field::{sample_field, FieldParams, PlacedInstance, RadialBias, GRASS_SCALE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn policy() -> SectorPolicy {
    SectorPolicy::default()
}

fn dir(degrees: f32) -> Vec2 {
    let r = degrees.to_radians();
    Vec2::new(r.cos(), r.sin())
}

fn placed(x: f64, z: f64, source_index: u64) -> PlacedInstance {
    PlacedInstance {
        x,
        z,
        rotation_y: 0.0,
        width_scale: 0.5,
        height_scale: 0.5,
        source_index,
    }
}

#[test]
fn near_sector_visible_when_facing_away() {
    let view = evaluate_sector(&policy(), Vec2::new(10.0, 0.0), Vec2::ZERO, dir(180.0));
    assert!(view.visible);
    assert_eq!(view.ratio, 1.0);
}

#[test]
fn sector_beyond_visibility_distance_hidden() {
    for deg in (0..360).step_by(30) {
        let view = evaluate_sector(&policy(), Vec2::new(60.0, 0.0), Vec2::ZERO, dir(deg as f32));
        assert!(!view.visible, "visible while facing {deg}°");
    }
}

#[test]
fn mid_ring_sector_behind_camera_hidden() {
    let view = evaluate_sector(&policy(), Vec2::new(30.0, 0.0), Vec2::ZERO, dir(120.0));
    assert!(!view.visible);
}

#[test]
fn mid_ring_sector_in_front_gets_half_density() {
    let view = evaluate_sector(&policy(), Vec2::new(30.0, 0.0), Vec2::ZERO, dir(0.0));
    assert!(view.visible);
    assert!((view.ratio - 0.5).abs() < 1e-6, "ratio {}", view.ratio);
}

#[test]
fn near_ring_ignores_facing() {
    let p = policy();
    for d in [0.0f32, 0.5, 5.0, 14.9] {
        for deg in (0..360).step_by(15) {
            let centroid = dir(deg as f32 * 0.7) * d;
            let view = evaluate_sector(&p, centroid, Vec2::ZERO, dir(deg as f32));
            assert!(view.visible, "hidden at distance {d} facing {deg}°");
            assert_eq!(view.ratio, 1.0);
        }
    }
}

#[test]
fn camera_on_centroid_is_visible() {
    let c = Vec2::new(3.0, -4.0);
    let view = evaluate_sector(&policy(), c, c, Vec2::ZERO);
    assert_eq!(view, SectorView { visible: true, ratio: 1.0 });
}

#[test]
fn vertical_forward_keeps_mid_ring() {
    let view = evaluate_sector(&policy(), Vec2::new(0.0, 30.0), Vec2::ZERO, Vec2::ZERO);
    assert!(view.visible);
}

#[test]
fn lod_ratio_is_monotone_and_clamped() {
    let p = policy();
    let mut prev = f32::INFINITY;
    for step in 0..=800 {
        let d = step as f32 * 0.1;
        let r = lod_ratio(&p, d);
        assert!(r <= prev, "ratio rose at {d}: {prev} -> {r}");
        if d <= p.lod_near {
            assert_eq!(r, 1.0);
        }
        if d >= p.lod_far {
            assert_eq!(r, p.lod_min_ratio);
        }
        prev = r;
    }
}

#[test]
fn lod_count_rounds_up() {
    assert_eq!(lod_count(100, 0.5), 50);
    assert_eq!(lod_count(7, 0.3), 3);
    assert_eq!(lod_count(10, 1.0), 10);
    assert_eq!(lod_count(0, 0.7), 0);
}

#[test]
fn lod_count_ignores_f32_representation_error() {
    // 0.3f32 is 0.30000001192...
    assert_eq!(lod_count(100, 0.3), 30);
    assert_eq!(lod_count(200, 0.3), 60);
    assert_eq!(lod_count(12_000, 0.3), 3_600);
    assert_eq!(lod_count(100, 0.301), 31);
}

#[test]
fn partition_is_complete_for_random_worlds() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..30 {
        let size: f64 = rng.gen_range(1.0..200.0);
        let sector_count = rng.gen_range(1..12);
        let params = FieldParams {
            count: rng.gen_range(0..3_000),
            inner_radius: size * 1.05,
            outer_radius: size * 1.95,
            exclusion: None,
            bias: RadialBias::Uniform,
        };
        let placed = sample_field(GRASS_SEED, &params, GRASS_SCALE).instances;
        let buckets = partition_sectors(&placed, sector_count);
        assert_eq!(buckets.len(), sector_count);

        let mut seen = BTreeSet::new();
        for (s, members) in buckets.iter().enumerate() {
            for m in members {
                assert_eq!(sector_index(m.angle(), sector_count), s);
                assert!(seen.insert(m.source_index), "duplicate {}", m.source_index);
            }
        }
        let expected: BTreeSet<u64> = placed.iter().map(|p| p.source_index).collect();
        assert_eq!(seen, expected);
    }
}

#[test]
fn sector_index_clamps_to_last() {
    assert_eq!(sector_index(0.0, 6), 0);
    assert_eq!(sector_index(std::f64::consts::TAU - 1e-12, 6), 5);
    assert_eq!(sector_index(std::f64::consts::TAU, 6), 5);
}

#[test]
fn empty_sectors_are_always_hidden() {
    let members: Vec<_> = (0..10).map(|i| placed(20.0, 1.0, i)).collect();
    let mut arena = build_sectors(&members, 6, GRASS_SEED);
    assert_eq!(arena.len(), 6);
    assert_eq!(arena.total_members(), 10);

    arena.update(&policy(), Vec2::ZERO, dir(0.0));
    assert!(arena.sectors[0].visible);
    for sector in &arena.sectors[1..] {
        assert!(!sector.visible);
        assert_eq!(sector.current_count, 0);
        assert_eq!(sector.full_count, 0);
    }
}

#[test]
fn sector_count_shrinks_to_prefix() {
    let members: Vec<_> = (0..50).map(|i| placed(30.0, 0.0, i)).collect();
    let mut arena = build_sectors(&members, 6, GRASS_SEED);
    let sector = &mut arena.sectors[0];
    assert_eq!(sector.full_count, 100);

    sector.update(&policy(), Vec2::ZERO, dir(0.0));
    assert!(sector.visible);
    assert_eq!(sector.current_count, 50);

    sector.update(&policy(), Vec2::ZERO, dir(180.0));
    assert!(!sector.visible);
    assert_eq!(sector.current_count, 0);

    sector.update(&policy(), Vec2::new(25.0, 0.0), dir(0.0));
    assert_eq!(sector.current_count, 100);
}

#[test]
fn far_sector_draws_min_ratio_prefix() {
    let members: Vec<_> = (0..50).map(|i| placed(46.0, 0.0, i)).collect();
    let mut arena = build_sectors(&members, 6, GRASS_SEED);
    let sector = &mut arena.sectors[0];
    assert_eq!(sector.full_count, 100);

    sector.update(&policy(), Vec2::ZERO, dir(0.0));
    assert!(sector.visible);
    assert_eq!(sector.current_count, 30);
}

#[test]
fn clumps_interleave_light_and_dark_blades() {
    let members = vec![placed(4.0, 2.0, 3), placed(-1.0, 6.0, 9)];
    let raw = clump_instances(&members, GRASS_SEED);
    assert_eq!(raw.len(), members.len() * BLADES_PER_CLUMP);
    for (k, m) in members.iter().enumerate() {
        let light = raw[2 * k].translation();
        let dark = raw[2 * k + 1].translation();
        assert!((light.x - m.x as f32).abs() < 1e-5 && (light.z - m.z as f32).abs() < 1e-5);
        assert!((dark.x - (m.x as f32 + 0.1)).abs() < 1e-5);
        assert!((light.y - 0.15 * 0.5).abs() < 1e-5);
        assert!((raw[2 * k].color_shift() + raw[2 * k + 1].color_shift() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn centroid_of_empty_is_origin() {
    assert_eq!(centroid(&[]), Vec2::ZERO);
    let c = centroid(&[placed(2.0, 0.0, 0), placed(0.0, 4.0, 1)]);
    assert!((c - Vec2::new(1.0, 2.0)).length() < 1e-6);
}

#[test]
fn default_policy_validates() {
    assert!(policy().validate().is_ok());
    let bad = SectorPolicy { lod_far: 10.0, ..policy() };
    assert!(bad.validate().is_err());
    assert!(policy().facing_cosine().abs() < 1e-6);
}
