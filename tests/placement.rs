use grove::plugins::placement::*;

#[test]
fn same_seed_and_index_repeat() {
    for i in 0..1_000u64 {
        let a = seeded_random(TREE_SEED, i);
        let b = seeded_random(TREE_SEED, i);
        assert_eq!(a.to_bits(), b.to_bits(), "draw {i} not reproducible");
    }
}

#[test]
fn values_stay_in_unit_interval() {
    for seed in [GRASS_SEED, TREE_SEED, foliage_seed(0), foliage_seed(3)] {
        for i in 0..20_000u64 {
            let v = seeded_random(seed, i);
            assert!((0.0..1.0).contains(&v), "{v} out of range at {i}");
        }
    }
}

// Pinned draws; a change here moves every tree and blade in the world.
const TREE_0: f64 = 0.283_635_443_189_268_7;
const TREE_7: f64 = 0.579_338_220_793_129_5;
const GRASS_41: f64 = 0.522_833_208_327_028_8;

#[test]
fn matches_golden_values() {
    // sin() may differ by an ulp across libm builds; x10000 scales that to ~1e-12
    for (got, want) in [
        (seeded_random(TREE_SEED, 0), TREE_0),
        (seeded_random(TREE_SEED, 7), TREE_7),
        (seeded_random(GRASS_SEED, 41), GRASS_41),
    ] {
        assert!((got - want).abs() < 1e-9, "{got} != {want}");
    }
}

#[test]
fn channels_read_distinct_indices() {
    let i = 10u64;
    let pairs = [
        (Channel::Angle, 20),
        (Channel::Radius, 21),
        (Channel::Scale, 30),
        (Channel::Rotation, 40),
        (Channel::Variant, 50),
        (Channel::ColorShift, 60),
        (Channel::Detail, 73),
    ];
    for (channel, index) in pairs {
        assert_eq!(channel_random(TREE_SEED, channel, i), seeded_random(TREE_SEED, index), "{channel:?}");
    }
}

#[test]
fn populations_are_uncorrelated() {
    let same = (0..200u64)
        .filter(|&i| (seeded_random(GRASS_SEED, i) - seeded_random(TREE_SEED, i)).abs() < 1e-9)
        .count();
    assert_eq!(same, 0, "grass and tree seeds produced identical draws");
}

#[test]
fn foliage_seeds_differ_per_variant() {
    let a = foliage_seed(0);
    let b = foliage_seed(1);
    assert_ne!(a, b);
    assert_ne!(seeded_random(a, 0), seeded_random(b, 0));
}
