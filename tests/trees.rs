use grove::plugins::colliders::trunk_collider_extent;
use grove::plugins::placement::TREE_SEED;
use grove::plugins::radial_field::{sample_field, FieldParams, RadialBias, TREE_SCALE};
use grove::plugins::trees::*;

fn trees(count: usize) -> Vec<grove::plugins::radial_field::PlacedInstance> {
    let params = FieldParams {
        count,
        inner_radius: 22.0,
        outer_radius: 38.0,
        exclusion: None,
        bias: RadialBias::CUBIC,
    };
    sample_field(TREE_SEED, &params, TREE_SCALE).instances
}

#[test]
fn variant_groups_partition_trees() {
    let placed = trees(500);
    let groups = VariantGroups::assign(&placed, 4, TREE_SEED);
    assert_eq!(groups.len(), 4);
    assert_eq!(groups.total(), placed.len());
    for (v, group) in groups.iter().enumerate() {
        for t in group {
            assert_eq!(assign_variant(TREE_SEED, t.source_index, 4), v);
        }
    }
    assert!(groups.iter().all(|g| !g.is_empty()), "500 trees should reach every variant");
}

#[test]
fn group_count_independent_of_population() {
    for count in [0, 1, 7, 300] {
        let groups = VariantGroups::assign(&trees(count), 3, TREE_SEED);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.total(), count);
    }
    assert!(VariantGroups::assign(&[], 3, TREE_SEED).group(9).is_empty());
}

#[test]
fn transforms_follow_scale() {
    let t = trees(1)[0];
    let s = t.width_scale as f32;
    let foliage = foliage_transform(&t);
    assert!((foliage.translation.y - 3.5 * s).abs() < 1e-5);
    assert!((foliage.scale.x - 3.2 * s).abs() < 1e-5);
    assert!((foliage.scale.y - 2.6 * s).abs() < 1e-5);
    let trunk = trunk_transform(&t);
    assert!((trunk.translation.y - 1.5 * s).abs() < 1e-5);
    assert_eq!(trunk.rotation, foliage.rotation);

    let (half, radius) = trunk_collider_extent(&t);
    assert!((half - 1.5 * s).abs() < 1e-5 && (radius - 0.3 * s).abs() < 1e-5);
}

#[test]
fn height_scale_drives_vertical_extent() {
    let mut t = trees(1)[0];
    t.width_scale = 0.5;
    t.height_scale = 1.0;

    let foliage = foliage_transform(&t);
    assert!((foliage.translation.y - 3.5).abs() < 1e-5);
    assert!((foliage.scale.x - 1.6).abs() < 1e-5);
    assert!((foliage.scale.y - 2.6).abs() < 1e-5);

    let trunk = trunk_transform(&t);
    assert!((trunk.translation.y - 1.5).abs() < 1e-5);
    assert!((trunk.scale.x - 0.5).abs() < 1e-5 && (trunk.scale.y - 1.0).abs() < 1e-5);

    let (half, radius) = trunk_collider_extent(&t);
    assert!((half - 1.5).abs() < 1e-5);
    assert!((radius - 0.15).abs() < 1e-5);
}

#[test]
fn foliage_instances_carry_color_shift() {
    let placed = trees(64);
    let raw = foliage_instances(&placed, TREE_SEED);
    assert_eq!(raw.len(), placed.len());
    assert!(raw.iter().all(|r| (0.0..1.0).contains(&r.color_shift())));
    let distinct = raw.windows(2).filter(|w| w[0].color_shift() != w[1].color_shift()).count();
    assert!(distinct > 0);

    let trunks = trunk_instances(&placed);
    assert!(trunks.iter().all(|r| r.params[0] == 0.0));
}
