use grove::error::VegetationError;
use grove::plugins::config::*;
use grove::plugins::foliage::ShadingMode;
use grove::plugins::radial_field::RadialBias;
use grove::plugins::vegetation::build_vegetation;

#[test]
fn defaults_are_valid() {
    let cfg = VegetationConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.variant_count, 4);
    assert_eq!(cfg.sector_count, 6);
    assert_eq!(cfg.trees.bias, RadialBias::CUBIC);
}

#[test]
fn shipped_ron_parses() {
    let cfg = parse_config(include_str!("../assets/vegetation.ron")).expect("shipped config");
    assert_eq!(cfg.grass.count, 12_000);
    assert_eq!(cfg.trees.count, 160);
    assert_eq!(cfg.foliage.shading, ShadingMode::Flat);
    assert!(cfg.trees.exclusion.is_some());
}

#[test]
fn partial_ron_keeps_defaults() {
    let cfg = parse_config("(variant_count: 2, lod: (visibility_distance: 80.0))").unwrap();
    assert_eq!(cfg.variant_count, 2);
    assert_eq!(cfg.lod.visibility_distance, 80.0);
    assert_eq!(cfg.lod.lod_near, 15.0);
    assert_eq!(cfg.sector_count, 6);
}

#[test]
fn inner_beyond_outer_fails_fast() {
    let mut cfg = VegetationConfig::default();
    cfg.grass.inner_radius = 50.0;
    cfg.grass.outer_radius = 40.0;
    match cfg.validate() {
        Err(VegetationError::InvalidConfig { field, .. }) => assert_eq!(field, "grass.outer_radius"),
        other => panic!("expected config error, got {other:?}"),
    }
    assert!(build_vegetation(&cfg).is_err());
}

#[test]
fn negative_count_is_rejected() {
    let err = parse_config(
        "(trees: (count: -5, inner_radius: 1.0, outer_radius: 2.0))",
    )
    .unwrap_err();
    assert!(matches!(err, VegetationError::Parse(_)), "{err:?}");
}

#[test]
fn zero_variants_rejected() {
    let cfg = VegetationConfig {
        variant_count: 0,
        ..VegetationConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(matches!(err, VegetationError::InvalidConfig { ref field, .. } if field == "variant_count"));
    assert!(err.to_string().contains("variant_count"));
}

#[test]
fn inverted_wedge_rejected() {
    let mut cfg = VegetationConfig::default();
    if let Some(w) = cfg.trees.exclusion.as_mut() {
        w.end = w.start - 0.1;
    }
    assert!(cfg.validate().is_err());
}

#[test]
fn bad_lod_band_rejected() {
    let mut cfg = VegetationConfig::default();
    cfg.lod.lod_far = cfg.lod.lod_near;
    assert!(cfg.validate().is_err());
}

#[test]
fn world_size_scales_radii() {
    let cfg = VegetationConfig::for_world(100.0);
    assert!((cfg.trees.inner_radius - 110.0).abs() < 1e-9);
    assert!((cfg.trees.outer_radius - 190.0).abs() < 1e-9);
    assert!(cfg.grass.inner_radius < cfg.trees.inner_radius);
}
