//! Tests for the configuration surface: defaults and serde round-trips

use afterglow::post::{AaPlacement, PostProcessSettings};

#[test]
fn defaults_match_the_documented_surface() {
    let settings = PostProcessSettings::default();

    assert_eq!(settings.bloom.strength, 0.5);
    assert_eq!(settings.bloom.radius, 1.0);
    assert_eq!(settings.bloom.down_samples, 5);
    assert_eq!(settings.bloom.bright_pass_steepness, 2.0);
    assert_eq!(settings.bloom.threshold_offset, 4.0);

    assert!(settings.exposure.auto_key);
    assert_eq!(settings.exposure.key, 0.08);
    assert_eq!(settings.exposure.min_exposure, 1.0 / 64.0);
    assert_eq!(settings.exposure.max_exposure, 64.0);
    assert_eq!(settings.exposure.adaption_speed, 1.1);
    assert_eq!(settings.exposure.exposure, 2.0);
    assert!(settings.exposure.auto_exposure);

    assert!(!settings.debug_histogram);
    assert_eq!(settings.aa_placement, AaPlacement::BeforeToneMap);
}

#[test]
fn empty_document_deserializes_to_defaults() {
    let settings: PostProcessSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, PostProcessSettings::default());
}

#[test]
fn partial_documents_keep_unmentioned_defaults() {
    let settings: PostProcessSettings =
        serde_json::from_str(r#"{"bloom": {"down_samples": 3}, "debug_histogram": true}"#).unwrap();
    assert_eq!(settings.bloom.down_samples, 3);
    assert_eq!(settings.bloom.strength, 0.5);
    assert!(settings.debug_histogram);
    assert!(settings.exposure.auto_exposure);
}

#[test]
fn settings_round_trip_through_json() {
    let mut settings = PostProcessSettings::default();
    settings.exposure.auto_exposure = false;
    settings.exposure.exposure = 1.25;
    settings.aa_placement = AaPlacement::AfterToneMap;
    settings.bloom.down_samples = 2;

    let encoded = serde_json::to_string(&settings).unwrap();
    let decoded: PostProcessSettings = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, settings);
}
