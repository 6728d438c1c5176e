//! Tests for the CPU mirrors of the exposure reduce math

use afterglow::post::exposure::{
    adapt_exposure, auto_key, exposure_buffer_values, target_exposure, ExposureSettings,
};
use approx::{assert_relative_eq, relative_eq};

#[test]
fn manual_exposure_vector_layout() {
    let values = exposure_buffer_values(2.0);
    assert_eq!(
        values,
        [2.0, 0.5, 2.0, 0.0, -12.0, 2.0, 14.0, 1.0 / 14.0]
    );
}

#[test]
fn manual_exposure_vector_tracks_the_configured_value() {
    let e = 0.37;
    let values = exposure_buffer_values(e);
    assert_relative_eq!(values[0], e);
    assert_relative_eq!(values[1], 1.0 / e);
    assert_relative_eq!(values[2], e);
}

#[test]
fn adaption_is_identity_at_zero_time_delta() {
    let previous = 3.7;
    assert_eq!(adapt_exposure(previous, 10.0, 1.1, 0.0), previous);
    assert_eq!(adapt_exposure(previous, 0.01, 1.1, 0.0), previous);
}

#[test]
fn adaption_is_monotone_toward_the_target() {
    let target: f32 = 8.0;
    let mut previous: f32 = 1.0;
    let mut last_distance = (target - previous).abs();

    for _ in 0..50 {
        previous = adapt_exposure(previous, target, 1.1, 1.0 / 60.0);
        let distance = (target - previous).abs();
        assert!(distance <= last_distance);
        last_distance = distance;
    }
    assert!(previous > 1.0);
    assert!(previous < target);
}

#[test]
fn adaption_converges_as_time_grows() {
    let adapted = adapt_exposure(1.0, 8.0, 1.1, 1000.0);
    assert_relative_eq!(adapted, 8.0, epsilon = 1e-4);

    // From above as well
    let adapted = adapt_exposure(32.0, 8.0, 1.1, 1000.0);
    assert_relative_eq!(adapted, 8.0, epsilon = 1e-4);
}

#[test]
fn target_exposure_respects_the_configured_clamp() {
    let settings = ExposureSettings {
        auto_key: false,
        key: 0.08,
        ..ExposureSettings::default()
    };

    // A blindingly bright scene pushes the raw target below the minimum
    let bright = target_exposure(&settings, 1e6);
    assert_eq!(bright, settings.min_exposure);

    // A black scene pushes it above the maximum
    let dark = target_exposure(&settings, 1e-8);
    assert_eq!(dark, settings.max_exposure);

    let mid = target_exposure(&settings, 0.08);
    assert!(mid >= settings.min_exposure && mid <= settings.max_exposure);
    assert!(relative_eq!(mid, 1.0, epsilon = 1e-5));
}

#[test]
fn auto_key_grows_with_scene_luminance() {
    let dark = auto_key(0.0);
    assert_relative_eq!(dark, 0.03, epsilon = 1e-6);

    let mut previous = dark;
    for lum in [0.1, 1.0, 10.0, 100.0] {
        let key = auto_key(lum);
        assert!(key > previous);
        previous = key;
    }
}
