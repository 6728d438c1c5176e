//! Tests for the atmosphere light-group parameter binding
//!
//! Atmosphere parameters must be omitted entirely (keys absent, not zeroed)
//! when the view's first light is not atmosphere-typed or no transmittance
//! lookup texture is available.

use afterglow::core::params::{composed, ParameterSet};
use afterglow::lighting::atmosphere::{
    atmosphere_params, AtmosphereLightGroup, AtmosphereSettings, LightKind, RenderLight,
    BOTTOM_RADIUS_KEY, LIGHTS_KEY, LIGHT_COUNT_KEY, SCALE_TO_SKY_UNIT_KEY, TOP_RADIUS_KEY,
    TRANSMITTANCE_LUT_KEY,
};
use approx::assert_relative_eq;
use glam::Vec3;

const COMPOSITION: &str = "DirectLightGroup0";

fn plain_directional() -> RenderLight {
    RenderLight {
        kind: LightKind::Directional,
        direction: Vec3::new(0.0, -1.0, 0.0),
        color: Vec3::ONE,
    }
}

fn atmosphere_directional() -> RenderLight {
    RenderLight {
        kind: LightKind::AtmosphereDirectional(AtmosphereSettings {
            planet_radius: 6360.0,
            atmosphere_height: 100.0,
            unit_scale: 0.001,
        }),
        direction: Vec3::new(0.3, -0.9, 0.1),
        color: Vec3::new(1.0, 0.95, 0.9),
    }
}

#[test]
fn non_atmosphere_first_light_publishes_no_atmosphere_keys() {
    let group = AtmosphereLightGroup::new(COMPOSITION);
    let lights = [plain_directional(), atmosphere_directional()];
    let mut parameters = ParameterSet::new();

    group.apply_view_parameters(&lights, 0..2, None, &mut parameters);

    // Light data is always published for the view
    assert_eq!(
        parameters.get_uint(&composed(LIGHT_COUNT_KEY, COMPOSITION)),
        Some(2)
    );
    assert!(parameters.contains(&composed(LIGHTS_KEY, COMPOSITION)));

    // Atmosphere keys are absent, not zeroed
    assert!(!parameters.contains(&composed(BOTTOM_RADIUS_KEY, COMPOSITION)));
    assert!(!parameters.contains(&composed(TOP_RADIUS_KEY, COMPOSITION)));
    assert!(!parameters.contains(&composed(SCALE_TO_SKY_UNIT_KEY, COMPOSITION)));
    assert!(!parameters.contains(TRANSMITTANCE_LUT_KEY));
}

#[test]
fn missing_lut_publishes_no_atmosphere_keys() {
    let group = AtmosphereLightGroup::new(COMPOSITION);
    let lights = [atmosphere_directional()];
    let mut parameters = ParameterSet::new();

    group.apply_view_parameters(&lights, 0..1, None, &mut parameters);

    assert_eq!(
        parameters.get_uint(&composed(LIGHT_COUNT_KEY, COMPOSITION)),
        Some(1)
    );
    assert!(!parameters.contains(&composed(BOTTOM_RADIUS_KEY, COMPOSITION)));
    assert!(!parameters.contains(TRANSMITTANCE_LUT_KEY));
}

#[test]
fn empty_light_range_publishes_an_empty_view() {
    let group = AtmosphereLightGroup::new(COMPOSITION);
    let lights = [atmosphere_directional()];
    let mut parameters = ParameterSet::new();

    group.apply_view_parameters(&lights, 1..1, None, &mut parameters);

    assert_eq!(
        parameters.get_uint(&composed(LIGHT_COUNT_KEY, COMPOSITION)),
        Some(0)
    );
    assert!(!parameters.contains(&composed(BOTTOM_RADIUS_KEY, COMPOSITION)));
}

#[test]
fn out_of_bounds_range_publishes_nothing() {
    let group = AtmosphereLightGroup::new(COMPOSITION);
    let lights = [atmosphere_directional()];
    let mut parameters = ParameterSet::new();

    group.apply_view_parameters(&lights, 0..5, None, &mut parameters);

    assert!(parameters.is_empty());
}

#[test]
fn top_radius_is_planet_radius_plus_atmosphere_height() {
    let light = atmosphere_directional();
    let (bottom, top, scale) = atmosphere_params(&light).unwrap();
    assert_relative_eq!(bottom, 6360.0);
    assert_relative_eq!(top, 6460.0);
    assert_relative_eq!(scale, 0.001);

    assert!(atmosphere_params(&plain_directional()).is_none());
}

#[test]
fn packed_light_data_covers_the_whole_range() {
    let group = AtmosphereLightGroup::new(COMPOSITION);
    let lights = [atmosphere_directional(), plain_directional()];
    let mut parameters = ParameterSet::new();

    group.apply_view_parameters(&lights, 0..2, None, &mut parameters);

    let data = parameters
        .get_data(&composed(LIGHTS_KEY, COMPOSITION))
        .unwrap();
    // Two lights, 32 bytes each (direction + color, padded to vec4)
    assert_eq!(data.len(), 64);
}
