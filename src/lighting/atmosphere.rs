//! Atmosphere parameter injection for directional light groups
//!
//! For each view, the first light in the view's light range is inspected; if
//! it is the atmosphere-capable directional variant and a transmittance
//! lookup texture is available, the atmosphere parameters are published
//! alongside the per-view light data. Otherwise the parameters are simply
//! omitted, never zeroed. Nothing is retained between draws.

use crate::core::params::{composed, ParameterSet};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use wgpu::TextureView;

pub const LIGHT_COUNT_KEY: &str = "LightCount";
pub const LIGHTS_KEY: &str = "Lights";
pub const BOTTOM_RADIUS_KEY: &str = "BottomRadius";
pub const TOP_RADIUS_KEY: &str = "TopRadius";
pub const SCALE_TO_SKY_UNIT_KEY: &str = "ScaleToSkyUnit";
pub const TRANSMITTANCE_LUT_KEY: &str = "TransmittanceLutTexture";

/// Per-light atmosphere description
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphereSettings {
    /// Planet radius in atmosphere units (km)
    pub planet_radius: f32,
    pub atmosphere_height: f32,
    /// Scale factor from world units to atmosphere units
    pub unit_scale: f32,
}

impl Default for AtmosphereSettings {
    fn default() -> Self {
        Self {
            planet_radius: 6360.0,
            atmosphere_height: 100.0,
            unit_scale: 1.0,
        }
    }
}

/// Directional light variants the group renders
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    AtmosphereDirectional(AtmosphereSettings),
}

/// One light as seen by the light-group renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderLight {
    pub kind: LightKind,
    pub direction: Vec3,
    pub color: Vec3,
}

/// Packed per-light data published to the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightData {
    pub direction: [f32; 3],
    _pad0: f32,
    pub color: [f32; 3],
    _pad1: f32,
}

impl From<&RenderLight> for DirectionalLightData {
    fn from(light: &RenderLight) -> Self {
        Self {
            direction: light.direction.to_array(),
            _pad0: 0.0,
            color: light.color.to_array(),
            _pad1: 0.0,
        }
    }
}

/// Atmosphere shader parameters derived from a light, when it carries them:
/// bottom radius, top radius and the world-to-sky unit scale
pub fn atmosphere_params(light: &RenderLight) -> Option<(f32, f32, f32)> {
    match light.kind {
        LightKind::AtmosphereDirectional(atmosphere) => Some((
            atmosphere.planet_radius,
            atmosphere.planet_radius + atmosphere.atmosphere_height,
            atmosphere.unit_scale,
        )),
        LightKind::Directional => None,
    }
}

/// Per-view parameter publication for the atmosphere directional light group
#[derive(Debug, Clone)]
pub struct AtmosphereLightGroup {
    composition_name: String,
}

impl AtmosphereLightGroup {
    pub fn new(composition_name: impl Into<String>) -> Self {
        Self {
            composition_name: composition_name.into(),
        }
    }

    pub fn composition_name(&self) -> &str {
        &self.composition_name
    }

    /// Publish the view's light data and, when applicable, the atmosphere
    /// parameters. Recomputed every view; nothing is cached.
    pub fn apply_view_parameters<'a>(
        &self,
        lights: &[RenderLight],
        light_range: Range<usize>,
        transmittance_lut: Option<&'a TextureView>,
        parameters: &mut ParameterSet<'a>,
    ) {
        let view_lights = match lights.get(light_range.clone()) {
            Some(view_lights) => view_lights,
            None => return,
        };

        let packed: Vec<DirectionalLightData> =
            view_lights.iter().map(DirectionalLightData::from).collect();
        parameters.set_uint(
            composed(LIGHT_COUNT_KEY, &self.composition_name),
            packed.len() as u32,
        );
        parameters.set_data(composed(LIGHTS_KEY, &self.composition_name), &packed);

        self.set_atmosphere_parameters(view_lights, transmittance_lut, parameters);
    }

    /// Only the first light of the range is considered; if it is not
    /// atmosphere-typed, or no lookup texture exists, the atmosphere keys
    /// are left unset.
    fn set_atmosphere_parameters<'a>(
        &self,
        view_lights: &[RenderLight],
        transmittance_lut: Option<&'a TextureView>,
        parameters: &mut ParameterSet<'a>,
    ) {
        let first = match view_lights.first() {
            Some(first) => first,
            None => return,
        };

        let (bottom_radius, top_radius, unit_scale) = match atmosphere_params(first) {
            Some(params) => params,
            None => return,
        };

        let lut = match transmittance_lut {
            Some(lut) => lut,
            None => return,
        };

        parameters.set_float(
            composed(BOTTOM_RADIUS_KEY, &self.composition_name),
            bottom_radius,
        );
        parameters.set_float(composed(TOP_RADIUS_KEY, &self.composition_name), top_radius);
        parameters.set_float(
            composed(SCALE_TO_SKY_UNIT_KEY, &self.composition_name),
            unit_scale,
        );
        parameters.set_texture(TRANSMITTANCE_LUT_KEY, lut);
    }
}
