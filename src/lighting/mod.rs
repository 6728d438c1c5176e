//! Light-group extensions
//!
//! Carries the atmosphere parameter binding for directional light groups.

pub mod atmosphere;

pub use atmosphere::{
    atmosphere_params, AtmosphereLightGroup, AtmosphereSettings, DirectionalLightData, LightKind,
    RenderLight,
};
