//! Post-processing pipeline
//!
//! The compositor orchestrates bloom, auto-exposure, tone mapping, the
//! antialiasing placement strategy and the pluggable screen-space effects.

pub mod aa;
pub mod bloom;
pub mod color_grade;
pub mod compositor;
pub mod effect;
pub mod exposure;
pub mod tonemap;

pub use aa::{AaPlacement, RangeCompression};
pub use bloom::{pyramid_levels, BloomEngine, BloomInput, BloomOutput, BloomSettings};
pub use color_grade::{
    sync_luminance_to_alpha, ColorChannel, ColorGradeStage, ColorTransform, ColorTransformGroup,
    ColorTransformKind,
};
pub use compositor::{
    Compositor, FrameCaps, FramePlan, FrameStage, OutputLayout, PostProcessSettings, StageToggles,
    TargetSemantic, HDR_FORMAT,
};
pub use effect::{AmbientOcclusion, AntiAliasing, EffectInputs, FrameContext, PostEffect};
pub use exposure::{
    adapt_exposure, auto_key, exposure_buffer_values, luminance_bucket, target_exposure,
    ExposureEngine, ExposureSettings, HISTOGRAM_BUCKETS, MAX_LOG_LUMINANCE, MIN_LOG_LUMINANCE,
};
pub use tonemap::ToneMapStage;
