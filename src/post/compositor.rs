//! Frame orchestrator
//!
//! Owns the full ordered post-processing pipeline, the scoped render-target
//! pool and the persistent exposure/histogram buffers, and propagates
//! per-frame parameters into every stage. One `draw` call records the whole
//! chain for one frame; a failing stage drops the frame at the draw entry
//! without poisoning later frames.

use crate::core::screen_effect::{ScreenEffect, ScreenEffectDesc};
use crate::core::targets::{FrameTargets, RenderTargetPool, TargetDesc, TargetId};
use crate::error::{RenderError, RenderResult};
use crate::post::aa::{AaPlacement, RangeCompression};
use crate::post::bloom::{BloomEngine, BloomInput, BloomOutput, BloomSettings};
use crate::post::color_grade::{sync_luminance_to_alpha, ColorGradeStage, ColorTransformGroup};
use crate::post::effect::{AmbientOcclusion, AntiAliasing, EffectInputs, FrameContext, PostEffect};
use crate::post::exposure::{ExposureEngine, ExposureSettings};
use crate::post::tonemap::ToneMapStage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use wgpu::{
    Device, Extent3d, ImageCopyTexture, Origin3d, Texture, TextureAspect, TextureFormat,
    TextureView, TextureViewDescriptor,
};

/// Format of every HDR intermediate in the chain
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Semantics the upstream output validator can report for the per-frame
/// input texture array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSemantic {
    Color,
    Normals,
    SpecularRoughness,
    ReflectionNormals,
    ReflectionRoughness,
    Velocity,
}

/// Maps semantics to indices in the per-frame input array. A slot is
/// populated only when the semantic is present.
#[derive(Debug, Clone, Default)]
pub struct OutputLayout {
    semantics: Vec<TargetSemantic>,
}

impl OutputLayout {
    pub fn new(semantics: Vec<TargetSemantic>) -> Self {
        Self { semantics }
    }

    pub fn find(&self, semantic: TargetSemantic) -> Option<usize> {
        self.semantics.iter().position(|s| *s == semantic)
    }
}

/// Full configuration surface of the compositor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    pub bloom: BloomSettings,
    pub exposure: ExposureSettings,
    pub debug_histogram: bool,
    pub aa_placement: AaPlacement,
}

/// Which optional inputs the caller supplied this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCaps {
    pub has_depth: bool,
    pub has_normals: bool,
    pub has_specular_roughness: bool,
    pub has_velocity: bool,
}

/// Enabled-state snapshot of the pluggable effects, used for planning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageToggles {
    pub antialiasing: bool,
    pub aa_needs_range_decompress: bool,
    pub local_reflections: bool,
    pub ambient_occlusion: bool,
    pub fog: bool,
    pub depth_of_field: bool,
    pub light_streak: bool,
    pub lens_flare: bool,
    pub color_transforms: bool,
}

/// One stage of the per-frame pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Sanitize,
    AaPre { range_compress: bool },
    LocalReflections,
    AmbientOcclusion,
    Fog,
    DepthOfField,
    AutoExposure,
    ManualExposure,
    Bloom { down_samples: u32 },
    DebugHistogram,
    LightStreak,
    LensFlare,
    ToneMap,
    ColorTransforms,
    Scaler,
    AaPost,
}

/// The ordered stage sequence for one frame, plus its scoped-target demand.
/// Skipped stages contribute nothing to either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    stages: Vec<FrameStage>,
    scoped_targets: u32,
}

impl FramePlan {
    pub fn build(
        settings: &PostProcessSettings,
        toggles: &StageToggles,
        caps: &FrameCaps,
    ) -> Self {
        let mut stages = Vec::new();
        let mut scoped = 0u32;

        stages.push(FrameStage::Sanitize);
        scoped += 1;

        if toggles.antialiasing && settings.aa_placement == AaPlacement::BeforeToneMap {
            stages.push(FrameStage::AaPre {
                range_compress: toggles.aa_needs_range_decompress,
            });
            scoped += 1;
        }

        if toggles.local_reflections
            && caps.has_depth
            && caps.has_normals
            && caps.has_specular_roughness
        {
            stages.push(FrameStage::LocalReflections);
            scoped += 1;
        }

        // Ambient occlusion owns its output target, no pool demand
        if toggles.ambient_occlusion {
            stages.push(FrameStage::AmbientOcclusion);
        }

        if toggles.fog && caps.has_depth {
            stages.push(FrameStage::Fog);
            scoped += 1;
        }

        if toggles.depth_of_field && caps.has_depth {
            stages.push(FrameStage::DepthOfField);
            scoped += 1;
        }

        if settings.exposure.auto_exposure {
            stages.push(FrameStage::AutoExposure);
        } else {
            stages.push(FrameStage::ManualExposure);
        }

        stages.push(FrameStage::Bloom {
            down_samples: settings.bloom.down_samples,
        });
        scoped += 1 + settings.bloom.down_samples;

        if settings.debug_histogram {
            stages.push(FrameStage::DebugHistogram);
            scoped += 1;
        }

        if toggles.light_streak {
            stages.push(FrameStage::LightStreak);
        }

        if toggles.lens_flare {
            stages.push(FrameStage::LensFlare);
        }

        stages.push(FrameStage::ToneMap);
        scoped += 1;

        let aa_post = toggles.antialiasing && settings.aa_placement == AaPlacement::AfterToneMap;

        if toggles.color_transforms {
            stages.push(FrameStage::ColorTransforms);
        } else {
            stages.push(FrameStage::Scaler);
        }
        if aa_post {
            // Color transforms render to a scoped target the final AA reads
            scoped += 1;
            stages.push(FrameStage::AaPost);
        }

        Self {
            stages,
            scoped_targets: scoped,
        }
    }

    pub fn stages(&self) -> &[FrameStage] {
        &self.stages
    }

    /// Scoped render targets this plan acquires from the frame pool
    pub fn scoped_targets(&self) -> u32 {
        self.scoped_targets
    }
}

/// The image currently threading through the chain
#[derive(Clone, Copy)]
enum CurrentImage {
    /// The caller's color input, only before the sanitize stage ran
    External,
    Scoped(TargetId),
    /// The ambient occlusion effect's own output
    Occlusion,
}

fn image_view<'f>(
    frame: &'f FrameTargets<'_>,
    external: &'f TextureView,
    occlusion: &'f Option<TextureView>,
    current: CurrentImage,
) -> RenderResult<&'f TextureView> {
    match current {
        CurrentImage::External => Ok(external),
        CurrentImage::Scoped(id) => Ok(frame.view(id)),
        CurrentImage::Occlusion => occlusion
            .as_ref()
            .ok_or_else(|| RenderError::render("ambient occlusion output missing")),
    }
}

fn record_failure(last_error: &mut Option<RenderError>, result: RenderResult<()>) {
    if let Err(err) = result {
        warn!("frame dropped: {err}");
        *last_error = Some(err);
    }
}

fn semantic_view(
    layout: &OutputLayout,
    inputs: &[&Texture],
    semantic: TargetSemantic,
) -> Option<TextureView> {
    layout
        .find(semantic)
        .and_then(|index| inputs.get(index))
        .map(|texture| texture.create_view(&TextureViewDescriptor::default()))
}

/// The post-processing compositor. Owns the pipeline stages, the scoped
/// target pool and the exposure/histogram state; external effects plug in
/// through the `PostEffect`/`AntiAliasing`/`AmbientOcclusion` traits.
pub struct Compositor {
    pub settings: PostProcessSettings,
    pub color_transforms: ColorTransformGroup,
    sanitizer: ScreenEffect,
    exposure: ExposureEngine,
    bloom: BloomEngine,
    tone_map: ToneMapStage,
    color_grade: ColorGradeStage,
    range: RangeCompression,
    targets: RenderTargetPool,
    antialiasing: Option<Box<dyn AntiAliasing>>,
    ambient_occlusion: Option<Box<dyn AmbientOcclusion>>,
    local_reflections: Option<Box<dyn PostEffect>>,
    fog: Option<Box<dyn PostEffect>>,
    depth_of_field: Option<Box<dyn PostEffect>>,
    light_streak: Option<Box<dyn PostEffect>>,
    lens_flare: Option<Box<dyn PostEffect>>,
    last_error: Option<RenderError>,
    output_format: TextureFormat,
}

impl Compositor {
    pub fn new(
        device: &Device,
        settings: PostProcessSettings,
        output_format: TextureFormat,
    ) -> RenderResult<Self> {
        let sanitizer = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "sanitize",
                source: include_str!("../shaders/sanitize.wgsl"),
                input_count: 1,
                uniform_size: 0,
                reads_exposure: false,
                additive_blend: false,
                output_format: HDR_FORMAT,
            },
        )?;

        let exposure = ExposureEngine::new(device, &settings.exposure)?;
        let bloom = BloomEngine::new(device, HDR_FORMAT)?;
        let tone_map = ToneMapStage::new(device, HDR_FORMAT)?;
        let color_grade = ColorGradeStage::new(device, output_format)?;
        let range = RangeCompression::new(device, HDR_FORMAT)?;

        Ok(Self {
            settings,
            color_transforms: ColorTransformGroup::new(),
            sanitizer,
            exposure,
            bloom,
            tone_map,
            color_grade,
            range,
            targets: RenderTargetPool::new(),
            antialiasing: None,
            ambient_occlusion: None,
            local_reflections: None,
            fog: None,
            depth_of_field: None,
            light_streak: None,
            lens_flare: None,
            last_error: None,
            output_format,
        })
    }

    pub fn set_antialiasing(&mut self, technique: Option<Box<dyn AntiAliasing>>) {
        self.antialiasing = technique;
    }

    pub fn antialiasing_mut(&mut self) -> Option<&mut (dyn AntiAliasing + 'static)> {
        self.antialiasing.as_deref_mut()
    }

    pub fn set_ambient_occlusion(&mut self, effect: Option<Box<dyn AmbientOcclusion>>) {
        self.ambient_occlusion = effect;
    }

    pub fn set_local_reflections(&mut self, effect: Option<Box<dyn PostEffect>>) {
        self.local_reflections = effect;
    }

    pub fn local_reflections_mut(&mut self) -> Option<&mut (dyn PostEffect + 'static)> {
        self.local_reflections.as_deref_mut()
    }

    pub fn set_fog(&mut self, effect: Option<Box<dyn PostEffect>>) {
        self.fog = effect;
    }

    pub fn fog_mut(&mut self) -> Option<&mut (dyn PostEffect + 'static)> {
        self.fog.as_deref_mut()
    }

    pub fn set_depth_of_field(&mut self, effect: Option<Box<dyn PostEffect>>) {
        self.depth_of_field = effect;
    }

    pub fn depth_of_field_mut(&mut self) -> Option<&mut (dyn PostEffect + 'static)> {
        self.depth_of_field.as_deref_mut()
    }

    pub fn set_light_streak(&mut self, effect: Option<Box<dyn PostEffect>>) {
        self.light_streak = effect;
    }

    pub fn light_streak_mut(&mut self) -> Option<&mut (dyn PostEffect + 'static)> {
        self.light_streak.as_deref_mut()
    }

    pub fn set_lens_flare(&mut self, effect: Option<Box<dyn PostEffect>>) {
        self.lens_flare = effect;
    }

    pub fn lens_flare_mut(&mut self) -> Option<&mut (dyn PostEffect + 'static)> {
        self.lens_flare.as_deref_mut()
    }

    /// Does the installed antialiasing technique want the velocity buffer
    pub fn requires_velocity_buffer(&self) -> bool {
        self.antialiasing
            .as_ref()
            .map_or(false, |aa| aa.requires_velocity())
    }

    pub fn requires_normal_buffer(&self) -> bool {
        self.ambient_occlusion
            .as_ref()
            .map_or(false, |ao| ao.requires_normals())
            || self
                .local_reflections
                .as_ref()
                .map_or(false, |e| e.enabled())
    }

    pub fn requires_specular_roughness_buffer(&self) -> bool {
        self.local_reflections
            .as_ref()
            .map_or(false, |e| e.enabled())
    }

    /// Last stage failure captured at the draw entry
    pub fn last_error(&self) -> Option<&RenderError> {
        self.last_error.as_ref()
    }

    /// Targets currently retained by the scoped pool
    pub fn pooled_targets(&self) -> usize {
        self.targets.allocated()
    }

    /// Switch every optional stage off
    pub fn disable_all(&mut self) {
        for effect in [
            &mut self.fog,
            &mut self.local_reflections,
            &mut self.depth_of_field,
            &mut self.light_streak,
            &mut self.lens_flare,
        ] {
            if let Some(effect) = effect.as_deref_mut() {
                effect.set_enabled(false);
            }
        }
        if let Some(aa) = self.antialiasing.as_deref_mut() {
            aa.set_enabled(false);
        }
        self.color_transforms.enabled = false;
    }

    fn toggles(&self) -> StageToggles {
        StageToggles {
            antialiasing: self.antialiasing.as_ref().map_or(false, |aa| aa.enabled()),
            aa_needs_range_decompress: self
                .antialiasing
                .as_ref()
                .map_or(false, |aa| aa.needs_range_decompress()),
            local_reflections: self
                .local_reflections
                .as_ref()
                .map_or(false, |e| e.enabled()),
            ambient_occlusion: self.ambient_occlusion.is_some(),
            fog: self.fog.as_ref().map_or(false, |e| e.enabled()),
            depth_of_field: self.depth_of_field.as_ref().map_or(false, |e| e.enabled()),
            light_streak: self.light_streak.as_ref().map_or(false, |e| e.enabled()),
            lens_flare: self.lens_flare.as_ref().map_or(false, |e| e.enabled()),
            color_transforms: self.color_transforms.enabled,
        }
    }

    /// The stage sequence the next draw will follow for these capabilities
    pub fn plan_frame(&self, caps: &FrameCaps) -> FramePlan {
        FramePlan::build(&self.settings, &self.toggles(), caps)
    }

    /// Record one frame. Any stage failure is captured as `last_error` and
    /// the frame is dropped; this entry point never propagates errors.
    pub fn draw(
        &mut self,
        ctx: &mut FrameContext<'_>,
        layout: &OutputLayout,
        inputs: &[&Texture],
        depth: Option<&Texture>,
        output: &Texture,
    ) {
        let result = self.draw_core(ctx, layout, inputs, depth, output);
        record_failure(&mut self.last_error, result);
    }

    fn draw_core(
        &mut self,
        ctx: &mut FrameContext<'_>,
        layout: &OutputLayout,
        inputs: &[&Texture],
        depth: Option<&Texture>,
        output: &Texture,
    ) -> RenderResult<()> {
        // Missing color input: silently skip the frame
        let Some(color_index) = layout.find(TargetSemantic::Color) else {
            return Ok(());
        };
        let Some(color) = inputs.get(color_index) else {
            return Ok(());
        };

        let width = color.width();
        let height = color.height();

        let color_view = color.create_view(&TextureViewDescriptor::default());
        let output_view = output.create_view(&TextureViewDescriptor::default());
        let depth_view = depth.map(|t| t.create_view(&TextureViewDescriptor::default()));
        let normals_view = semantic_view(layout, inputs, TargetSemantic::Normals);
        let specular_view = semantic_view(layout, inputs, TargetSemantic::SpecularRoughness);
        let reflection_normals_view =
            semantic_view(layout, inputs, TargetSemantic::ReflectionNormals);
        let reflection_roughness_view =
            semantic_view(layout, inputs, TargetSemantic::ReflectionRoughness);
        let velocity_view = semantic_view(layout, inputs, TargetSemantic::Velocity);

        let caps = FrameCaps {
            has_depth: depth_view.is_some(),
            has_normals: normals_view.is_some(),
            has_specular_roughness: specular_view.is_some(),
            has_velocity: velocity_view.is_some(),
        };
        let plan = self.plan_frame(&caps);
        debug!(
            "recording frame: {} stages, {} scoped targets",
            plan.stages().len(),
            plan.scoped_targets()
        );
        let aa_post = plan.stages().contains(&FrameStage::AaPost);

        let mut frame = self.targets.begin_frame();
        let mut current = CurrentImage::External;
        let mut occlusion_view: Option<TextureView> = None;
        let mut bloom_output: Option<BloomOutput> = None;

        for stage in plan.stages() {
            match *stage {
                FrameStage::Sanitize => {
                    let target =
                        frame.acquire(ctx.device, TargetDesc::color(width, height, HDR_FORMAT));
                    self.sanitizer.draw(
                        ctx.device,
                        ctx.encoder,
                        &[&color_view],
                        None,
                        frame.view(target),
                    )?;
                    current = CurrentImage::Scoped(target);
                }

                FrameStage::AaPre { range_compress } => {
                    let aa = self.antialiasing.as_deref_mut().ok_or_else(|| {
                        RenderError::render("antialiasing stage planned without a technique")
                    })?;
                    aa.set_input_luminance_in_alpha(true);

                    let surface =
                        frame.acquire(ctx.device, TargetDesc::color(width, height, HDR_FORMAT));

                    if range_compress {
                        // Fold to display range, run the technique in place,
                        // unfold back to HDR
                        let source =
                            image_view(&frame, &color_view, &occlusion_view, current)?;
                        self.range.compress(ctx, source, frame.view(surface))?;

                        let mut aa_inputs = EffectInputs::new(frame.view(surface));
                        if aa.requires_depth() {
                            aa_inputs.depth = depth_view.as_ref();
                        }
                        if aa.requires_velocity() {
                            aa_inputs.velocity = velocity_view.as_ref();
                        }
                        let target =
                            image_view(&frame, &color_view, &occlusion_view, current)?;
                        aa.draw(ctx, &aa_inputs, target)?;

                        let source =
                            image_view(&frame, &color_view, &occlusion_view, current)?;
                        self.range.decompress(ctx, source, frame.view(surface))?;
                    } else {
                        let mut aa_inputs = EffectInputs::new(image_view(
                            &frame,
                            &color_view,
                            &occlusion_view,
                            current,
                        )?);
                        if aa.requires_depth() {
                            aa_inputs.depth = depth_view.as_ref();
                        }
                        if aa.requires_velocity() {
                            aa_inputs.velocity = velocity_view.as_ref();
                        }
                        aa.draw(ctx, &aa_inputs, frame.view(surface))?;
                    }
                    current = CurrentImage::Scoped(surface);
                }

                FrameStage::LocalReflections => {
                    let effect = self.local_reflections.as_deref_mut().ok_or_else(|| {
                        RenderError::render("local reflections stage planned without an effect")
                    })?;
                    let target =
                        frame.acquire(ctx.device, TargetDesc::color(width, height, HDR_FORMAT));
                    let mut effect_inputs = EffectInputs::new(image_view(
                        &frame,
                        &color_view,
                        &occlusion_view,
                        current,
                    )?);
                    effect_inputs.depth = depth_view.as_ref();
                    effect_inputs.normals = normals_view.as_ref();
                    effect_inputs.specular_roughness = specular_view.as_ref();
                    effect_inputs.reflection_normals = reflection_normals_view.as_ref();
                    effect_inputs.reflection_roughness = reflection_roughness_view.as_ref();
                    effect.draw(ctx, &effect_inputs, frame.view(target))?;
                    current = CurrentImage::Scoped(target);
                }

                FrameStage::AmbientOcclusion => {
                    let effect = self.ambient_occlusion.as_deref_mut().ok_or_else(|| {
                        RenderError::render("ambient occlusion stage planned without an effect")
                    })?;
                    let result = {
                        let source =
                            image_view(&frame, &color_view, &occlusion_view, current)?;
                        effect.draw(ctx, source, depth_view.as_ref(), normals_view.as_ref())?
                    };
                    occlusion_view = Some(result);
                    current = CurrentImage::Occlusion;
                }

                FrameStage::Fog => {
                    let effect = self.fog.as_deref_mut().ok_or_else(|| {
                        RenderError::render("fog stage planned without an effect")
                    })?;
                    let target =
                        frame.acquire(ctx.device, TargetDesc::color(width, height, HDR_FORMAT));
                    let mut effect_inputs = EffectInputs::new(image_view(
                        &frame,
                        &color_view,
                        &occlusion_view,
                        current,
                    )?);
                    effect_inputs.depth = depth_view.as_ref();
                    effect.draw(ctx, &effect_inputs, frame.view(target))?;
                    current = CurrentImage::Scoped(target);
                }

                FrameStage::DepthOfField => {
                    let effect = self.depth_of_field.as_deref_mut().ok_or_else(|| {
                        RenderError::render("depth of field stage planned without an effect")
                    })?;
                    let target =
                        frame.acquire(ctx.device, TargetDesc::color(width, height, HDR_FORMAT));
                    let mut effect_inputs = EffectInputs::new(image_view(
                        &frame,
                        &color_view,
                        &occlusion_view,
                        current,
                    )?);
                    effect_inputs.depth = depth_view.as_ref();
                    effect.draw(ctx, &effect_inputs, frame.view(target))?;
                    current = CurrentImage::Scoped(target);
                }

                FrameStage::AutoExposure | FrameStage::ManualExposure => {
                    let source = image_view(&frame, &color_view, &occlusion_view, current)?;
                    self.exposure
                        .update(ctx, &self.settings.exposure, source, width, height)?;
                }

                FrameStage::Bloom { .. } => {
                    let input = match current {
                        CurrentImage::Scoped(id) => BloomInput::Target(id),
                        CurrentImage::External => BloomInput::View(&color_view),
                        CurrentImage::Occlusion => BloomInput::View(
                            occlusion_view.as_ref().ok_or_else(|| {
                                RenderError::render("ambient occlusion output missing")
                            })?,
                        ),
                    };
                    let result = self.bloom.draw(
                        ctx,
                        &self.settings.bloom,
                        input,
                        width,
                        height,
                        self.exposure.exposure_buffer(),
                        &mut frame,
                    )?;
                    bloom_output = Some(result);
                }

                FrameStage::DebugHistogram => {
                    let debug_target = frame.acquire(
                        ctx.device,
                        TargetDesc::storage(
                            output.width(),
                            output.height(),
                            TextureFormat::Rgba8Unorm,
                        ),
                    );
                    let extent = Extent3d {
                        width: output.width(),
                        height: output.height(),
                        depth_or_array_layers: 1,
                    };
                    ctx.encoder.copy_texture_to_texture(
                        ImageCopyTexture {
                            texture: output,
                            mip_level: 0,
                            origin: Origin3d::ZERO,
                            aspect: TextureAspect::All,
                        },
                        ImageCopyTexture {
                            texture: frame.texture(debug_target),
                            mip_level: 0,
                            origin: Origin3d::ZERO,
                            aspect: TextureAspect::All,
                        },
                        extent,
                    );
                    self.exposure
                        .draw_debug_overlay(ctx, frame.view(debug_target))?;
                    ctx.encoder.copy_texture_to_texture(
                        ImageCopyTexture {
                            texture: frame.texture(debug_target),
                            mip_level: 0,
                            origin: Origin3d::ZERO,
                            aspect: TextureAspect::All,
                        },
                        ImageCopyTexture {
                            texture: output,
                            mip_level: 0,
                            origin: Origin3d::ZERO,
                            aspect: TextureAspect::All,
                        },
                        extent,
                    );
                }

                FrameStage::LightStreak => {
                    let effect = self.light_streak.as_deref_mut().ok_or_else(|| {
                        RenderError::render("light streak stage planned without an effect")
                    })?;
                    let bloom = bloom_output.as_ref().ok_or_else(|| {
                        RenderError::render("light streak requires the bright pass")
                    })?;
                    let effect_inputs = EffectInputs::new(frame.view(bloom.bright_pass));
                    let target = image_view(&frame, &color_view, &occlusion_view, current)?;
                    effect.draw(ctx, &effect_inputs, target)?;
                }

                FrameStage::LensFlare => {
                    let effect = self.lens_flare.as_deref_mut().ok_or_else(|| {
                        RenderError::render("lens flare stage planned without an effect")
                    })?;
                    let bloom = bloom_output.as_ref().ok_or_else(|| {
                        RenderError::render("lens flare requires the bright pass")
                    })?;
                    let effect_inputs = EffectInputs::new(frame.view(bloom.bright_pass));
                    let target = image_view(&frame, &color_view, &occlusion_view, current)?;
                    effect.draw(ctx, &effect_inputs, target)?;
                }

                FrameStage::ToneMap => {
                    // Keep the luminance-in-alpha contract in sync before the
                    // final color passes run
                    let (uses_luminance, active) = match self.antialiasing.as_deref() {
                        Some(aa) => (
                            aa.uses_luminance_in_alpha(),
                            aa.enabled() && aa.input_luminance_in_alpha(),
                        ),
                        None => (false, false),
                    };
                    sync_luminance_to_alpha(&mut self.color_transforms, uses_luminance, active);

                    let bloom = bloom_output
                        .as_ref()
                        .ok_or_else(|| RenderError::render("tone map requires bloom output"))?;
                    let target =
                        frame.acquire(ctx.device, TargetDesc::color(width, height, HDR_FORMAT));
                    let source = image_view(&frame, &color_view, &occlusion_view, current)?;
                    self.tone_map.draw(
                        ctx,
                        source,
                        frame.view(bloom.bloom),
                        self.exposure.exposure_buffer(),
                        frame.view(target),
                    )?;
                    current = CurrentImage::Scoped(target);
                }

                FrameStage::ColorTransforms | FrameStage::Scaler => {
                    if aa_post {
                        let target = frame.acquire(
                            ctx.device,
                            TargetDesc::color(output.width(), output.height(), self.output_format),
                        );
                        let source =
                            image_view(&frame, &color_view, &occlusion_view, current)?;
                        self.color_grade.draw(
                            ctx,
                            &self.color_transforms,
                            source,
                            frame.view(target),
                        )?;
                        current = CurrentImage::Scoped(target);
                    } else {
                        let source =
                            image_view(&frame, &color_view, &occlusion_view, current)?;
                        self.color_grade
                            .draw(ctx, &self.color_transforms, source, &output_view)?;
                    }
                }

                FrameStage::AaPost => {
                    let aa = self.antialiasing.as_deref_mut().ok_or_else(|| {
                        RenderError::render("antialiasing stage planned without a technique")
                    })?;
                    let mut aa_inputs = EffectInputs::new(image_view(
                        &frame,
                        &color_view,
                        &occlusion_view,
                        current,
                    )?);
                    if aa.requires_depth() {
                        aa_inputs.depth = depth_view.as_ref();
                    }
                    if aa.requires_velocity() {
                        aa_inputs.velocity = velocity_view.as_ref();
                    }
                    aa.draw(ctx, &aa_inputs, &output_view)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_captured_and_does_not_poison() {
        let mut last_error = None;

        record_failure(&mut last_error, Err(RenderError::render("stage exploded")));
        assert!(last_error.is_some());

        // A later clean frame leaves the captured detail in place but keeps
        // the compositor drawable
        record_failure(&mut last_error, Ok(()));
        assert!(last_error.is_some());

        record_failure(&mut last_error, Err(RenderError::device("lost")));
        assert!(matches!(last_error, Some(RenderError::Device(_))));
    }

    #[test]
    fn output_layout_semantic_lookup() {
        let layout = OutputLayout::new(vec![
            TargetSemantic::Color,
            TargetSemantic::Normals,
            TargetSemantic::Velocity,
        ]);
        assert_eq!(layout.find(TargetSemantic::Color), Some(0));
        assert_eq!(layout.find(TargetSemantic::Velocity), Some(2));
        assert_eq!(layout.find(TargetSemantic::SpecularRoughness), None);
    }
}
