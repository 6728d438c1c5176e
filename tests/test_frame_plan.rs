//! Tests for the compositor's frame plan
//!
//! Validates stage sequencing, skip behavior for disabled stages and
//! missing optional dependencies, both antialiasing placements, and the
//! scoped-target demand of skipped stages.

use afterglow::post::compositor::{FrameCaps, FramePlan, FrameStage, StageToggles};
use afterglow::post::{AaPlacement, ExposureSettings, PostProcessSettings};

fn manual_exposure_settings() -> PostProcessSettings {
    PostProcessSettings {
        exposure: ExposureSettings {
            auto_exposure: false,
            ..ExposureSettings::default()
        },
        ..PostProcessSettings::default()
    }
}

fn full_caps() -> FrameCaps {
    FrameCaps {
        has_depth: true,
        has_normals: true,
        has_specular_roughness: true,
        has_velocity: true,
    }
}

#[test]
fn all_optional_stages_disabled_is_the_minimal_chain() {
    let settings = manual_exposure_settings();
    let toggles = StageToggles::default();
    let plan = FramePlan::build(&settings, &toggles, &full_caps());

    assert_eq!(
        plan.stages(),
        &[
            FrameStage::Sanitize,
            FrameStage::ManualExposure,
            FrameStage::Bloom { down_samples: 5 },
            FrameStage::ToneMap,
            FrameStage::Scaler,
        ]
    );

    // sanitize + bright pass + 5 downsample levels + tone map; nothing for
    // the skipped stages
    assert_eq!(plan.scoped_targets(), 8);
}

#[test]
fn disabled_effects_plan_identically_to_absent_effects() {
    // A compositor with every optional stage switched off must not differ
    // from one that never had the effects installed
    let settings = manual_exposure_settings();
    let disabled = FramePlan::build(&settings, &StageToggles::default(), &full_caps());
    let absent = FramePlan::build(&settings, &StageToggles::default(), &FrameCaps::default());
    assert_eq!(disabled, absent);
}

#[test]
fn full_chain_is_ordered_correctly() {
    let settings = PostProcessSettings {
        debug_histogram: true,
        ..PostProcessSettings::default()
    };
    let toggles = StageToggles {
        antialiasing: true,
        aa_needs_range_decompress: true,
        local_reflections: true,
        ambient_occlusion: true,
        fog: true,
        depth_of_field: true,
        light_streak: true,
        lens_flare: true,
        color_transforms: true,
    };
    let plan = FramePlan::build(&settings, &toggles, &full_caps());

    assert_eq!(
        plan.stages(),
        &[
            FrameStage::Sanitize,
            FrameStage::AaPre {
                range_compress: true
            },
            FrameStage::LocalReflections,
            FrameStage::AmbientOcclusion,
            FrameStage::Fog,
            FrameStage::DepthOfField,
            FrameStage::AutoExposure,
            FrameStage::Bloom { down_samples: 5 },
            FrameStage::DebugHistogram,
            FrameStage::LightStreak,
            FrameStage::LensFlare,
            FrameStage::ToneMap,
            FrameStage::ColorTransforms,
        ]
    );
}

#[test]
fn stages_missing_their_dependencies_are_skipped() {
    let settings = PostProcessSettings::default();
    let toggles = StageToggles {
        local_reflections: true,
        fog: true,
        depth_of_field: true,
        ..StageToggles::default()
    };

    // No depth buffer: fog, depth of field and reflections all drop out
    let no_depth = FrameCaps {
        has_depth: false,
        has_normals: true,
        has_specular_roughness: true,
        has_velocity: false,
    };
    let plan = FramePlan::build(&settings, &toggles, &no_depth);
    assert!(!plan.stages().contains(&FrameStage::Fog));
    assert!(!plan.stages().contains(&FrameStage::DepthOfField));
    assert!(!plan.stages().contains(&FrameStage::LocalReflections));

    // Depth but no normals: reflections still out, fog and DoF run
    let no_normals = FrameCaps {
        has_depth: true,
        has_normals: false,
        has_specular_roughness: true,
        has_velocity: false,
    };
    let plan = FramePlan::build(&settings, &toggles, &no_normals);
    assert!(plan.stages().contains(&FrameStage::Fog));
    assert!(plan.stages().contains(&FrameStage::DepthOfField));
    assert!(!plan.stages().contains(&FrameStage::LocalReflections));
}

#[test]
fn aa_before_tonemap_runs_early_and_never_late() {
    let settings = PostProcessSettings::default();
    assert_eq!(settings.aa_placement, AaPlacement::BeforeToneMap);

    let toggles = StageToggles {
        antialiasing: true,
        ..StageToggles::default()
    };
    let plan = FramePlan::build(&settings, &toggles, &full_caps());

    assert_eq!(
        plan.stages()[1],
        FrameStage::AaPre {
            range_compress: false
        }
    );
    assert!(!plan.stages().contains(&FrameStage::AaPost));
}

#[test]
fn aa_after_tonemap_runs_on_the_final_image() {
    let settings = PostProcessSettings {
        aa_placement: AaPlacement::AfterToneMap,
        ..PostProcessSettings::default()
    };
    let toggles = StageToggles {
        antialiasing: true,
        color_transforms: true,
        ..StageToggles::default()
    };
    let plan = FramePlan::build(&settings, &toggles, &full_caps());

    let stages = plan.stages();
    assert_eq!(stages.last(), Some(&FrameStage::AaPost));
    assert!(!stages
        .iter()
        .any(|s| matches!(s, FrameStage::AaPre { .. })));

    // Color transforms render into one extra scoped target the final AA reads
    let without_aa =
        FramePlan::build(&settings, &StageToggles::default(), &full_caps());
    assert_eq!(plan.scoped_targets(), without_aa.scoped_targets() + 1);
}

#[test]
fn range_compression_follows_the_technique_requirement() {
    let settings = PostProcessSettings::default();
    let toggles = StageToggles {
        antialiasing: true,
        aa_needs_range_decompress: true,
        ..StageToggles::default()
    };
    let plan = FramePlan::build(&settings, &toggles, &full_caps());
    assert!(plan.stages().contains(&FrameStage::AaPre {
        range_compress: true
    }));
}

#[test]
fn bloom_downsample_count_drives_target_demand() {
    let mut settings = manual_exposure_settings();

    settings.bloom.down_samples = 0;
    let base = FramePlan::build(&settings, &StageToggles::default(), &full_caps());

    settings.bloom.down_samples = 7;
    let deep = FramePlan::build(&settings, &StageToggles::default(), &full_caps());

    assert_eq!(deep.scoped_targets(), base.scoped_targets() + 7);
}
