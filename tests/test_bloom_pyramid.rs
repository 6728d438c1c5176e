//! Tests for the bloom pyramid plan
//!
//! The chain must produce exactly N+1 targets (bright pass + N downsample
//! levels), halving at each step, and degenerate cleanly at N = 0.

use afterglow::post::bloom::{pyramid_levels, BloomSettings};

#[test]
fn pyramid_has_one_level_per_downsample_plus_bright_pass() {
    for n in 0..8 {
        let levels = pyramid_levels(1920, 1080, n);
        assert_eq!(levels.len(), n as usize + 1);
    }
}

#[test]
fn pyramid_halves_each_level() {
    let levels = pyramid_levels(1920, 1080, 5);
    assert_eq!(levels[0], (1920, 1080));
    for pair in levels.windows(2) {
        assert_eq!(pair[1].0, (pair[0].0 / 2).max(1));
        assert_eq!(pair[1].1, (pair[0].1 / 2).max(1));
    }
}

#[test]
fn zero_downsamples_is_just_the_bright_pass() {
    let levels = pyramid_levels(800, 600, 0);
    assert_eq!(levels, vec![(800, 600)]);
}

#[test]
fn odd_sizes_lose_a_pixel_to_integer_halving() {
    let levels = pyramid_levels(99, 51, 3);
    assert_eq!(levels, vec![(99, 51), (49, 25), (24, 12), (12, 6)]);
}

#[test]
fn levels_never_collapse_below_one_pixel() {
    let levels = pyramid_levels(4, 2, 6);
    assert_eq!(levels.len(), 7);
    for (w, h) in levels {
        assert!(w >= 1);
        assert!(h >= 1);
    }
}

#[test]
fn sizes_are_monotonically_non_increasing() {
    let levels = pyramid_levels(1280, 720, BloomSettings::default().down_samples);
    for pair in levels.windows(2) {
        assert!(pair[1].0 <= pair[0].0);
        assert!(pair[1].1 <= pair[0].1);
    }
}
