//! Configuration parameters for key signature retrieval
//!
//! [`KeyConfig`] holds scale-independent values (fractions of interline, of line
//! thickness, plain ratios and grades). [`KeyParameters`] is derived from a config and
//! a [`Scale`] and carries the pixel values actually used by the scanner.

use crate::error::KeyError;
use crate::sheet::Scale;
use serde::{Deserialize, Serialize};

/// Key retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    // Region of interest
    /// Horizontal margin before measure start kept in the projection (default: 2.0 interlines)
    pub pre_staff_margin: f64,

    /// Margin above the first staff line (default: 2.0 interlines)
    pub roi_margin_above: f64,

    /// Margin below the last staff line (default: 1.0 interline)
    pub roi_margin_below: f64,

    // Spaces
    /// Maximum cumul value in a space, as a multiple of line thickness (default: 2.0)
    pub max_space_cumul: f64,

    /// Maximum initial space before key signature (default: 1.75 interlines)
    /// A too small value might miss the whole key signature
    pub max_first_space_width: f64,

    /// Maximum inner space within key signature (default: 0.7 interline)
    /// A too small value might miss final key signature items
    pub max_inner_space: f64,

    // Peaks
    /// Typical alteration height (default: 2.5 interlines)
    pub typical_alteration_height: f64,

    /// Ratio of alteration contribution to detect peaks (default: 0.5)
    pub peak_height_ratio: f64,

    /// Maximum cumul value to accept a peak (default: 4.0 interlines)
    pub max_peak_cumul: f64,

    /// Maximum width to accept a peak, measured at threshold height (default: 0.4 interline)
    pub max_peak_width: f64,

    /// Maximum x offset of first peak from browse start (default: 2.0 interlines)
    pub max_first_peak_offset: f64,

    /// Maximum delta abscissa between peaks (default: 1.4 interlines)
    pub max_peak_dx: f64,

    // Stems
    /// Core length for alteration "stem" (default: 2.0 interlines)
    pub core_stem_length: f64,

    /// Minimum ratio of black rows in core length (default: 0.75)
    pub min_black_ratio: f64,

    // Signature
    /// Maximum short peak delta for sharps (default: 0.75 interline)
    pub max_sharp_delta: f64,

    /// Minimum short peak delta for flats (default: 0.5 interline)
    pub min_flat_delta: f64,

    /// Threshold on first peak offset that differentiates sharps from flats when peak
    /// spacing is ambiguous (default: 0.1 interline).
    /// Empirical value, to be calibrated against labeled key signatures.
    pub offset_threshold: f64,

    /// Maximum heading length before peak for a flat item (default: 0.4 interline)
    pub max_flat_heading: f64,

    /// Typical trailing length after peak for a flat item (default: 1.0 interline)
    pub flat_trail: f64,

    /// Minimum trailing length after peak for a flat item (default: 0.8 interline)
    pub min_flat_trail: f64,

    /// Maximum trailing length after peak for a flat item (default: 1.3 interlines)
    pub max_flat_trail: f64,

    /// Typical trailing length after last peak for a sharp item (default: 0.3 interline)
    pub sharp_trail: f64,

    /// Minimum trailing length after last peak for a sharp item (default: 0.2 interline)
    pub min_sharp_trail: f64,

    /// Maximum trailing length after last peak for a sharp item (default: 0.5 interline)
    pub max_sharp_trail: f64,

    // Glyphs
    /// Maximum distance between two parts of a single alteration (default: 1.5 interlines)
    pub max_glyph_gap: f64,

    /// Maximum glyph width (default: 2.0 interlines)
    pub max_glyph_width: f64,

    /// Maximum glyph height (default: 3.5 interlines)
    pub max_glyph_height: f64,

    /// Minimum glyph weight, in interline squared (default: 0.3)
    pub min_glyph_weight: f64,

    /// Minimum weight of a connected part kept before combination search (default: 2 pixels)
    pub min_part_weight: usize,

    /// Height of the flat loop, used to locate the flat pitch above glyph bottom
    /// (default: 1.0 interline)
    pub flat_loop_height: f64,

    // Grades
    /// Discount applied to raw classifier grades (default: 0.8)
    pub intrinsic_ratio: f64,

    /// Minimum grade for alterations found in whole-area mode (default: 0.3)
    pub alter_min_grade: f64,

    /// Minimum grade for alterations found in per-slice mode (default: 0.15)
    pub slice_alter_min_grade: f64,

    /// Support ratio between alterations of the same key signature (default: 1.5)
    pub alter_support_ratio: f64,

    /// Grade bonus granted to accepted alterations of a key signature (default: 0.25)
    pub key_alter_bonus: f64,

    // System alignment
    /// Maximum x distance to theoretical slice (default: 0.5 interline)
    pub max_slice_dist: f64,

    /// Maximum number of corrective re-runs per staff in one system pass (default: 1)
    pub max_retries: usize,

    /// Maximum expectation-maximization iterations for slice offsets (default: 50)
    pub em_max_iterations: usize,

    /// Process staves of a system in parallel during the first pass (default: true)
    pub parallel: bool,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            pre_staff_margin: 2.0,
            roi_margin_above: 2.0,
            roi_margin_below: 1.0,
            max_space_cumul: 2.0,
            max_first_space_width: 1.75,
            max_inner_space: 0.7,
            typical_alteration_height: 2.5,
            peak_height_ratio: 0.5,
            max_peak_cumul: 4.0,
            max_peak_width: 0.4,
            max_first_peak_offset: 2.0,
            max_peak_dx: 1.4,
            core_stem_length: 2.0,
            min_black_ratio: 0.75,
            max_sharp_delta: 0.75,
            min_flat_delta: 0.5,
            offset_threshold: 0.1,
            max_flat_heading: 0.4,
            flat_trail: 1.0,
            min_flat_trail: 0.8,
            max_flat_trail: 1.3,
            sharp_trail: 0.3,
            min_sharp_trail: 0.2,
            max_sharp_trail: 0.5,
            max_glyph_gap: 1.5,
            max_glyph_width: 2.0,
            max_glyph_height: 3.5,
            min_glyph_weight: 0.3,
            min_part_weight: 2,
            flat_loop_height: 1.0,
            intrinsic_ratio: 0.8,
            alter_min_grade: 0.3,
            slice_alter_min_grade: 0.15,
            alter_support_ratio: 1.5,
            key_alter_bonus: 0.25,
            max_slice_dist: 0.5,
            max_retries: 1,
            em_max_iterations: 50,
            parallel: true,
        }
    }
}

impl KeyConfig {
    /// Check configuration consistency
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidConfig` when a ratio or grade lies outside [0, 1],
    /// or when trailing bounds are not ordered (min <= typical <= max).
    pub fn validate(&self) -> Result<(), KeyError> {
        let unit_values = [
            ("min_black_ratio", self.min_black_ratio),
            ("peak_height_ratio", self.peak_height_ratio),
            ("intrinsic_ratio", self.intrinsic_ratio),
            ("alter_min_grade", self.alter_min_grade),
            ("slice_alter_min_grade", self.slice_alter_min_grade),
            ("key_alter_bonus", self.key_alter_bonus),
        ];

        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                return Err(KeyError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(self.min_flat_trail <= self.flat_trail && self.flat_trail <= self.max_flat_trail) {
            return Err(KeyError::InvalidConfig(
                "Flat trailing lengths must satisfy min <= typical <= max".to_string(),
            ));
        }

        if !(self.min_sharp_trail <= self.sharp_trail && self.sharp_trail <= self.max_sharp_trail)
        {
            return Err(KeyError::InvalidConfig(
                "Sharp trailing lengths must satisfy min <= typical <= max".to_string(),
            ));
        }

        if self.core_stem_length <= 0.0 {
            return Err(KeyError::InvalidConfig(
                "core_stem_length must be positive".to_string(),
            ));
        }

        if self.alter_support_ratio < 1.0 {
            return Err(KeyError::InvalidConfig(format!(
                "alter_support_ratio must be at least 1.0, got {}",
                self.alter_support_ratio
            )));
        }

        Ok(())
    }
}

/// Scale-dependent parameters, in pixels
///
/// Fields carry the same meaning as their [`KeyConfig`] counterparts.
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyParameters {
    /// Interline, in pixels
    pub interline: i32,
    pub pre_staff_margin: i32,
    pub roi_margin_above: i32,
    pub roi_margin_below: i32,
    pub max_first_peak_offset: i32,
    pub max_first_space_width: i32,
    pub max_inner_space: i32,
    /// Minimum cumul value for a column to belong to a peak
    pub min_peak_cumul: i32,
    pub max_space_cumul: i32,
    pub core_stem_length: i32,
    pub min_black_ratio: f64,
    pub max_peak_cumul: i32,
    pub max_peak_width: i32,
    pub max_flat_heading: i32,
    pub flat_trail: i32,
    pub min_flat_trail: i32,
    pub max_flat_trail: i32,
    pub sharp_trail: i32,
    pub min_sharp_trail: i32,
    pub max_sharp_trail: i32,
    pub max_peak_dx: i32,
    pub max_sharp_delta: f64,
    pub min_flat_delta: f64,
    pub offset_threshold: f64,
    pub max_glyph_gap: f64,
    pub max_glyph_width: f64,
    pub max_glyph_height: f64,
    pub min_glyph_weight: i32,
    pub min_part_weight: usize,
    pub flat_loop_height: f64,
    pub max_slice_dist: i32,
}

impl KeyParameters {
    /// Convert a configuration to pixel values for the provided scale
    pub fn new(config: &KeyConfig, scale: &Scale) -> Self {
        let interline = scale.interline() as f64;
        let main_fore = scale.main_fore() as f64;

        // Maximum alteration contribution, on top of staff lines
        let max_alter_contrib = config.typical_alteration_height * (interline - main_fore);
        let min_peak_cumul =
            (5.0 * main_fore + config.peak_height_ratio * max_alter_contrib).round() as i32;

        Self {
            interline: scale.interline() as i32,
            pre_staff_margin: scale.to_pixels(config.pre_staff_margin),
            roi_margin_above: scale.to_pixels(config.roi_margin_above),
            roi_margin_below: scale.to_pixels(config.roi_margin_below),
            max_first_peak_offset: scale.to_pixels(config.max_first_peak_offset),
            max_first_space_width: scale.to_pixels(config.max_first_space_width),
            max_inner_space: scale.to_pixels(config.max_inner_space),
            min_peak_cumul,
            max_space_cumul: scale.line_to_pixels(config.max_space_cumul),
            core_stem_length: scale.to_pixels(config.core_stem_length),
            min_black_ratio: config.min_black_ratio,
            max_peak_cumul: scale.to_pixels(config.max_peak_cumul),
            max_peak_width: scale.to_pixels(config.max_peak_width),
            max_flat_heading: scale.to_pixels(config.max_flat_heading),
            flat_trail: scale.to_pixels(config.flat_trail),
            min_flat_trail: scale.to_pixels(config.min_flat_trail),
            max_flat_trail: scale.to_pixels(config.max_flat_trail),
            sharp_trail: scale.to_pixels(config.sharp_trail),
            min_sharp_trail: scale.to_pixels(config.min_sharp_trail),
            max_sharp_trail: scale.to_pixels(config.max_sharp_trail),
            max_peak_dx: scale.to_pixels(config.max_peak_dx),
            max_sharp_delta: scale.to_pixels_f64(config.max_sharp_delta),
            min_flat_delta: scale.to_pixels_f64(config.min_flat_delta),
            offset_threshold: scale.to_pixels_f64(config.offset_threshold),
            max_glyph_gap: scale.to_pixels_f64(config.max_glyph_gap),
            max_glyph_width: scale.to_pixels_f64(config.max_glyph_width),
            max_glyph_height: scale.to_pixels_f64(config.max_glyph_height),
            min_glyph_weight: scale.area_to_pixels(config.min_glyph_weight),
            min_part_weight: config.min_part_weight,
            flat_loop_height: scale.to_pixels_f64(config.flat_loop_height),
            max_slice_dist: scale.to_pixels(config.max_slice_dist),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(KeyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let config = KeyConfig {
            min_black_ratio: 1.5,
            ..KeyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unordered_trails_rejected() {
        let config = KeyConfig {
            min_sharp_trail: 0.6,
            ..KeyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parameters_in_pixels() {
        let scale = Scale::new(20, 2).unwrap();
        let params = KeyParameters::new(&KeyConfig::default(), &scale);

        // 5 * 2 + 0.5 * 2.5 * (20 - 2) = 32.5
        assert_eq!(params.min_peak_cumul, 33);
        assert_eq!(params.max_space_cumul, 4);
        assert_eq!(params.core_stem_length, 40);
        assert_eq!(params.max_peak_width, 8);
        assert_eq!(params.max_first_space_width, 35);
        assert_eq!(params.max_inner_space, 14);
        assert_eq!(params.max_peak_dx, 28);
        assert_eq!(params.min_glyph_weight, 120);
        assert!((params.min_flat_delta - 10.0).abs() < 1e-9);
        assert!((params.max_sharp_delta - 15.0).abs() < 1e-9);
    }
}
