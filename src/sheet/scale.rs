//! Sheet scale: interline and staff line thickness
//!
//! Every key retrieval threshold is expressed as a fraction of the interline (or of the
//! line thickness) and converted to pixels through this type.

use crate::error::KeyError;
use serde::{Deserialize, Serialize};

/// Sheet scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    interline: u32,
    main_fore: u32,
}

impl Scale {
    /// Create a new scale
    ///
    /// # Arguments
    ///
    /// * `interline` - Distance between two staff lines, in pixels
    /// * `main_fore` - Typical staff line thickness, in pixels
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidInput` if the interline is zero or if the line
    /// thickness is not smaller than the interline.
    pub fn new(interline: u32, main_fore: u32) -> Result<Self, KeyError> {
        if interline == 0 {
            return Err(KeyError::InvalidInput("Interline must be positive".to_string()));
        }

        if main_fore >= interline {
            return Err(KeyError::InvalidInput(format!(
                "Line thickness {} must be smaller than interline {}",
                main_fore, interline
            )));
        }

        Ok(Self {
            interline,
            main_fore,
        })
    }

    /// Interline, in pixels
    pub fn interline(&self) -> u32 {
        self.interline
    }

    /// Staff line thickness, in pixels
    pub fn main_fore(&self) -> u32 {
        self.main_fore
    }

    /// Convert an interline fraction to a rounded pixel count
    pub fn to_pixels(&self, fraction: f64) -> i32 {
        self.to_pixels_f64(fraction).round() as i32
    }

    /// Convert an interline fraction to pixels, without rounding
    pub fn to_pixels_f64(&self, fraction: f64) -> f64 {
        fraction * self.interline as f64
    }

    /// Convert a line thickness fraction to a rounded pixel count
    pub fn line_to_pixels(&self, fraction: f64) -> i32 {
        (fraction * self.main_fore as f64).round() as i32
    }

    /// Convert an interline-squared fraction to a rounded pixel area
    pub fn area_to_pixels(&self, fraction: f64) -> i32 {
        let interline = self.interline as f64;
        (fraction * interline * interline).round() as i32
    }
}
