//! Key signature retrieval modules
//!
//! Retrieve key signatures using:
//! - A per-staff builder (projection scan, slices, glyph extraction, reconciliation)
//! - Canonical clef layouts and clef guess
//! - A system-level column aligning the slices of all staves

pub mod builder;
pub mod column;
pub mod detector;
pub mod mixture;
pub mod slices;
pub mod templates;

pub use builder::KeyBuilder;
pub use column::{ColumnReport, KeyColumn, StaffReport};
pub use detector::{guess_clef_kind, ClefGuess};
pub use slices::{Roi, Slice};
pub use templates::ClefTemplates;

use crate::config::{KeyConfig, KeyParameters};
use crate::features::glyph::{ComponentBuilder, ShapeClassifier};
use crate::io::PixelSource;

/// Injected capabilities
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    /// Shape scoring oracle
    pub classifier: &'a dyn ShapeClassifier,
    /// Connected component builder
    pub components: &'a dyn ComponentBuilder,
}

/// Everything a builder reads but never modifies
#[derive(Clone, Copy)]
pub struct KeyContext<'a> {
    /// Binary, staff-free image
    pub source: &'a dyn PixelSource,
    /// Injected capabilities
    pub capabilities: Capabilities<'a>,
    /// Configuration
    pub config: &'a KeyConfig,
    /// Configuration converted to pixels
    pub params: &'a KeyParameters,
}
