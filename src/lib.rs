//! # Stave Keysig
//!
//! Key signature retrieval for optical music recognition: given a binarized, staff-free
//! image of a system of staves, find for each staff whether a key signature follows the
//! clef, and if so where each sharp or flat lies and what its pitch is.
//!
//! ## Features
//!
//! - **Projection scanning**: per-column foreground counts, peaks validated by stem probing
//! - **Signature inference**: sharps, flats or none, from peak spacing
//! - **Slice extraction**: one slice per item, glyph combinations graded by an injected classifier
//! - **Clef reconciliation**: pitches snapped to the best fitting clef layout
//! - **System alignment**: Gaussian mixture offsets, missing slices repaired across staves
//!
//! ## Quick Start
//!
//! ```
//! use image::{GrayImage, Luma};
//! use stave_keysig::analysis::graph::InterGraph;
//! use stave_keysig::features::glyph::{Evaluation, Glyph, RunComponentBuilder, ShapeClassifier};
//! use stave_keysig::sheet::{Scale, StaffGeometry, StaffInfo, StaffLine, SystemInfo};
//! use stave_keysig::{retrieve_keys, Capabilities, KeyConfig};
//!
//! struct Blind;
//!
//! impl ShapeClassifier for Blind {
//!     fn evaluate(&self, _glyph: &Glyph, _interline: f64) -> Vec<Evaluation> {
//!         vec![]
//!     }
//! }
//!
//! let image = GrayImage::from_pixel(300, 200, Luma([255]));
//! let geometry = StaffGeometry {
//!     id: 1,
//!     first_line: StaffLine::horizontal(0.0, 299.0, 60.0),
//!     last_line: StaffLine::horizontal(0.0, 299.0, 140.0),
//!     bars: vec![],
//! };
//! let mut system = SystemInfo {
//!     id: 1,
//!     staves: vec![StaffInfo::new(geometry, 10)],
//! };
//! let capabilities = Capabilities {
//!     classifier: &Blind,
//!     components: &RunComponentBuilder::new(),
//! };
//! let mut graph = InterGraph::new();
//!
//! let report = retrieve_keys(
//!     &mut system,
//!     &image,
//!     capabilities,
//!     &mut graph,
//!     &Scale::new(20, 2)?,
//!     &KeyConfig::default(),
//!     200,
//! )?;
//! assert_eq!(report.staves[0].fifths, 0);
//! # Ok::<(), stave_keysig::KeyError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Pixels → Projection → Peaks/Spaces → Signature → Slices → Items → Clef reconciliation
//!                                                      ↑
//!                                     System alignment (per-staff repairs)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod sheet;

// Re-export main types
pub use analysis::graph::InterGraph;
pub use analysis::result::{AlterItem, ClefKind, KeyResult, Shape};
pub use config::{KeyConfig, KeyParameters};
pub use error::KeyError;
pub use features::key::{Capabilities, ColumnReport, KeyContext, StaffReport};
pub use io::PixelSource;

use features::key::KeyColumn;
use sheet::{Scale, SystemInfo};

/// Main retrieval function
///
/// Retrieves the key signature of every staff in `system`, records results in the
/// staff headers and in `graph`, and returns a per-system report.
///
/// # Arguments
///
/// * `system` - Staves, with geometry and header (measure start, clef stop)
/// * `source` - Binarized, staff-free image
/// * `capabilities` - Shape classifier and component builder
/// * `graph` - Result graph, holding clef candidates
/// * `scale` - Interline and line thickness
/// * `config` - Retrieval configuration
/// * `projection_width` - Maximum key area width, from measure start, in pixels
///
/// # Returns
///
/// `ColumnReport` with per-staff fifths, weird slices and the maximum key offset
///
/// # Errors
///
/// Returns `KeyError` if the configuration is invalid, the projection width is not
/// positive or the source image is empty
pub fn retrieve_keys(
    system: &mut SystemInfo,
    source: &dyn PixelSource,
    capabilities: Capabilities<'_>,
    graph: &mut InterGraph,
    scale: &Scale,
    config: &KeyConfig,
    projection_width: i32,
) -> Result<ColumnReport, KeyError> {
    config.validate()?;

    if projection_width <= 0 {
        return Err(KeyError::InvalidInput(format!(
            "Invalid projection width: {}",
            projection_width
        )));
    }

    if source.width() <= 0 || source.height() <= 0 {
        return Err(KeyError::InvalidInput("Empty pixel source".to_string()));
    }

    log::debug!(
        "Starting key retrieval: system#{} {} staves, interline {}",
        system.id,
        system.staves.len(),
        scale.interline()
    );

    let params = KeyParameters::new(config, scale);
    let ctx = KeyContext {
        source,
        capabilities,
        config,
        params: &params,
    };

    let mut column = KeyColumn::new(ctx, system, projection_width);
    let report = column.retrieve_keys(system, graph);

    log::debug!(
        "System#{} keys: {:?}, max key offset {}",
        report.system_id,
        report.staves.iter().map(|s| s.fifths).collect::<Vec<_>>(),
        report.max_key_offset
    );

    Ok(report)
}
