//! Pixel input
//!
//! Key retrieval reads an already binarized, staff-free image through the
//! [`PixelSource`] trait.

pub mod pixels;

pub use pixels::{copy_region, PixelSource, BACKGROUND, FOREGROUND};
