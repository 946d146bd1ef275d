//! Feature extraction modules
//!
//! This module contains the key retrieval pipeline:
//! - Header projection and stem probing
//! - Peak and space scanning
//! - Signature inference
//! - Glyph capabilities and combination search
//! - Per-staff key building and system-level alignment

pub mod glyph;
pub mod key;
pub mod peak_picking;
pub mod projection;
pub mod signature;
pub mod stem;
