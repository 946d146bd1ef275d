//! Result modules
//!
//! What key retrieval produces:
//! - Result types (alteration items, key results)
//! - The symbolic result graph
//! - Diagnostics

pub mod diagnostics;
pub mod graph;
pub mod result;
