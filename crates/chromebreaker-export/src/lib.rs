//! ChromeBreaker Export Pipeline
//!
//! Writes extracted RP6 resources to disk:
//! - Meshes: assembled from their compact parts and written as MSH
//! - Animations: the payload part as `.anm2`
//! - Everything else: one raw `.bin` file per part
//!
//! A `manifest.json` in the output root records what was written.

pub mod manifest;
pub mod writer;

pub use manifest::{Manifest, ManifestEntry, MANIFEST_FILE_NAME};
pub use writer::{raw_part_name, sanitize_name, ResourceWriter};
