//! Pixel integrity checker
//!
//! Verifies a directory of images against a per-directory manifest of
//! content hashes (raw bytes) and pixel hashes (decoded image buffer), so
//! that metadata-only edits can be told apart from real pixel changes.

pub mod checker;
pub mod config;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod models;
pub mod scanner;
pub mod update;

#[cfg(test)]
mod test_support;

pub use checker::Checker;
pub use config::{CheckConfig, RunMode};
pub use coordinator::{HashCoordinator, HashKind, HashOutcome};
pub use error::{PintError, PintErrorKind, Result};
pub use hasher::{FileHasher, ImageDecoder, PixelDecoder};
pub use manifest::{Manifest, ManifestStore};
pub use models::{
    Classification, FileReport, HexDigest, LiveFile, ManifestEntry, PassReport, RunSummary,
};
pub use scanner::{list_directories, list_images};
