//! Core data models for the integrity checker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::PintError;

/// Length of an MD5 digest in hex characters
pub const DIGEST_HEX_LEN: usize = 32;

/// Lowercase hex digest of fixed length
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexDigest(String);

impl HexDigest {
    /// Parse a digest as written by this crate.
    /// Returns None unless the input is exactly `DIGEST_HEX_LEN` lowercase hex
    /// characters, so a loaded manifest serializes back byte for byte.
    pub fn parse(s: &str) -> Option<Self> {
        let lower_hex = |b: u8| b.is_ascii_digit() || (b'a'..=b'f').contains(&b);
        if s.len() == DIGEST_HEX_LEN && s.bytes().all(lower_hex) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Wrap a digest already formatted as lowercase hex
    pub(crate) fn from_lower_hex(hex: String) -> Self {
        debug_assert_eq!(hex.len(), DIGEST_HEX_LEN);
        Self(hex)
    }

    /// Get the hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes recorded for one file in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Digest of the raw file bytes
    pub content_hash: HexDigest,
    /// Digest of the decoded pixel buffer
    pub pixel_hash: HexDigest,
}

/// Outcome of comparing content hashes (first phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFlag {
    /// Content hash matches the manifest
    Identical,
    /// Content hash differs; pending pixel comparison
    Changed,
    /// Not present in the manifest
    New,
}

impl ContentFlag {
    /// Whether a pixel hash must be computed for this file
    pub fn needs_pixel_hash(&self) -> bool {
        !matches!(self, ContentFlag::Identical)
    }
}

/// Final per-file classification of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Bytes unchanged
    Identical,
    /// Bytes changed, decoded pixels unchanged
    ChangedMetadata,
    /// Decoded pixels changed
    ChangedPixeldata,
    /// On disk but not in the manifest
    New,
    /// In the manifest but not on disk
    Missing,
}

impl Classification {
    /// Get the display label
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Identical => "IDENTICAL",
            Classification::ChangedMetadata => "CHANGED (METADATA)",
            Classification::ChangedPixeldata => "CHANGED (PIXELDATA)",
            Classification::New => "NEW",
            Classification::Missing => "MISSING",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A live file after the content-hash phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDiff {
    pub filename: String,
    pub content_hash: HexDigest,
    pub flag: ContentFlag,
}

/// A live file after both phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFile {
    /// File name inside the directory
    pub filename: String,
    /// Digest of the current bytes
    pub content_hash: HexDigest,
    /// Digest of the decoded pixels; only computed for new or changed files
    pub pixel_hash: Option<HexDigest>,
    /// Final classification
    pub classification: Classification,
}

/// Per-file line of a pass report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub filename: String,
    pub classification: Classification,
}

/// Result of one pass over a directory
#[derive(Debug, Serialize)]
pub struct PassReport {
    /// Directory the pass ran over
    pub directory: PathBuf,
    /// When the pass started
    pub checked_at: DateTime<Utc>,
    /// Classified files, sorted by filename
    pub files: Vec<FileReport>,
    /// Per-file hashing failures
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PintError>,
    /// Whether the manifest was written
    pub updated: bool,
    /// Pass duration in milliseconds
    pub duration_ms: u64,
}

impl PassReport {
    /// Create an empty report for a directory
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            checked_at: Utc::now(),
            files: Vec::new(),
            errors: Vec::new(),
            updated: false,
            duration_ms: 0,
        }
    }

    /// Replace the file list, sorted by filename
    pub fn set_files(&mut self, mut files: Vec<FileReport>) {
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        self.files = files;
    }

    /// Number of files with the given classification
    pub fn count(&self, classification: Classification) -> usize {
        self.files
            .iter()
            .filter(|f| f.classification == classification)
            .count()
    }

    /// Look up a file's classification
    pub fn classification_of(&self, filename: &str) -> Option<Classification> {
        self.files
            .iter()
            .find(|f| f.filename == filename)
            .map(|f| f.classification)
    }

    /// Whether the pass finished without file errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A directory whose pass could not complete
#[derive(Debug, Serialize)]
pub struct DirectoryFailure {
    pub directory: PathBuf,
    pub error: PintError,
}

/// Result of a whole run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub passes: Vec<PassReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DirectoryFailure>,
}

impl RunSummary {
    /// Create an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Total file errors across all passes
    pub fn error_count(&self) -> usize {
        self.passes.iter().map(|p| p.errors.len()).sum::<usize>() + self.failures.len()
    }

    /// Check if the run completed without errors
    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }
}
