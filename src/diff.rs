//! Diff engine: classifies live files against a manifest
//!
//! Classification runs in two phases. The content phase compares raw-byte
//! digests and marks each file identical, changed or new. Pixel digests are
//! then computed only for changed and new files, and the pixel phase splits
//! changed files into metadata-only and pixel changes.

use std::collections::{BTreeSet, HashMap};

use crate::manifest::Manifest;
use crate::models::{Classification, ContentDiff, ContentFlag, FileReport, HexDigest, LiveFile};

/// Phase one: compare content hashes against the manifest
pub fn flag_content_changes(
    manifest: &Manifest,
    content_hashes: Vec<(String, HexDigest)>,
) -> Vec<ContentDiff> {
    content_hashes
        .into_iter()
        .map(|(filename, content_hash)| {
            let flag = match manifest.get(&filename) {
                None => ContentFlag::New,
                Some(entry) if entry.content_hash == content_hash => ContentFlag::Identical,
                Some(_) => ContentFlag::Changed,
            };
            ContentDiff {
                filename,
                content_hash,
                flag,
            }
        })
        .collect()
}

/// Filenames that need a pixel hash after phase one (changed or new)
pub fn pending_pixel_hashes(diffs: &[ContentDiff]) -> Vec<String> {
    diffs
        .iter()
        .filter(|d| d.flag.needs_pixel_hash())
        .map(|d| d.filename.clone())
        .collect()
}

/// Phase two: settle the final classification using pixel hashes.
///
/// Changed and new files without an entry in `pixel_hashes` (their pixel
/// hash failed) are left out of the result.
pub fn flag_pixel_changes(
    manifest: &Manifest,
    diffs: Vec<ContentDiff>,
    mut pixel_hashes: HashMap<String, HexDigest>,
) -> Vec<LiveFile> {
    diffs
        .into_iter()
        .filter_map(|diff| {
            let (pixel_hash, classification) = match diff.flag {
                ContentFlag::Identical => (None, Classification::Identical),
                ContentFlag::New => {
                    let pixel = pixel_hashes.remove(&diff.filename)?;
                    (Some(pixel), Classification::New)
                }
                ContentFlag::Changed => {
                    let pixel = pixel_hashes.remove(&diff.filename)?;
                    let same_pixels = manifest
                        .get(&diff.filename)
                        .map_or(false, |entry| entry.pixel_hash == pixel);
                    let classification = if same_pixels {
                        Classification::ChangedMetadata
                    } else {
                        Classification::ChangedPixeldata
                    };
                    (Some(pixel), classification)
                }
            };
            Some(LiveFile {
                filename: diff.filename,
                content_hash: diff.content_hash,
                pixel_hash,
                classification,
            })
        })
        .collect()
}

/// Manifest entries with no corresponding live file
pub fn find_missing(manifest: &Manifest, live: &BTreeSet<String>) -> BTreeSet<String> {
    manifest
        .filenames()
        .filter(|name| !live.contains(*name))
        .map(str::to_string)
        .collect()
}

/// Per-file report lines for live and missing files, sorted by filename
pub fn report_lines(live: &[LiveFile], missing: &BTreeSet<String>) -> Vec<FileReport> {
    let mut lines: Vec<FileReport> = live
        .iter()
        .map(|f| FileReport {
            filename: f.filename.clone(),
            classification: f.classification,
        })
        .chain(missing.iter().map(|name| FileReport {
            filename: name.clone(),
            classification: Classification::Missing,
        }))
        .collect();
    lines.sort_by(|a, b| a.filename.cmp(&b.filename));
    lines
}
