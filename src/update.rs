//! Update writer: merges pass results into a manifest working copy

use std::collections::BTreeSet;
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::manifest::{Manifest, ManifestStore};
use crate::models::{Classification, LiveFile, ManifestEntry};

/// Apply classified files and missing names to a working copy.
/// Returns the number of entries that were inserted, changed or removed.
pub fn merge(working: &mut Manifest, live: &[LiveFile], missing: &BTreeSet<String>) -> usize {
    let mut mutations = 0;

    for file in live {
        match (file.classification, &file.pixel_hash) {
            (Classification::New, Some(pixel)) => {
                working.insert(
                    file.filename.clone(),
                    ManifestEntry {
                        content_hash: file.content_hash.clone(),
                        pixel_hash: pixel.clone(),
                    },
                );
                mutations += 1;
            }
            (Classification::ChangedMetadata, _) => {
                if let Some(entry) = working.get_mut(&file.filename) {
                    entry.content_hash = file.content_hash.clone();
                    mutations += 1;
                }
            }
            (Classification::ChangedPixeldata, Some(pixel)) => {
                if let Some(entry) = working.get_mut(&file.filename) {
                    entry.content_hash = file.content_hash.clone();
                    entry.pixel_hash = pixel.clone();
                    mutations += 1;
                }
            }
            _ => {}
        }
    }

    for name in missing {
        if working.remove(name).is_some() {
            debug!("Dropping missing file {} from manifest", name);
            mutations += 1;
        }
    }

    mutations
}

/// Merge into `working` and persist it through the store
pub fn write_update(
    store: &ManifestStore,
    dir: &Path,
    mut working: Manifest,
    live: &[LiveFile],
    missing: &BTreeSet<String>,
) -> Result<Manifest> {
    let mutations = merge(&mut working, live, missing);
    debug!("{} manifest mutations for {:?}", mutations, dir);
    store.save(dir, &working)?;
    Ok(working)
}
