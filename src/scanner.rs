//! Scanner module - builds the set of files and directories to check

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

use crate::config::CheckConfig;
use crate::error::{PintError, Result};
use crate::manifest::is_storable_name;

/// List eligible images directly inside `dir`, sorted by filename.
///
/// Only regular files (or symlinks to them) whose extension is whitelisted
/// are returned. Names that cannot be stored in a manifest are skipped with
/// a warning.
pub fn list_images(dir: &Path, config: &CheckConfig) -> Result<BTreeSet<String>> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut names = BTreeSet::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        let path = entry.path();
        if !is_regular_file(&entry) {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !config.should_include_extension(extension) {
            continue;
        }

        match entry.file_name().to_str() {
            Some(name) if is_storable_name(name) => {
                names.insert(name.to_string());
            }
            _ => warn!("Skipping {:?}: name cannot be stored in a manifest", path),
        }
    }

    Ok(names)
}

/// Regular files, and symlinks resolving to regular files
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    if !file_type.is_symlink() {
        return file_type.is_file();
    }
    match std::fs::metadata(entry.path()) {
        Ok(meta) => meta.is_file(),
        Err(e) => {
            warn!("Skipping {:?}: cannot resolve link: {}", entry.path(), e);
            false
        }
    }
}

/// Directories a run visits: the root alone, or the root and every
/// sub-directory in sorted order when recursive.
pub fn list_directories(root: &Path, recursive: bool, config: &CheckConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PintError::not_found(root.to_path_buf()));
    }
    if !recursive {
        return Ok(vec![root.to_path_buf()]);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || e
                    .file_name()
                    .to_str()
                    .map_or(true, |name| !config.should_ignore_dir(name))
        });

    let mut dirs = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.into_path()),
            Ok(_) => {}
            // An unreadable sub-directory fails its own pass later, not the listing
            Err(e) if e.depth() > 0 => {
                if let Some(path) = e.path() {
                    warn!("Cannot descend into {:?}: {}", path, e);
                    if e.io_error().is_some() && path.is_dir() {
                        dirs.push(path.to_path_buf());
                    }
                }
            }
            Err(e) => return Err(walk_error(root, e)),
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn walk_error(dir: &Path, err: walkdir::Error) -> PintError {
    let path = err.path().unwrap_or(dir).to_path_buf();
    match err.into_io_error() {
        Some(io) => PintError::io(path, "list directory", io),
        None => PintError::new(
            crate::error::PintErrorKind::Io,
            Some(path),
            "list directory: filesystem loop",
        ),
    }
}
