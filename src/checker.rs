//! Checker module - runs passes over directories and files
//!
//! A pass loads the directory's manifest, scans the eligible images, hashes
//! their content, classifies them, hashes pixels for the new and changed
//! ones, and finally (when requested) writes the merged manifest. The
//! manifest is only written when every file in the pass hashed cleanly.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::config::{CheckConfig, RunMode};
use crate::coordinator::{HashCoordinator, HashKind, HashOutcome};
use crate::diff;
use crate::error::{PintError, Result};
use crate::hasher::FileHasher;
use crate::manifest::{is_storable_name, Manifest, ManifestStore};
use crate::models::{Classification, DirectoryFailure, HexDigest, LiveFile, PassReport, RunSummary};
use crate::scanner;
use crate::update;

/// Drives check passes according to a `CheckConfig`
pub struct Checker {
    config: CheckConfig,
    store: ManifestStore,
    coordinator: HashCoordinator,
}

impl Checker {
    /// Create a checker decoding images with the `image` crate
    pub fn new(config: CheckConfig) -> Result<Self> {
        let hasher = FileHasher::new(config.block_size);
        Self::with_hasher(config, hasher)
    }

    /// Create a checker with a custom hasher
    pub fn with_hasher(config: CheckConfig, hasher: FileHasher) -> Result<Self> {
        let coordinator = HashCoordinator::new(config.effective_threads(), hasher)?;
        let store = ManifestStore::new(config.manifest_name.clone());
        Ok(Self {
            config,
            store,
            coordinator,
        })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Run the configured check.
    ///
    /// Invalid options fail the whole run. A failure inside one directory is
    /// recorded in the summary and the next directory is still attempted.
    pub fn run(&self) -> Result<RunSummary> {
        let mode = self.config.validate()?;
        let target = self
            .config
            .target
            .canonicalize()
            .map_err(|e| PintError::io(self.config.target.clone(), "resolve target", e))?;

        let mut summary = RunSummary::new();
        if mode == RunMode::File {
            let dir = target
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            match self.check_file(&target) {
                Ok(report) => summary.passes.push(report),
                Err(e) => record_failure(&mut summary, dir, e),
            }
            return Ok(summary);
        }

        let dirs = scanner::list_directories(&target, self.config.recursive, &self.config)?;
        info!("Checking {} director(ies) under {:?}", dirs.len(), target);

        for dir in dirs {
            let result = match mode {
                RunMode::NewOnly => self.add_new_files(&dir),
                _ => self.check_directory(&dir),
            };
            match result {
                Ok(report) => summary.passes.push(report),
                Err(e) => record_failure(&mut summary, dir, e),
            }
        }

        Ok(summary)
    }

    /// Verify every eligible image in `dir` against the directory's manifest
    pub fn check_directory(&self, dir: &Path) -> Result<PassReport> {
        let start = Instant::now();
        let mut report = PassReport::new(dir.to_path_buf());

        let manifest = self.store.load(dir)?;
        let names = scanner::list_images(dir, &self.config)?;
        let missing = diff::find_missing(&manifest, &names);

        let name_list: Vec<String> = names.iter().cloned().collect();
        let live = self.classify(dir, &manifest, &name_list, &mut report);
        report.set_files(diff::report_lines(&live, &missing));

        if self.config.update {
            if names.is_empty() && manifest.is_empty() && !self.store.exists(dir) {
                debug!("No images and no manifest in {:?}, nothing to write", dir);
            } else {
                report.updated = self.persist(dir, &manifest, &live, &missing, &report)?;
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log_pass(&report);
        Ok(report)
    }

    /// Verify a single file against its parent directory's manifest.
    /// MISSING detection does not run in this mode.
    pub fn check_file(&self, path: &Path) -> Result<PassReport> {
        let start = Instant::now();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| is_storable_name(n))
            .ok_or_else(|| {
                PintError::invalid_path(path.to_path_buf(), "name cannot be stored in a manifest")
            })?
            .to_string();

        let mut report = PassReport::new(dir.clone());
        let manifest = self.store.load(&dir)?;
        let live = self.classify(&dir, &manifest, &[filename], &mut report);
        let missing = BTreeSet::new();
        report.set_files(diff::report_lines(&live, &missing));

        if self.config.update {
            report.updated = self.persist(&dir, &manifest, &live, &missing, &report)?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log_pass(&report);
        Ok(report)
    }

    /// Hash files absent from the manifest and add them, without verifying
    /// existing entries. The manifest is written only if something was added.
    pub fn add_new_files(&self, dir: &Path) -> Result<PassReport> {
        let start = Instant::now();
        let mut report = PassReport::new(dir.to_path_buf());

        let manifest = self.store.load(dir)?;
        let new_names: Vec<String> = scanner::list_images(dir, &self.config)?
            .into_iter()
            .filter(|name| !manifest.contains(name))
            .collect();

        if !new_names.is_empty() {
            let live = self.classify(dir, &manifest, &new_names, &mut report);
            report.set_files(diff::report_lines(&live, &BTreeSet::new()));
            if !live.is_empty() {
                report.updated = self.persist(dir, &manifest, &live, &BTreeSet::new(), &report)?;
                if report.updated {
                    info!("New files found in {:?}, added to manifest", dir);
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log_pass(&report);
        Ok(report)
    }

    /// Content phase, then pixel phase for new and changed files.
    /// Hashing failures are recorded on the report and their files skipped.
    fn classify(
        &self,
        dir: &Path,
        manifest: &Manifest,
        names: &[String],
        report: &mut PassReport,
    ) -> Vec<LiveFile> {
        let content = self.coordinator.hash_all(dir, names, HashKind::Content);
        let hashed = split_outcomes(content, &mut report.errors);
        let diffs = diff::flag_content_changes(manifest, hashed);

        let pending = diff::pending_pixel_hashes(&diffs);
        let pixels = self.coordinator.hash_all(dir, &pending, HashKind::Pixel);
        let pixel_hashes: HashMap<String, HexDigest> =
            split_outcomes(pixels, &mut report.errors).into_iter().collect();

        diff::flag_pixel_changes(manifest, diffs, pixel_hashes)
    }

    /// Write the merged manifest unless the pass had file errors
    fn persist(
        &self,
        dir: &Path,
        manifest: &Manifest,
        live: &[LiveFile],
        missing: &BTreeSet<String>,
        report: &PassReport,
    ) -> Result<bool> {
        if !report.is_success() {
            warn!(
                "Not updating manifest in {:?}: {} file(s) failed to hash",
                dir,
                report.errors.len()
            );
            return Ok(false);
        }
        let working = manifest.clone();
        update::write_update(&self.store, dir, working, live, missing)?;
        Ok(true)
    }
}

fn split_outcomes(outcomes: Vec<HashOutcome>, errors: &mut Vec<PintError>) -> Vec<(String, HexDigest)> {
    outcomes
        .into_iter()
        .filter_map(|outcome| match outcome.result {
            Ok(digest) => Some((outcome.filename, digest)),
            Err(e) => {
                warn!("{}: {}", outcome.filename, e);
                errors.push(e);
                None
            }
        })
        .collect()
}

fn record_failure(summary: &mut RunSummary, directory: PathBuf, error: PintError) {
    error!("Check failed for {:?}: {}", directory, error);
    summary.failures.push(DirectoryFailure { directory, error });
}

fn log_pass(report: &PassReport) {
    info!(
        "{:?}: {} identical, {} metadata, {} pixeldata, {} new, {} missing, {} error(s) in {}ms",
        report.directory,
        report.count(Classification::Identical),
        report.count(Classification::ChangedMetadata),
        report.count(Classification::ChangedPixeldata),
        report.count(Classification::New),
        report.count(Classification::Missing),
        report.errors.len(),
        report.duration_ms
    );
}
