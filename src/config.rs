//! Configuration for the integrity checker

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{PintError, Result};

/// Default manifest file name, stored inside each checked directory
pub const DEFAULT_MANIFEST_NAME: &str = ".pint.txt";

/// Default number of hashing workers
pub const DEFAULT_NUM_THREADS: usize = 4;

/// Default read block size for content hashing (128 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024;

/// What a run does with its target path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Check a single file against its parent directory's manifest
    File,
    /// Check one directory, or a directory tree when recursive
    Directory,
    /// Only add files missing from the manifest, no verification
    NewOnly,
}

/// Configuration for a check run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// File or directory to check
    pub target: PathBuf,

    /// Process every sub-directory of the target as well
    pub recursive: bool,

    /// Persist the merged manifest after each directory pass
    pub update: bool,

    /// Only hash and add new files (implies an update)
    pub new_only: bool,

    /// Number of hashing workers
    /// 0 means auto-detect (CPU cores)
    pub num_threads: usize,

    /// Read block size for content hashing
    pub block_size: usize,

    /// Manifest file name inside each directory
    pub manifest_name: String,

    /// Eligible image extensions (lowercase, without dot)
    pub extensions: HashSet<String>,

    /// Directory names skipped during recursion
    pub ignore_dirs: HashSet<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            target: PathBuf::from("."),
            recursive: false,
            update: false,
            new_only: false,
            num_threads: DEFAULT_NUM_THREADS,
            block_size: DEFAULT_BLOCK_SIZE,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            extensions: Self::default_extensions(),
            ignore_dirs: Self::default_ignore_dirs(),
        }
    }
}

impl CheckConfig {
    /// Create a new config for the given target
    pub fn new(target: PathBuf) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> CheckConfigBuilder {
        CheckConfigBuilder::new()
    }

    /// Get the default image extensions
    pub fn default_extensions() -> HashSet<String> {
        ["jpg"].iter().map(|s| s.to_string()).collect()
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        [
            "$RECYCLE.BIN",
            "System Volume Information",
            "@eaDir",
            "node_modules",
            "__pycache__",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Check if an extension should be included
    pub fn should_include_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&ext.to_lowercase())
    }

    /// Check if a directory should be ignored
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        // Hidden directories (.git, .Trash, ...)
        if name.starts_with('.') {
            return true;
        }
        self.ignore_dirs.contains(name)
    }

    /// Get the effective number of threads
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(DEFAULT_NUM_THREADS)
        } else {
            self.num_threads
        }
    }

    /// Validate the target and flag combination and return the run mode
    pub fn validate(&self) -> Result<RunMode> {
        if self.target.is_dir() {
            if self.new_only {
                Ok(RunMode::NewOnly)
            } else {
                Ok(RunMode::Directory)
            }
        } else if self.target.is_file() {
            if self.new_only {
                return Err(PintError::invalid_argument(
                    Some(self.target.clone()),
                    "path must be a directory when using --new-only",
                ));
            }
            if self.recursive {
                return Err(PintError::invalid_argument(
                    Some(self.target.clone()),
                    "path must be a directory when using --recursive",
                ));
            }
            Ok(RunMode::File)
        } else {
            Err(PintError::not_found(self.target.clone()))
        }
    }
}

/// Builder for CheckConfig
#[derive(Debug, Default)]
pub struct CheckConfigBuilder {
    config: CheckConfig,
}

impl CheckConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target file or directory
    pub fn target(mut self, target: PathBuf) -> Self {
        self.config.target = target;
        self
    }

    /// Enable or disable recursion into sub-directories
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.config.recursive = enabled;
        self
    }

    /// Enable or disable manifest updates
    pub fn update(mut self, enabled: bool) -> Self {
        self.config.update = enabled;
        self
    }

    /// Enable or disable new-only mode
    pub fn new_only(mut self, enabled: bool) -> Self {
        self.config.new_only = enabled;
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the content hashing block size
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size.max(1);
        self
    }

    /// Set the manifest file name
    pub fn manifest_name(mut self, name: impl Into<String>) -> Self {
        self.config.manifest_name = name.into();
        self
    }

    /// Set the extensions whitelist
    pub fn extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.extensions = extensions
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();
        self
    }

    /// Add a directory to ignore
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.ignore_dirs.insert(dir.into());
        self
    }

    /// Build the config
    pub fn build(self) -> CheckConfig {
        self.config
    }
}
