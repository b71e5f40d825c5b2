//! Parallel hash coordinator
//!
//! Fans a batch of filenames out over a fixed-size rayon pool and blocks
//! until every file has a result. Results come back in input order, each
//! paired with the filename it belongs to.

use std::path::Path;

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::Result;
use crate::hasher::FileHasher;
use crate::models::HexDigest;

/// Which digest to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Content,
    Pixel,
}

/// Result of hashing one file
#[derive(Debug)]
pub struct HashOutcome {
    pub filename: String,
    pub result: Result<HexDigest>,
}

/// Runs hashing batches on a dedicated worker pool
pub struct HashCoordinator {
    pool: ThreadPool,
    hasher: FileHasher,
}

impl HashCoordinator {
    /// Create a coordinator with `num_threads` workers
    pub fn new(num_threads: usize, hasher: FileHasher) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("pint-hash-{}", i))
            .build()?;
        Ok(Self { pool, hasher })
    }

    /// Number of workers in the pool
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Hash every file in `filenames` (relative to `dir`).
    ///
    /// Returns one outcome per input, in input order. A failure is reported
    /// for its own file and does not stop the rest of the batch.
    pub fn hash_all(&self, dir: &Path, filenames: &[String], kind: HashKind) -> Vec<HashOutcome> {
        if filenames.is_empty() {
            return Vec::new();
        }
        debug!(
            "Computing {} {:?} hashes in {:?}",
            filenames.len(),
            kind,
            dir
        );

        let hasher = &self.hasher;
        self.pool.install(|| {
            filenames
                .par_iter()
                .map(|filename| {
                    let path = dir.join(filename);
                    let result = match kind {
                        HashKind::Content => hasher.content_hash(&path),
                        HashKind::Pixel => hasher.pixel_hash(&path),
                    };
                    HashOutcome {
                        filename: filename.clone(),
                        result,
                    }
                })
                .collect()
        })
    }
}
