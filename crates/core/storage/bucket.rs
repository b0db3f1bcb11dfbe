//! Time buckets.
//!
//! A bucket is the directory `<root>/<key>` with `key = floor(time / width)`.
//! Buckets are created on first write and never removed, so the set of keys
//! is read straight from the directory listing.

use crate::error::{GeochromeError, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bucket holding events at `time`.
pub fn bucket_key(time: i64, width: i64) -> i64 {
    time.div_euclid(width)
}

/// First second covered by bucket `key`.
pub fn bucket_start(key: i64, width: i64) -> i64 {
    key.saturating_mul(width)
}

pub fn bucket_dir<P: AsRef<Path>>(root: P, key: i64) -> PathBuf {
    root.as_ref().join(key.to_string())
}

/// Keys of every bucket under `root`. Entries that are not directories with
/// an integer name are skipped.
pub fn list_buckets<P: AsRef<Path>>(root: P) -> Result<BTreeSet<i64>> {
    let root = root.as_ref();
    let access = |source: std::io::Error| GeochromeError::IoAccess {
        path: root.to_path_buf(),
        source,
    };

    let mut keys = BTreeSet::new();
    for entry in fs::read_dir(root).map_err(access)? {
        let entry = entry.map_err(access)?;
        if !entry.file_type().map_err(access)?.is_dir() {
            continue;
        }
        if let Some(key) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
            keys.insert(key);
        }
    }
    Ok(keys)
}

/// Key closest to `target`. On a tie the smaller key wins.
pub fn nearest_bucket(keys: &BTreeSet<i64>, target: i64) -> Option<i64> {
    let mut best: Option<(i64, u64)> = None;
    for &key in keys {
        let distance = key.abs_diff(target);
        if best.is_none_or(|(_, closest)| distance < closest) {
            best = Some((key, distance));
        }
    }
    best.map(|(key, _)| key)
}

/// Per-bucket reader/writer locks shared by every session of an index.
///
/// An insertion walk holds the write side of its bucket, a query descent
/// the read side. Walks on different buckets never contend.
#[derive(Debug, Default)]
pub struct BucketLocks {
    locks: DashMap<i64, Arc<RwLock<()>>>,
}

impl BucketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: i64) -> Arc<RwLock<()>> {
        self.locks.entry(key).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
