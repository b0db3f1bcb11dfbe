//! Time-bucketed index over a root directory.
//!
//! ```text
//! <root>/system                 depth and bucket width
//! <root>/<key>/scale-000.bin    root node of bucket `key`
//! <root>/<key>/scale-NNN.bin    nodes of scale NNN
//! ```
//!
//! An [`Index`] is shared between workers; each worker opens a [`Session`]
//! that caches the scale files of the bucket it last touched. Sessions of
//! the same index coordinate through per-bucket locks.

use crate::config::SystemConfig;
use crate::error::Result;
use crate::node::{NodeKind, Sample};
use crate::storage::{
    BucketLocks, ScaleFileSet, ScaleStore, bucket_key, bucket_start, list_buckets,
    nearest_bucket,
};
use geochrome_types::address::{MODE_FIRST, MODE_SECOND};
use geochrome_types::{Address, Record};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub mod insert;
pub mod query;

pub use query::{Gather, Representative};

#[derive(Debug)]
pub struct Index {
    root: PathBuf,
    config: SystemConfig,
    kind: NodeKind,
    locks: BucketLocks,
}

impl Index {
    /// Opens an existing index, reading `<root>/system`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = SystemConfig::load(&root)?;
        log::info!(
            "Opened index at {} (depth {}, bucket width {}s)",
            root.display(),
            config.depth(),
            config.bucket_width()
        );
        Ok(Self::with_config(root, config))
    }

    /// Creates the root directory and writes `config` to it, replacing any
    /// previous configuration.
    pub fn create<P: AsRef<Path>>(root: P, config: SystemConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if let Ok(previous) = SystemConfig::load(&root) {
            if previous != config {
                log::warn!(
                    "Replacing configuration of {} ({:?} -> {:?}); existing buckets keep \
                    their old layout",
                    root.display(),
                    previous,
                    config
                );
            }
        }
        config.store(&root)?;
        Ok(Self::with_config(root, config))
    }

    fn with_config(root: PathBuf, config: SystemConfig) -> Self {
        Self {
            root,
            config,
            kind: NodeKind::default(),
            locks: BucketLocks::new(),
        }
    }

    /// Selects the node variant of the scale files.
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> SystemConfig {
        self.config
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn session(&self) -> Session<'_> {
        Session {
            index: self,
            files: None,
        }
    }

    pub fn list_buckets(&self) -> Result<BTreeSet<i64>> {
        list_buckets(&self.root)
    }

    /// Start times of every bucket, ascending.
    pub fn times(&self) -> Result<Vec<i64>> {
        let width = self.config.bucket_width();
        Ok(self
            .list_buckets()?
            .into_iter()
            .map(|key| bucket_start(key, width))
            .collect())
    }

    /// Bucket closest to `time`, if any exists.
    pub fn nearest_bucket(&self, time: i64) -> Result<Option<i64>> {
        let keys = self.list_buckets()?;
        Ok(nearest_bucket(
            &keys,
            bucket_key(time, self.config.bucket_width()),
        ))
    }
}

/// Per-worker access to an [`Index`].
#[derive(Debug)]
pub struct Session<'a> {
    index: &'a Index,
    files: Option<ScaleFileSet>,
}

impl<'a> Session<'a> {
    pub fn index(&self) -> &'a Index {
        self.index
    }

    /// Scale files of the bucket holding `time`.
    pub fn open(&mut self, time: i64) -> Result<&mut ScaleFileSet> {
        self.open_bucket(bucket_key(time, self.index.config.bucket_width()))
    }

    /// Scale files of bucket `key`. Handles of another bucket are dropped
    /// without being flushed.
    pub fn open_bucket(&mut self, key: i64) -> Result<&mut ScaleFileSet> {
        let files = match self.files.take() {
            Some(files) if files.key() == key => files,
            previous => {
                drop(previous);
                ScaleFileSet::open(&self.index.root, key, self.index.config.depth())?
            }
        };
        Ok(self.files.insert(files))
    }

    /// Key of the bucket currently open.
    pub fn current_bucket(&self) -> Option<i64> {
        self.files.as_ref().map(ScaleFileSet::key)
    }

    pub fn insert(&mut self, pose: [f64; 3], time: i64, sample: Sample) -> Result<()> {
        let key = bucket_key(time, self.index.config.bucket_width());
        let address = Address::from_pose(pose, self.index.config.depth());
        let kind = self.index.kind;

        let lock = self.index.locks.get(key);
        let _guard = lock.write();
        let files = self.open_bucket(key)?;
        insert::insert(files, kind, &address, sample)
    }

    pub fn insert_record(&mut self, record: &Record) -> Result<()> {
        self.insert(record.pose, record.time, Sample::Color(record.color))
    }

    /// Runs the query for each time selected by the address mode.
    ///
    /// Each selected time is snapped to the start of the nearest existing
    /// bucket and written back into the address. A time with no bucket to
    /// snap to contributes nothing. Returns the number of cells gathered.
    pub fn query<G: Gather + ?Sized>(&mut self, address: &mut Address, sink: &mut G) -> Result<usize> {
        let width = self.index.config.bucket_width();
        let keys = self.index.list_buckets()?;

        let mut found = 0;
        for (time_index, bit) in [(0, MODE_FIRST), (1, MODE_SECOND)] {
            if address.mode() & bit == 0 {
                continue;
            }
            let target = bucket_key(address.time(time_index), width);
            let Some(key) = nearest_bucket(&keys, target) else {
                continue;
            };
            address.set_time(time_index, bucket_start(key, width));
            found += self.gather(address, time_index, key, sink)?;
        }
        Ok(found)
    }

    /// Runs the query walk over bucket `key` alone.
    pub fn gather<G: Gather + ?Sized>(
        &mut self,
        address: &mut Address,
        time_index: usize,
        key: i64,
        sink: &mut G,
    ) -> Result<usize> {
        let kind = self.index.kind;
        let lock = self.index.locks.get(key);
        let _guard = lock.read();
        let files = self.open_bucket(key)?;
        query::query(files, kind, address, time_index, sink)
    }

    pub fn flush(&mut self) -> Result<()> {
        match self.files.as_mut() {
            Some(files) => files.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Payload;
    use tempfile::TempDir;

    fn index(dir: &TempDir) -> Index {
        Index::create(dir.path(), SystemConfig::new(3, 3600).unwrap()).unwrap()
    }

    #[test]
    fn test_open_reads_system_file() {
        let dir = TempDir::new().unwrap();
        index(&dir);

        let reopened = Index::open(dir.path()).unwrap();
        assert_eq!(reopened.config().depth(), 3);
        assert_eq!(reopened.config().bucket_width(), 3600);
        assert!(reopened.times().unwrap().is_empty());
    }

    #[test]
    fn test_session_caches_one_bucket() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        let mut session = index.session();

        assert_eq!(session.open(100).unwrap().key(), 0);
        assert_eq!(session.open(3599).unwrap().key(), 0);
        assert_eq!(session.open(-1).unwrap().key(), -1);
        assert_eq!(session.current_bucket(), Some(-1));

        assert_eq!(index.list_buckets().unwrap().len(), 2);
        assert_eq!(index.times().unwrap(), vec![-3600, 0]);
    }

    #[test]
    fn test_query_snaps_times() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        let mut session = index.session();
        let pose = [0.1, 0.2, 10.0];

        session.insert_record(&Record::new(pose, 100, [1, 2, 3])).unwrap();
        session
            .insert_record(&Record::new(pose, 10 * 3600 + 5, [7, 8, 9]))
            .unwrap();

        let mut address = Address::from_pose(pose, 2)
            .with_mode(MODE_FIRST | MODE_SECOND)
            .with_time(0, 3 * 3600)
            .with_time(1, 8 * 3600);
        let mut found = Vec::new();
        assert_eq!(session.query(&mut address, &mut found).unwrap(), 2);

        assert_eq!(address.time(0), 0);
        assert_eq!(address.time(1), 10 * 3600);
        assert_eq!(found[0].time, 0);
        assert_eq!(found[0].payload, Payload::Color { rgb: [1, 2, 3], count: 1 });
        assert_eq!(found[1].payload, Payload::Color { rgb: [7, 8, 9], count: 1 });
    }

    #[test]
    fn test_query_without_buckets() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        let mut address = Address::new().with_time(0, 1234);

        let mut found = Vec::new();
        assert_eq!(index.session().query(&mut address, &mut found).unwrap(), 0);
        assert_eq!(address.time(0), 1234);
    }

    #[test]
    fn test_nearest_bucket_by_time() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        let mut session = index.session();
        for key in [10, 20, 30] {
            session.open_bucket(key).unwrap();
        }

        assert_eq!(index.nearest_bucket(22 * 3600).unwrap(), Some(20));
        assert_eq!(index.nearest_bucket(15 * 3600).unwrap(), Some(10));
    }
}
