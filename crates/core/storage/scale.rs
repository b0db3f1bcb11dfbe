//! On-disk scale files of one time bucket.

use super::{ScaleStore, check_scale};
use crate::error::{GeochromeError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File name of the nodes of `scale`.
pub fn scale_file_name(scale: usize) -> String {
    format!("scale-{scale:03}.bin")
}

/// One read/write handle per scale inside `<root>/<key>/`.
#[derive(Debug)]
pub struct ScaleFileSet {
    key: i64,
    dir: PathBuf,
    files: Vec<File>,
}

impl ScaleFileSet {
    /// Opens the scale files of bucket `key`, creating the directory and any
    /// missing file.
    pub fn open<P: AsRef<Path>>(root: P, key: i64, depth: usize) -> Result<Self> {
        let dir = super::bucket::bucket_dir(root, key);
        fs::create_dir_all(&dir).map_err(|source| GeochromeError::IoAccess {
            path: dir.clone(),
            source,
        })?;

        let mut files = Vec::with_capacity(depth);
        for scale in 0..depth {
            let path = dir.join(scale_file_name(scale));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|source| GeochromeError::IoAccess { path, source })?;
            files.push(file);
        }

        log::debug!("Opened bucket {} with {} scale files", key, depth);
        Ok(Self { key, dir, files })
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn seek(&mut self, scale: usize, offset: u64) -> Result<&mut File> {
        check_scale(scale, self.files.len())?;
        let file = &mut self.files[scale];
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| GeochromeError::IoSeek { offset, source })?;
        Ok(file)
    }
}

impl ScaleStore for ScaleFileSet {
    fn depth(&self) -> usize {
        self.files.len()
    }

    fn scale_len(&self, scale: usize) -> Result<u64> {
        check_scale(scale, self.files.len())?;
        let metadata = self.files[scale]
            .metadata()
            .map_err(|source| GeochromeError::IoAccess {
                path: self.dir.join(scale_file_name(scale)),
                source,
            })?;
        Ok(metadata.len())
    }

    fn read_at(&mut self, scale: usize, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek(scale, offset)?
            .read_exact(buf)
            .map_err(|source| GeochromeError::IoRead { offset, source })
    }

    fn write_at(&mut self, scale: usize, offset: u64, bytes: &[u8]) -> Result<()> {
        self.seek(scale, offset)?
            .write_all(bytes)
            .map_err(|source| GeochromeError::IoWrite { offset, source })
    }

    fn flush(&mut self) -> Result<()> {
        for file in &mut self.files {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{COLOR_NODE_LEN, Node, NodeKind, Offset, Sample};
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let files = ScaleFileSet::open(dir.path(), 12, 3).unwrap();

        assert_eq!(files.depth(), 3);
        assert_eq!(files.key(), 12);
        for scale in 0..3 {
            assert!(dir.path().join("12").join(scale_file_name(scale)).is_file());
            assert_eq!(files.scale_len(scale).unwrap(), 0);
        }
        assert_eq!(scale_file_name(7), "scale-007.bin");
    }

    #[test]
    fn test_nodes_persist_across_handles() {
        let dir = TempDir::new().unwrap();
        let mut node = Node::create(Sample::Color([9, 8, 7])).unwrap();
        node.set_offset(3, Some(Offset::new(0).unwrap()));

        {
            let mut files = ScaleFileSet::open(dir.path(), -4, 2).unwrap();
            files.write_node(0, 0, &node).unwrap();
            files.flush().unwrap();
        }

        let mut files = ScaleFileSet::open(dir.path(), -4, 2).unwrap();
        assert_eq!(files.scale_len(0).unwrap(), COLOR_NODE_LEN as u64);
        assert_eq!(files.read_node(0, 0, NodeKind::Color).unwrap(), Some(node));
        assert_eq!(
            files.read_slot(0, 0, NodeKind::Color, 3).unwrap(),
            Some(Offset::new(0).unwrap())
        );
        assert!(files.read_node(1, 0, NodeKind::Color).unwrap().is_none());
    }

    #[test]
    fn test_link_node_reads_only_used_links() {
        let dir = TempDir::new().unwrap();
        let mut files = ScaleFileSet::open(dir.path(), 0, 1).unwrap();

        let mut node = Node::create(Sample::Link(11)).unwrap();
        node.append_link(12).unwrap();
        files.write_node(0, 0, &node).unwrap();

        assert_eq!(files.read_node(0, 0, NodeKind::Link).unwrap(), Some(node));
    }
}
