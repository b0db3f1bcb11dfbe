//! In-memory scale storage.

use super::{ScaleStore, check_scale};
use crate::error::{GeochromeError, Result};
use std::io::ErrorKind;

/// Scales held in plain byte vectors. Used for tests and benchmarks, and for
/// building a tree before it is known whether it is worth persisting.
#[derive(Debug, Clone, Default)]
pub struct MemoryScales {
    scales: Vec<Vec<u8>>,
}

impl MemoryScales {
    pub fn new(depth: usize) -> Self {
        Self {
            scales: vec![Vec::new(); depth],
        }
    }

    /// Total bytes over every scale.
    pub fn size_bytes(&self) -> usize {
        self.scales.iter().map(Vec::len).sum()
    }
}

impl ScaleStore for MemoryScales {
    fn depth(&self) -> usize {
        self.scales.len()
    }

    fn scale_len(&self, scale: usize) -> Result<u64> {
        check_scale(scale, self.depth())?;
        Ok(self.scales[scale].len() as u64)
    }

    fn read_at(&mut self, scale: usize, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_scale(scale, self.depth())?;
        let data = &self.scales[scale];
        let start = offset as usize;
        let source = start
            .checked_add(buf.len())
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| GeochromeError::IoRead {
                offset,
                source: ErrorKind::UnexpectedEof.into(),
            })?;
        buf.copy_from_slice(source);
        Ok(())
    }

    fn write_at(&mut self, scale: usize, offset: u64, bytes: &[u8]) -> Result<()> {
        check_scale(scale, self.depth())?;
        let data = &mut self.scales[scale];
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind, Offset, Sample};

    #[test]
    fn test_absent_node_past_end() {
        let mut store = MemoryScales::new(2);
        assert!(store.read_node(0, 0, NodeKind::Color).unwrap().is_none());

        let node = Node::create(Sample::Color([1, 2, 3])).unwrap();
        store.write_node(0, 0, &node).unwrap();
        assert_eq!(store.read_node(0, 0, NodeKind::Color).unwrap(), Some(node));
        assert!(store.read_node(0, 44, NodeKind::Color).unwrap().is_none());
    }

    #[test]
    fn test_detached_slot_access() {
        let mut store = MemoryScales::new(2);
        let node = Node::create(Sample::Link(4)).unwrap();
        store.write_node(1, 0, &node).unwrap();

        let target = Offset::new(900).unwrap();
        store.write_slot(1, 0, NodeKind::Link, 6, Some(target)).unwrap();
        assert_eq!(store.read_slot(1, 0, NodeKind::Link, 6).unwrap(), Some(target));
        assert_eq!(store.read_slot(1, 0, NodeKind::Link, 5).unwrap(), None);

        let stored = store.read_node(1, 0, NodeKind::Link).unwrap().unwrap();
        assert_eq!(stored.get_offset(6), Some(target));
    }

    #[test]
    fn test_truncated_node_is_read_error() {
        let mut store = MemoryScales::new(1);
        store.write_at(0, 0, &[0u8; 10]).unwrap();
        assert!(matches!(
            store.read_node(0, 0, NodeKind::Color),
            Err(GeochromeError::IoRead { .. })
        ));
    }

    #[test]
    fn test_scale_out_of_range() {
        let mut store = MemoryScales::new(1);
        assert!(store.scale_len(1).is_err());
        assert!(store.write_at(3, 0, &[1]).is_err());
    }
}
