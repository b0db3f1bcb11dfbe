//! Storage layer for the index.
//!
//! Nodes of scale `k` live in their own append-only byte space, addressed
//! by offset. [`ScaleStore`] abstracts those spaces so the tree walks run
//! unchanged over the on-disk [`ScaleFileSet`] and the in-memory
//! [`MemoryScales`].

use crate::error::{GeochromeError, Result};
use crate::node::{self, LINK_HEADER_LEN, Node, NodeKind, Offset, SLOT_LEN};

pub mod bucket;
mod memory;
pub mod scale;

pub use bucket::{BucketLocks, bucket_key, bucket_start, list_buckets, nearest_bucket};
pub use memory::MemoryScales;
pub use scale::ScaleFileSet;

/// One byte space per scale.
///
/// Implementors provide raw positioned I/O; node and slot access is built
/// on top of it.
pub trait ScaleStore {
    /// Number of scales.
    fn depth(&self) -> usize;

    /// Current length of a scale, which is also where the next node goes.
    fn scale_len(&self, scale: usize) -> Result<u64>;

    /// Fills `buf` from `offset`. Reading past the end is an error.
    fn read_at(&mut self, scale: usize, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `bytes` at `offset`, extending the scale if needed.
    fn write_at(&mut self, scale: usize, offset: u64, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Reads the node at `offset`, or `None` when the offset is at or past
    /// the end of the scale.
    fn read_node(&mut self, scale: usize, offset: u64, kind: NodeKind) -> Result<Option<Node>> {
        if offset >= self.scale_len(scale)? {
            return Ok(None);
        }

        let mut bytes = vec![0u8; kind.header_len()];
        self.read_at(scale, offset, &mut bytes)?;

        if kind == NodeKind::Link {
            let count = node::read_u40(&bytes) as usize;
            if count > 0 {
                bytes.resize(LINK_HEADER_LEN + count * SLOT_LEN, 0);
                self.read_at(
                    scale,
                    offset + LINK_HEADER_LEN as u64,
                    &mut bytes[LINK_HEADER_LEN..],
                )?;
            }
        }

        Node::decode(kind, &bytes).map(Some)
    }

    fn write_node(&mut self, scale: usize, offset: u64, node: &Node) -> Result<()> {
        self.write_at(scale, offset, &node.encode())
    }

    /// Reads one slot without decoding the rest of the node.
    fn read_slot(
        &mut self,
        scale: usize,
        offset: u64,
        kind: NodeKind,
        digit: u8,
    ) -> Result<Option<Offset>> {
        let mut raw = [0u8; SLOT_LEN];
        self.read_at(scale, offset + kind.slot_position(digit) as u64, &mut raw)?;
        Ok(node::decode_slot(&raw))
    }

    /// Patches one slot of a stored node.
    fn write_slot(
        &mut self,
        scale: usize,
        offset: u64,
        kind: NodeKind,
        digit: u8,
        slot: Option<Offset>,
    ) -> Result<()> {
        self.write_at(
            scale,
            offset + kind.slot_position(digit) as u64,
            &node::encode_slot(slot),
        )
    }
}

fn check_scale(scale: usize, depth: usize) -> Result<()> {
    if scale >= depth {
        return Err(GeochromeError::InvalidInput(format!(
            "scale {scale} outside depth {depth}"
        )));
    }
    Ok(())
}
