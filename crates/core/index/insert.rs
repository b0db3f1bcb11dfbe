//! Insertion walk.
//!
//! A sample is folded into one node per scale, from the root down along
//! the digits of its address. Missing nodes are created, and a missing
//! child is allocated at the current end of the next scale, where the walk
//! writes it on its next step.

use crate::error::{GeochromeError, Result};
use crate::node::{Node, NodeKind, Offset, Sample};
use crate::storage::ScaleStore;
use geochrome_types::Address;

/// Folds `sample` into every scale of `store` along `address`.
///
/// A link node that outgrows the space it was written in moves to the end
/// of its scale and its parent slot is patched. The root is alone in its
/// scale and grows in place.
pub fn insert<S: ScaleStore>(
    store: &mut S,
    kind: NodeKind,
    address: &Address,
    sample: Sample,
) -> Result<()> {
    if sample.kind() != kind {
        return Err(GeochromeError::InvalidInput(format!(
            "{:?} sample inserted into a {:?} index",
            sample.kind(),
            kind
        )));
    }

    let depth = store.depth();
    let mut offset = 0u64;
    let mut parent: Option<(usize, u64, u8)> = None;

    for scale in 0..depth {
        let digit = address.digit(scale);

        let (mut node, stored_len) = match store.read_node(scale, offset, kind)? {
            Some(mut node) => {
                let stored_len = node.encoded_len();
                node.accumulate(sample)?;
                (node, Some(stored_len))
            }
            None => (Node::create(sample)?, None),
        };

        if scale + 1 < depth && node.get_offset(digit).is_none() {
            let end = store.scale_len(scale + 1)?;
            node.set_offset(digit, Some(Offset::new(end)?));
        }

        let mut at = offset;
        if let Some(stored_len) = stored_len {
            let scale_len = store.scale_len(scale)?;
            if node.encoded_len() > stored_len && offset + stored_len as u64 != scale_len {
                at = scale_len;
                if let Some((parent_scale, parent_offset, parent_digit)) = parent {
                    store.write_slot(
                        parent_scale,
                        parent_offset,
                        kind,
                        parent_digit,
                        Some(Offset::new(at)?),
                    )?;
                }
                log::debug!(
                    "Relocated scale {} node from {} to {} ({} bytes)",
                    scale,
                    offset,
                    at,
                    node.encoded_len()
                );
            }
        }

        store.write_node(scale, at, &node)?;
        parent = Some((scale, at, digit));

        match node.get_offset(digit) {
            Some(next) => offset = next.get(),
            None => break,
        }
    }

    Ok(())
}
