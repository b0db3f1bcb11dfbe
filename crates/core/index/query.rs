//! Query walk.
//!
//! The walk descends along the first `size` digits of an address, then
//! fans out over every existing child for `span` more scales. Each node
//! reached at scale `size + span` yields one [`Representative`].

use crate::buffer::Buffer;
use crate::error::{GeochromeError, Result};
use crate::node::{NodeKind, Payload};
use crate::storage::ScaleStore;
use geochrome_types::{Address, Record};

/// One cell returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Representative {
    /// Center of the cell.
    pub pose: [f64; 3],
    pub time: i64,
    pub payload: Payload,
}

impl Representative {
    /// Point record of a color cell; `None` for link cells.
    pub fn to_record(&self) -> Option<Record> {
        match self.payload {
            Payload::Color { rgb, .. } => Some(Record::new(self.pose, self.time, rgb)),
            Payload::Links(_) => None,
        }
    }
}

/// Receiver of query results.
pub trait Gather {
    fn gather(&mut self, representative: Representative) -> Result<()>;
}

impl Gather for Vec<Representative> {
    fn gather(&mut self, representative: Representative) -> Result<()> {
        self.push(representative);
        Ok(())
    }
}

/// Packs color cells as point records.
impl Gather for Buffer {
    fn gather(&mut self, representative: Representative) -> Result<()> {
        let record = representative.to_record().ok_or_else(|| {
            GeochromeError::InvalidInput("link cells have no point record".into())
        })?;
        self.push_record(&record)
    }
}

/// Gathers the cells matching `address` into `sink` and returns how many
/// were found. Digits below `size` are overwritten with the path of each
/// cell as it is visited; time is taken from slot `time_index`.
pub fn query<S: ScaleStore, G: Gather + ?Sized>(
    store: &mut S,
    kind: NodeKind,
    address: &mut Address,
    time_index: usize,
    sink: &mut G,
) -> Result<usize> {
    let (size, span) = (address.size(), address.span());
    let depth = store.depth();
    if size + span >= depth {
        log::warn!(
            "Query of size {} and span {} does not fit a tree of depth {}",
            size,
            span,
            depth
        );
        return Ok(0);
    }

    let mut offset = 0u64;
    for scale in 0..size {
        let Some(node) = store.read_node(scale, offset, kind)? else {
            return Ok(0);
        };
        match node.get_offset(address.digit(scale)) {
            Some(next) => offset = next.get(),
            None => return Ok(0),
        }
    }

    let mut found = 0;
    fan_out(
        store,
        kind,
        address,
        time_index,
        size,
        offset,
        size + span,
        sink,
        &mut found,
    )?;
    Ok(found)
}

#[allow(clippy::too_many_arguments)]
fn fan_out<S: ScaleStore, G: Gather + ?Sized>(
    store: &mut S,
    kind: NodeKind,
    address: &mut Address,
    time_index: usize,
    scale: usize,
    offset: u64,
    target: usize,
    sink: &mut G,
    found: &mut usize,
) -> Result<()> {
    let Some(node) = store.read_node(scale, offset, kind)? else {
        return Ok(());
    };

    if scale == target {
        sink.gather(Representative {
            pose: address.pose_at(scale),
            time: address.time(time_index),
            payload: node.into_payload(),
        })?;
        *found += 1;
        return Ok(());
    }

    for (digit, child) in node.children() {
        address.set_digit(scale, digit);
        fan_out(
            store,
            kind,
            address,
            time_index,
            scale + 1,
            child.get(),
            target,
            sink,
            found,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::insert::insert;
    use crate::node::Sample;
    use crate::storage::MemoryScales;

    fn store_with(points: &[([f64; 3], [u8; 3])], depth: usize) -> MemoryScales {
        let mut store = MemoryScales::new(depth);
        for (pose, color) in points {
            let address = Address::from_pose(*pose, depth);
            insert(&mut store, NodeKind::Color, &address, Sample::Color(*color)).unwrap();
        }
        store
    }

    #[test]
    fn test_full_span_reaches_every_leaf() {
        let points = [
            ([10.0, 10.0, 10.0], [1, 1, 1]),
            ([-10.0, 10.0, 10.0], [2, 2, 2]),
            ([100.0, -50.0, -300.0], [3, 3, 3]),
            ([100.0, -50.0, -300.0], [5, 5, 5]),
            ([-170.0, 80.0, 9000.0], [4, 4, 4]),
        ];
        let mut store = store_with(&points, 5);

        let mut address = Address::new().with_span(4).with_time(0, 77);
        let mut found = Vec::new();
        let count = query(&mut store, NodeKind::Color, &mut address, 0, &mut found).unwrap();

        assert_eq!(count, 4);
        assert_eq!(found.len(), 4);
        assert!(found.iter().all(|r| r.time == 77));
        let total: u32 = found
            .iter()
            .map(|r| match r.payload {
                Payload::Color { count, .. } => u32::from(count),
                _ => 0,
            })
            .sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_representative_position_is_cell_center() {
        let pose = [6.14, 46.2, 375.0];
        let mut store = store_with(&[(pose, [9, 9, 9])], 6);

        let mut address = Address::from_pose(pose, 3).with_span(2);
        let mut found = Vec::new();
        query(&mut store, NodeKind::Color, &mut address, 0, &mut found).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pose, Address::from_pose(pose, 5).pose());
    }

    #[test]
    fn test_missing_prefix_is_empty() {
        let mut store = store_with(&[([10.0, 10.0, 10.0], [1, 1, 1])], 4);
        let mut address = Address::from_pose([-10.0, -10.0, -10.0], 2);

        let mut found = Vec::new();
        assert_eq!(
            query(&mut store, NodeKind::Color, &mut address, 0, &mut found).unwrap(),
            0
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_too_deep_is_empty() {
        let mut store = store_with(&[([10.0, 10.0, 10.0], [1, 1, 1])], 4);
        let mut address = Address::from_pose([10.0, 10.0, 10.0], 2).with_span(2);

        let mut found = Vec::new();
        assert_eq!(
            query(&mut store, NodeKind::Color, &mut address, 0, &mut found).unwrap(),
            0
        );
    }

    #[test]
    fn test_empty_store() {
        let mut store = MemoryScales::new(3);
        let mut address = Address::new().with_span(2);
        let mut found = Vec::new();
        assert_eq!(
            query(&mut store, NodeKind::Color, &mut address, 0, &mut found).unwrap(),
            0
        );
    }

    #[test]
    fn test_buffer_sink_packs_records() {
        let pose = [0.1, 0.2, 10.0];
        let mut store = store_with(&[(pose, [10, 20, 30]), (pose, [50, 60, 70])], 3);

        let mut address = Address::from_pose(pose, 2).with_time(1, 3600);
        let mut buffer = Buffer::new();
        query(&mut store, NodeKind::Color, &mut address, 1, &mut buffer).unwrap();

        let records = Record::parse_all(buffer.as_slice()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].color, [30, 40, 50]);
        assert_eq!(records[0].time, 3600);
    }

    #[test]
    fn test_buffer_sink_rejects_links() {
        let mut store = MemoryScales::new(2);
        let address = Address::from_pose([0.0, 0.0, 0.0], 2);
        insert(&mut store, NodeKind::Link, &address, Sample::Link(1)).unwrap();

        let mut address = Address::new();
        let mut buffer = Buffer::new();
        assert!(matches!(
            query(&mut store, NodeKind::Link, &mut address, 0, &mut buffer),
            Err(GeochromeError::InvalidInput(_))
        ));

        let mut found = Vec::new();
        query(&mut store, NodeKind::Link, &mut address, 0, &mut found).unwrap();
        assert_eq!(found[0].payload, Payload::Links(vec![1]));
    }
}
