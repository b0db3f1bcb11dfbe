//! Node records stored in scale files.
//!
//! Every node carries one 5-byte little-endian offset slot per child digit.
//! A slot holds either an offset into the next scale's file or
//! [`Offset::SENTINEL`], meaning the child does not exist.
//!
//! Color variant (44 bytes):
//!
//! ```text
//! 0..3    r, g, b running mean
//! 3       sample counter, saturates at 255
//! 4..44   8 x 5-byte slots
//! ```
//!
//! Link variant (45 + 5 * capacity bytes):
//!
//! ```text
//! 0..5    link count
//! 5..45   8 x 5-byte slots
//! 45..    capacity x 5-byte link values, zero padded
//! ```
//!
//! The link capacity is not stored; it is the count rounded up to the next
//! multiple of [`LINK_BLOCK`].

use crate::error::{GeochromeError, Result};
use geochrome_types::address::BRANCHING;

/// Width of an offset slot, a link value and the link counter.
pub const SLOT_LEN: usize = 5;

/// Number of child slots per node.
pub const SLOT_COUNT: usize = BRANCHING as usize;

/// Bytes taken by the slot table.
pub const SLOTS_LEN: usize = SLOT_COUNT * SLOT_LEN;

/// Encoded length of a color node.
pub const COLOR_NODE_LEN: usize = 4 + SLOTS_LEN;

/// Encoded length of a link node without its link array.
pub const LINK_HEADER_LEN: usize = SLOT_LEN + SLOTS_LEN;

/// Link arrays grow by this many entries.
pub const LINK_BLOCK: usize = 1024;

/// Saturation value of the color sample counter.
pub const COUNTER_MAX: u8 = u8::MAX;

/// Offset of a node inside a scale file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(u64);

impl Offset {
    /// All 40 bits set: the child is absent.
    pub const SENTINEL: u64 = (1 << 40) - 1;

    /// Fails with [`GeochromeError::Overflow`] when `value` is not below the
    /// sentinel.
    pub fn new(value: u64) -> Result<Self> {
        if value >= Self::SENTINEL {
            return Err(GeochromeError::Overflow {
                value,
                limit: Self::SENTINEL,
            });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Reads a 5-byte little-endian integer.
pub fn read_u40(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw[..SLOT_LEN].copy_from_slice(&bytes[..SLOT_LEN]);
    u64::from_le_bytes(raw)
}

/// Writes the low 40 bits of `value` as 5 little-endian bytes.
pub fn write_u40(out: &mut [u8], value: u64) {
    out[..SLOT_LEN].copy_from_slice(&value.to_le_bytes()[..SLOT_LEN]);
}

/// Encodes one slot.
pub fn encode_slot(slot: Option<Offset>) -> [u8; SLOT_LEN] {
    let mut out = [0u8; SLOT_LEN];
    write_u40(&mut out, slot.map_or(Offset::SENTINEL, Offset::get));
    out
}

/// Decodes one slot; the sentinel reads as `None`.
pub fn decode_slot(bytes: &[u8]) -> Option<Offset> {
    match read_u40(bytes) {
        Offset::SENTINEL => None,
        value => Some(Offset(value)),
    }
}

/// Which variant a scale file holds. It is not stored in the records, so
/// every reader of an index must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Color,
    Link,
}

impl NodeKind {
    /// Bytes to read before the full length of a node is known.
    pub fn header_len(self) -> usize {
        match self {
            NodeKind::Color => COLOR_NODE_LEN,
            NodeKind::Link => LINK_HEADER_LEN,
        }
    }

    /// Position of the slot for `digit` inside an encoded node.
    pub fn slot_position(self, digit: u8) -> usize {
        debug_assert!(digit < BRANCHING, "digit {digit} out of range");
        let table = match self {
            NodeKind::Color => 4,
            NodeKind::Link => SLOT_LEN,
        };
        table + digit as usize * SLOT_LEN
    }
}

/// Link array capacity reserved for `count` links.
pub fn link_capacity(count: usize) -> usize {
    count.div_ceil(LINK_BLOCK).max(1) * LINK_BLOCK
}

/// One value folded into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Color([u8; 3]),
    Link(u64),
}

impl Sample {
    pub fn kind(&self) -> NodeKind {
        match self {
            Sample::Color(_) => NodeKind::Color,
            Sample::Link(_) => NodeKind::Link,
        }
    }
}

/// Aggregated content of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Color { rgb: [u8; 3], count: u8 },
    Links(Vec<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    payload: Payload,
    slots: [Option<Offset>; SLOT_COUNT],
}

impl Node {
    /// New node holding a single sample, every child absent.
    pub fn create(sample: Sample) -> Result<Self> {
        let payload = match sample {
            Sample::Color(rgb) => Payload::Color { rgb, count: 1 },
            Sample::Link(value) => Payload::Links(vec![check_link(value)?]),
        };
        Ok(Self {
            payload,
            slots: [None; SLOT_COUNT],
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Color { .. } => NodeKind::Color,
            Payload::Links(_) => NodeKind::Link,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Child offset of `digit`. Digits are below [`BRANCHING`].
    pub fn get_offset(&self, digit: u8) -> Option<Offset> {
        debug_assert!(digit < BRANCHING, "digit {digit} out of range");
        self.slots[digit as usize]
    }

    pub fn set_offset(&mut self, digit: u8, offset: Option<Offset>) {
        debug_assert!(digit < BRANCHING, "digit {digit} out of range");
        self.slots[digit as usize] = offset;
    }

    /// Digits whose child exists, ascending.
    pub fn children(&self) -> impl Iterator<Item = (u8, Offset)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(digit, slot)| slot.map(|offset| (digit as u8, offset)))
    }

    /// Folds `sample` into the payload. The sample variant must match.
    pub fn accumulate(&mut self, sample: Sample) -> Result<()> {
        match sample {
            Sample::Color(rgb) => self.accumulate_color(rgb),
            Sample::Link(value) => self.append_link(value),
        }
    }

    /// Updates the running mean with round-half-up integer arithmetic.
    ///
    /// Once the counter reaches 255 it stops, and every further sample is
    /// weighted 1/256 against the mean.
    pub fn accumulate_color(&mut self, sample: [u8; 3]) -> Result<()> {
        let Payload::Color { rgb, count } = &mut self.payload else {
            return Err(GeochromeError::InvalidInput(
                "color sample on a link node".into(),
            ));
        };

        let weight = u32::from(*count);
        for (mean, value) in rgb.iter_mut().zip(sample) {
            let total = weight * u32::from(*mean) + u32::from(value);
            *mean = ((total + (weight + 1) / 2) / (weight + 1)) as u8;
        }
        *count = count.saturating_add(1);
        Ok(())
    }

    pub fn append_link(&mut self, value: u64) -> Result<()> {
        let Payload::Links(links) = &mut self.payload else {
            return Err(GeochromeError::InvalidInput(
                "link sample on a color node".into(),
            ));
        };

        let value = check_link(value)?;
        if links.len() as u64 + 1 >= Offset::SENTINEL {
            return Err(GeochromeError::Overflow {
                value: links.len() as u64 + 1,
                limit: Offset::SENTINEL,
            });
        }
        if links.len() == links.capacity() {
            links.reserve_exact(link_capacity(links.len() + 1) - links.len());
        }
        links.push(value);
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        match &self.payload {
            Payload::Color { .. } => COLOR_NODE_LEN,
            Payload::Links(links) => LINK_HEADER_LEN + link_capacity(links.len()) * SLOT_LEN,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.encoded_len()];
        let table = match &self.payload {
            Payload::Color { rgb, count } => {
                out[..3].copy_from_slice(rgb);
                out[3] = *count;
                4
            }
            Payload::Links(links) => {
                write_u40(&mut out, links.len() as u64);
                for (link, chunk) in links
                    .iter()
                    .zip(out[LINK_HEADER_LEN..].chunks_exact_mut(SLOT_LEN))
                {
                    write_u40(chunk, *link);
                }
                SLOT_LEN
            }
        };

        for (slot, chunk) in self
            .slots
            .iter()
            .zip(out[table..table + SLOTS_LEN].chunks_exact_mut(SLOT_LEN))
        {
            chunk.copy_from_slice(&encode_slot(*slot));
        }
        out
    }

    /// Decodes a node of the given variant. Link nodes only need the header
    /// and `count` link values; trailing padding is ignored.
    pub fn decode(kind: NodeKind, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < kind.header_len() {
            return Err(GeochromeError::InvalidFormat(format!(
                "{:?} node needs {} bytes, got {}",
                kind,
                kind.header_len(),
                bytes.len()
            )));
        }

        let (payload, table) = match kind {
            NodeKind::Color => (
                Payload::Color {
                    rgb: [bytes[0], bytes[1], bytes[2]],
                    count: bytes[3],
                },
                4,
            ),
            NodeKind::Link => {
                let count = read_u40(bytes) as usize;
                let needed = LINK_HEADER_LEN + count * SLOT_LEN;
                if bytes.len() < needed {
                    return Err(GeochromeError::InvalidFormat(format!(
                        "link node with {} links needs {} bytes, got {}",
                        count,
                        needed,
                        bytes.len()
                    )));
                }
                let mut links = Vec::with_capacity(link_capacity(count));
                links.extend(
                    bytes[LINK_HEADER_LEN..needed]
                        .chunks_exact(SLOT_LEN)
                        .map(read_u40),
                );
                (Payload::Links(links), SLOT_LEN)
            }
        };

        let mut slots = [None; SLOT_COUNT];
        for (slot, chunk) in slots
            .iter_mut()
            .zip(bytes[table..table + SLOTS_LEN].chunks_exact(SLOT_LEN))
        {
            *slot = decode_slot(chunk);
        }

        Ok(Self { payload, slots })
    }
}

fn check_link(value: u64) -> Result<u64> {
    Offset::new(value).map(Offset::get)
}
