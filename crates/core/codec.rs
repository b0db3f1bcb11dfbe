//! UF3 delta codec over fixed-stride records.
//!
//! The first record is stored verbatim. Every following record is stored as
//!
//! ```text
//! [mask: ceil(prefix / 8)][changed prefix bytes][trailing bytes]
//! ```
//!
//! where bit `i % 8` of mask byte `i / 8` is set when byte `i` of the
//! diffable prefix differs from the previous record. Bytes past the prefix
//! are copied as they are. Streams of fewer than two records are stored
//! unchanged.

use crate::buffer::Buffer;
use crate::error::{GeochromeError, Result};
use geochrome_types::record::{POSE_LEN, RECORD_LEN};

/// Shape of the records a stream is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaLayout {
    stride: usize,
    prefix: usize,
}

impl DeltaLayout {
    /// Point records: the position is diffed, time and color are copied.
    pub const RECORD: DeltaLayout = DeltaLayout {
        stride: RECORD_LEN,
        prefix: POSE_LEN,
    };

    pub fn new(stride: usize, prefix: usize) -> Result<Self> {
        if stride == 0 || prefix > stride {
            return Err(GeochromeError::InvalidInput(format!(
                "delta prefix {prefix} does not fit stride {stride}"
            )));
        }
        Ok(Self { stride, prefix })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn prefix(&self) -> usize {
        self.prefix
    }

    pub fn mask_len(&self) -> usize {
        self.prefix.div_ceil(8)
    }

    pub fn trailing(&self) -> usize {
        self.stride - self.prefix
    }
}

impl Default for DeltaLayout {
    fn default() -> Self {
        Self::RECORD
    }
}

/// Encodes `input` into `out`, replacing its content.
pub fn encode(layout: DeltaLayout, input: &[u8], out: &mut Buffer) -> Result<()> {
    if input.len() % layout.stride != 0 {
        return Err(GeochromeError::InvalidInput(format!(
            "{} bytes is not a whole number of {}-byte records",
            input.len(),
            layout.stride
        )));
    }

    out.reset();
    if input.len() < 2 * layout.stride {
        return out.append(input);
    }

    let mask_len = layout.mask_len();
    // worst case: every byte changed
    out.reserve(input.len() + (input.len() / layout.stride) * mask_len)?;
    out.append(&input[..layout.stride])?;

    let mut mask = vec![0u8; mask_len];
    let mut changed = Vec::with_capacity(layout.prefix);
    let records = input.chunks_exact(layout.stride);
    for (previous, current) in records.clone().zip(records.skip(1)) {
        mask.fill(0);
        changed.clear();
        for i in 0..layout.prefix {
            if current[i] != previous[i] {
                mask[i / 8] |= 1 << (i % 8);
                changed.push(current[i]);
            }
        }

        out.append(&mask)?;
        out.append(&changed)?;
        out.append(&current[layout.prefix..])?;
    }
    Ok(())
}

/// Decodes `input` into `out`, replacing its content.
pub fn decode(layout: DeltaLayout, input: &[u8], out: &mut Buffer) -> Result<()> {
    out.reset();
    if input.is_empty() || input.len() == layout.stride {
        return out.append(input);
    }
    if input.len() < layout.stride {
        return Err(GeochromeError::InvalidFormat(format!(
            "stream of {} bytes is shorter than one {}-byte record",
            input.len(),
            layout.stride
        )));
    }

    let mask_len = layout.mask_len();
    let mut previous = input[..layout.stride].to_vec();
    out.append(&previous)?;

    let mut cursor = layout.stride;
    while cursor < input.len() {
        let mask = input
            .get(cursor..cursor + mask_len)
            .ok_or_else(|| truncated(cursor))?;
        cursor += mask_len;

        for i in 0..layout.prefix {
            if mask[i / 8] & (1 << (i % 8)) != 0 {
                previous[i] = *input.get(cursor).ok_or_else(|| truncated(cursor))?;
                cursor += 1;
            }
        }
        if layout.prefix % 8 != 0 && mask[mask_len - 1] >> (layout.prefix % 8) != 0 {
            return Err(GeochromeError::InvalidFormat(format!(
                "mask at {} flags bytes past the prefix",
                cursor
            )));
        }

        let trailing = input
            .get(cursor..cursor + layout.trailing())
            .ok_or_else(|| truncated(cursor))?;
        previous[layout.prefix..].copy_from_slice(trailing);
        cursor += layout.trailing();

        out.append(&previous)?;
    }
    Ok(())
}

fn truncated(at: usize) -> GeochromeError {
    GeochromeError::InvalidFormat(format!("delta stream truncated at byte {at}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geochrome_types::Record;

    fn records(n: usize) -> Vec<u8> {
        let records: Vec<Record> = (0..n)
            .map(|i| {
                Record::new(
                    [6.14 + i as f64 * 1e-6, 46.2, 375.0 + (i / 3) as f64],
                    1_600_000_000 + i as i64,
                    [i as u8, 20, 30],
                )
            })
            .collect();
        Record::pack_all(&records)
    }

    fn round_trip(layout: DeltaLayout, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut encoded = Buffer::new();
        encode(layout, input, &mut encoded).unwrap();
        let mut decoded = Buffer::new();
        decode(layout, encoded.as_slice(), &mut decoded).unwrap();
        (encoded.as_slice().to_vec(), decoded.as_slice().to_vec())
    }

    #[test]
    fn test_identity_below_two_records() {
        for n in [0, 1] {
            let input = records(n);
            let (encoded, decoded) = round_trip(DeltaLayout::RECORD, &input);
            assert_eq!(encoded, input);
            assert_eq!(decoded, input);
        }
    }

    #[test]
    fn test_round_trip() {
        for n in [2, 3, 17, 500] {
            let input = records(n);
            let (encoded, decoded) = round_trip(DeltaLayout::RECORD, &input);
            assert_eq!(decoded, input, "{n} records");
            assert!(encoded.len() < input.len(), "{n} records did not shrink");
        }
    }

    #[test]
    fn test_unchanged_prefix_costs_only_the_mask() {
        let record = Record::new([1.0, 2.0, 3.0], 10, [1, 2, 3]);
        let input = Record::pack_all(&[record, record]);

        let mut encoded = Buffer::new();
        encode(DeltaLayout::RECORD, &input, &mut encoded).unwrap();
        assert_eq!(encoded.len(), RECORD_LEN + 3 + 11);
        assert_eq!(&encoded.as_slice()[RECORD_LEN..RECORD_LEN + 3], &[0, 0, 0]);
    }

    #[test]
    fn test_mask_bits() {
        let layout = DeltaLayout::new(4, 3).unwrap();
        let input = [1, 2, 3, 4, 1, 9, 3, 8];

        let mut encoded = Buffer::new();
        encode(layout, &input, &mut encoded).unwrap();
        // second record: mask 0b010, changed byte 9, trailing byte 8
        assert_eq!(encoded.as_slice(), &[1, 2, 3, 4, 0b010, 9, 8]);
    }

    #[test]
    fn test_rejects_partial_records() {
        let input = records(2);
        let mut out = Buffer::new();
        assert!(matches!(
            encode(DeltaLayout::RECORD, &input[..40], &mut out),
            Err(GeochromeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_stream() {
        let mut encoded = Buffer::new();
        encode(DeltaLayout::RECORD, &records(4), &mut encoded).unwrap();

        let mut out = Buffer::new();
        for cut in [10, RECORD_LEN + 1, encoded.len() - 1] {
            assert!(
                matches!(
                    decode(DeltaLayout::RECORD, &encoded.as_slice()[..cut], &mut out),
                    Err(GeochromeError::InvalidFormat(_))
                ),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_layout_validation() {
        assert!(DeltaLayout::new(0, 0).is_err());
        assert!(DeltaLayout::new(4, 5).is_err());
        assert_eq!(DeltaLayout::new(35, 24).unwrap(), DeltaLayout::RECORD);
        assert_eq!(DeltaLayout::RECORD.mask_len(), 3);
        assert_eq!(DeltaLayout::RECORD.trailing(), 11);
    }
}
