//! Fixed-stride point record.
//!
//! ```text
//! offset  size  field
//! 0       24    pose: longitude, latitude, height (3 x f64 LE)
//! 24      8     time (i64 LE, seconds)
//! 32      3     color (r, g, b)
//! ```

use crate::error::TypesError;
use serde::{Deserialize, Serialize};

pub const POSE_LEN: usize = 3 * 8;
pub const TIME_LEN: usize = 8;
pub const COLOR_LEN: usize = 3;

/// Bytes per record on disk and on the wire.
pub const RECORD_LEN: usize = POSE_LEN + TIME_LEN + COLOR_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub pose: [f64; 3],
    pub time: i64,
    pub color: [u8; 3],
}

impl Record {
    pub fn new(pose: [f64; 3], time: i64, color: [u8; 3]) -> Self {
        Self { pose, time, color }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        self.write_into(&mut out);
        out
    }

    /// Writes the record into the first `RECORD_LEN` bytes of `out`.
    pub fn write_into(&self, out: &mut [u8]) {
        for (axis, value) in self.pose.iter().enumerate() {
            out[axis * 8..axis * 8 + 8].copy_from_slice(&value.to_le_bytes());
        }
        out[POSE_LEN..POSE_LEN + TIME_LEN].copy_from_slice(&self.time.to_le_bytes());
        out[POSE_LEN + TIME_LEN..RECORD_LEN].copy_from_slice(&self.color);
    }

    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut pose = [0.0f64; 3];
        for (axis, value) in pose.iter_mut().enumerate() {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[axis * 8..axis * 8 + 8]);
            *value = f64::from_le_bytes(raw);
        }

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[POSE_LEN..POSE_LEN + TIME_LEN]);
        let time = i64::from_le_bytes(raw);

        let mut color = [0u8; 3];
        color.copy_from_slice(&bytes[POSE_LEN + TIME_LEN..RECORD_LEN]);

        Self { pose, time, color }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let exact: &[u8; RECORD_LEN] =
            bytes.try_into().map_err(|_| TypesError::InvalidRecordLength {
                expected: RECORD_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(exact))
    }

    /// Splits a packed stream into records.
    pub fn parse_all(bytes: &[u8]) -> Result<Vec<Self>, TypesError> {
        if bytes.len() % RECORD_LEN != 0 {
            return Err(TypesError::InvalidRecordLength {
                expected: (bytes.len() / RECORD_LEN + 1) * RECORD_LEN,
                actual: bytes.len(),
            });
        }
        bytes.chunks_exact(RECORD_LEN).map(Self::from_slice).collect()
    }

    /// Packs records back to back.
    pub fn pack_all(records: &[Self]) -> Vec<u8> {
        let mut out = vec![0u8; records.len() * RECORD_LEN];
        for (record, chunk) in records.iter().zip(out.chunks_exact_mut(RECORD_LEN)) {
            record.write_into(chunk);
        }
        out
    }
}
