//! Cell addresses of the spatial subdivision tree.
//!
//! A position is mapped to a digit per scale by bisecting the longitude,
//! latitude and height ranges: at every scale each axis contributes one
//! bit (`lon | lat << 1 | height << 2`), giving a digit in `[0, 8)`.
//! Scale 0 is the coarsest cell.
//!
//! Besides the digits an address carries what a query needs: the number of
//! meaningful digits (`size`), the extra depth to gather below them
//! (`span`), a mode mask selecting which of the two embedded times are
//! used, and the two times themselves.

use crate::error::TypesError;

/// Branching factor of the tree: three bisected axes.
pub const BRANCHING: u8 = 8;

/// Maximum number of scales an address can describe.
pub const MAX_DEPTH: usize = 40;

/// Mode bit selecting the first embedded time.
pub const MODE_FIRST: u8 = 0x01;

/// Mode bit selecting the second embedded time.
pub const MODE_SECOND: u8 = 0x02;

/// Longitude range in degrees.
pub const LON_RANGE: (f64, f64) = (-180.0, 180.0);

/// Latitude range in degrees.
pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);

/// Height range in meters.
pub const HEIGHT_RANGE: (f64, f64) = (-16384.0, 16384.0);

/// Encoded header length: size, span, mode and two times.
pub const HEADER_LEN: usize = 3 + 2 * 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    size: u8,
    span: u8,
    mode: u8,
    times: [i64; 2],
    digits: [u8; MAX_DEPTH],
}

impl Address {
    /// Empty address selecting the first time.
    pub fn new() -> Self {
        Self {
            size: 0,
            span: 0,
            mode: MODE_FIRST,
            times: [0; 2],
            digits: [0; MAX_DEPTH],
        }
    }

    /// Computes the first `size` digits of `pose` (longitude, latitude and
    /// height). Coordinates outside the ranges are clamped onto them.
    pub fn from_pose(pose: [f64; 3], size: usize) -> Self {
        let mut address = Self::new();
        let size = size.min(MAX_DEPTH);
        let mut low = [LON_RANGE.0, LAT_RANGE.0, HEIGHT_RANGE.0];
        let mut high = [LON_RANGE.1, LAT_RANGE.1, HEIGHT_RANGE.1];

        for scale in 0..size {
            let mut digit = 0u8;
            for axis in 0..3 {
                let mid = (low[axis] + high[axis]) * 0.5;
                if pose[axis] >= mid {
                    digit |= 1 << axis;
                    low[axis] = mid;
                } else {
                    high[axis] = mid;
                }
            }
            address.digits[scale] = digit;
        }

        address.size = size as u8;
        address
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size.min(MAX_DEPTH) as u8;
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.set_size(size);
        self
    }

    pub fn span(&self) -> usize {
        self.span as usize
    }

    pub fn set_span(&mut self, span: usize) {
        self.span = span.min(MAX_DEPTH) as u8;
    }

    pub fn with_span(mut self, span: usize) -> Self {
        self.set_span(span);
        self
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn set_mode(&mut self, mode: u8) {
        self.mode = mode & (MODE_FIRST | MODE_SECOND);
    }

    pub fn with_mode(mut self, mode: u8) -> Self {
        self.set_mode(mode);
        self
    }

    /// Time of slot `index` (0 or 1).
    pub fn time(&self, index: usize) -> i64 {
        self.times[index & 1]
    }

    pub fn set_time(&mut self, index: usize, time: i64) {
        self.times[index & 1] = time;
    }

    pub fn with_time(mut self, index: usize, time: i64) -> Self {
        self.set_time(index, time);
        self
    }

    /// Digit at `scale`; scales beyond the stored depth read as zero.
    pub fn digit(&self, scale: usize) -> u8 {
        self.digits.get(scale).copied().unwrap_or(0)
    }

    /// Writes a digit. Writing beyond `size` is allowed; it is how the query
    /// walk records the path below the prefix.
    pub fn set_digit(&mut self, scale: usize, digit: u8) {
        if let Some(slot) = self.digits.get_mut(scale) {
            *slot = digit % BRANCHING;
        }
    }

    /// The meaningful digits.
    pub fn digits(&self) -> &[u8] {
        &self.digits[..self.size()]
    }

    /// Center of the cell designated by the first `size` digits.
    pub fn pose(&self) -> [f64; 3] {
        self.pose_at(self.size())
    }

    /// Center of the cell designated by the first `depth` digits, whatever
    /// the current size.
    pub fn pose_at(&self, depth: usize) -> [f64; 3] {
        let mut low = [LON_RANGE.0, LAT_RANGE.0, HEIGHT_RANGE.0];
        let mut high = [LON_RANGE.1, LAT_RANGE.1, HEIGHT_RANGE.1];

        for &digit in &self.digits[..depth.min(MAX_DEPTH)] {
            for axis in 0..3 {
                let mid = (low[axis] + high[axis]) * 0.5;
                if digit & (1 << axis) != 0 {
                    low[axis] = mid;
                } else {
                    high[axis] = mid;
                }
            }
        }

        [
            (low[0] + high[0]) * 0.5,
            (low[1] + high[1]) * 0.5,
            (low[2] + high[2]) * 0.5,
        ]
    }

    /// Encoded length of this address.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.size()
    }

    /// `[size][span][mode][time0 LE][time1 LE][digits...]`
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.size);
        out.push(self.span);
        out.push(self.mode);
        out.extend_from_slice(&self.times[0].to_le_bytes());
        out.extend_from_slice(&self.times[1].to_le_bytes());
        out.extend_from_slice(self.digits());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() < HEADER_LEN {
            return Err(TypesError::TruncatedAddress {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let size = bytes[0] as usize;
        let span = bytes[1] as usize;
        if size + span > MAX_DEPTH {
            return Err(TypesError::AddressTooDeep {
                size,
                span,
                max: MAX_DEPTH,
            });
        }
        if bytes.len() < HEADER_LEN + size {
            return Err(TypesError::TruncatedAddress {
                expected: HEADER_LEN + size,
                actual: bytes.len(),
            });
        }

        let mut address = Self::new();
        address.size = bytes[0];
        address.span = bytes[1];
        address.set_mode(bytes[2]);
        address.times[0] = read_i64(&bytes[3..11]);
        address.times[1] = read_i64(&bytes[11..19]);

        for (scale, &digit) in bytes[HEADER_LEN..HEADER_LEN + size].iter().enumerate() {
            if digit >= BRANCHING {
                return Err(TypesError::InvalidDigit { scale, digit });
            }
            address.digits[scale] = digit;
        }

        Ok(address)
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new()
    }
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    i64::from_le_bytes(raw)
}
