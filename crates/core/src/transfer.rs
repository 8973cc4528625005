//! Upload sizing
//!
//! Decides whether a buffered write is committed with a single put or staged
//! as a multipart upload, and how the payload is cut into parts.

use serde::{Deserialize, Deserializer, Serialize};

/// Default multipart threshold: 64 MiB
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Default part size: 64 MiB
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// Upload configuration carried by a drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Payloads strictly below this size are committed with one put
    #[serde(default = "default_threshold")]
    pub multipart_threshold: u64,

    /// Preferred part size for staged uploads, clamped to the store limits
    #[serde(default = "default_part_size", deserialize_with = "deserialize_part_size")]
    pub part_size: u64,
}

fn default_threshold() -> u64 {
    DEFAULT_MULTIPART_THRESHOLD
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

fn deserialize_part_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(clamp_part_size)
}

/// Bring a part size within `MIN_PART_SIZE..=MAX_PART_SIZE`
pub fn clamp_part_size(size: u64) -> u64 {
    size.clamp(MIN_PART_SIZE, MAX_PART_SIZE)
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn multipart_threshold(mut self, size: u64) -> Self {
        self.multipart_threshold = size;
        self
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = clamp_part_size(size);
        self
    }

    /// Whether a payload of `size` bytes goes through a staged upload
    pub fn use_multipart(&self, size: u64) -> bool {
        size >= self.multipart_threshold
    }

    /// Calculate appropriate part size for a payload
    pub fn calculate_part_size(&self, total_size: u64) -> u64 {
        if total_size <= MIN_PART_SIZE {
            return MIN_PART_SIZE;
        }

        let part_size = clamp_part_size(self.part_size);
        let parts = total_size.div_ceil(part_size);

        if parts <= MAX_PARTS as u64 {
            part_size
        } else {
            // Need larger parts to fit within 10,000 limit
            let required_size = total_size.div_ceil(MAX_PARTS as u64);
            required_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE)
        }
    }
}

/// Calculate number of parts for a payload
pub fn calculate_parts(total_size: u64, part_size: u64) -> usize {
    (total_size.div_ceil(part_size.max(1)) as usize).max(1)
}

/// Byte range `[start, end)` of a 1-based part
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> (u64, u64) {
    let start = (part_number as u64 - 1) * part_size;
    let end = (start + part_size).min(total_size);
    (start, end)
}
