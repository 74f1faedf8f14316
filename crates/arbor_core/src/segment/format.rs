//! Layout of node segments.
//!
//! The archive stores opaque bytes; the node layer packs its records into
//! segments with this layout:
//!
//! ```text
//! | magic "ASEG" (4) | version u16 (2) | record_count u32 (4) |
//! | len u32 (4) | record bytes | ... repeated record_count times
//! ```

use crate::error::{CoreError, CoreResult};
use bytes::Bytes;

/// Magic bytes identifying a node segment.
pub const SEGMENT_MAGIC: [u8; 4] = *b"ASEG";

/// Current node segment format version.
pub const SEGMENT_VERSION: u16 = 1;

/// Bytes before the first record.
pub const SEGMENT_HEADER_SIZE: usize = 10;

/// Per-record length prefix.
pub const RECORD_OVERHEAD: usize = 4;

/// Accumulates encoded records until the segment is sealed.
#[derive(Debug)]
pub struct SegmentBuilder {
    records: Vec<Vec<u8>>,
    size: usize,
}

impl SegmentBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            size: SEGMENT_HEADER_SIZE,
        }
    }

    /// Appends a record and returns its index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push(&mut self, record: Vec<u8>) -> u32 {
        self.size += RECORD_OVERHEAD + record.len();
        self.records.push(record);
        (self.records.len() - 1) as u32
    }

    /// Encoded size of the segment so far.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        self.size
    }

    /// Encoded size after adding a record of `len` bytes.
    #[must_use]
    pub fn size_with(&self, len: usize) -> usize {
        self.size + RECORD_OVERHEAD + len
    }

    /// Number of records pushed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes the segment.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn finish(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size);
        buf.extend_from_slice(&SEGMENT_MAGIC);
        buf.extend_from_slice(&SEGMENT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for record in &self.records {
            buf.extend_from_slice(&(record.len() as u32).to_le_bytes());
            buf.extend_from_slice(record);
        }
        buf
    }
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed node segment sharing the bytes it was read from.
#[derive(Debug, Clone)]
pub struct SegmentView {
    data: Bytes,
    ranges: Vec<(usize, usize)>,
}

impl SegmentView {
    /// Parses the record table of a segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupt`] if the header or a length is invalid.
    pub fn parse(data: Bytes) -> CoreResult<Self> {
        if data.len() < SEGMENT_HEADER_SIZE {
            return Err(CoreError::corrupt(format!(
                "segment too short: {} bytes",
                data.len()
            )));
        }
        if data[0..4] != SEGMENT_MAGIC {
            return Err(CoreError::corrupt("bad segment magic"));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != SEGMENT_VERSION {
            return Err(CoreError::corrupt(format!(
                "unsupported segment version {version}"
            )));
        }
        let count = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;

        let mut ranges = Vec::with_capacity(count.min(data.len() / RECORD_OVERHEAD));
        let mut pos = SEGMENT_HEADER_SIZE;
        for index in 0..count {
            if pos + RECORD_OVERHEAD > data.len() {
                return Err(CoreError::corrupt(format!(
                    "segment truncated before record {index}"
                )));
            }
            let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                as usize;
            pos += RECORD_OVERHEAD;
            if pos + len > data.len() {
                return Err(CoreError::corrupt(format!(
                    "record {index} extends past segment end"
                )));
            }
            ranges.push((pos, pos + len));
            pos += len;
        }
        if pos != data.len() {
            return Err(CoreError::corrupt(format!(
                "{} trailing bytes after last record",
                data.len() - pos
            )));
        }

        Ok(Self { data, ranges })
    }

    /// Returns record `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the index is out of range.
    pub fn record(&self, index: u32) -> CoreResult<&[u8]> {
        let (start, end) = self
            .ranges
            .get(index as usize)
            .copied()
            .ok_or_else(|| CoreError::not_found(format!("record {index} in segment")))?;
        Ok(&self.data[start..end])
    }

    /// Number of records in the segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True when the segment holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_come_back_by_index() {
        let mut builder = SegmentBuilder::new();
        assert_eq!(builder.push(b"first".to_vec()), 0);
        assert_eq!(builder.push(Vec::new()), 1);
        assert_eq!(builder.push(b"third".to_vec()), 2);
        let expected = builder.encoded_size();

        let bytes = builder.finish();
        assert_eq!(bytes.len(), expected);

        let view = SegmentView::parse(Bytes::from(bytes)).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.record(0).unwrap(), b"first");
        assert!(view.record(1).unwrap().is_empty());
        assert_eq!(view.record(2).unwrap(), b"third");
        assert!(matches!(view.record(3), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn size_with_predicts_growth() {
        let mut builder = SegmentBuilder::new();
        let predicted = builder.size_with(7);
        builder.push(vec![0; 7]);
        assert_eq!(builder.encoded_size(), predicted);
    }

    #[test]
    fn empty_segment_parses() {
        let view = SegmentView::parse(Bytes::from(SegmentBuilder::new().finish())).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = SegmentBuilder::new().finish();
        bytes[0] = b'X';
        assert!(matches!(
            SegmentView::parse(Bytes::from(bytes)),
            Err(CoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn rejects_truncated_record() {
        let mut builder = SegmentBuilder::new();
        builder.push(b"payload".to_vec());
        let mut bytes = builder.finish();
        bytes.truncate(bytes.len() - 2);
        assert!(SegmentView::parse(Bytes::from(bytes)).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = SegmentBuilder::new().finish();
        bytes.push(0);
        assert!(SegmentView::parse(Bytes::from(bytes)).is_err());
    }
}
