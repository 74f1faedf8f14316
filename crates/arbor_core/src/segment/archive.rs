//! Archive file format: header, blocks and recovery scan.
//!
//! ```text
//! file header : | magic "ARBA" (4) | version u16 (2) | file_id u32 (4) | crc32 (4) |
//! block       : | kind u8 (1) | payload_len u32 (4) | address [32] | payload | crc32 (4) |
//! ```
//!
//! A segment block's address is the SHA-256 of its payload. A head block's
//! address is the root segment and its payload is
//! `| root_index u32 | sequence u64 |`.
//!
//! Recovery follows one rule: a block cut short by the end of the file is a
//! torn write and marks the clean end of the log, while a complete block
//! whose checksum does not match is corruption.

use crate::error::{CoreError, CoreResult};
use crate::types::{Address, Head, RecordId, Sequence, ADDRESS_LEN};
use arbor_storage::StorageBackend;

/// Magic bytes identifying an archive file.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"ARBA";

/// Current archive format version.
pub const ARCHIVE_VERSION: u16 = 1;

/// Size of the file header.
pub const FILE_HEADER_SIZE: usize = 14;

/// Size of a block header: kind, payload length and address.
pub const BLOCK_HEADER_SIZE: usize = 1 + 4 + ADDRESS_LEN;

const CRC_SIZE: usize = 4;
const HEAD_PAYLOAD_SIZE: usize = 12;

/// Bytes a block adds around its payload.
pub const BLOCK_OVERHEAD: usize = BLOCK_HEADER_SIZE + CRC_SIZE;

/// Kind of an archive block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockKind {
    /// Content-addressed segment bytes.
    Segment = 1,
    /// Pointer to the current root.
    Head = 2,
}

impl BlockKind {
    /// Converts a byte to a block kind.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Segment),
            2 => Some(Self::Head),
            _ => None,
        }
    }
}

/// Encodes the header of archive file `file_id`.
#[must_use]
pub fn encode_file_header(file_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FILE_HEADER_SIZE);
    buf.extend_from_slice(&ARCHIVE_MAGIC);
    buf.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
    buf.extend_from_slice(&file_id.to_le_bytes());
    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

/// Validates a file header and checks it belongs to `file_id`.
///
/// # Errors
///
/// Returns [`CoreError::Corrupt`] or [`CoreError::ChecksumMismatch`].
pub fn decode_file_header(bytes: &[u8], file_id: u32) -> CoreResult<()> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(CoreError::corrupt("archive header truncated"));
    }
    if bytes[0..4] != ARCHIVE_MAGIC {
        return Err(CoreError::corrupt("not an archive file (bad magic)"));
    }
    let expected = read_u32(&bytes[10..14]);
    let actual = compute_crc32(&bytes[0..10]);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch { expected, actual });
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != ARCHIVE_VERSION {
        return Err(CoreError::corrupt(format!(
            "unsupported archive version {version}"
        )));
    }
    let stored_id = read_u32(&bytes[6..10]);
    if stored_id != file_id {
        return Err(CoreError::corrupt(format!(
            "archive file {file_id} carries id {stored_id}"
        )));
    }
    Ok(())
}

/// Encodes a segment block for `payload`.
#[must_use]
pub fn encode_segment_block(address: &Address, payload: &[u8]) -> Vec<u8> {
    encode_block(BlockKind::Segment, address, payload)
}

/// Encodes a head block.
#[must_use]
pub fn encode_head_block(head: &Head) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HEAD_PAYLOAD_SIZE);
    payload.extend_from_slice(&head.root.index.to_le_bytes());
    payload.extend_from_slice(&head.sequence.as_u64().to_le_bytes());
    encode_block(BlockKind::Head, &head.root.segment, &payload)
}

#[allow(clippy::cast_possible_truncation)]
fn encode_block(kind: BlockKind, address: &Address, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BLOCK_OVERHEAD + payload.len());
    buf.push(kind as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(address.as_bytes());
    buf.extend_from_slice(payload);
    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

/// A valid block found by [`scan_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// A segment; `payload_offset` is where its bytes start in the file.
    Segment {
        /// Segment address.
        address: Address,
        /// File offset of the payload.
        payload_offset: u64,
        /// Payload length.
        len: u32,
    },
    /// A head record.
    Head(Head),
}

/// Result of scanning one archive file.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Valid blocks in file order.
    pub blocks: Vec<Block>,
    /// Offset just past the last valid block.
    pub valid_end: u64,
    /// Bytes after `valid_end` that form an incomplete block.
    pub torn_bytes: u64,
}

impl ScanOutcome {
    /// True when the file ends in an incomplete block.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.torn_bytes > 0
    }
}

/// Scans every block of archive file `file_id`.
///
/// A file shorter than its header is reported as entirely torn
/// (`valid_end == 0`), which only happens when a crash interrupted the
/// creation of a new file.
///
/// # Errors
///
/// Returns [`CoreError::ChecksumMismatch`] for a complete block with a bad
/// checksum and [`CoreError::Corrupt`] for an invalid header, an unknown
/// block kind, a malformed head or an address that does not match its
/// segment payload.
pub fn scan_file(backend: &dyn StorageBackend, file_id: u32) -> CoreResult<ScanOutcome> {
    let size = backend.size()?;
    if size < FILE_HEADER_SIZE as u64 {
        return Ok(ScanOutcome {
            blocks: Vec::new(),
            valid_end: 0,
            torn_bytes: size,
        });
    }
    decode_file_header(&backend.read_at(0, FILE_HEADER_SIZE)?, file_id)?;

    let mut outcome = ScanOutcome {
        valid_end: FILE_HEADER_SIZE as u64,
        ..ScanOutcome::default()
    };
    let mut offset = FILE_HEADER_SIZE as u64;

    while offset < size {
        let remaining = size - offset;
        if remaining < BLOCK_HEADER_SIZE as u64 {
            outcome.torn_bytes = remaining;
            break;
        }
        let header = backend.read_at(offset, BLOCK_HEADER_SIZE)?;
        let payload_len = read_u32(&header[1..5]);
        let total = BLOCK_OVERHEAD as u64 + u64::from(payload_len);
        if remaining < total {
            outcome.torn_bytes = remaining;
            break;
        }

        #[allow(clippy::cast_possible_truncation)]
        let block = backend.read_at(offset, total as usize)?;
        let body_end = block.len() - CRC_SIZE;
        let expected = read_u32(&block[body_end..]);
        let actual = compute_crc32(&block[..body_end]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&block[5..BLOCK_HEADER_SIZE]);
        let address = Address::from_bytes(address);
        let payload = &block[BLOCK_HEADER_SIZE..body_end];

        let parsed = match BlockKind::from_byte(block[0]) {
            Some(BlockKind::Segment) => {
                if Address::of(payload) != address {
                    return Err(CoreError::corrupt(format!(
                        "segment at offset {offset} does not match address {}",
                        address.short()
                    )));
                }
                Block::Segment {
                    address,
                    payload_offset: offset + BLOCK_HEADER_SIZE as u64,
                    len: payload_len,
                }
            }
            Some(BlockKind::Head) => {
                if payload.len() != HEAD_PAYLOAD_SIZE {
                    return Err(CoreError::corrupt(format!(
                        "head record at offset {offset} has {} payload bytes",
                        payload.len()
                    )));
                }
                let index = read_u32(&payload[0..4]);
                let mut seq = [0u8; 8];
                seq.copy_from_slice(&payload[4..12]);
                Block::Head(Head {
                    root: RecordId::new(address, index),
                    sequence: Sequence::new(u64::from_le_bytes(seq)),
                })
            }
            None => {
                return Err(CoreError::corrupt(format!(
                    "unknown block kind {} at offset {offset}",
                    block[0]
                )));
            }
        };

        outcome.blocks.push(parsed);
        offset += total;
        outcome.valid_end = offset;
    }

    Ok(outcome)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// CRC32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut n = 0;
        while n < 256 {
            let mut c = n as u32;
            let mut bit = 0;
            while bit < 8 {
                c = if c & 1 == 0 { c >> 1 } else { 0xEDB8_8320 ^ (c >> 1) };
                bit += 1;
            }
            table[n] = c;
            n += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_storage::InMemoryBackend;

    fn archive_with(blocks: &[Vec<u8>]) -> InMemoryBackend {
        let mut backend = InMemoryBackend::new();
        backend.append(&encode_file_header(0)).unwrap();
        for block in blocks {
            backend.append(block).unwrap();
        }
        backend
    }

    fn head(payload: &[u8], index: u32, seq: u64) -> Head {
        Head {
            root: RecordId::new(Address::of(payload), index),
            sequence: Sequence::new(seq),
        }
    }

    #[test]
    fn crc32_check_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn header_roundtrip_and_mismatched_id() {
        let header = encode_file_header(3);
        assert_eq!(header.len(), FILE_HEADER_SIZE);
        decode_file_header(&header, 3).unwrap();
        assert!(matches!(
            decode_file_header(&header, 4),
            Err(CoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn header_checksum_detected() {
        let mut header = encode_file_header(0);
        header[5] ^= 0x01;
        assert!(matches!(
            decode_file_header(&header, 0),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn scan_finds_segments_and_heads() {
        let payload = b"segment bytes".to_vec();
        let address = Address::of(&payload);
        let backend = archive_with(&[
            encode_segment_block(&address, &payload),
            encode_head_block(&head(&payload, 2, 1)),
        ]);

        let outcome = scan_file(&backend, 0).unwrap();
        assert!(!outcome.is_torn());
        assert_eq!(outcome.valid_end, backend.size().unwrap());
        assert_eq!(outcome.blocks.len(), 2);

        let Block::Segment {
            address: found,
            payload_offset,
            len,
        } = outcome.blocks[0]
        else {
            panic!("expected segment block");
        };
        assert_eq!(found, address);
        assert_eq!(
            backend.read_at(payload_offset, len as usize).unwrap(),
            payload
        );
        assert_eq!(outcome.blocks[1], Block::Head(head(&payload, 2, 1)));
    }

    #[test]
    fn torn_tail_is_clean_end() {
        let payload = b"abc".to_vec();
        let complete = encode_segment_block(&Address::of(&payload), &payload);
        let mut torn = encode_segment_block(&Address::of(b"next"), b"next");
        torn.truncate(torn.len() - 3);
        let backend = archive_with(&[complete.clone(), torn.clone()]);

        let outcome = scan_file(&backend, 0).unwrap();
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(
            outcome.valid_end,
            (FILE_HEADER_SIZE + complete.len()) as u64
        );
        assert_eq!(outcome.torn_bytes, torn.len() as u64);
    }

    #[test]
    fn partial_block_header_is_torn() {
        let backend = archive_with(&[vec![1, 0, 0]]);
        let outcome = scan_file(&backend, 0).unwrap();
        assert!(outcome.blocks.is_empty());
        assert_eq!(outcome.torn_bytes, 3);
    }

    #[test]
    fn flipped_byte_in_complete_block_is_fatal() {
        let payload = b"abc".to_vec();
        let mut block = encode_segment_block(&Address::of(&payload), &payload);
        block[BLOCK_HEADER_SIZE] ^= 0xFF;
        let backend = archive_with(&[block]);
        assert!(matches!(
            scan_file(&backend, 0),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn address_must_match_payload() {
        let block = encode_segment_block(&Address::of(b"other"), b"abc");
        let backend = archive_with(&[block]);
        assert!(matches!(
            scan_file(&backend, 0),
            Err(CoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn short_file_is_entirely_torn() {
        let backend = InMemoryBackend::with_data(b"ARB".to_vec());
        let outcome = scan_file(&backend, 0).unwrap();
        assert_eq!(outcome.valid_end, 0);
        assert!(outcome.is_torn());
    }
}
