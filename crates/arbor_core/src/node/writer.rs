//! Packs new node records into segments.

use crate::error::{CoreError, CoreResult};
use crate::node::record::{encode_chunk, ChildRef, StoredChain, StoredNode, RECORD_TAG_SIZE};
use crate::node::value::PropertyState;
use crate::segment::format::{SegmentBuilder, RECORD_OVERHEAD, SEGMENT_HEADER_SIZE};
use crate::segment::SegmentStore;
use crate::types::{Address, RecordId};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A reference to a node that is either already stored or written in this
/// commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteRef {
    Existing(RecordId),
    Pending { generation: u64, index: u32 },
}

/// Writes records bottom-up, sealing a segment whenever the next record
/// would not fit.
///
/// A node too large for any segment is split into chunk records and
/// referenced through a chain record.
///
/// Each open segment is a generation. References into the open generation
/// are stored as local indexes; references into sealed generations are
/// translated to full record ids.
pub(crate) struct SegmentWriter<'a> {
    store: &'a SegmentStore,
    max_size: usize,
    generation: u64,
    current: SegmentBuilder,
    sealed: HashMap<u64, Address>,
    records: usize,
}

impl<'a> SegmentWriter<'a> {
    pub(crate) fn new(store: &'a SegmentStore) -> Self {
        Self {
            store,
            max_size: store.config().max_segment_size,
            generation: 0,
            current: SegmentBuilder::new(),
            sealed: HashMap::new(),
            records: 0,
        }
    }

    pub(crate) fn write_node(
        &mut self,
        properties: BTreeMap<String, PropertyState>,
        children: &BTreeMap<String, WriteRef>,
        child_order: Option<Vec<String>>,
    ) -> CoreResult<WriteRef> {
        let mut node = StoredNode {
            properties,
            children: self.translate(children)?,
            child_order,
        };
        let bytes = node.encode()?;
        if self.fits_alone(bytes.len())
            && (self.current.is_empty() || self.current.size_with(bytes.len()) <= self.max_size)
        {
            return Ok(self.push(bytes));
        }

        // Sealing turns local child references into remote ones, which
        // changes the encoding.
        self.seal()?;
        node.children = self.translate(children)?;
        let bytes = node.encode()?;
        if self.fits_alone(bytes.len()) {
            Ok(self.push(bytes))
        } else {
            self.write_chained(&bytes)
        }
    }

    fn fits_alone(&self, len: usize) -> bool {
        SEGMENT_HEADER_SIZE + RECORD_OVERHEAD + len <= self.max_size
    }

    fn push(&mut self, record: Vec<u8>) -> WriteRef {
        let index = self.current.push(record);
        self.records += 1;
        WriteRef::Pending {
            generation: self.generation,
            index,
        }
    }

    /// Spreads `bytes` over chunk records and returns the chain record.
    ///
    /// The open segment must be empty, so `bytes` hold no local references.
    fn write_chained(&mut self, bytes: &[u8]) -> CoreResult<WriteRef> {
        let max = self.max_size;
        let too_large = || CoreError::SegmentTooLarge {
            size: bytes.len(),
            max,
        };
        let chunk_size = max.saturating_sub(SEGMENT_HEADER_SIZE + RECORD_OVERHEAD + RECORD_TAG_SIZE);
        if chunk_size == 0 {
            return Err(too_large());
        }

        let mut pieces = Vec::with_capacity(bytes.len().div_ceil(chunk_size));
        for piece in bytes.chunks(chunk_size) {
            let record = encode_chunk(piece);
            if !self.current.is_empty() && self.current.size_with(record.len()) > self.max_size {
                self.seal()?;
            }
            pieces.push(self.push(record));
        }
        self.seal()?;

        let chain = StoredChain {
            len: bytes.len() as u64,
            chunks: pieces
                .into_iter()
                .map(|piece| self.resolve(piece))
                .collect::<CoreResult<_>>()?,
        };
        let record = chain.encode()?;
        if !self.fits_alone(record.len()) {
            return Err(too_large());
        }
        debug!(size = bytes.len(), chunks = chain.chunks.len(), "chained large node record");
        Ok(self.push(record))
    }

    /// Seals the open segment and resolves `root` to a stored record id.
    pub(crate) fn finish(mut self, root: WriteRef) -> CoreResult<RecordId> {
        self.seal()?;
        let id = self.resolve(root)?;
        debug!(
            records = self.records,
            segments = self.sealed.len(),
            root = %id,
            "wrote node records"
        );
        Ok(id)
    }

    fn translate(
        &self,
        children: &BTreeMap<String, WriteRef>,
    ) -> CoreResult<BTreeMap<String, ChildRef>> {
        children
            .iter()
            .map(|(name, child)| {
                let stored = match *child {
                    WriteRef::Pending { generation, index } if generation == self.generation => {
                        ChildRef::Local(index)
                    }
                    other => ChildRef::Remote(self.resolve(other)?),
                };
                Ok((name.clone(), stored))
            })
            .collect()
    }

    fn resolve(&self, reference: WriteRef) -> CoreResult<RecordId> {
        match reference {
            WriteRef::Existing(id) => Ok(id),
            WriteRef::Pending { generation, index } => self
                .sealed
                .get(&generation)
                .map(|segment| RecordId::new(*segment, index))
                .ok_or_else(|| {
                    CoreError::invalid_operation(format!(
                        "record {index} of generation {generation} is not sealed"
                    ))
                }),
        }
    }

    fn seal(&mut self) -> CoreResult<()> {
        if self.current.is_empty() {
            return Ok(());
        }
        let segment = std::mem::take(&mut self.current).finish();
        let address = self.store.write_segment(&segment)?;
        self.sealed.insert(self.generation, address);
        self.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::node::reader::RecordReader;
    use std::sync::Arc;

    fn props(value: &str) -> BTreeMap<String, PropertyState> {
        let mut p = BTreeMap::new();
        p.insert("value".to_string(), PropertyState::string(value));
        p
    }

    #[test]
    fn parent_references_child_in_same_segment() {
        let store = Arc::new(SegmentStore::in_memory(Config::default()).unwrap());
        let mut writer = SegmentWriter::new(&store);
        let child = writer.write_node(props("child"), &BTreeMap::new(), None).unwrap();
        let mut children = BTreeMap::new();
        children.insert("c".to_string(), child);
        let root = writer.write_node(props("root"), &children, None).unwrap();
        let root = writer.finish(root).unwrap();

        let reader = RecordReader::new(Arc::clone(&store));
        let record = reader.read(root).unwrap();
        let child = reader.read(record.child("c").unwrap()).unwrap();
        assert_eq!(child.property("value").unwrap().as_str(), Some("child"));
        assert_eq!(store.stats().unwrap().segments, 1);
    }

    #[test]
    fn spills_into_several_segments() {
        let config = Config::default().max_segment_size(2048);
        let store = Arc::new(SegmentStore::in_memory(config).unwrap());
        let mut writer = SegmentWriter::new(&store);

        let mut children = BTreeMap::new();
        for i in 0..20 {
            let child = writer
                .write_node(props(&"x".repeat(300)), &BTreeMap::new(), None)
                .unwrap();
            children.insert(format!("n{i}"), child);
        }
        let root = writer.write_node(BTreeMap::new(), &children, None).unwrap();
        let root = writer.finish(root).unwrap();
        assert!(store.stats().unwrap().segments > 1);

        let reader = RecordReader::new(Arc::clone(&store));
        let record = reader.read(root).unwrap();
        assert_eq!(record.child_count(), 20);
        for name in record.child_names() {
            let child = reader.read(record.child(name).unwrap()).unwrap();
            assert_eq!(child.property("value").unwrap().as_str().unwrap().len(), 300);
        }
    }

    #[test]
    fn large_node_is_chained_across_segments() {
        let config = Config::default().max_segment_size(1024);
        let store = Arc::new(SegmentStore::in_memory(config).unwrap());
        let mut writer = SegmentWriter::new(&store);

        let small = writer.write_node(props("small"), &BTreeMap::new(), None).unwrap();
        let mut children = BTreeMap::new();
        children.insert("small".to_string(), small);
        for i in 0..40 {
            let child = writer.write_node(BTreeMap::new(), &BTreeMap::new(), None).unwrap();
            children.insert(format!("child{i:03}"), child);
        }
        let big = "z".repeat(5000);
        let root = writer.write_node(props(&big), &children, None).unwrap();
        let root = writer.finish(root).unwrap();
        assert!(store.stats().unwrap().segments >= 5);

        let reader = RecordReader::new(Arc::clone(&store));
        let record = reader.read(root).unwrap();
        assert_eq!(record.property("value").unwrap().as_str(), Some(big.as_str()));
        assert_eq!(record.child_count(), 41);
        let small = reader.read(record.child("small").unwrap()).unwrap();
        assert_eq!(small.property("value").unwrap().as_str(), Some("small"));
    }

    #[test]
    fn chain_too_long_for_a_segment_is_rejected() {
        let config = Config::default().max_segment_size(128);
        let store = SegmentStore::in_memory(config).unwrap();
        let mut writer = SegmentWriter::new(&store);
        let result = writer.write_node(props(&"y".repeat(20_000)), &BTreeMap::new(), None);
        assert!(matches!(result, Err(CoreError::SegmentTooLarge { .. })));
    }
}
