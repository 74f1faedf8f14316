//! Record lookup with a decoded-record cache.

use crate::cache::FifoCache;
use crate::error::{CoreError, CoreResult};
use crate::node::record::{NodeRecord, RawRecord, StoredChain, StoredNode};
use crate::segment::{SegmentStore, SegmentView};
use crate::types::RecordId;
use parking_lot::Mutex;
use std::sync::Arc;

const RECORD_CACHE_SIZE: usize = 4096;

/// Resolves [`RecordId`]s to decoded records. Cheap to clone.
#[derive(Clone)]
pub(crate) struct RecordReader {
    segments: Arc<SegmentStore>,
    records: Arc<Mutex<FifoCache<RecordId, Arc<NodeRecord>>>>,
}

impl RecordReader {
    pub(crate) fn new(segments: Arc<SegmentStore>) -> Self {
        Self {
            segments,
            records: Arc::new(Mutex::new(FifoCache::new(RECORD_CACHE_SIZE))),
        }
    }

    pub(crate) fn read(&self, id: RecordId) -> CoreResult<Arc<NodeRecord>> {
        if let Some(record) = self.records.lock().get(&id) {
            return Ok(record);
        }
        let view = self.view(id)?;
        let bytes = view.record(id.index)?;
        let record = match RawRecord::parse(bytes)? {
            RawRecord::Node(_) => StoredNode::decode(bytes, id.segment)?,
            RawRecord::Chain(chain) => StoredNode::decode(&self.join(&chain)?, id.segment)?,
            RawRecord::Chunk(_) => {
                return Err(CoreError::corrupt(format!("record {id} is a chunk, not a node")))
            }
        };
        let record = Arc::new(record);
        self.records.lock().insert(id, Arc::clone(&record));
        Ok(record)
    }

    fn view(&self, id: RecordId) -> CoreResult<SegmentView> {
        SegmentView::parse(self.segments.read_segment(&id.segment)?)
    }

    /// Concatenates the chunks of a large node.
    fn join(&self, chain: &StoredChain) -> CoreResult<Vec<u8>> {
        let mut out = Vec::new();
        for &chunk in &chain.chunks {
            let view = self.view(chunk)?;
            match RawRecord::parse(view.record(chunk.index)?)? {
                RawRecord::Chunk(piece) => out.extend_from_slice(piece),
                _ => {
                    return Err(CoreError::corrupt(format!(
                        "chain entry {chunk} is not a chunk"
                    )))
                }
            }
        }
        if out.len() as u64 != chain.len {
            return Err(CoreError::corrupt(format!(
                "chained record is {} bytes, expected {}",
                out.len(),
                chain.len
            )));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("cached", &self.records.lock().len())
            .finish_non_exhaustive()
    }
}
