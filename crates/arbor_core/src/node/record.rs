//! Node records and their stored form.

use crate::error::{CoreError, CoreResult};
use crate::node::value::PropertyState;
use crate::types::{Address, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable node: its properties and references to its children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRecord {
    properties: BTreeMap<String, PropertyState>,
    children: BTreeMap<String, RecordId>,
    /// Explicit child order for orderable nodes.
    child_order: Option<Vec<String>>,
}

impl NodeRecord {
    /// Properties by name.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, PropertyState> {
        &self.properties
    }

    /// One property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyState> {
        self.properties.get(name)
    }

    /// One child reference.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<RecordId> {
        self.children.get(name).copied()
    }

    /// Number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// True if the node keeps its children in insertion order.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        self.child_order.is_some()
    }

    pub(crate) fn child_order(&self) -> Option<&[String]> {
        self.child_order.as_deref()
    }

    /// Child names: insertion order for orderable nodes, sorted otherwise.
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        match &self.child_order {
            Some(order) => order.iter().map(String::as_str).collect(),
            None => self.children.keys().map(String::as_str).collect(),
        }
    }
}

/// A child reference inside a segment.
///
/// A record can point at a sibling record in the same segment before that
/// segment's address is known, so such references are stored as an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum ChildRef {
    Local(u32),
    Remote(RecordId),
}

/// First byte of every node-layer record.
const NODE_RECORD: u8 = 0;
const CHUNK_RECORD: u8 = 1;
const CHAIN_RECORD: u8 = 2;

/// Bytes a record adds around its body.
pub(crate) const RECORD_TAG_SIZE: usize = 1;

/// A record read back from a segment, by kind.
///
/// A node whose encoding does not fit in one segment is stored as raw
/// chunks spread over as many segments as needed, plus a chain record
/// listing them. The chain record stands in for the node everywhere.
#[derive(Debug)]
pub(crate) enum RawRecord<'a> {
    Node(&'a [u8]),
    Chunk(&'a [u8]),
    Chain(StoredChain),
}

impl<'a> RawRecord<'a> {
    pub(crate) fn parse(bytes: &'a [u8]) -> CoreResult<Self> {
        let Some((&kind, body)) = bytes.split_first() else {
            return Err(CoreError::corrupt("empty node record"));
        };
        match kind {
            NODE_RECORD => Ok(Self::Node(body)),
            CHUNK_RECORD => Ok(Self::Chunk(body)),
            CHAIN_RECORD => Ok(Self::Chain(arbor_codec::from_cbor(body)?)),
            other => Err(CoreError::corrupt(format!("unknown record kind {other}"))),
        }
    }
}

/// The chunks of one large node, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredChain {
    /// Length of the joined node bytes.
    pub(crate) len: u64,
    pub(crate) chunks: Vec<RecordId>,
}

impl StoredChain {
    pub(crate) fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(tagged(CHAIN_RECORD, &arbor_codec::to_canonical_cbor(self)?))
    }
}

pub(crate) fn encode_chunk(piece: &[u8]) -> Vec<u8> {
    tagged(CHUNK_RECORD, piece)
}

fn tagged(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_TAG_SIZE + body.len());
    out.push(kind);
    out.extend_from_slice(body);
    out
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredNode {
    pub(crate) properties: BTreeMap<String, PropertyState>,
    pub(crate) children: BTreeMap<String, ChildRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) child_order: Option<Vec<String>>,
}

impl StoredNode {
    pub(crate) fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(tagged(NODE_RECORD, &arbor_codec::to_canonical_cbor(self)?))
    }

    /// Decodes a node record read from segment `segment`.
    ///
    /// For a chained node, `bytes` are the joined chunks.
    pub(crate) fn decode(bytes: &[u8], segment: Address) -> CoreResult<NodeRecord> {
        let RawRecord::Node(body) = RawRecord::parse(bytes)? else {
            return Err(CoreError::corrupt(format!(
                "expected a node record in segment {}",
                segment.short()
            )));
        };
        let stored: StoredNode = arbor_codec::from_cbor(body)?;
        let children: BTreeMap<String, RecordId> = stored
            .children
            .into_iter()
            .map(|(name, child)| {
                let id = match child {
                    ChildRef::Local(index) => RecordId::new(segment, index),
                    ChildRef::Remote(id) => id,
                };
                (name, id)
            })
            .collect();

        if let Some(order) = &stored.child_order {
            if order.len() != children.len() || order.iter().any(|n| !children.contains_key(n)) {
                return Err(CoreError::corrupt(format!(
                    "child order does not match children in segment {}",
                    segment.short()
                )));
            }
        }

        Ok(NodeRecord {
            properties: stored.properties,
            children,
            child_order: stored.child_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(order: Option<Vec<&str>>) -> StoredNode {
        let mut children = BTreeMap::new();
        children.insert("b".to_string(), ChildRef::Local(0));
        children.insert(
            "a".to_string(),
            ChildRef::Remote(RecordId::new(Address::of(b"elsewhere"), 4)),
        );
        let mut properties = BTreeMap::new();
        properties.insert("jcr:primaryType".to_string(), PropertyState::name("nt:unstructured"));
        StoredNode {
            properties,
            children,
            child_order: order.map(|o| o.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn local_refs_resolve_against_containing_segment() {
        let segment = Address::of(b"this segment");
        let bytes = stored(None).encode().unwrap();
        let record = StoredNode::decode(&bytes, segment).unwrap();

        assert_eq!(record.child("b"), Some(RecordId::new(segment, 0)));
        assert_eq!(record.child("a"), Some(RecordId::new(Address::of(b"elsewhere"), 4)));
        assert_eq!(record.child_names(), vec!["a", "b"]);
        assert!(!record.is_orderable());
        assert_eq!(
            record.property("jcr:primaryType").and_then(PropertyState::as_str),
            Some("nt:unstructured")
        );
    }

    #[test]
    fn orderable_keeps_order() {
        let bytes = stored(Some(vec!["b", "a"])).encode().unwrap();
        let record = StoredNode::decode(&bytes, Address::of(b"s")).unwrap();
        assert!(record.is_orderable());
        assert_eq!(record.child_names(), vec!["b", "a"]);
    }

    #[test]
    fn inconsistent_order_is_corrupt() {
        let bytes = stored(Some(vec!["a"])).encode().unwrap();
        assert!(matches!(
            StoredNode::decode(&bytes, Address::of(b"s")),
            Err(CoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn records_carry_their_kind() {
        let node = stored(None).encode().unwrap();
        assert!(matches!(RawRecord::parse(&node).unwrap(), RawRecord::Node(_)));

        let chunk = encode_chunk(b"piece");
        assert!(matches!(RawRecord::parse(&chunk).unwrap(), RawRecord::Chunk(body) if body == b"piece"));

        let chain = StoredChain {
            len: 10,
            chunks: vec![RecordId::new(Address::of(b"a"), 0), RecordId::new(Address::of(b"b"), 3)],
        };
        match RawRecord::parse(&chain.encode().unwrap()).unwrap() {
            RawRecord::Chain(decoded) => assert_eq!(decoded, chain),
            other => panic!("decoded {other:?}"),
        }

        assert!(RawRecord::parse(&[]).is_err());
        assert!(RawRecord::parse(&[9, 0]).is_err());
    }

    #[test]
    fn chunk_is_not_a_node() {
        assert!(matches!(
            StoredNode::decode(&encode_chunk(b"x"), Address::of(b"s")),
            Err(CoreError::Corrupt { .. })
        ));
    }
}
