//! Segment store behavior on disk.

use arbor_core::{Config, CoreError, SegmentStore, SEGMENT_SIZE_LIMIT};
use arbor_testkit::prelude::*;
use proptest::prelude::*;
use tempfile::tempdir;

#[test]
fn boundary_sizes_round_trip_across_reopen() {
    let dir = tempdir().unwrap();
    let config = Config::default();
    let max = config.max_segment_size;
    let payloads = [Vec::new(), vec![7u8], vec![0xAB; max]];

    let addresses: Vec<_> = {
        let store = SegmentStore::open(dir.path(), config.clone()).unwrap();
        let addresses = payloads
            .iter()
            .map(|p| store.write_segment(p).unwrap())
            .collect();
        store.close().unwrap();
        addresses
    };

    let store = SegmentStore::open(dir.path(), config).unwrap();
    for (address, payload) in addresses.iter().zip(&payloads) {
        assert_eq!(store.read_segment(address).unwrap().as_ref(), payload.as_slice());
    }
}

#[test]
fn oversized_segment_is_refused() {
    let store = SegmentStore::in_memory(Config::default().max_segment_size(16)).unwrap();
    let err = store.write_segment(&[0u8; 17]).unwrap_err();
    assert!(matches!(err, CoreError::SegmentTooLarge { size: 17, max: 16 }));
}

#[test]
fn segment_size_is_capped() {
    let config = Config::default().max_segment_size(usize::MAX);
    assert_eq!(config.max_segment_size, SEGMENT_SIZE_LIMIT);
}

#[test]
fn duplicate_writes_do_not_grow_the_archive() {
    let dir = tempdir().unwrap();
    let store = SegmentStore::open(dir.path(), Config::default()).unwrap();
    let first = store.write_segment(b"same bytes").unwrap();
    let size = store.stats().unwrap().archive_bytes;

    let second = store.write_segment(b"same bytes").unwrap();
    assert_eq!(first, second);
    assert_eq!(store.stats().unwrap().archive_bytes, size);
    assert_eq!(store.stats().unwrap().segments, 1);
}

#[test]
fn archive_rolls_over_and_reopens() {
    let dir = tempdir().unwrap();
    let config = Config::default().max_archive_file_size(4096);
    let payloads: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i; 1000]).collect();

    {
        let store = SegmentStore::open(dir.path(), config.clone()).unwrap();
        for payload in &payloads {
            store.write_segment(payload).unwrap();
        }
    }
    assert!(archive_files(dir.path()).unwrap().len() > 1);

    let store = SegmentStore::open(dir.path(), config).unwrap();
    assert_eq!(store.stats().unwrap().segments, payloads.len());
    assert!(store.verify().unwrap().is_ok());
}

#[test]
fn second_handle_is_locked_out() {
    let dir = tempdir().unwrap();
    let _first = SegmentStore::open(dir.path(), Config::default()).unwrap();
    let err = SegmentStore::open(dir.path(), Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::StoreLocked));
}

#[test]
fn missing_archive_is_not_created_on_request() {
    let dir = tempdir().unwrap();
    let err = SegmentStore::open(dir.path(), Config::default().create_if_missing(false)).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }), "{err}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn arbitrary_payloads_read_back(payloads in prop::collection::vec(segment_payload_strategy(512), 1..8)) {
        let store = SegmentStore::in_memory(Config::default()).unwrap();
        for payload in &payloads {
            let address = store.write_segment(payload).unwrap();
            let read_back = store.read_segment(&address).unwrap();
            prop_assert_eq!(read_back.as_ref(), payload.as_slice());
        }
    }
}
