//! Access mode integration tests.
//!
//! Tests verify:
//! - File-backed and memory-backed sessions return identical results
//! - Repeated opens discover the same tags and datasets
//! - Memory-backed payload and dataset reads are faster than file-backed ones
//! - The inline array limit never changes what a session reports
//! - The tree walk batches its reads

use std::time::{Duration, Instant};

use dm_reader::{AccessMode, DmFile, ReadOptions, Value};

use super::test_utils::{
    large_4d_file, nonsquare_3d_file, spectrum_1d_file, write_temp, ByteOrderType, DmBuilder,
    Samples, TestNode, TrackingSource, Version,
};

/// Number of repeated reads in the performance comparison.
const REPEAT: usize = 10;

/// Timing rounds per mode for decoded datasets; the fastest round counts.
const ROUNDS: usize = 3;

fn open(path: &std::path::Path, mode: AccessMode) -> DmFile<Box<dyn dm_reader::ByteSource>> {
    DmFile::open(path, &ReadOptions::new(mode)).unwrap()
}

// =============================================================================
// Equivalence
// =============================================================================

#[test]
fn test_modes_return_identical_datasets() {
    let fixtures = [
        ("stack.dm3", nonsquare_3d_file(Version::Dm3, ByteOrderType::LittleEndian)),
        ("stack.dm4", nonsquare_3d_file(Version::Dm4, ByteOrderType::BigEndian)),
        ("spectrum.dm4", spectrum_1d_file(Version::Dm4, ByteOrderType::LittleEndian)),
    ];

    for (name, data) in fixtures {
        let (_dir, path) = write_temp(&data, name);
        let file = open(&path, AccessMode::File);
        let memory = open(&path, AccessMode::Memory);

        assert_eq!(file.header(), memory.header());
        assert_eq!(file.dataset_count(), memory.dataset_count());
        for i in 0..file.dataset_count() {
            assert_eq!(file.descriptor(i).unwrap(), memory.descriptor(i).unwrap());
            assert_eq!(file.raw_data(i).unwrap(), memory.raw_data(i).unwrap());
            assert_eq!(file.dataset(i).unwrap(), memory.dataset(i).unwrap(), "{}", name);
        }
        assert_eq!(file.all_tags().unwrap(), memory.all_tags().unwrap());
    }
}

#[test]
fn test_read_ahead_window_does_not_change_results() {
    let data = nonsquare_3d_file(Version::Dm4, ByteOrderType::LittleEndian);
    let (_dir, path) = write_temp(&data, "stack.dm4");

    let reference = open(&path, AccessMode::File);
    for window in [64, 100, 4096, 1 << 20] {
        let options = ReadOptions::new(AccessMode::File).with_read_ahead(window);
        let file = DmFile::open(&path, &options).unwrap();
        assert_eq!(file.tags(), reference.tags(), "window {}", window);
    }
}

fn lookup_file() -> Vec<u8> {
    DmBuilder::new(Version::Dm4)
        .add(TestNode::group(
            "Acquisition",
            vec![
                TestNode::array("Lookup", Samples::F32(vec![0.75; 2000])),
                TestNode::text("Operator", "beamline scientist"),
            ],
        ))
        .build()
}

#[test]
fn test_inline_array_limit_does_not_change_results() {
    let fixtures = [
        ("stack.dm4", nonsquare_3d_file(Version::Dm4, ByteOrderType::BigEndian)),
        ("lookup.dm4", lookup_file()),
    ];

    for (name, data) in fixtures {
        let (_dir, path) = write_temp(&data, name);
        for mode in [AccessMode::File, AccessMode::Memory] {
            let reference = open(&path, mode);
            let reference_tags = reference.all_tags().unwrap();

            for limit in [0, 16, 1 << 20] {
                let options = ReadOptions::new(mode).with_inline_array_limit(limit);
                let file = DmFile::open(&path, &options).unwrap();
                assert_eq!(file.descriptors(), reference.descriptors(), "{} {}", name, limit);
                assert_eq!(file.all_tags().unwrap(), reference_tags, "{} {}", name, limit);
            }
        }
    }
}

#[test]
fn test_large_metadata_arrays_are_listed_by_value() {
    let (_dir, path) = write_temp(&lookup_file(), "lookup.dm4");
    let tags = open(&path, AccessMode::File).all_tags().unwrap();

    match tags.get("Acquisition.Lookup") {
        Some(Value::Array(values)) => assert_eq!(values.len(), 2000),
        other => panic!("expected lookup values, got {:?}", other),
    }
    match tags.get("Acquisition.Operator") {
        Some(Value::Array(values)) => {
            assert_eq!(values.as_text().as_deref(), Some("beamline scientist"))
        }
        other => panic!("expected operator text, got {:?}", other),
    }
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_repeated_opens_are_deterministic() {
    let data = nonsquare_3d_file(Version::Dm3, ByteOrderType::BigEndian);
    let (_dir, path) = write_temp(&data, "stack.dm3");

    for mode in [AccessMode::File, AccessMode::Memory] {
        let first = open(&path, mode);
        let first_tags = first.all_tags().unwrap();
        let first_descriptors = first.descriptors().to_vec();
        first.close();

        for _ in 0..3 {
            let again = open(&path, mode);
            assert_eq!(again.all_tags().unwrap(), first_tags);
            assert_eq!(again.descriptors(), first_descriptors.as_slice());

            let keys: Vec<String> = again
                .all_tags()
                .unwrap()
                .keys()
                .map(str::to_string)
                .collect();
            let expected: Vec<String> = first_tags.keys().map(str::to_string).collect();
            assert_eq!(keys, expected);
        }
    }
}

// =============================================================================
// Performance
// =============================================================================

fn time_raw_reads(file: &DmFile<Box<dyn dm_reader::ByteSource>>) -> Duration {
    let start = Instant::now();
    let mut total = 0;
    for _ in 0..REPEAT {
        total += file.raw_data(0).unwrap().len();
    }
    assert_eq!(total, REPEAT * 64 * 64 * 32 * 8 * 4);
    start.elapsed()
}

fn time_datasets(file: &DmFile<Box<dyn dm_reader::ByteSource>>) -> Duration {
    let start = Instant::now();
    let mut total = 0;
    for _ in 0..REPEAT {
        total += file.dataset(0).unwrap().len();
    }
    assert_eq!(total, REPEAT * 64 * 64 * 32 * 8);
    start.elapsed()
}

#[test]
fn test_memory_mode_repeated_reads_are_faster() {
    let data = large_4d_file(Version::Dm4);
    let (_dir, path) = write_temp(&data, "hyperstack.dm4");

    let file = open(&path, AccessMode::File);
    let memory = open(&path, AccessMode::Memory);

    // Warm up the page cache so file mode is measured at its best
    let _ = file.raw_data(0).unwrap();

    let file_time = time_raw_reads(&file);
    let memory_time = time_raw_reads(&memory);
    assert!(
        memory_time < file_time,
        "memory {:?} should beat file {:?}",
        memory_time,
        file_time
    );

    // Both still decode to the same array
    assert_eq!(file.dataset(0).unwrap(), memory.dataset(0).unwrap());
}

#[test]
fn test_memory_mode_repeated_datasets_are_faster() {
    let data = large_4d_file(Version::Dm4);
    let (_dir, path) = write_temp(&data, "hyperstack.dm4");

    let file = open(&path, AccessMode::File);
    let memory = open(&path, AccessMode::Memory);
    let _ = file.dataset(0).unwrap();

    let mut file_time = Duration::MAX;
    let mut memory_time = Duration::MAX;
    for _ in 0..ROUNDS {
        file_time = file_time.min(time_datasets(&file));
        memory_time = memory_time.min(time_datasets(&memory));
    }
    assert!(
        memory_time < file_time,
        "memory {:?} should beat file {:?}",
        memory_time,
        file_time
    );
}

#[test]
fn test_memory_mode_payload_is_zero_copy() {
    let data = large_4d_file(Version::Dm3);
    let (_dir, path) = write_temp(&data, "hyperstack.dm3");
    let memory = open(&path, AccessMode::Memory);

    let a = memory.raw_data(0).unwrap();
    let b = memory.raw_data(0).unwrap();
    assert_eq!(a.as_ptr(), b.as_ptr());
}

// =============================================================================
// Read Batching
// =============================================================================

#[test]
fn test_tree_walk_reads_in_windows() {
    let data = nonsquare_3d_file(Version::Dm4, ByteOrderType::LittleEndian);
    let len = data.len();
    let source = TrackingSource::new(data, "tracking://stack");
    let counter = source.counter();

    let file = DmFile::from_source(source, &ReadOptions::default()).unwrap();
    let after_open = counter.load(std::sync::atomic::Ordering::SeqCst);

    // Header read plus a single 64KB window covers this small file
    assert!(len < 64 * 1024);
    assert_eq!(after_open, 2);
    assert_eq!(file.source().request_count(), 2);

    file.raw_data(0).unwrap();
    assert_eq!(file.source().request_count(), 3);
}
