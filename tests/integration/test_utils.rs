//! Test utilities for integration tests.
//!
//! This module provides a small DM3/DM4 writer, fixture builders for the
//! image layouts the reader has to handle, and a byte source that counts
//! its reads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use dm_reader::error::IoError;
use dm_reader::io::{ByteSource, MemorySource};

// =============================================================================
// Tracking Byte Source
// =============================================================================

/// A byte source that counts every read request.
pub struct TrackingSource {
    inner: MemorySource,
    request_count: Arc<AtomicUsize>,
}

impl TrackingSource {
    pub fn new(data: Vec<u8>, identifier: &str) -> Self {
        Self {
            inner: MemorySource::from_bytes(data, identifier.to_string()),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

impl ByteSource for TrackingSource {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.inner.read_at(offset, len)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}

// =============================================================================
// Tag Values
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    Dm3,
    Dm4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Typed values for a tag; a scalar tag holds exactly one.
#[derive(Clone, Debug)]
pub enum Samples {
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Samples {
    fn type_code(&self) -> u64 {
        match self {
            Samples::I16(_) => 2,
            Samples::I32(_) => 3,
            Samples::U16(_) => 4,
            Samples::U32(_) => 5,
            Samples::F32(_) => 6,
            Samples::F64(_) => 7,
            Samples::U8(_) => 10,
        }
    }

    fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::I16(v) => v.len(),
            Samples::U16(v) => v.len(),
            Samples::I32(v) => v.len(),
            Samples::U32(v) => v.len(),
            Samples::F32(v) => v.len(),
            Samples::F64(v) => v.len(),
        }
    }

    fn encode(&self, order: ByteOrderType) -> Vec<u8> {
        macro_rules! encode {
            ($values:expr) => {
                $values
                    .iter()
                    .flat_map(|v| match order {
                        ByteOrderType::LittleEndian => v.to_le_bytes().to_vec(),
                        ByteOrderType::BigEndian => v.to_be_bytes().to_vec(),
                    })
                    .collect()
            };
        }
        match self {
            Samples::U8(v) => v.clone(),
            Samples::I16(v) => encode!(v),
            Samples::U16(v) => encode!(v),
            Samples::I32(v) => encode!(v),
            Samples::U32(v) => encode!(v),
            Samples::F32(v) => encode!(v),
            Samples::F64(v) => encode!(v),
        }
    }
}

/// A node of the tag tree to write.
#[derive(Clone, Debug)]
pub enum TestNode {
    Group {
        name: String,
        children: Vec<TestNode>,
    },
    Scalar {
        name: String,
        value: Samples,
    },
    Array {
        name: String,
        values: Samples,
    },
}

impl TestNode {
    pub fn group(name: &str, children: Vec<TestNode>) -> Self {
        TestNode::Group {
            name: name.to_string(),
            children,
        }
    }

    pub fn u32(name: &str, value: u32) -> Self {
        TestNode::Scalar {
            name: name.to_string(),
            value: Samples::U32(vec![value]),
        }
    }

    pub fn i32(name: &str, value: i32) -> Self {
        TestNode::Scalar {
            name: name.to_string(),
            value: Samples::I32(vec![value]),
        }
    }

    pub fn f32(name: &str, value: f32) -> Self {
        TestNode::Scalar {
            name: name.to_string(),
            value: Samples::F32(vec![value]),
        }
    }

    pub fn f64(name: &str, value: f64) -> Self {
        TestNode::Scalar {
            name: name.to_string(),
            value: Samples::F64(vec![value]),
        }
    }

    /// Text stored the way DM stores it: an array of UTF-16 units.
    pub fn text(name: &str, text: &str) -> Self {
        TestNode::Array {
            name: name.to_string(),
            values: Samples::U16(text.encode_utf16().collect()),
        }
    }

    pub fn array(name: &str, values: Samples) -> Self {
        TestNode::Array {
            name: name.to_string(),
            values,
        }
    }
}

// =============================================================================
// DM File Builder
// =============================================================================

/// Builder for test DM files.
pub struct DmBuilder {
    version: Version,
    byte_order: ByteOrderType,
    nodes: Vec<TestNode>,
}

impl DmBuilder {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            byte_order: ByteOrderType::LittleEndian,
            nodes: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn add(mut self, node: TestNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Build the file data.
    pub fn build(self) -> Vec<u8> {
        let mut body = Vec::new();
        self.write_directory(&mut body, &self.nodes);

        let mut data = Vec::new();
        match self.version {
            Version::Dm3 => {
                data.extend(3u32.to_be_bytes());
                data.extend((body.len() as u32).to_be_bytes());
            }
            Version::Dm4 => {
                data.extend(4u32.to_be_bytes());
                data.extend((body.len() as u64).to_be_bytes());
            }
        }
        let flag: u32 = match self.byte_order {
            ByteOrderType::BigEndian => 0,
            ByteOrderType::LittleEndian => 1,
        };
        data.extend(flag.to_be_bytes());
        data.extend(body);
        data.extend([0u8; 8]);
        data
    }

    fn write_count(&self, out: &mut Vec<u8>, value: u64) {
        match self.version {
            Version::Dm3 => out.extend((value as u32).to_be_bytes()),
            Version::Dm4 => out.extend(value.to_be_bytes()),
        }
    }

    fn write_directory(&self, out: &mut Vec<u8>, nodes: &[TestNode]) {
        out.push(0); // sorted
        out.push(1); // open
        self.write_count(out, nodes.len() as u64);
        for node in nodes {
            self.write_entry(out, node);
        }
    }

    fn write_entry(&self, out: &mut Vec<u8>, node: &TestNode) {
        let mut body = Vec::new();
        let (marker, name) = match node {
            TestNode::Group { name, children } => {
                self.write_directory(&mut body, children);
                (20u8, name)
            }
            TestNode::Scalar { name, value } => {
                body.extend(b"%%%%");
                self.write_count(&mut body, 1);
                self.write_count(&mut body, value.type_code());
                body.extend(value.encode(self.byte_order));
                (21u8, name)
            }
            TestNode::Array { name, values } => {
                body.extend(b"%%%%");
                self.write_count(&mut body, 3);
                self.write_count(&mut body, 20);
                self.write_count(&mut body, values.type_code());
                self.write_count(&mut body, values.len() as u64);
                body.extend(values.encode(self.byte_order));
                (21u8, name)
            }
        };

        out.push(marker);
        out.extend((name.len() as u16).to_be_bytes());
        out.extend(name.as_bytes());
        if self.version == Version::Dm4 {
            out.extend((body.len() as u64).to_be_bytes());
        }
        out.extend(body);
    }
}

// =============================================================================
// Image Builders
// =============================================================================

/// One image container.
#[derive(Clone, Debug)]
pub struct TestImage {
    pub name: String,
    pub data_type: u32,
    /// Extents, fastest axis first (file order)
    pub dims: Vec<u32>,
    /// (origin, scale, units) per axis, file order
    pub calibrations: Vec<(f32, f32, String)>,
    pub data: Samples,
}

impl TestImage {
    pub fn new(name: &str, data_type: u32, dims: &[u32], data: Samples) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            dims: dims.to_vec(),
            calibrations: Vec::new(),
            data,
        }
    }

    pub fn with_calibration(mut self, origin: f32, scale: f32, units: &str) -> Self {
        self.calibrations.push((origin, scale, units.to_string()));
        self
    }

    pub fn to_node(&self) -> TestNode {
        let calibrations = self
            .calibrations
            .iter()
            .map(|(origin, scale, units)| {
                TestNode::group(
                    "",
                    vec![
                        TestNode::f32("Origin", *origin),
                        TestNode::f32("Scale", *scale),
                        TestNode::text("Units", units),
                    ],
                )
            })
            .collect();

        TestNode::group(
            "",
            vec![
                TestNode::group(
                    "ImageData",
                    vec![
                        TestNode::group(
                            "Calibrations",
                            vec![
                                TestNode::group(
                                    "Brightness",
                                    vec![
                                        TestNode::f32("Origin", 0.0),
                                        TestNode::f32("Scale", 1.0),
                                        TestNode::text("Units", "Counts"),
                                    ],
                                ),
                                TestNode::group("Dimension", calibrations),
                            ],
                        ),
                        TestNode::array("Data", self.data.clone()),
                        TestNode::i32("DataType", self.data_type as i32),
                        TestNode::group(
                            "Dimensions",
                            self.dims.iter().map(|&d| TestNode::u32("", d)).collect(),
                        ),
                        TestNode::i32("PixelDepth", 4),
                    ],
                ),
                TestNode::group(
                    "ImageTags",
                    vec![TestNode::group(
                        "Microscope Info",
                        vec![
                            TestNode::f64("Voltage", 300000.0),
                            TestNode::text("Operator", "test"),
                        ],
                    )],
                ),
                TestNode::text("Name", &self.name),
                TestNode::u32("UniqueID", 7),
            ],
        )
    }
}

/// A complete file with the given images under `ImageList`.
pub fn build_image_file(version: Version, order: ByteOrderType, images: &[TestImage]) -> Vec<u8> {
    DmBuilder::new(version)
        .with_byte_order(order)
        .add(TestNode::u32("ApplicationBounds", 0))
        .add(TestNode::group(
            "DocumentObjectList",
            vec![TestNode::group(
                "",
                vec![TestNode::u32("ImageDisplayType", 1)],
            )],
        ))
        .add(TestNode::group(
            "ImageList",
            images.iter().map(TestImage::to_node).collect(),
        ))
        .add(TestNode::u32("InImageMode", 1))
        .build()
}

/// A small 2D `u8` preview, written first the way acquisition software does.
pub fn thumbnail() -> TestImage {
    TestImage::new("thumbnail", 6, &[8, 8], Samples::U8(vec![128; 64]))
}

/// Thumbnail plus a 6 x 4 x 3 `f32` stack with different pixel sizes per axis.
///
/// Sample `i` (file order) holds `i as f32`.
pub fn nonsquare_3d_file(version: Version, order: ByteOrderType) -> Vec<u8> {
    let data: Vec<f32> = (0..72).map(|i| i as f32).collect();
    let image = TestImage::new("stack", 2, &[6, 4, 3], Samples::F32(data))
        .with_calibration(0.0, 0.5, "nm")
        .with_calibration(0.0, 0.25, "nm")
        .with_calibration(0.0, 2.0, "eV");
    build_image_file(version, order, &[thumbnail(), image])
}

/// Thumbnail plus a 2048-channel spectrum stored as a 2048 x 1 image.
pub fn spectrum_1d_file(version: Version, order: ByteOrderType) -> Vec<u8> {
    let data: Vec<f32> = (0..2048).map(|i| (i % 97) as f32).collect();
    let image = TestImage::new("spectrum", 2, &[2048, 1], Samples::F32(data))
        .with_calibration(-400.0, 0.5, "eV")
        .with_calibration(0.0, 1.0, "");
    build_image_file(version, order, &[thumbnail(), image])
}

/// A single five-dimensional image.
pub fn five_d_file() -> Vec<u8> {
    let image = TestImage::new("5d", 10, &[2, 2, 2, 2, 2], Samples::U16(vec![1; 32]));
    build_image_file(Version::Dm4, ByteOrderType::LittleEndian, &[image])
}

/// Thumbnail plus a 64 x 64 x 32 x 8 `f32` hyperstack (4MB of pixels).
pub fn large_4d_file(version: Version) -> Vec<u8> {
    let count = 64 * 64 * 32 * 8;
    let data: Vec<f32> = (0..count).map(|i| (i % 1013) as f32 * 0.5).collect();
    let image = TestImage::new("hyperstack", 2, &[64, 64, 32, 8], Samples::F32(data));
    build_image_file(version, ByteOrderType::LittleEndian, &[thumbnail(), image])
}

// =============================================================================
// Files on Disk
// =============================================================================

/// Write `data` to a temporary file, returning the guard and the path.
pub fn write_temp(data: &[u8], name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    (dir, path)
}

/// Offset just past the tag tree: header plus declared root length.
pub fn tree_end(data: &[u8]) -> usize {
    let version = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if version == 3 {
        12 + u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize
    } else {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[4..12]);
        16 + u64::from_be_bytes(raw) as usize
    }
}

/// Deterministic pseudo-random offsets in `[low, high)`.
pub fn pseudo_random_offsets(low: usize, high: usize, count: usize, seed: u64) -> Vec<usize> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            low + ((state >> 33) as usize) % (high - low)
        })
        .collect()
}
