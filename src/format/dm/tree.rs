//! Tag tree structure and parsing.
//!
//! The body of a DM file is one tag directory holding named entries, each of
//! which is either a nested directory or a typed tag. The parser walks it
//! once, depth-first, preserving child order.
//!
//! # Entry Layout
//!
//! ```text
//! Directory: sorted (u8) | open (u8) | count (i32 DM3, i64 DM4) | entries...
//! Entry:     marker (u8: 20 = directory, 21 = tag) | name length (u16) | name
//!            | DM4 only: entry length (u64)
//! Tag:       "%%%%" | info count (u32/u64) | info words (u32/u64 each) | value
//! ```
//!
//! All of these structural fields are big-endian. Any inconsistency stops
//! the walk with a [`ParseError`]; a partial tree is never returned.

use tracing::debug;

use crate::error::{DmError, ParseError, ParseErrorKind};
use crate::io::{ByteSource, ReadAhead};

use super::codec;
use super::header::FormatHeader;
use super::types::TypeEncoding;
use super::value::TagValue;

// =============================================================================
// Constants
// =============================================================================

/// Entry marker for a nested tag directory
pub const GROUP_MARKER: u8 = 20;

/// Entry marker for a typed tag
pub const TAG_MARKER: u8 = 21;

/// Delimiter in front of every tag's type info
const TAG_DELIMITER: [u8; 4] = *b"%%%%";

/// Maximum directory nesting (safety limit)
const MAX_DEPTH: usize = 256;

/// Most children reserved up front; larger directories grow as they are read
const MAX_RESERVED_CHILDREN: u64 = 1024;

// =============================================================================
// Tree Types
// =============================================================================

/// A child of a tag directory.
#[derive(Debug, Clone, PartialEq)]
pub enum TagNode {
    Group(TagGroup),
    Entry(TagEntry),
}

impl TagNode {
    pub fn name(&self) -> &str {
        match self {
            TagNode::Group(g) => &g.name,
            TagNode::Entry(e) => &e.name,
        }
    }

    pub fn as_group(&self) -> Option<&TagGroup> {
        match self {
            TagNode::Group(g) => Some(g),
            TagNode::Entry(_) => None,
        }
    }

    pub fn as_entry(&self) -> Option<&TagEntry> {
        match self {
            TagNode::Entry(e) => Some(e),
            TagNode::Group(_) => None,
        }
    }
}

/// An ordered tag directory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagGroup {
    /// Entry name (empty for the root and for list items)
    pub name: String,
    pub sorted: bool,
    pub open: bool,
    pub children: Vec<TagNode>,
}

/// A named, typed leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub name: String,

    /// Offset of the entry marker in the file
    pub offset: u64,

    pub encoding: TypeEncoding,
    pub value: TagValue,
}

/// Path segment for the child at `index`: its name, or its position when unnamed.
pub fn segment_label(node: &TagNode, index: usize) -> String {
    if node.name().is_empty() {
        index.to_string()
    } else {
        node.name().to_string()
    }
}

impl TagGroup {
    /// Find a direct child by path segment.
    pub fn child(&self, segment: &str) -> Option<&TagNode> {
        if let Some(node) = self
            .children
            .iter()
            .find(|c| !c.name().is_empty() && c.name() == segment)
        {
            return Some(node);
        }
        let index: usize = segment.parse().ok()?;
        self.children
            .get(index)
            .filter(|node| node.name().is_empty())
    }

    /// Resolve a dotted path such as `ImageList.1.ImageData.DataType`.
    pub fn get(&self, path: &str) -> Option<&TagNode> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.child(first)?;
        for segment in segments {
            node = node.as_group()?.child(segment)?;
        }
        Some(node)
    }

    pub fn group(&self, path: &str) -> Option<&TagGroup> {
        self.get(path)?.as_group()
    }

    pub fn value(&self, path: &str) -> Option<&TagValue> {
        Some(&self.get(path)?.as_entry()?.value)
    }

    /// Visit every leaf depth-first with its dotted path.
    pub fn for_each_entry<'a>(&'a self, mut visit: impl FnMut(&str, &'a TagEntry)) {
        let mut path = String::new();
        walk(self, &mut path, &mut visit);
    }

    /// Number of leaves in this subtree.
    pub fn entry_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                TagNode::Group(g) => g.entry_count(),
                TagNode::Entry(_) => 1,
            })
            .sum()
    }
}

fn walk<'a>(group: &'a TagGroup, path: &mut String, visit: &mut impl FnMut(&str, &'a TagEntry)) {
    for (index, child) in group.children.iter().enumerate() {
        let base_len = path.len();
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&segment_label(child, index));
        match child {
            TagNode::Group(g) => walk(g, path, visit),
            TagNode::Entry(e) => visit(path, e),
        }
        path.truncate(base_len);
    }
}

/// The parsed tag tree of one file. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct TagTree {
    root: TagGroup,
}

impl TagTree {
    pub fn new(root: TagGroup) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TagGroup {
        &self.root
    }

    pub fn get(&self, path: &str) -> Option<&TagNode> {
        self.root.get(path)
    }

    pub fn value(&self, path: &str) -> Option<&TagValue> {
        self.root.value(path)
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Parse the whole tag tree following the header.
///
/// # Arguments
/// * `source` - The opened file
/// * `header` - Header decisions (count width, entry lengths, byte order)
/// * `retain_limit` - Arrays up to this many bytes keep their decoded values
/// * `window` - Read-ahead window size for the walk
pub fn parse_tree<S: ByteSource + ?Sized>(
    source: &S,
    header: &FormatHeader,
    retain_limit: usize,
    window: usize,
) -> Result<TagTree, DmError> {
    let cursor = ReadAhead::with_window(source, header.header_size() as u64, window);
    let mut parser = TreeParser {
        cursor,
        header,
        retain_limit,
    };

    let root = parser.read_group(String::new(), 0)?;
    debug!(
        source = source.identifier(),
        entries = root.entry_count(),
        end = parser.cursor.position(),
        "parsed tag tree"
    );
    Ok(TagTree::new(root))
}

struct TreeParser<'a, 'h, S: ByteSource + ?Sized> {
    cursor: ReadAhead<'a, S>,
    header: &'h FormatHeader,
    retain_limit: usize,
}

impl<S: ByteSource + ?Sized> TreeParser<'_, '_, S> {
    fn read_group(&mut self, name: String, depth: usize) -> Result<TagGroup, DmError> {
        if depth > MAX_DEPTH {
            return Err(self.error(ParseErrorKind::Inconsistent(format!(
                "tag directories nested deeper than {}",
                MAX_DEPTH
            ))));
        }

        let sorted = self.cursor.read_u8()? != 0;
        let open = self.cursor.read_u8()? != 0;

        let count_offset = self.cursor.position();
        let count = self.read_signed_count()?;
        if count < 0 {
            return Err(ParseError::new(count_offset, ParseErrorKind::NegativeCount(count)).into());
        }
        let count = count as u64;

        // Smallest possible entry: marker + empty name (+ DM4 length)
        let min_entry = if self.header.has_entry_lengths() { 11 } else { 3 };
        let needed = count.saturating_mul(min_entry);
        if needed > self.cursor.remaining() {
            return Err(ParseError::new(
                count_offset,
                ParseErrorKind::LengthExceedsFile {
                    declared: needed,
                    available: self.cursor.remaining(),
                },
            )
            .into());
        }

        let mut children = Vec::with_capacity(count.min(MAX_RESERVED_CHILDREN) as usize);
        for _ in 0..count {
            children.push(self.read_entry(depth)?);
        }

        Ok(TagGroup {
            name,
            sorted,
            open,
            children,
        })
    }

    fn read_entry(&mut self, depth: usize) -> Result<TagNode, DmError> {
        let offset = self.cursor.position();
        let marker = self.cursor.read_u8()?;
        let name_length = self.cursor.read_be_u16()?;
        let name: String = self
            .cursor
            .take(name_length as usize)?
            .iter()
            .map(|&b| b as char)
            .collect();

        if self.header.has_entry_lengths() {
            let length_offset = self.cursor.position();
            let declared = self.cursor.read_be_u64()?;
            if declared > self.cursor.remaining() {
                return Err(ParseError::new(
                    length_offset,
                    ParseErrorKind::LengthExceedsFile {
                        declared,
                        available: self.cursor.remaining(),
                    },
                )
                .into());
            }
        }

        match marker {
            GROUP_MARKER => {
                debug!(name = %name, offset, depth, "entering tag directory");
                Ok(TagNode::Group(self.read_group(name, depth + 1)?))
            }
            TAG_MARKER => Ok(TagNode::Entry(self.read_tag(name, offset)?)),
            other => {
                Err(ParseError::new(offset, ParseErrorKind::InvalidMarker(other)).into())
            }
        }
    }

    fn read_tag(&mut self, name: String, offset: u64) -> Result<TagEntry, DmError> {
        let delimiter_offset = self.cursor.position();
        let delimiter = self.cursor.take_array::<4>()?;
        if delimiter != TAG_DELIMITER {
            return Err(ParseError::new(
                delimiter_offset,
                ParseErrorKind::MissingDelimiter(delimiter),
            )
            .into());
        }

        let info_offset = self.cursor.position();
        let info_count = self.read_unsigned_count()?;
        let info_bytes = info_count
            .checked_mul(self.header.count_width() as u64)
            .ok_or_else(|| ParseError::new(info_offset, ParseErrorKind::Overflow))?;
        if info_bytes > self.cursor.remaining() {
            return Err(ParseError::new(
                info_offset,
                ParseErrorKind::LengthExceedsFile {
                    declared: info_bytes,
                    available: self.cursor.remaining(),
                },
            )
            .into());
        }

        let mut info = Vec::with_capacity(info_count as usize);
        for _ in 0..info_count {
            info.push(self.read_unsigned_count()?);
        }

        let encoding = TypeEncoding::parse(&info, info_offset)?;
        let value = codec::read_value(
            &mut self.cursor,
            &encoding,
            self.header.byte_order,
            self.retain_limit,
        )?;

        Ok(TagEntry {
            name,
            offset,
            encoding,
            value,
        })
    }

    fn read_signed_count(&mut self) -> Result<i64, DmError> {
        if self.header.count_width() == 8 {
            self.cursor.read_be_i64()
        } else {
            Ok(self.cursor.read_be_i32()? as i64)
        }
    }

    fn read_unsigned_count(&mut self) -> Result<u64, DmError> {
        if self.header.count_width() == 8 {
            self.cursor.read_be_u64()
        } else {
            Ok(self.cursor.read_be_u32()? as u64)
        }
    }

    fn error(&self, kind: ParseErrorKind) -> DmError {
        ParseError::new(self.cursor.position(), kind).into()
    }
}

// =============================================================================
// Tests
// =============================================================================
