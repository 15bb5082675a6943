//! Stable handles to objects allocated inside pages.

use meridian_common::page::{PageId, PAGE_DATA_SIZE};

/// Sentinel page id marking the null handle.
const NULL_PAGE: u32 = u32::MAX;

/// Type tag wrapper for handles.
///
/// A wrapper around a u16 whose sole purpose is to keep allocation
/// sizes and type codes from being swapped at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleType(pub u16);

impl HandleType {
    /// Untyped allocation.
    pub const UNTYPED: HandleType = HandleType(0);
}

/// The stable `(page_id, offset, type_tag)` identity of an in-page
/// object.
///
/// A handle keeps addressing the same object across evictions and
/// reloads, until the object is explicitly freed. Equality is
/// structural on the page location; the type tag is metadata used as a
/// safety check at deallocation time and does not participate.
///
/// The null handle has no location; all null handles compare equal.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct NodeHandle {
    page_id: u32,
    offset: u16,
    type_tag: u16,
}

// Handles are embedded in node entries, so the layout must stay fixed.
const _: () = assert!(std::mem::size_of::<NodeHandle>() == 8);
const _: () = assert!(PAGE_DATA_SIZE <= u16::MAX as usize);

impl NodeHandle {
    /// Serialized size in bytes.
    pub const SERIALIZED_SIZE: usize = 8;

    /// Creates a handle to the object at `offset` within `page_id`.
    pub fn new(page_id: PageId, offset: u16, type_tag: HandleType) -> Self {
        debug_assert!(page_id.is_valid());
        debug_assert!((offset as usize) < PAGE_DATA_SIZE);
        Self {
            page_id: page_id.0,
            offset,
            type_tag: type_tag.0,
        }
    }

    /// The null handle.
    pub const fn null() -> Self {
        Self {
            page_id: NULL_PAGE,
            offset: 0,
            type_tag: 0,
        }
    }

    /// Returns true if this handle addresses nothing.
    pub fn is_null(&self) -> bool {
        self.page_id == NULL_PAGE
    }

    /// The page this handle points into.
    pub fn page_id(&self) -> PageId {
        debug_assert!(!self.is_null());
        PageId(self.page_id)
    }

    /// Byte offset within the page data region.
    pub fn offset(&self) -> u16 {
        debug_assert!(!self.is_null());
        self.offset
    }

    /// The type tag recorded at allocation time.
    pub fn type_tag(&self) -> HandleType {
        HandleType(self.type_tag)
    }

    /// Replaces the type tag.
    pub fn set_type(&mut self, type_tag: HandleType) {
        debug_assert!(!self.is_null());
        self.type_tag = type_tag.0;
    }

    /// A handle to the same page at a different offset, keeping the
    /// type tag. Used when carving a free block.
    pub fn at_offset(&self, offset: u16) -> Self {
        debug_assert!(!self.is_null());
        Self {
            page_id: self.page_id,
            offset,
            type_tag: self.type_tag,
        }
    }

    /// Serializes the handle for the meta file.
    pub fn to_bytes(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..6].copy_from_slice(&self.offset.to_le_bytes());
        buf[6..8].copy_from_slice(&self.type_tag.to_le_bytes());
        buf
    }

    /// Deserializes a handle.
    pub fn from_bytes(buf: &[u8; Self::SERIALIZED_SIZE]) -> Self {
        Self {
            page_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            offset: u16::from_le_bytes([buf[4], buf[5]]),
            type_tag: u16::from_le_bytes([buf[6], buf[7]]),
        }
    }
}

impl Default for NodeHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }
        self.page_id == other.page_id && self.offset == other.offset
    }
}

impl Eq for NodeHandle {}

impl std::hash::Hash for NodeHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.page_id.hash(state);
        if !self.is_null() {
            self.offset.hash(state);
        }
    }
}

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "{{ null }}")
        } else {
            write!(
                f,
                "{{ page: {}, offset: {} }}",
                self.page_id, self.offset
            )
        }
    }
}
