//! Isothetic polygon layouts.
//!
//! Polygons come in two storage flavours. The inline form has a fixed
//! rectangle capacity and can be embedded anywhere. The unbounded form
//! is a size-prefixed header followed by its rectangle array in the
//! same allocation; it only ever lives inside pages handed out by the
//! tree-node allocator, which is also why the allocator's minimum
//! useful fragment size is derived from it.

use crate::geom::{Point, Rect};

/// Rectangle capacity of the inline polygon form. Past this the
/// polygon spills into the unbounded form.
pub const MAX_RECTANGLE_COUNT: usize = 5;

/// A polygon with a fixed inline rectangle capacity.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct InlinePolygon {
    rect_count: u32,
    _reserved: u32,
    bbox: Rect,
    rects: [Rect; MAX_RECTANGLE_COUNT],
}

impl InlinePolygon {
    /// Creates an empty polygon.
    pub fn new() -> Self {
        Self {
            rect_count: 0,
            _reserved: 0,
            bbox: Rect::EMPTY,
            rects: [Rect::EMPTY; MAX_RECTANGLE_COUNT],
        }
    }

    /// Creates a polygon from a single base rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        let mut p = Self::new();
        p.push(rect);
        p
    }

    pub fn len(&self) -> usize {
        self.rect_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.rect_count == 0
    }

    /// Appends a rectangle. Returns false once capacity is reached;
    /// the caller is expected to spill to the unbounded form.
    pub fn push(&mut self, rect: Rect) -> bool {
        if self.len() == MAX_RECTANGLE_COUNT {
            return false;
        }
        self.rects[self.len()] = rect;
        self.rect_count += 1;
        self.bbox.expand(&rect);
        true
    }

    pub fn rect(&self, index: usize) -> Rect {
        assert!(index < self.len());
        self.rects[index]
    }

    pub fn bounding_box(&self) -> Rect {
        self.bbox
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.rects[..self.len()].iter().any(|r| r.contains_point(p))
    }

    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        self.bbox.intersects(rect) && self.rects[..self.len()].iter().any(|r| r.intersects(rect))
    }
}

impl Default for InlinePolygon {
    fn default() -> Self {
        Self::new()
    }
}

/// Header of the unbounded polygon form. The rectangle array follows
/// the header immediately in the same allocation; `max_rect_count` is
/// the size prefix recording how many rectangles the allocation can
/// hold.
///
/// Never materialize this on the stack: it is only meaningful at the
/// start of an allocation of at least
/// `unbounded_polygon_size(max_rect_count)` bytes.
#[derive(Debug)]
#[repr(C)]
pub struct PolygonHeader {
    rect_count: u32,
    max_rect_count: u32,
    bbox: Rect,
}

/// Allocation size of an unbounded polygon holding up to `max_rects`
/// rectangles.
pub const fn unbounded_polygon_size(max_rects: usize) -> usize {
    std::mem::size_of::<PolygonHeader>() + max_rects * std::mem::size_of::<Rect>()
}

impl PolygonHeader {
    /// Initializes the header in place for an allocation sized for
    /// `max_rect_count` rectangles.
    pub fn init(&mut self, max_rect_count: u32) {
        self.rect_count = 0;
        self.max_rect_count = max_rect_count;
        self.bbox = Rect::EMPTY;
    }

    pub fn len(&self) -> usize {
        self.rect_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.rect_count == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_rect_count as usize
    }

    pub fn bounding_box(&self) -> Rect {
        self.bbox
    }

    fn rects_ptr(&self) -> *const Rect {
        // The rectangle array starts right past the header.
        unsafe { (self as *const PolygonHeader).add(1) as *const Rect }
    }

    fn rects_ptr_mut(&mut self) -> *mut Rect {
        unsafe { (self as *mut PolygonHeader).add(1) as *mut Rect }
    }

    /// Reads a rectangle from the tail array.
    ///
    /// # Safety
    /// The header must sit at the start of an allocation of at least
    /// `unbounded_polygon_size(self.capacity())` bytes.
    pub unsafe fn rect(&self, index: usize) -> Rect {
        assert!(index < self.len());
        unsafe { *self.rects_ptr().add(index) }
    }

    /// Appends a rectangle to the tail array. Returns false when the
    /// allocation is full.
    ///
    /// # Safety
    /// Same allocation requirement as [`PolygonHeader::rect`].
    pub unsafe fn push(&mut self, rect: Rect) -> bool {
        if self.rect_count >= self.max_rect_count {
            return false;
        }
        let len = self.len();
        unsafe {
            let slot = self.rects_ptr_mut().add(len);
            slot.write(rect);
        }
        self.rect_count += 1;
        self.bbox.expand(&rect);
        true
    }

    /// Whether any rectangle of the polygon contains the point.
    ///
    /// # Safety
    /// Same allocation requirement as [`PolygonHeader::rect`].
    pub unsafe fn contains_point(&self, p: &Point) -> bool {
        if !self.bbox.contains_point(p) {
            return false;
        }
        (0..self.len()).any(|i| unsafe { self.rect(i) }.contains_point(p))
    }
}
