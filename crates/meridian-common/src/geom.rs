//! Geometry kernel: points and axis-aligned rectangles.
//!
//! Both types are `#[repr(C)]` and trivially copyable so they can live
//! directly inside page bytes. Containment and intersection are
//! inclusive on all borders, which is what makes degenerate
//! (point-sized) rectangles behave.

/// Arity of points and rectangles. Fixed at startup; the node layout
/// depends on it.
pub const DIMENSIONS: usize = 2;

/// A point in `DIMENSIONS`-dimensional space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Point {
    pub coords: [f64; DIMENSIONS],
}

impl Point {
    /// The origin.
    pub const ORIGIN: Point = Point {
        coords: [0.0; DIMENSIONS],
    };

    pub const fn new(coords: [f64; DIMENSIONS]) -> Self {
        Self { coords }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl std::ops::Index<usize> for Point {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.coords[index]
    }
}

impl std::ops::IndexMut<usize> for Point {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.coords[index]
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

/// An axis-aligned rectangle spanning `[lower, upper]` in every
/// dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Rect {
    pub lower: Point,
    pub upper: Point,
}

impl Rect {
    /// The empty rectangle: expanding it by anything yields that thing.
    pub const EMPTY: Rect = Rect {
        lower: Point {
            coords: [f64::INFINITY; DIMENSIONS],
        },
        upper: Point {
            coords: [f64::NEG_INFINITY; DIMENSIONS],
        },
    };

    pub const fn new(lower: Point, upper: Point) -> Self {
        Self { lower, upper }
    }

    /// The degenerate rectangle covering exactly one point.
    pub const fn from_point(p: Point) -> Self {
        Self { lower: p, upper: p }
    }

    /// Extent along one dimension, clamped to zero for empty rects.
    fn extent(&self, d: usize) -> f64 {
        (self.upper[d] - self.lower[d]).max(0.0)
    }

    /// Area (hyper-volume).
    pub fn area(&self) -> f64 {
        (0..DIMENSIONS).map(|d| self.extent(d)).product()
    }

    /// Margin: the sum of edge lengths over all dimensions. This is the
    /// quantity the split-axis heuristic minimizes.
    pub fn margin(&self) -> f64 {
        (0..DIMENSIONS).map(|d| self.extent(d)).sum()
    }

    /// Centre point.
    pub fn center(&self) -> Point {
        let mut c = Point::ORIGIN;
        for d in 0..DIMENSIONS {
            c[d] = (self.lower[d] + self.upper[d]) / 2.0;
        }
        c
    }

    /// Whether the point lies inside (borders inclusive).
    pub fn contains_point(&self, p: &Point) -> bool {
        (0..DIMENSIONS).all(|d| self.lower[d] <= p[d] && p[d] <= self.upper[d])
    }

    /// Whether the other rectangle lies fully inside.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        (0..DIMENSIONS).all(|d| self.lower[d] <= other.lower[d] && other.upper[d] <= self.upper[d])
    }

    /// Whether the rectangles share any point (borders inclusive).
    pub fn intersects(&self, other: &Rect) -> bool {
        (0..DIMENSIONS).all(|d| self.lower[d] <= other.upper[d] && other.lower[d] <= self.upper[d])
    }

    /// Grows in place to cover the point.
    pub fn expand_point(&mut self, p: &Point) {
        for d in 0..DIMENSIONS {
            self.lower[d] = self.lower[d].min(p[d]);
            self.upper[d] = self.upper[d].max(p[d]);
        }
    }

    /// Grows in place to cover the other rectangle.
    pub fn expand(&mut self, other: &Rect) {
        for d in 0..DIMENSIONS {
            self.lower[d] = self.lower[d].min(other.lower[d]);
            self.upper[d] = self.upper[d].max(other.upper[d]);
        }
    }

    /// The smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let mut r = *self;
        r.expand(other);
        r
    }

    /// Area increase required to cover the other rectangle.
    pub fn expansion_area(&self, other: &Rect) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Area shared with the other rectangle (zero if disjoint).
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let mut area = 1.0;
        for d in 0..DIMENSIONS {
            let lo = self.lower[d].max(other.lower[d]);
            let hi = self.upper[d].min(other.upper[d]);
            if hi < lo {
                return 0.0;
            }
            area *= hi - lo;
        }
        area
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} - {}]", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(lx: f64, ly: f64, ux: f64, uy: f64) -> Rect {
        Rect::new(Point::new([lx, ly]), Point::new([ux, uy]))
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new([0.0, 0.0]);
        let b = Point::new([3.0, 4.0]);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_point_indexing() {
        let mut p = Point::new([1.0, 2.0]);
        assert_eq!(p[0], 1.0);
        p[1] = 7.0;
        assert_eq!(p[1], 7.0);
    }

    #[test]
    fn test_rect_area_and_margin() {
        let r = rect(0.0, 0.0, 4.0, 3.0);
        assert_eq!(r.area(), 12.0);
        assert_eq!(r.margin(), 7.0);
    }

    #[test]
    fn test_degenerate_rect() {
        let r = Rect::from_point(Point::new([2.0, 2.0]));
        assert_eq!(r.area(), 0.0);
        assert!(r.contains_point(&Point::new([2.0, 2.0])));
        assert!(!r.contains_point(&Point::new([2.0, 2.1])));
    }

    #[test]
    fn test_empty_rect() {
        assert_eq!(Rect::EMPTY.area(), 0.0);
        assert_eq!(Rect::EMPTY.margin(), 0.0);
        assert!(!Rect::EMPTY.contains_point(&Point::ORIGIN));

        let mut r = Rect::EMPTY;
        r.expand_point(&Point::new([1.0, 2.0]));
        assert_eq!(r, Rect::from_point(Point::new([1.0, 2.0])));
    }

    #[test]
    fn test_containment() {
        let outer = rect(0.0, 0.0, 10.0, 10.0);
        let inner = rect(2.0, 2.0, 5.0, 5.0);

        assert!(outer.contains_rect(&inner));
        assert!(!inner.contains_rect(&outer));
        assert!(outer.contains_rect(&outer));
        assert!(outer.contains_point(&Point::new([0.0, 10.0])));
        assert!(!outer.contains_point(&Point::new([-0.1, 5.0])));
    }

    #[test]
    fn test_intersects() {
        let a = rect(0.0, 0.0, 5.0, 5.0);
        let b = rect(4.0, 4.0, 8.0, 8.0);
        let c = rect(6.0, 6.0, 9.0, 9.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(b.intersects(&c));
        assert!(!a.intersects(&c));

        // Border touch counts as intersection.
        let d = rect(5.0, 0.0, 7.0, 5.0);
        assert!(a.intersects(&d));
    }

    #[test]
    fn test_union_and_expansion() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(3.0, 3.0, 4.0, 4.0);

        let u = a.union(&b);
        assert_eq!(u, rect(0.0, 0.0, 4.0, 4.0));
        assert_eq!(a.expansion_area(&b), 16.0 - 4.0);
        assert_eq!(a.expansion_area(&a), 0.0);
    }

    #[test]
    fn test_overlap_area() {
        let a = rect(0.0, 0.0, 4.0, 4.0);
        let b = rect(2.0, 2.0, 6.0, 6.0);
        let c = rect(5.0, 5.0, 6.0, 6.0);

        assert_eq!(a.overlap_area(&b), 4.0);
        assert_eq!(a.overlap_area(&c), 0.0);
        assert_eq!(a.overlap_area(&a), 16.0);
    }

    #[test]
    fn test_center() {
        let r = rect(0.0, 2.0, 4.0, 6.0);
        assert_eq!(r.center(), Point::new([2.0, 4.0]));
    }
}
