use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in absolute screen coordinates (or frame-local pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const ORIGIN: Point = Point { x: 0, y: 0 };
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A rectangle on screen that the matcher is restricted to.
///
/// Width and height are always non-zero; use [`SearchRegion::new`] or
/// [`SearchRegion::from_corners`] to construct one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRegion {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl SearchRegion {
    /// Build a region from an origin and size. Returns `None` for a degenerate size.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Normalize two opposite corners of a drag into a region.
    ///
    /// The origin is the component-wise minimum and the size is the absolute
    /// difference, so the drag direction does not matter.
    pub fn from_corners(a: Point, b: Point) -> Option<Self> {
        let width = a.x.abs_diff(b.x);
        let height = a.y.abs_diff(b.y);
        Self::new(a.x.min(b.x), a.y.min(b.y), width, height)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl fmt::Display for SearchRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at ({}, {})", self.width, self.height, self.x, self.y)
    }
}

/// What part of the screen the loop captures each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchArea {
    /// The whole primary display, with no offset.
    #[default]
    FullScreen,
    Region(SearchRegion),
}

impl SearchArea {
    /// Offset that turns frame-local coordinates into absolute screen coordinates.
    pub fn offset(&self) -> Point {
        match self {
            SearchArea::FullScreen => Point::ORIGIN,
            SearchArea::Region(region) => region.origin(),
        }
    }

    pub fn region(&self) -> Option<&SearchRegion> {
        match self {
            SearchArea::FullScreen => None,
            SearchArea::Region(region) => Some(region),
        }
    }
}

impl fmt::Display for SearchArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchArea::FullScreen => write!(f, "full screen"),
            SearchArea::Region(region) => write!(f, "region {}", region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_rejects_zero_size() {
        assert!(SearchRegion::new(10, 10, 0, 5).is_none());
        assert!(SearchRegion::new(10, 10, 5, 0).is_none());
        assert!(SearchRegion::new(10, 10, 5, 5).is_some());
    }

    #[test]
    fn test_from_corners_normalizes_direction() {
        let region = SearchRegion::from_corners(Point::new(300, 40), Point::new(100, 240)).unwrap();
        assert_eq!(region.origin(), Point::new(100, 40));
        assert_eq!(region.width(), 200);
        assert_eq!(region.height(), 200);
    }

    #[test]
    fn test_from_corners_with_negative_coordinates() {
        let region = SearchRegion::from_corners(Point::new(-50, 10), Point::new(50, -10)).unwrap();
        assert_eq!(region.origin(), Point::new(-50, -10));
        assert_eq!(region.width(), 100);
        assert_eq!(region.height(), 20);
    }

    #[test]
    fn test_full_screen_offset_is_origin() {
        assert_eq!(SearchArea::FullScreen.offset(), Point::ORIGIN);
        assert!(SearchArea::FullScreen.region().is_none());

        let area = SearchArea::Region(SearchRegion::new(12, 34, 10, 10).unwrap());
        assert_eq!(area.offset(), Point::new(12, 34));
    }
}
