//! Rectangles, points and search-window offsets in image coordinates.

use serde::{Deserialize, Serialize};

/// A screen point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Relative displacement learned from a positional match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

/// Axis-aligned rectangle `(x1, y1, x2, y2)`, upper-left inclusive, lower-right exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Area {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x1 && point.x < self.x2 && point.y >= self.y1 && point.y < self.y2
    }

    pub fn moved(&self, offset: Offset) -> Area {
        Area::new(
            self.x1 + offset.dx,
            self.y1 + offset.dy,
            self.x2 + offset.dx,
            self.y2 + offset.dy,
        )
    }

    /// Grow (positive) or shrink (negative) every side by `pad`.
    pub fn padded(&self, pad: i32) -> Area {
        Area::new(self.x1 - pad, self.y1 - pad, self.x2 + pad, self.y2 + pad)
    }

    /// Add a per-edge delta, as used for search windows.
    pub fn expanded(&self, window: SearchWindow) -> Area {
        Area::new(
            self.x1 + window.left,
            self.y1 + window.top,
            self.x2 + window.right,
            self.y2 + window.bottom,
        )
    }

    /// Intersection with `[0, width) x [0, height)`.
    pub fn clipped(&self, width: u32, height: u32) -> Area {
        Area::new(
            self.x1.clamp(0, width as i32),
            self.y1.clamp(0, height as i32),
            self.x2.clamp(0, width as i32),
            self.y2.clamp(0, height as i32),
        )
    }

    /// Resolve a rectangle given relative to this one's upper-left corner.
    pub fn sub_area(&self, relative: Area) -> Area {
        relative.moved(Offset::new(self.x1, self.y1))
    }
}

impl From<(i32, i32, i32, i32)> for Area {
    fn from((x1, y1, x2, y2): (i32, i32, i32, i32)) -> Self {
        Area::new(x1, y1, x2, y2)
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Per-edge expansion of the detection area for a positional search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// How far a positional match may look around the detection area.
///
/// `Vertical(n)` is the common case for lists that shift up and down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOffset {
    /// `(-3, -n, 3, n)`
    Vertical(i32),
    /// `(-x, -y, x, y)`
    Symmetric(i32, i32),
    /// Explicit `(left, top, right, bottom)` edge deltas.
    Explicit(i32, i32, i32, i32),
}

impl SearchOffset {
    pub fn window(&self) -> SearchWindow {
        let (left, top, right, bottom) = match *self {
            SearchOffset::Vertical(n) => (-3, -n, 3, n),
            SearchOffset::Symmetric(x, y) => (-x, -y, x, y),
            SearchOffset::Explicit(l, t, r, b) => (l, t, r, b),
        };
        SearchWindow {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl From<i32> for SearchOffset {
    fn from(n: i32) -> Self {
        SearchOffset::Vertical(n)
    }
}

impl From<(i32, i32)> for SearchOffset {
    fn from((x, y): (i32, i32)) -> Self {
        SearchOffset::Symmetric(x, y)
    }
}

impl From<(i32, i32, i32, i32)> for SearchOffset {
    fn from((l, t, r, b): (i32, i32, i32, i32)) -> Self {
        SearchOffset::Explicit(l, t, r, b)
    }
}
