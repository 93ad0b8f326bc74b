use serde::{Deserialize, Serialize};

/// A point in the global (output-space) coordinate system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self { Self { x, y } }

    pub fn offset(self, dx: i32, dy: i32) -> Self { Self::new(self.x + dx, self.y + dy) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// 0x0 means "let the client pick its natural size".
    pub fn is_unset(self) -> bool { self.width == 0 && self.height == 0 }
}

/// Axis-aligned rectangle. Width and height are always non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    pub fn from_parts(pos: Point, size: Size) -> Self {
        Self::new(pos.x, pos.y, size.width, size.height)
    }

    pub fn pos(&self) -> Point { Point::new(self.x, self.y) }

    pub fn size(&self) -> Size { Size::new(self.width, self.height) }

    pub fn right(&self) -> i32 { self.x + self.width }

    pub fn bottom(&self) -> i32 { self.y + self.height }

    pub fn center(&self) -> Point { Point::new(self.x + self.width / 2, self.y + self.height / 2) }

    pub fn is_empty(&self) -> bool { self.width == 0 || self.height == 0 }

    pub fn area(&self) -> i64 { self.width as i64 * self.height as i64 }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn intersects(&self, other: &Rect) -> bool { !self.intersection(other).is_empty() }

    /// Shrink by a per-edge margin, clamping at a zero-sized rect centered on
    /// the over-shrunk axis.
    pub fn shrink_by_edges(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        let width = (self.width - left - right).max(0);
        let height = (self.height - top - bottom).max(0);
        Rect::new(self.x + left, self.y + top, width, height)
    }

    pub fn shrink_uniform(&self, margin: i32) -> Rect {
        self.shrink_by_edges(margin, margin, margin, margin)
    }

    /// Position `size` centered within this rect. An unset size centers a
    /// zero-extent rect, which leaves the client's natural size in effect.
    pub fn center_rect(&self, size: Size) -> Rect {
        let c = self.center();
        Rect::new(c.x - size.width / 2, c.y - size.height / 2, size.width, size.height)
    }
}
