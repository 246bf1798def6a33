use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in global display coordinates (points, top-left origin).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 { self.x + self.width }

    pub fn max_y(&self) -> f64 { self.y + self.height }

    pub fn mid(&self) -> (f64, f64) { (self.x + self.width / 2.0, self.y + self.height / 2.0) }

    pub fn area(&self) -> f64 { self.width.max(0.0) * self.height.max(0.0) }

    /// Half-open containment, matching how a point on a shared display edge
    /// belongs to exactly one display.
    pub fn contains(&self, (px, py): (f64, f64)) -> bool {
        px >= self.x && px < self.max_x() && py >= self.y && py < self.max_y()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= x || max_y <= y {
            return None;
        }
        Some(Rect::new(x, y, max_x - x, max_y - y))
    }

    /// Width over height, with a degenerate height treated as one point.
    pub fn aspect_ratio(&self) -> f64 { self.width / self.height.max(1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 25.0, 100.0, 100.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(50.0, 25.0, 50.0, 75.0)));
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(100.0, 0.0, 100.0, 100.0);
        assert_eq!(a.intersection(&b), None);
        assert!(!a.contains(b.mid()));
        assert!(!a.contains((100.0, 10.0)));
        assert!(b.contains((100.0, 10.0)));
    }
}
