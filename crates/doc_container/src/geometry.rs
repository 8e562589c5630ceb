//! Page-space rectangles

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page coordinates (points, origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rect {
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            llx: self.llx.min(other.llx),
            lly: self.lly.min(other.lly),
            urx: self.urx.max(other.urx),
            ury: self.ury.max(other.ury),
        }
    }

    /// True when the rectangles share any area
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.llx < other.urx && other.llx < self.urx && self.lly < other.ury && other.lly < self.ury
    }

    /// Coordinate-wise equality within `tol` points
    pub fn approx_eq(&self, other: &Rect, tol: f64) -> bool {
        (self.llx - other.llx).abs() <= tol
            && (self.lly - other.lly).abs() <= tol
            && (self.urx - other.urx).abs() <= tol
            && (self.ury - other.ury).abs() <= tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 20.0, 20.0);
        assert!(a.overlaps(&b));
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 20.0, 20.0));

        let c = Rect::new(11.0, 11.0, 12.0, 12.0);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_approx_eq_tolerance() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(0.4, -0.4, 10.3, 9.8);
        assert!(a.approx_eq(&b, 0.5));
        assert!(!a.approx_eq(&b, 0.1));
    }
}
