use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel space, `x1 < x2`, `y1 < y2`.
///
/// Serializes as the wire-format array `[x1, y1, x2, y2]` used by the
/// detection service.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Intersection-over-union with `other`.
    ///
    /// Non-overlapping boxes yield exactly `0.0`. Degenerate geometry
    /// (zero-area union, inverted coordinates) also yields `0.0` rather
    /// than NaN or an error.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let iw = ix2 - ix1;
        let ih = iy2 - iy1;
        if iw <= 0.0 || ih <= 0.0 {
            return 0.0;
        }

        let inter = iw * ih;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Coordinate-wise bounding union: the smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2)
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical_boxes() {
        let a = bbox(10.0, 10.0, 110.0, 110.0);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = bbox(0.0, 0.0, 50.0, 50.0);
        let b = bbox(100.0, 100.0, 150.0, 150.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // a: [0,0]-[100,100], b: [50,0]-[150,100]
        // intersection: 50*100 = 5000, union: 10000 + 10000 - 5000 = 15000
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(50.0, 0.0, 150.0, 100.0);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_contained() {
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(25.0, 25.0, 75.0, 75.0);
        assert_relative_eq!(a.iou(&b), 2500.0 / 10000.0);
    }

    #[test]
    fn test_iou_touching_edges() {
        let a = bbox(0.0, 0.0, 50.0, 50.0);
        let b = bbox(50.0, 0.0, 100.0, 50.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(1.0, 1.0, 11.0, 11.0);
        assert_relative_eq!(a.iou(&b), b.iou(&a));
    }

    #[rstest]
    #[case::zero_width(bbox(0.0, 0.0, 0.0, 100.0), bbox(0.0, 0.0, 50.0, 50.0))]
    #[case::zero_height(bbox(0.0, 0.0, 100.0, 0.0), bbox(0.0, 0.0, 50.0, 50.0))]
    #[case::inverted(bbox(10.0, 10.0, 0.0, 0.0), bbox(0.0, 0.0, 50.0, 50.0))]
    fn test_iou_degenerate_is_zero(#[case] a: BoundingBox, #[case] b: BoundingBox) {
        assert_relative_eq!(a.iou(&b), 0.0);
        assert_relative_eq!(b.iou(&a), 0.0);
    }

    // ── Union ────────────────────────────────────────────────────────

    #[test]
    fn test_union_covers_both() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 20.0, 8.0);
        let u = a.union(&b);
        assert_eq!(u, bbox(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn test_union_with_contained_box_is_identity() {
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(10.0, 10.0, 20.0, 20.0);
        assert_eq!(a.union(&b), a);
    }

    #[test]
    fn test_union_commutative() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(50.0, 50.0, 60.0, 60.0);
        assert_eq!(a.union(&b), b.union(&a));
    }

    // ── Wire format ──────────────────────────────────────────────────

    #[test]
    fn test_serializes_as_array() {
        let b = bbox(1.0, 2.0, 3.5, 4.5);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.5,4.5]");
    }

    #[test]
    fn test_deserializes_from_array() {
        let b: BoundingBox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(b, bbox(1.0, 2.0, 3.0, 4.0));
    }
}
