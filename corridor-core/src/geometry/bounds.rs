use serde::Serialize;

// Axis-aligned planar envelope; all comparisons are inclusive so that touching
// boxes count as intersecting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlanarBounds {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl PlanarBounds {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Smallest envelope holding every given coordinate, `None` for an empty input.
    pub fn from_coords<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for [x, y] in iter {
            bounds.min[0] = bounds.min[0].min(x);
            bounds.min[1] = bounds.min[1].min(y);
            bounds.max[0] = bounds.max[0].max(x);
            bounds.max[1] = bounds.max[1].max(y);
        }
        Some(bounds)
    }

    /// The four corners, ordered (min,min), (min,max), (max,min), (max,max).
    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            [self.min[0], self.min[1]],
            [self.min[0], self.max[1]],
            [self.max[0], self.min[1]],
            [self.max[0], self.max[1]],
        ]
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min[0] && x <= self.max[0] && y >= self.min[1] && y <= self.max[1]
    }

    pub fn intersects(&self, other: &PlanarBounds) -> bool {
        self.min[0] <= other.max[0]
            && other.min[0] <= self.max[0]
            && self.min[1] <= other.max[1]
            && other.min[1] <= self.max[1]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_of_coords() {
        let bounds =
            PlanarBounds::from_coords([[3.0, -1.0], [-2.0, 4.0], [0.5, 0.5]]).unwrap();
        assert_eq!(bounds.min, [-2.0, -1.0]);
        assert_eq!(bounds.max, [3.0, 4.0]);
        assert!(PlanarBounds::from_coords(Vec::new()).is_none());
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = PlanarBounds::new([0.0, 0.0], [10.0, 10.0]);
        let b = PlanarBounds::new([10.0, 5.0], [20.0, 6.0]);
        let c = PlanarBounds::new([10.1, 5.0], [20.0, 6.0]);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn corners_cover_all_extremes() {
        let bounds = PlanarBounds::new([1.0, 2.0], [3.0, 4.0]);
        assert_eq!(
            bounds.corners(),
            [[1.0, 2.0], [1.0, 4.0], [3.0, 2.0], [3.0, 4.0]]
        );
        assert_eq!(bounds.area(), 4.0);
    }
}
