use super::{GeometryError, PlanarBounds};

// Points closer than this to an edge are treated as lying on the boundary.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// A closed planar polygon. The closing edge from the last vertex back to the
/// first is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<[f64; 2]>,
    bounds: PlanarBounds,
}

impl Polygon {
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self, GeometryError> {
        if vertices.len() < 3 {
            return Err(GeometryError::TooFewVertices(vertices.len()));
        }
        if let Some(bad) = vertices.iter().flatten().find(|v| !v.is_finite()) {
            return Err(GeometryError::NonFinite(*bad));
        }
        let bounds = PlanarBounds::from_coords(vertices.iter().copied())
            .ok_or(GeometryError::TooFewVertices(0))?;
        Ok(Self { vertices, bounds })
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    pub fn bounds(&self) -> PlanarBounds {
        self.bounds
    }

    fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Shoelace area; positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f64 {
        self.edges()
            .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
            .sum::<f64>()
            * 0.5
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Strict interior test. Points on the boundary are not contained.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !self.bounds.contains(x, y) || self.on_boundary(x, y) {
            return false;
        }

        let mut inside = false;
        for (a, b) in self.edges() {
            if (a[1] > y) != (b[1] > y) {
                let x_cross = (b[0] - a[0]) * (y - a[1]) / (b[1] - a[1]) + a[0];
                if x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    pub fn on_boundary(&self, x: f64, y: f64) -> bool {
        self.edges()
            .any(|(a, b)| distance_to_segment([x, y], a, b) <= BOUNDARY_TOLERANCE)
    }

    /// Interior or boundary.
    pub fn covers(&self, x: f64, y: f64) -> bool {
        self.on_boundary(x, y) || self.contains(x, y)
    }

    /// Whether the rectangle and the polygon share at least one point.
    pub fn intersects_bounds(&self, rect: &PlanarBounds) -> bool {
        if !self.bounds.intersects(rect) {
            return false;
        }
        if self.vertices.iter().any(|v| rect.contains(v[0], v[1])) {
            return true;
        }
        let corners = rect.corners();
        if corners.iter().any(|c| self.covers(c[0], c[1])) {
            return true;
        }

        // corners() is not in ring order, walk the rectangle explicitly
        let ring = [corners[0], corners[1], corners[3], corners[2]];
        self.edges().any(|(a, b)| {
            (0..4).any(|i| segments_intersect(a, b, ring[i], ring[(i + 1) % 4]))
        })
    }

    /// True when no two non-adjacent edges touch and the area is non-zero.
    pub fn is_simple(&self) -> bool {
        let n = self.vertices.len();
        if self.area() <= f64::EPSILON {
            return false;
        }
        let edges: Vec<_> = self.edges().collect();
        for i in 0..n {
            let (a, b) = edges[i];
            if a == b {
                return false;
            }
            for (j, &(c, d)) in edges.iter().enumerate().skip(i + 1) {
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                if !adjacent && segments_intersect(a, b, c, d) {
                    return false;
                }
            }
        }
        true
    }
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn within_segment_box(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
    p[0] >= a[0].min(b[0])
        && p[0] <= a[0].max(b[0])
        && p[1] >= a[1].min(b[1])
        && p[1] <= a[1].max(b[1])
}

fn segments_intersect(p1: [f64; 2], p2: [f64; 2], q1: [f64; 2], q2: [f64; 2]) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && within_segment_box(p1, q1, q2))
        || (d2 == 0.0 && within_segment_box(p2, q1, q2))
        || (d3 == 0.0 && within_segment_box(q1, p1, p2))
        || (d4 == 0.0 && within_segment_box(q2, p1, p2))
}

fn distance_to_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a[0] + t * dx, a[1] + t * dy);
    ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Polygon {
        Polygon::new(vec![[0.0, -10.0], [10.0, 0.0], [0.0, 10.0], [-10.0, 0.0]]).unwrap()
    }

    #[test]
    fn rejects_short_rings() {
        assert_eq!(
            Polygon::new(vec![[0.0, 0.0], [1.0, 1.0]]),
            Err(GeometryError::TooFewVertices(2))
        );
        assert!(matches!(
            Polygon::new(vec![[0.0, 0.0], [1.0, f64::NAN], [1.0, 0.0]]),
            Err(GeometryError::NonFinite(_))
        ));
    }

    #[test]
    fn contains_is_strict() {
        let poly = diamond();
        assert!(poly.contains(0.0, 0.0));
        assert!(poly.contains(4.0, 4.0));
        assert!(!poly.contains(6.0, 6.0));
        // on an edge and on a vertex
        assert!(!poly.contains(5.0, 5.0));
        assert!(!poly.contains(10.0, 0.0));
        assert!(poly.covers(5.0, 5.0));
    }

    #[test]
    fn area_of_diamond() {
        assert!((diamond().area() - 200.0).abs() < 1e-9);
        assert!(diamond().signed_area() > 0.0);
    }

    #[test]
    fn rectangle_intersection_cases() {
        let poly = diamond();
        // box fully inside the polygon
        assert!(poly.intersects_bounds(&PlanarBounds::new([-1.0, -1.0], [1.0, 1.0])));
        // polygon fully inside the box
        assert!(poly.intersects_bounds(&PlanarBounds::new([-20.0, -20.0], [20.0, 20.0])));
        // crossing edges only, no vertex of either inside the other
        let bar =
            Polygon::new(vec![[-10.0, -1.0], [10.0, -1.0], [10.0, 1.0], [-10.0, 1.0]]).unwrap();
        assert!(bar.intersects_bounds(&PlanarBounds::new([-1.0, -10.0], [1.0, 10.0])));
        // envelopes overlap but the box sits in the empty corner
        assert!(!poly.intersects_bounds(&PlanarBounds::new([7.0, 7.0], [9.0, 9.0])));
        // disjoint envelopes
        assert!(!poly.intersects_bounds(&PlanarBounds::new([30.0, 30.0], [40.0, 40.0])));
    }

    #[test]
    fn detects_bow_tie() {
        let bow_tie =
            Polygon::new(vec![[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]]).unwrap();
        assert!(!bow_tie.is_simple());
        assert!(diamond().is_simple());

        let flat = Polygon::new(vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]).unwrap();
        assert!(!flat.is_simple());
    }
}
