//! Planar geometry helpers for ROI containment

use crate::Point;

/// Even-odd ray-casting containment test.
///
/// Casts a ray in the +x direction and counts edge crossings. Polygons with
/// fewer than 3 vertices are treated as empty.
#[must_use]
pub fn point_in_polygon(p: Point, points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut p1 = points[0];
    for i in 1..=n {
        let p2 = points[i % n];
        if p.y > p1.y.min(p2.y) && p.y <= p1.y.max(p2.y) && p.x <= p1.x.max(p2.x) {
            let crosses = if (p1.y - p2.y).abs() > f32::EPSILON {
                let x_intersect = (p.y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y) + p1.x;
                p1.x == p2.x || p.x <= x_intersect
            } else {
                true
            };
            if crosses {
                inside = !inside;
            }
        }
        p1 = p2;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, RoiShape};

    fn square(x: f32, y: f32, w: f32, h: f32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ]
    }

    #[test]
    fn test_point_inside_square() {
        let poly = square(0.0, 0.0, 100.0, 100.0);
        assert!(point_in_polygon(Point::new(50.0, 50.0), &poly));
        assert!(!point_in_polygon(Point::new(150.0, 50.0), &poly));
        assert!(!point_in_polygon(Point::new(-10.0, 50.0), &poly));
    }

    #[test]
    fn test_point_inside_triangle() {
        let poly = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(50.0, 100.0),
        ];
        assert!(point_in_polygon(Point::new(50.0, 40.0), &poly));
        assert!(!point_in_polygon(Point::new(5.0, 90.0), &poly));
    }

    #[test]
    fn test_concave_polygon() {
        // U-shaped region: points inside the notch are outside the polygon
        let poly = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(70.0, 100.0),
            Point::new(70.0, 30.0),
            Point::new(30.0, 30.0),
            Point::new(30.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        assert!(point_in_polygon(Point::new(10.0, 50.0), &poly));
        assert!(point_in_polygon(Point::new(50.0, 10.0), &poly));
        assert!(!point_in_polygon(Point::new(50.0, 60.0), &poly));
    }

    #[test]
    fn test_degenerate_polygon_is_empty() {
        assert!(!point_in_polygon(Point::new(0.0, 0.0), &[]));
        assert!(!point_in_polygon(
            Point::new(5.0, 5.0),
            &[Point::new(0.0, 0.0), Point::new(10.0, 10.0)]
        ));
    }

    #[test]
    fn test_rectangle_polygon_agreement() {
        // A rectangle expressed as a polygon must agree with the rect test
        let rect = RoiShape::Rectangle {
            bounds: BoundingBox::new(500.0, 400.0, 200.0, 200.0),
        };
        let poly = RoiShape::Polygon {
            points: square(500.0, 400.0, 200.0, 200.0),
        };

        let probes = [
            Point::new(520.0, 420.0),
            Point::new(600.0, 500.0),
            Point::new(699.0, 599.0),
            Point::new(710.0, 500.0),
            Point::new(480.0, 500.0),
            Point::new(600.0, 380.0),
            Point::new(600.0, 620.0),
        ];

        for p in probes {
            assert_eq!(
                rect.contains(p),
                poly.contains(p),
                "containment mismatch at ({}, {})",
                p.x,
                p.y
            );
        }
    }
}
