//! Polygon validity, repair, and point-containment primitives.
//!
//! All geometry here is planar: coordinates are projected, so distances and
//! areas are directly meaningful and no great-circle math is involved.
//!
//! The containment predicate is boundary-inclusive: a point lying exactly on
//! a ring is treated as contained. A point on a boundary shared by two
//! regions therefore matches both, and the spatial join emits one row per
//! match.

mod repair;

pub use repair::repair_polygons;

use geo::{Coord, Line, LineString, Point, Polygon};

/// Tolerance for coordinate coincidence and on-boundary tests, in map units.
pub(crate) const EPS: f64 = 1e-9;

/// Minimum absolute ring area considered non-degenerate.
pub(crate) const AREA_EPS: f64 = 1e-9;

/// Where a point sits relative to a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingContainment {
    /// Strictly inside the ring.
    Inside,
    /// On the ring itself (within tolerance).
    OnBoundary,
    /// Strictly outside the ring.
    Outside,
}

/// Classifies `point` against a closed ring using an even-odd crossing count
/// with an explicit on-boundary test first.
pub fn ring_containment(ring: &LineString<f64>, point: Coord<f64>) -> RingContainment {
    for line in ring.lines() {
        if point_on_segment(point, line) {
            return RingContainment::OnBoundary;
        }
    }

    let mut inside = false;
    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if x_cross > point.x {
                inside = !inside;
            }
        }
    }
    if inside {
        RingContainment::Inside
    } else {
        RingContainment::Outside
    }
}

/// Boundary-inclusive point-in-polygon test.
///
/// A point inside a hole is outside the polygon, but a point on a hole's
/// ring is on the polygon boundary and counts as contained.
pub fn polygon_contains_point(polygon: &Polygon<f64>, point: Point<f64>) -> bool {
    let coord = Coord {
        x: point.x(),
        y: point.y(),
    };
    match ring_containment(polygon.exterior(), coord) {
        RingContainment::Outside => false,
        RingContainment::OnBoundary => true,
        RingContainment::Inside => {
            for hole in polygon.interiors() {
                match ring_containment(hole, coord) {
                    RingContainment::Inside => return false,
                    RingContainment::OnBoundary => return true,
                    RingContainment::Outside => {}
                }
            }
            true
        }
    }
}

/// Simplicity check for one closed ring: closed, at least four coordinates,
/// non-degenerate area, no proper self-intersection.
pub(crate) fn ring_is_valid(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
        && ring.is_closed()
        && signed_area(&ring.0).abs() > AREA_EPS
        && !ring_self_intersects(ring)
}

/// Simplicity check for a polygon and all of its rings.
pub fn polygon_is_valid(polygon: &Polygon<f64>) -> bool {
    ring_is_valid(polygon.exterior()) && polygon.interiors().iter().all(ring_is_valid)
}

pub(crate) fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let segments: Vec<Line<f64>> = ring.lines().collect();
    let n = segments.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // The first and last segments of a closed ring are adjacent too.
            if i == 0 && j == n - 1 {
                continue;
            }
            if proper_intersection(segments[i], segments[j]).is_some() {
                return true;
            }
        }
    }
    false
}

/// Interior crossing point of two segments, excluding shared endpoints and
/// collinear overlap.
pub(crate) fn proper_intersection(a: Line<f64>, b: Line<f64>) -> Option<Coord<f64>> {
    let r = Coord {
        x: a.end.x - a.start.x,
        y: a.end.y - a.start.y,
    };
    let s = Coord {
        x: b.end.x - b.start.x,
        y: b.end.y - b.start.y,
    };
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let qp = Coord {
        x: b.start.x - a.start.x,
        y: b.start.y - a.start.y,
    };
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;

    const T_EPS: f64 = 1e-12;
    if t > T_EPS && t < 1.0 - T_EPS && u > T_EPS && u < 1.0 - T_EPS {
        Some(Coord {
            x: a.start.x + t * r.x,
            y: a.start.y + t * r.y,
        })
    } else {
        None
    }
}

/// Shoelace area of a coordinate sequence (open or closed; the wrap term
/// makes both work).
pub(crate) fn signed_area(coords: &[Coord<f64>]) -> f64 {
    let n = coords.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = coords[i];
        let b = coords[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

pub(crate) fn coords_close(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() <= EPS && (a.y - b.y).abs() <= EPS
}

fn point_on_segment(p: Coord<f64>, line: Line<f64>) -> bool {
    let (a, b) = (line.start, line.end);
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return coords_close(p, a);
    }
    let cross = dx * (p.y - a.y) - dy * (p.x - a.x);
    // Perpendicular distance from the segment's line exceeds tolerance.
    if cross * cross > EPS * EPS * len2 {
        return false;
    }
    let dot = (p.x - a.x) * dx + (p.y - a.y) * dy;
    let slack = EPS * len2.sqrt();
    dot >= -slack && dot <= len2 + slack
}

#[cfg(test)]
mod tests {
    use super::{RingContainment, polygon_contains_point, polygon_is_valid, ring_containment};
    use geo::{Coord, LineString, Point, Polygon};

    fn unit_square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![],
        )
    }

    fn square_with_hole() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![
                (1.0, 1.0),
                (1.0, 3.0),
                (3.0, 3.0),
                (3.0, 1.0),
                (1.0, 1.0),
            ])],
        )
    }

    #[test]
    fn ring_containment_classifies_inside_boundary_outside() {
        let ring = unit_square().exterior().clone();
        assert_eq!(
            ring_containment(&ring, Coord { x: 2.0, y: 2.0 }),
            RingContainment::Inside
        );
        assert_eq!(
            ring_containment(&ring, Coord { x: 4.0, y: 2.0 }),
            RingContainment::OnBoundary
        );
        assert_eq!(
            ring_containment(&ring, Coord { x: 0.0, y: 0.0 }),
            RingContainment::OnBoundary
        );
        assert_eq!(
            ring_containment(&ring, Coord { x: 5.0, y: 2.0 }),
            RingContainment::Outside
        );
    }

    #[test]
    fn polygon_containment_is_boundary_inclusive() {
        let poly = unit_square();
        assert!(polygon_contains_point(&poly, Point::new(2.0, 2.0)));
        assert!(polygon_contains_point(&poly, Point::new(4.0, 2.0)));
        assert!(!polygon_contains_point(&poly, Point::new(4.1, 2.0)));
    }

    #[test]
    fn holes_exclude_points_but_their_rings_count_as_boundary() {
        let poly = square_with_hole();
        assert!(!polygon_contains_point(&poly, Point::new(2.0, 2.0)));
        assert!(polygon_contains_point(&poly, Point::new(1.0, 2.0)));
        assert!(polygon_contains_point(&poly, Point::new(0.5, 0.5)));
    }

    #[test]
    fn validity_flags_self_intersection_and_degenerate_rings() {
        assert!(polygon_is_valid(&unit_square()));
        assert!(polygon_is_valid(&square_with_hole()));

        let bowtie = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        );
        assert!(!polygon_is_valid(&bowtie));

        let sliver = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        assert!(!polygon_is_valid(&sliver));
    }
}
