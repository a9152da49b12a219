//! Topology-preserving polygon repair.
//!
//! Regions drawn by hand occasionally self-intersect or carry degenerate
//! rings. Before the spatial join, every region polygon is validated and, if
//! needed, repaired: self-intersections are noded, the resulting simple
//! loops are extracted, and the largest loop by absolute area becomes the
//! repaired exterior. Interior rings survive only if they are themselves
//! simple and still sit inside the kept exterior. A feature that cannot be
//! reduced to a single simple polygon aborts the run.

use std::cmp::Ordering;

use geo::orient::{Direction, Orient};
use geo::{Coord, Line, LineString, Polygon};

use crate::error::GeometryError;
use crate::types::{Feature, FeatureSet, Geometry};

use super::{
    AREA_EPS, RingContainment, coords_close, polygon_is_valid, proper_intersection,
    ring_containment, ring_is_valid, signed_area,
};

/// Validates every polygon in `fs`, repairing the invalid ones.
///
/// The output has the same feature count, ids, and attributes; only
/// geometries change. Already-valid polygons pass through with their ring
/// winding normalized (exterior counter-clockwise, interiors clockwise).
///
/// Fails with [`GeometryError::Unrepairable`] if any feature cannot be
/// reduced to a single simple polygon, and with
/// [`GeometryError::NotAPolygon`] if a feature carries no polygon geometry.
pub fn repair_polygons(fs: &FeatureSet) -> Result<FeatureSet, GeometryError> {
    let mut features = Vec::with_capacity(fs.feature_count());
    for feature in &fs.features {
        let polygon = match &feature.geometry {
            Some(Geometry::Polygon(p)) => p,
            _ => {
                return Err(GeometryError::NotAPolygon {
                    feature_id: feature.id,
                });
            }
        };

        let repaired = if polygon_is_valid(polygon) {
            polygon.orient(Direction::Default)
        } else {
            repair_polygon(feature.id, polygon)?
        };

        features.push(Feature::new(
            feature.id,
            Some(Geometry::Polygon(repaired)),
            feature.attributes.clone(),
        ));
    }
    Ok(FeatureSet::new(fs.schema.clone(), fs.crs.clone(), features))
}

fn repair_polygon(feature_id: i64, polygon: &Polygon<f64>) -> Result<Polygon<f64>, GeometryError> {
    let exterior =
        repair_ring(polygon.exterior()).ok_or(GeometryError::Unrepairable { feature_id })?;

    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .filter(|ring| ring_is_valid(ring))
        .filter(|ring| {
            ring.0
                .iter()
                .all(|c| ring_containment(&exterior, *c) != RingContainment::Outside)
        })
        .cloned()
        .collect();

    Ok(Polygon::new(exterior, interiors).orient(Direction::Default))
}

/// Dissolves a ring's self-intersections and returns its largest simple
/// loop, or `None` if no loop with positive area remains.
fn repair_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut pts: Vec<Coord<f64>> = ring.0.clone();
    if pts.len() > 1 && coords_close(pts[0], *pts.last().expect("non-empty ring")) {
        pts.pop();
    }
    pts.dedup_by(|a, b| coords_close(*a, *b));
    if pts.len() < 3 {
        return None;
    }

    let noded = node_ring(&pts);
    let mut best: Option<(f64, Vec<Coord<f64>>)> = None;
    for candidate in extract_loops(&noded) {
        let area = signed_area(&candidate).abs();
        if area <= AREA_EPS {
            continue;
        }
        let better = best
            .as_ref()
            .is_none_or(|(best_area, _)| area.partial_cmp(best_area) == Some(Ordering::Greater));
        if better {
            best = Some((area, candidate));
        }
    }

    let (_, mut coords) = best?;
    coords.push(coords[0]);
    Some(LineString::new(coords))
}

/// Inserts every proper self-intersection point into both segments that
/// produce it, so each crossing appears twice in the walked sequence.
fn node_ring(pts: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let n = pts.len();
    let segment = |i: usize| Line::new(pts[i], pts[(i + 1) % n]);

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(pts[i]);

        let mut hits: Vec<(f64, Coord<f64>)> = Vec::new();
        for j in 0..n {
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            if let Some(p) = proper_intersection(segment(i), segment(j)) {
                hits.push((param_along(segment(i), p), p));
            }
        }
        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        out.extend(hits.into_iter().map(|(_, p)| p));
    }
    out
}

/// Walks the noded sequence, popping a closed loop whenever a coordinate
/// reappears on the path stack. The remaining path is the final loop.
fn extract_loops(seq: &[Coord<f64>]) -> Vec<Vec<Coord<f64>>> {
    let mut stack: Vec<Coord<f64>> = Vec::new();
    let mut loops = Vec::new();

    for &p in seq {
        if let Some(pos) = stack.iter().position(|&q| coords_close(q, p)) {
            let cycle: Vec<Coord<f64>> = stack[pos..].to_vec();
            if cycle.len() >= 3 {
                loops.push(cycle);
            }
            stack.truncate(pos + 1);
        } else {
            stack.push(p);
        }
    }
    if stack.len() >= 3 {
        loops.push(stack);
    }
    loops
}

fn param_along(line: Line<f64>, p: Coord<f64>) -> f64 {
    let dx = line.end.x - line.start.x;
    let dy = line.end.y - line.start.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    ((p.x - line.start.x) * dx + (p.y - line.start.y) * dy) / len2
}
