//! Point-in-polygon spatial join.

use geo::{BoundingRect, Point, Polygon, Rect};

use crate::error::SchemaError;
use crate::geometry::polygon_contains_point;
use crate::types::{Feature, FeatureSet, Geometry, Schema, Value};

/// Inner-joins point `subjects` against polygon `regions` by containment.
///
/// For every subject point, one output row is produced per region polygon
/// containing it (boundary-inclusive, so a point on a shared boundary
/// produces one row per touching region). A subject inside no region
/// produces no rows.
///
/// Each row carries the requested subject fields followed by the requested
/// region fields, a fresh sequential id, and the subject's geometry. Row
/// order is canonical: subjects in input order, and per subject, matching
/// regions in region input order.
///
/// Both inputs are assumed repaired and in one shared planar coordinate
/// system; subjects without point geometry match nothing. Fails with
/// [`SchemaError`] if a requested field is missing or the combined output
/// fields collide.
pub fn spatial_join(
    subjects: &FeatureSet,
    subject_fields: &[&str],
    regions: &FeatureSet,
    region_fields: &[&str],
) -> Result<FeatureSet, SchemaError> {
    let plan = PreparedSpatialJoin::new(subjects, subject_fields, regions, region_fields)?;

    let mut features = Vec::new();
    for subject in &subjects.features {
        for (geometry, attributes) in plan.rows_for(subject) {
            features.push(Feature::new(features.len() as i64, geometry, attributes));
        }
    }
    Ok(plan.into_feature_set(features))
}

/// A resolved spatial-join plan: field indexes, region polygons with
/// bounding-rectangle prefilters, and the output schema.
///
/// Splitting preparation from row production lets the execution engine fan
/// subjects out across worker threads and still assemble rows in canonical
/// order.
pub struct PreparedSpatialJoin<'a> {
    subject_idxs: Vec<usize>,
    region_idxs: Vec<usize>,
    regions: Vec<(&'a Feature, &'a Polygon<f64>, Rect<f64>)>,
    schema: Schema,
    crs: Option<crate::types::Crs>,
}

impl<'a> PreparedSpatialJoin<'a> {
    pub(crate) fn new(
        subjects: &'a FeatureSet,
        subject_fields: &[&str],
        regions: &'a FeatureSet,
        region_fields: &[&str],
    ) -> Result<Self, SchemaError> {
        let subject_idxs = resolve_fields(&subjects.schema, subject_fields)?;
        let region_idxs = resolve_fields(&regions.schema, region_fields)?;

        let mut fields = Vec::with_capacity(subject_idxs.len() + region_idxs.len());
        for &i in &subject_idxs {
            fields.push(subjects.schema.fields[i].clone());
        }
        for &i in &region_idxs {
            fields.push(regions.schema.fields[i].clone());
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    field: field.name.clone(),
                });
            }
        }

        // Regions without polygon geometry can never contain a point; they
        // are excluded from the candidate list up front.
        let region_polygons = regions
            .features
            .iter()
            .filter_map(|feature| {
                let polygon = feature.geometry.as_ref()?.as_polygon()?;
                let bbox = polygon.bounding_rect()?;
                Some((feature, polygon, bbox))
            })
            .collect();

        Ok(Self {
            subject_idxs,
            region_idxs,
            regions: region_polygons,
            schema: Schema::new(fields),
            crs: subjects.crs.clone(),
        })
    }

    /// All output rows for one subject, in region input order.
    pub(crate) fn rows_for(&self, subject: &Feature) -> Vec<(Option<Geometry>, Vec<Value>)> {
        let Some(point) = subject.geometry.as_ref().and_then(Geometry::as_point) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for &(region, polygon, bbox) in &self.regions {
            if !rect_contains(&bbox, point) {
                continue;
            }
            if !polygon_contains_point(polygon, *point) {
                continue;
            }

            let mut attributes = Vec::with_capacity(self.subject_idxs.len() + self.region_idxs.len());
            for &i in &self.subject_idxs {
                attributes.push(subject.attributes[i].clone());
            }
            for &i in &self.region_idxs {
                attributes.push(region.attributes[i].clone());
            }
            rows.push((subject.geometry.clone(), attributes));
        }
        rows
    }

    pub(crate) fn into_feature_set(self, features: Vec<Feature>) -> FeatureSet {
        FeatureSet::new(self.schema, self.crs, features)
    }
}

fn resolve_fields(schema: &Schema, names: &[&str]) -> Result<Vec<usize>, SchemaError> {
    names
        .iter()
        .map(|name| {
            schema.index_of(name).ok_or_else(|| SchemaError::MissingField {
                field: (*name).to_string(),
            })
        })
        .collect()
}

fn rect_contains(rect: &Rect<f64>, point: &Point<f64>) -> bool {
    point.x() >= rect.min().x
        && point.x() <= rect.max().x
        && point.y() >= rect.min().y
        && point.y() <= rect.max().y
}

#[cfg(test)]
mod tests {
    use super::spatial_join;
    use crate::error::SchemaError;
    use crate::types::{Crs, Feature, FeatureSet, Field, FieldType, Geometry, Schema, Value};
    use geo::{LineString, Point, Polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    fn region_set() -> FeatureSet {
        let schema = Schema::new(vec![
            Field::new("region_id", FieldType::Integer),
            Field::new("name", FieldType::Text),
        ]);
        let features = vec![
            Feature::new(
                1,
                Some(Geometry::Polygon(square(0.0, 0.0, 10.0))),
                vec![Value::Integer(1), Value::Text("R1".to_string())],
            ),
            Feature::new(
                2,
                Some(Geometry::Polygon(square(10.0, 0.0, 10.0))),
                vec![Value::Integer(2), Value::Text("R2".to_string())],
            ),
        ];
        FeatureSet::new(schema, Some(Crs::projected("EPSG:6677")), features)
    }

    fn point_set(points: Vec<(f64, f64)>) -> FeatureSet {
        let schema = Schema::new(vec![Field::real("load", 1)]);
        let features = points
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| {
                Feature::new(
                    i as i64,
                    Some(Geometry::Point(Point::new(x, y))),
                    vec![Value::Real(i as f64)],
                )
            })
            .collect();
        FeatureSet::new(schema, Some(Crs::projected("EPSG:6677")), features)
    }

    #[test]
    fn inner_join_drops_unmatched_subjects() {
        let regions = region_set();
        let subjects = point_set(vec![(5.0, 5.0), (50.0, 50.0)]);
        let out = spatial_join(&subjects, &["load"], &regions, &["region_id", "name"]).unwrap();

        assert_eq!(out.feature_count(), 1);
        assert_eq!(
            out.features[0].attributes,
            vec![
                Value::Real(0.0),
                Value::Integer(1),
                Value::Text("R1".to_string())
            ]
        );
    }

    #[test]
    fn boundary_point_matches_both_regions_in_region_order() {
        let regions = region_set();
        // Exactly on the shared edge x = 10.
        let subjects = point_set(vec![(10.0, 5.0)]);
        let out = spatial_join(&subjects, &["load"], &regions, &["name"]).unwrap();

        assert_eq!(out.feature_count(), 2);
        assert_eq!(out.features[0].attributes[1], Value::Text("R1".to_string()));
        assert_eq!(out.features[1].attributes[1], Value::Text("R2".to_string()));
    }

    #[test]
    fn rows_follow_subject_order_with_fresh_ids() {
        let regions = region_set();
        let subjects = point_set(vec![(15.0, 5.0), (5.0, 5.0), (1.0, 1.0)]);
        let out = spatial_join(&subjects, &["load"], &regions, &["name"]).unwrap();

        assert_eq!(out.feature_count(), 3);
        let names: Vec<&Value> = out.features.iter().map(|f| &f.attributes[1]).collect();
        assert_eq!(
            names,
            vec![
                &Value::Text("R2".to_string()),
                &Value::Text("R1".to_string()),
                &Value::Text("R1".to_string())
            ]
        );
        let ids: Vec<i64> = out.features.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn subject_without_geometry_matches_nothing() {
        let regions = region_set();
        let schema = Schema::new(vec![Field::real("load", 1)]);
        let subjects = FeatureSet::new(
            schema,
            None,
            vec![Feature::new(0, None, vec![Value::Real(1.0)])],
        );
        let out = spatial_join(&subjects, &["load"], &regions, &["name"]).unwrap();
        assert_eq!(out.feature_count(), 0);
    }

    #[test]
    fn missing_and_colliding_fields_are_schema_errors() {
        let regions = region_set();
        let subjects = point_set(vec![(5.0, 5.0)]);

        assert_eq!(
            spatial_join(&subjects, &["missing"], &regions, &["name"]),
            Err(SchemaError::MissingField {
                field: "missing".to_string()
            })
        );

        let schema = Schema::new(vec![Field::new("name", FieldType::Text)]);
        let clashing = FeatureSet::new(
            schema,
            None,
            vec![Feature::new(
                0,
                Some(Geometry::Point(Point::new(5.0, 5.0))),
                vec![Value::Text("b".to_string())],
            )],
        );
        assert_eq!(
            spatial_join(&clashing, &["name"], &regions, &["name"]),
            Err(SchemaError::DuplicateField {
                field: "name".to_string()
            })
        );
    }
}
