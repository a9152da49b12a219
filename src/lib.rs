//! `disaster-waste-aggregation` computes, for a set of caller-chosen region
//! polygons, aggregate statistics about building damage and candidate
//! temporary-storage sites located inside each region.
//!
//! The pipeline is a chain of in-memory stages over [`types::FeatureSet`]
//! values:
//!
//! 1. **Preflight** — schema, coordinate-system, selection, and key checks;
//!    everything is validated before any aggregation stage runs.
//! 2. **Geometry repair** ([`geometry`]) — region polygons are validated and
//!    self-intersections dissolved before they participate in a join.
//! 3. **Spatial join** ([`join`]) — boundary-inclusive point-in-polygon
//!    containment pairs building/storage points with their regions.
//! 4. **Grouped aggregation** ([`aggregate`]) — declarative
//!    [`aggregate::AggregateSpec`]s evaluate a small expression language
//!    ([`expr`]) per feature and reduce per group (`sum`, `concatenate`,
//!    `first_value`).
//! 5. **Table join + rounding** ([`join`], [`round`]) — aggregates are
//!    left-joined back onto the regions by key and Real columns rounded to
//!    one decimal digit.
//!
//! A second pass re-aggregates the result across all regions into a
//! single-row summary with a narrative text block and chart data.
//!
//! Everything is synchronous and deterministic; the optional
//! [`execution::ExecutionEngine`] parallelizes the containment predicate
//! across a thread pool without changing any output.
//!
//! ## Example: aggregate one region
//!
//! ```rust
//! use disaster_waste_aggregation::pipeline::{
//!     AggregationConfig, AggregationPipeline, building_fields, columns,
//! };
//! use disaster_waste_aggregation::types::{
//!     Crs, Feature, FeatureSet, Field, FieldType, Geometry, Schema, Value,
//! };
//! use geo::{LineString, Point, Polygon};
//!
//! # fn main() -> Result<(), disaster_waste_aggregation::PipelineError> {
//! let crs = Crs::projected("EPSG:6677");
//!
//! // One selected region: a 100 m square named R1.
//! let regions = FeatureSet::new(
//!     Schema::new(vec![Field::new("name", FieldType::Text)]),
//!     Some(crs.clone()),
//!     vec![Feature::new(
//!         1,
//!         Some(Geometry::Polygon(Polygon::new(
//!             LineString::from(vec![
//!                 (0.0, 0.0),
//!                 (100.0, 0.0),
//!                 (100.0, 100.0),
//!                 (0.0, 100.0),
//!                 (0.0, 0.0),
//!             ]),
//!             vec![],
//!         ))),
//!         vec![Value::Text("R1".to_string())],
//!     )],
//! );
//!
//! // Two building points inside it: one wooden (601), one non-wooden (610).
//! let building_schema = Schema::new(vec![
//!     Field::new(building_fields::STRUCTURE_CODE, FieldType::Integer),
//!     Field::real(building_fields::COLLAPSE, 1),
//!     Field::real(building_fields::HALF_COLLAPSE, 1),
//!     Field::real(building_fields::BURN, 1),
//!     Field::real(building_fields::WASTE_COMBUSTIBLE, 1),
//!     Field::real(building_fields::WASTE_NON_COMBUSTIBLE, 1),
//!     Field::real(building_fields::WASTE_TOTAL, 1),
//!     Field::real(building_fields::REQUIRED_STAGING_AREA, 1),
//! ]);
//! let buildings = FeatureSet::new(
//!     building_schema,
//!     Some(crs.clone()),
//!     vec![
//!         Feature::new(
//!             1,
//!             Some(Geometry::Point(Point::new(10.0, 10.0))),
//!             vec![
//!                 Value::Integer(601),
//!                 Value::Real(1.0),
//!                 Value::Real(0.5),
//!                 Value::Real(0.2),
//!                 Value::Real(10.0),
//!                 Value::Real(5.0),
//!                 Value::Real(15.0),
//!                 Value::Real(120.0),
//!             ],
//!         ),
//!         Feature::new(
//!             2,
//!             Some(Geometry::Point(Point::new(20.0, 20.0))),
//!             vec![
//!                 Value::Integer(610),
//!                 Value::Real(2.0),
//!                 Value::Real(1.0),
//!                 Value::Real(0.1),
//!                 Value::Real(20.0),
//!                 Value::Real(10.0),
//!                 Value::Real(30.0),
//!                 Value::Real(240.0),
//!             ],
//!         ),
//!     ],
//! );
//!
//! // One storage candidate inside the region.
//! let storages = FeatureSet::new(
//!     Schema::new(vec![
//!         Field::new("site", FieldType::Text),
//!         Field::real("eff_area", 1),
//!     ]),
//!     Some(crs),
//!     vec![Feature::new(
//!         1,
//!         Some(Geometry::Point(Point::new(50.0, 50.0))),
//!         vec![Value::Text("Depot A".to_string()), Value::Real(900.0)],
//!     )],
//! );
//!
//! let pipeline = AggregationPipeline::new(AggregationConfig::new("name", "site", "eff_area"));
//! let result = pipeline.run(&regions, &buildings, &storages)?;
//!
//! assert_eq!(result.feature_count(), 1);
//! assert_eq!(
//!     result.value(0, columns::BUILDINGS_WOODEN),
//!     Some(&Value::Integer(1))
//! );
//! assert_eq!(
//!     result.value(0, columns::DAMAGE_TOTAL_COLLAPSE),
//!     Some(&Value::Real(3.0))
//! );
//! assert_eq!(
//!     result.value(0, columns::STORAGE_NAMES),
//!     Some(&Value::Text("Depot A".to_string()))
//! );
//!
//! let summary = pipeline.summarize(&result)?;
//! assert!(summary.text.contains("Total: 2 (wooden: 1, non-wooden: 1)"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: schema, tagged values, geometry, and feature sets
//! - [`expr`]: the per-feature expression language
//! - [`geometry`]: polygon validity, repair, and containment primitives
//! - [`join`]: spatial join and attribute table join
//! - [`aggregate`]: expression-driven grouped reduction
//! - [`round`]: rounding and number formatting
//! - [`pipeline`]: the orchestrated pipelines, configuration, observability
//! - [`execution`]: rayon-backed parallel spatial join
//! - [`error`]: typed failures shared across stages

pub mod aggregate;
pub mod error;
pub mod execution;
pub mod expr;
pub mod geometry;
pub mod join;
pub mod pipeline;
pub mod round;
pub mod types;

pub use error::{PipelineError, PipelineResult};
