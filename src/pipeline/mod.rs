//! The two concrete pipelines: per-region aggregation and the cross-region
//! summary.
//!
//! [`AggregationPipeline::run`] composes the stage components into the
//! per-region pipeline: preflight checks → region repair → spatial joins →
//! grouped aggregation → table joins → rounding. All checks run before any
//! aggregation stage; a failing check or stage aborts the whole run and no
//! partial result is ever returned.
//!
//! [`AggregationPipeline::summarize`] feeds a result set back through the
//! aggregator as a single group and renders the narrative summary block plus
//! the staging-area chart data.

mod observability;
mod specs;
mod summary;

use std::sync::Arc;

use geo::Area;
use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::error::{GeometryError, JoinKeyError, PipelineError, PipelineResult, SchemaError};
use crate::execution::{ExecutionEngine, ExecutionOptions};
use crate::geometry::repair_polygons;
use crate::join::{left_join, spatial_join};
use crate::round::round_fields;
use crate::types::{Feature, FeatureSet, Field, FieldType, Geometry, Schema, Value};

pub use observability::{
    CompositeObserver, FileObserver, PipelineObserver, PipelineStage, StageStats, StdErrObserver,
};
pub use specs::{
    NON_WOODEN_STRUCTURE_CODE, WOODEN_STRUCTURE_CODE, building_fields, columns,
};
pub use summary::{AggregationSummary, ChartBar, ChartData};

use specs::{
    BUILDING_COPY_FIELDS, ROUNDED_RESULT_FIELDS, STORAGE_COPY_FIELDS, building_specs,
    storage_specs,
};

/// Configurable field names of the aggregation inputs.
///
/// The building set's field names are fixed ([`building_fields`]); the
/// region name field and the storage name/area fields are chosen by the
/// caller, matching whatever their datasets use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Text field of the region set holding the region's display name.
    pub region_name_field: String,
    /// Text field of the storage set holding the candidate site's name.
    pub storage_name_field: String,
    /// Numeric field of the storage set holding the effective area.
    pub storage_area_field: String,
}

impl AggregationConfig {
    /// Create a config from the three caller-chosen field names.
    pub fn new(
        region_name_field: impl Into<String>,
        storage_name_field: impl Into<String>,
        storage_area_field: impl Into<String>,
    ) -> Self {
        Self {
            region_name_field: region_name_field.into(),
            storage_name_field: storage_name_field.into(),
            storage_area_field: storage_area_field.into(),
        }
    }
}

/// The aggregation pipeline: configuration plus optional observer and
/// parallel execution engine.
pub struct AggregationPipeline {
    config: AggregationConfig,
    observer: Option<Arc<dyn PipelineObserver>>,
    engine: Option<ExecutionEngine>,
}

impl AggregationPipeline {
    /// Create a pipeline with the given configuration.
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            config,
            observer: None,
            engine: None,
        }
    }

    /// Attach an observer for stage progress, warnings, and failures.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the spatial joins on a thread pool instead of inline.
    ///
    /// Output is identical either way; only the containment predicate work
    /// is parallelized.
    pub fn with_execution(mut self, options: ExecutionOptions) -> Self {
        self.engine = Some(ExecutionEngine::new(options));
        self
    }

    /// The pipeline's configuration.
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Runs the per-region aggregation pipeline.
    ///
    /// `regions` holds the caller-selected region polygons; `buildings` and
    /// `storages` are point sets sharing the regions' planar coordinate
    /// system. The result has one polygon feature per region, carrying the
    /// region's name and area, all building aggregates, and all storage
    /// aggregates, with Real fields rounded to one decimal digit.
    pub fn run(
        &self,
        regions: &FeatureSet,
        buildings: &FeatureSet,
        storages: &FeatureSet,
    ) -> PipelineResult<FeatureSet> {
        let mut stage = PipelineStage::Preflight;
        match self.run_stages(regions, buildings, storages, &mut stage) {
            Ok(result) => Ok(result),
            Err(error) => {
                if let Some(observer) = &self.observer {
                    observer.on_failure(stage, &error);
                }
                Err(error)
            }
        }
    }

    /// Runs the cross-region summary pass over a result set produced by
    /// [`AggregationPipeline::run`].
    pub fn summarize(&self, result: &FeatureSet) -> PipelineResult<AggregationSummary> {
        self.started(PipelineStage::Summary);
        match summary::summarize(&self.config, result) {
            Ok(out) => {
                self.finished(PipelineStage::Summary, out.summary.feature_count());
                Ok(out)
            }
            Err(error) => {
                if let Some(observer) = &self.observer {
                    observer.on_failure(PipelineStage::Summary, &error);
                }
                Err(error)
            }
        }
    }

    fn run_stages(
        &self,
        regions: &FeatureSet,
        buildings: &FeatureSet,
        storages: &FeatureSet,
        stage: &mut PipelineStage,
    ) -> PipelineResult<FeatureSet> {
        *stage = PipelineStage::Preflight;
        self.started(*stage);
        self.preflight(regions, buildings, storages)?;
        self.finished(*stage, regions.feature_count());

        *stage = PipelineStage::GeometryRepair;
        self.started(*stage);
        let base = self.prepare_regions(regions)?;
        self.finished(*stage, base.feature_count());

        *stage = PipelineStage::SpatialJoin;
        self.started(*stage);
        let region_fields = [columns::REGION_ID, self.config.region_name_field.as_str()];
        let joined_buildings =
            self.join(buildings, &building_fields::REQUIRED, &base, &region_fields)?;
        let joined_storages = self.join(
            storages,
            &[
                self.config.storage_name_field.as_str(),
                self.config.storage_area_field.as_str(),
            ],
            &base,
            &region_fields,
        )?;
        self.finished(
            *stage,
            joined_buildings.feature_count() + joined_storages.feature_count(),
        );

        *stage = PipelineStage::Aggregate;
        self.started(*stage);
        let building_totals = aggregate(
            &joined_buildings,
            &building_specs(&self.config.region_name_field),
            columns::REGION_ID,
        )?;
        let storage_totals = aggregate(
            &joined_storages,
            &storage_specs(
                &self.config.storage_name_field,
                &self.config.storage_area_field,
                &self.config.region_name_field,
            ),
            columns::REGION_ID,
        )?;
        self.finished(
            *stage,
            building_totals.feature_count() + storage_totals.feature_count(),
        );

        *stage = PipelineStage::TableJoin;
        self.started(*stage);
        let with_buildings = left_join(
            &base,
            columns::REGION_ID,
            &building_totals,
            columns::REGION_ID,
            &BUILDING_COPY_FIELDS,
        )?;
        let with_storages = left_join(
            &with_buildings,
            columns::REGION_ID,
            &storage_totals,
            columns::REGION_ID,
            &STORAGE_COPY_FIELDS,
        )?;
        let trimmed = with_storages.drop_fields(&[columns::REGION_ID]);
        self.finished(*stage, trimmed.feature_count());

        *stage = PipelineStage::Rounding;
        self.started(*stage);
        let result = round_fields(&trimmed, &ROUNDED_RESULT_FIELDS, 1)?;
        self.finished(*stage, result.feature_count());

        Ok(result)
    }

    /// Pre-flight checks, all before any aggregation stage: selection,
    /// coordinate system, required fields and types, and key uniqueness.
    fn preflight(
        &self,
        regions: &FeatureSet,
        buildings: &FeatureSet,
        storages: &FeatureSet,
    ) -> PipelineResult<()> {
        if regions.feature_count() == 0 {
            return Err(PipelineError::EmptySelection);
        }

        let crs = regions
            .crs
            .as_ref()
            .ok_or(PipelineError::Geometry(GeometryError::UndefinedCrs))?;
        if crs.geographic {
            return Err(GeometryError::GeographicCrs {
                auth_id: crs.auth_id.clone(),
            }
            .into());
        }

        let name_field = self.config.region_name_field.as_str();
        require_typed_field(regions, name_field, FieldType::Text)?;
        if name_field == columns::REGION_ID || name_field == columns::AREA {
            return Err(SchemaError::DuplicateField {
                field: name_field.to_string(),
            }
            .into());
        }

        for feature in &regions.features {
            let is_polygon = feature
                .geometry
                .as_ref()
                .is_some_and(|g| g.as_polygon().is_some());
            if !is_polygon {
                return Err(GeometryError::NotAPolygon {
                    feature_id: feature.id,
                }
                .into());
            }
        }

        // Region feature ids become the join key of the whole run; the table
        // joins assume they are unique.
        for (i, feature) in regions.features.iter().enumerate() {
            if regions.features[..i].iter().any(|earlier| earlier.id == feature.id) {
                return Err(JoinKeyError::DuplicateKey {
                    field: columns::REGION_ID.to_string(),
                    value: feature.id.to_string(),
                }
                .into());
            }
        }

        for name in building_fields::REQUIRED {
            require_numeric_field(buildings, name)?;
        }
        require_typed_field(storages, &self.config.storage_name_field, FieldType::Text)?;
        require_numeric_field(storages, &self.config.storage_area_field)?;

        for (label, fs) in [("building", buildings), ("storage", storages)] {
            match &fs.crs {
                Some(other) if other != crs => self.warn(
                    PipelineStage::Preflight,
                    &format!(
                        "{label} set CRS {} differs from region CRS {}",
                        other.auth_id, crs.auth_id
                    ),
                ),
                None => self.warn(
                    PipelineStage::Preflight,
                    &format!("{label} set declares no CRS; assuming the region CRS"),
                ),
                _ => {}
            }
        }
        Ok(())
    }

    /// Repairs the selected region polygons and builds the region base set:
    /// `region_id` (the source feature id), the region name, and the
    /// polygon's planar area.
    fn prepare_regions(&self, regions: &FeatureSet) -> PipelineResult<FeatureSet> {
        let repaired = repair_polygons(regions)?;
        let name_field = self.config.region_name_field.as_str();
        let name_idx =
            repaired
                .schema
                .index_of(name_field)
                .ok_or_else(|| SchemaError::MissingField {
                    field: name_field.to_string(),
                })?;

        let schema = Schema::new(vec![
            Field::new(columns::REGION_ID, FieldType::Integer),
            Field::new(name_field, FieldType::Text),
            Field::real(columns::AREA, 1),
        ]);

        let mut features = Vec::with_capacity(repaired.feature_count());
        for (i, feature) in repaired.features.iter().enumerate() {
            let polygon = feature
                .geometry
                .as_ref()
                .and_then(Geometry::as_polygon)
                .ok_or(GeometryError::NotAPolygon {
                    feature_id: feature.id,
                })?;

            features.push(Feature::new(
                i as i64,
                Some(Geometry::Polygon(polygon.clone())),
                vec![
                    Value::Integer(feature.id),
                    feature.attributes[name_idx].clone(),
                    Value::Real(polygon.unsigned_area()),
                ],
            ));
        }

        Ok(FeatureSet::new(schema, repaired.crs.clone(), features))
    }

    fn join(
        &self,
        subjects: &FeatureSet,
        subject_fields: &[&str],
        regions: &FeatureSet,
        region_fields: &[&str],
    ) -> Result<FeatureSet, SchemaError> {
        match &self.engine {
            Some(engine) => engine.spatial_join(subjects, subject_fields, regions, region_fields),
            None => spatial_join(subjects, subject_fields, regions, region_fields),
        }
    }

    fn started(&self, stage: PipelineStage) {
        if let Some(observer) = &self.observer {
            observer.on_stage_started(stage);
        }
    }

    fn finished(&self, stage: PipelineStage, output_features: usize) {
        if let Some(observer) = &self.observer {
            observer.on_stage_finished(stage, StageStats { output_features });
        }
    }

    fn warn(&self, stage: PipelineStage, message: &str) {
        if let Some(observer) = &self.observer {
            observer.on_warning(stage, message);
        }
    }
}

fn require_typed_field(
    fs: &FeatureSet,
    name: &str,
    expected: FieldType,
) -> Result<(), SchemaError> {
    let field = fs.schema.field(name).ok_or_else(|| SchemaError::MissingField {
        field: name.to_string(),
    })?;
    if field.field_type != expected {
        return Err(SchemaError::WrongType {
            field: name.to_string(),
            expected: type_label(expected),
            actual: type_label(field.field_type),
        });
    }
    Ok(())
}

fn require_numeric_field(fs: &FeatureSet, name: &str) -> Result<(), SchemaError> {
    let field = fs.schema.field(name).ok_or_else(|| SchemaError::MissingField {
        field: name.to_string(),
    })?;
    if field.field_type == FieldType::Text {
        return Err(SchemaError::WrongType {
            field: name.to_string(),
            expected: "numeric",
            actual: "text",
        });
    }
    Ok(())
}

fn type_label(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer => "integer",
        FieldType::Real => "real",
        FieldType::Text => "text",
    }
}
