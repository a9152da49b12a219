//! Cross-region summary: re-aggregation, sentinel cleanup, narrative text,
//! and chart data.

use crate::aggregate::aggregate_all;
use crate::error::{PipelineResult, SchemaError};
use crate::round::{format_grouped, format_grouped_int, round_half_away_from_zero};
use crate::types::{Feature, FeatureSet, Value};

use super::AggregationConfig;
use super::specs::{columns as col, summary_specs};

/// One bar of the staging-area chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
}

/// Data for the two-bar staging-area chart.
///
/// Rendering is an external collaborator; the core only supplies values.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    /// Bars in display order: effective area, then required area.
    pub bars: Vec<ChartBar>,
}

/// Output of the summary pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSummary {
    /// Single-row feature set with all per-region columns re-aggregated.
    pub summary: FeatureSet,
    /// Human-readable narrative block.
    pub text: String,
    /// Chart data, absent when both staging areas are zero.
    pub chart: Option<ChartData>,
}

pub(crate) fn summarize(
    config: &AggregationConfig,
    result: &FeatureSet,
) -> PipelineResult<AggregationSummary> {
    let raw = aggregate_all(result, &summary_specs(&config.region_name_field))?;
    let summary = strip_storage_sentinels(&raw);
    let text = render_text(config, &summary)?;
    let chart = chart_data(&summary)?;
    Ok(AggregationSummary {
        summary,
        text,
        chart,
    })
}

/// Removes the `none` placeholders that [`summary_specs`] introduces for
/// regions without storage candidates.
///
/// This is text post-processing on the concatenated value, not a data-model
/// operation: `"A, none, B"` becomes `"A, B"`, and a list of only
/// placeholders becomes empty.
fn strip_storage_sentinels(summary: &FeatureSet) -> FeatureSet {
    let Some(idx) = summary.schema.index_of(col::STORAGE_NAMES) else {
        return summary.clone();
    };

    let features = summary
        .features
        .iter()
        .map(|feature| {
            let mut attributes = feature.attributes.clone();
            if let Value::Text(names) = &attributes[idx] {
                let mut cleaned = names.replace("none, ", "").replace(", none", "");
                if cleaned == "none" {
                    cleaned.clear();
                }
                attributes[idx] = Value::Text(cleaned);
            }
            Feature::new(feature.id, feature.geometry.clone(), attributes)
        })
        .collect();

    FeatureSet::new(summary.schema.clone(), summary.crs.clone(), features)
}

fn render_text(config: &AggregationConfig, summary: &FeatureSet) -> PipelineResult<String> {
    let int = |field: &str| -> PipelineResult<String> {
        Ok(format_grouped_int(real_at(summary, field)? as i64))
    };
    let real = |field: &str| -> PipelineResult<String> {
        Ok(format_grouped(
            round_half_away_from_zero(real_at(summary, field)?, 1),
            1,
        ))
    };

    let required = real_at(summary, col::REQUIRED_STAGING_AREA)?;
    let effective = real_at(summary, col::STORAGE_EFFECTIVE_AREA)?;
    let usage = if required == 0.0 || effective == 0.0 {
        "-".to_string()
    } else {
        format!("{}%", (required / effective * 100.0).round() as i64)
    };

    let text = format!(
        "<Buildings>\n\
         Total: {total} (wooden: {wooden}, non-wooden: {non_wooden})\n\
         \n\
         <Area within selection>\n\
         {area} m²\n\
         \n\
         <Estimated building damage>\n\
         Collapsed: {collapse} (wooden: {w_collapse}, non-wooden: {nw_collapse})\n\
         Half-collapsed: {half} (wooden: {w_half}, non-wooden: {nw_half})\n\
         Burnt: {burn} (wooden: {w_burn}, non-wooden: {nw_burn})\n\
         \n\
         <Estimated disaster waste>\n\
         Total: {waste} t (combustible: {waste_c} t, non-combustible: {waste_n} t)\n\
         \n\
         <Required staging area>\n\
         {required} m²\n\
         \n\
         <Temporary storage sites>\n\
         Names: {names}\n\
         Effective area: {effective} m²\n\
         Usage: {usage}\n\
         \n\
         <Aggregated regions>\n\
         {regions}",
        total = int(col::BUILDINGS_TOTAL)?,
        wooden = int(col::BUILDINGS_WOODEN)?,
        non_wooden = int(col::BUILDINGS_NON_WOODEN)?,
        area = real(col::AREA_TOTAL)?,
        collapse = real(col::DAMAGE_TOTAL_COLLAPSE)?,
        w_collapse = real(col::DAMAGE_WOODEN_COLLAPSE)?,
        nw_collapse = real(col::DAMAGE_NON_WOODEN_COLLAPSE)?,
        half = real(col::DAMAGE_TOTAL_HALF_COLLAPSE)?,
        w_half = real(col::DAMAGE_WOODEN_HALF_COLLAPSE)?,
        nw_half = real(col::DAMAGE_NON_WOODEN_HALF_COLLAPSE)?,
        burn = real(col::DAMAGE_TOTAL_BURN)?,
        w_burn = real(col::DAMAGE_WOODEN_BURN)?,
        nw_burn = real(col::DAMAGE_NON_WOODEN_BURN)?,
        waste = real(col::WASTE_TOTAL)?,
        waste_c = real(col::WASTE_COMBUSTIBLE)?,
        waste_n = real(col::WASTE_NON_COMBUSTIBLE)?,
        required = real(col::REQUIRED_STAGING_AREA)?,
        names = text_at(summary, col::STORAGE_NAMES)?,
        effective = real(col::STORAGE_EFFECTIVE_AREA)?,
        regions = text_at(summary, &config.region_name_field)?,
    );
    Ok(text)
}

fn chart_data(summary: &FeatureSet) -> PipelineResult<Option<ChartData>> {
    let effective = round_half_away_from_zero(real_at(summary, col::STORAGE_EFFECTIVE_AREA)?, 1);
    let required = round_half_away_from_zero(real_at(summary, col::REQUIRED_STAGING_AREA)?, 1);

    if effective == 0.0 && required == 0.0 {
        return Ok(None);
    }
    Ok(Some(ChartData {
        bars: vec![
            ChartBar {
                label: "Effective staging area".to_string(),
                value: effective,
            },
            ChartBar {
                label: "Required staging area".to_string(),
                value: required,
            },
        ],
    }))
}

fn real_at(fs: &FeatureSet, field: &str) -> PipelineResult<f64> {
    let value = fs
        .value(0, field)
        .ok_or_else(|| SchemaError::MissingField {
            field: field.to_string(),
        })?;
    Ok(value.as_f64().unwrap_or(0.0))
}

fn text_at(fs: &FeatureSet, field: &str) -> PipelineResult<String> {
    let value = fs
        .value(0, field)
        .ok_or_else(|| SchemaError::MissingField {
            field: field.to_string(),
        })?;
    Ok(value.to_display_text().unwrap_or_default())
}
