//! Fixed field names, structure codes, and aggregate-spec tables used by the
//! two concrete pipelines.

use crate::aggregate::AggregateSpec;
use crate::types::{Field, FieldType};

/// Structure-type code for wooden buildings.
pub const WOODEN_STRUCTURE_CODE: i64 = 601;

/// Structure-type code for non-wooden buildings.
pub const NON_WOODEN_STRUCTURE_CODE: i64 = 610;

/// Required input fields of the building point set.
///
/// These names follow the source building dataset and are not configurable.
pub mod building_fields {
    /// Structure-type code (wooden = 601, non-wooden = 610).
    pub const STRUCTURE_CODE: &str = "Bld_Str";
    /// Estimated fully-collapsed building count.
    pub const COLLAPSE: &str = "Cdst_Dmg";
    /// Estimated half-collapsed building count.
    pub const HALF_COLLAPSE: &str = "Hdst_Dmg";
    /// Estimated burn-loss building count.
    pub const BURN: &str = "Prob_Burn";
    /// Combustible waste quantity.
    pub const WASTE_COMBUSTIBLE: &str = "Flam_out";
    /// Non-combustible waste quantity.
    pub const WASTE_NON_COMBUSTIBLE: &str = "Noflam_out";
    /// Total waste quantity.
    pub const WASTE_TOTAL: &str = "All_Out";
    /// Staging area required to process this building's waste.
    pub const REQUIRED_STAGING_AREA: &str = "T_Area";

    /// Every field the building set must carry, with numeric type.
    pub const REQUIRED: [&str; 8] = [
        STRUCTURE_CODE,
        COLLAPSE,
        HALF_COLLAPSE,
        BURN,
        WASTE_COMBUSTIBLE,
        WASTE_NON_COMBUSTIBLE,
        WASTE_TOTAL,
        REQUIRED_STAGING_AREA,
    ];
}

/// Output column names of the aggregation result and summary sets.
pub mod columns {
    /// Working join key carried through the pipeline and dropped from the
    /// final result.
    pub const REGION_ID: &str = "region_id";
    /// Planar area of the region polygon.
    pub const AREA: &str = "area";

    pub const BUILDINGS_WOODEN: &str = "buildings_wooden";
    pub const BUILDINGS_NON_WOODEN: &str = "buildings_non_wooden";
    pub const BUILDINGS_TOTAL: &str = "buildings_total";

    pub const DAMAGE_WOODEN_COLLAPSE: &str = "damage_wooden_collapse";
    pub const DAMAGE_WOODEN_HALF_COLLAPSE: &str = "damage_wooden_half_collapse";
    pub const DAMAGE_WOODEN_BURN: &str = "damage_wooden_burn";
    pub const DAMAGE_NON_WOODEN_COLLAPSE: &str = "damage_non_wooden_collapse";
    pub const DAMAGE_NON_WOODEN_HALF_COLLAPSE: &str = "damage_non_wooden_half_collapse";
    pub const DAMAGE_NON_WOODEN_BURN: &str = "damage_non_wooden_burn";
    pub const DAMAGE_TOTAL_COLLAPSE: &str = "damage_total_collapse";
    pub const DAMAGE_TOTAL_HALF_COLLAPSE: &str = "damage_total_half_collapse";
    pub const DAMAGE_TOTAL_BURN: &str = "damage_total_burn";

    pub const WASTE_COMBUSTIBLE: &str = "waste_combustible";
    pub const WASTE_NON_COMBUSTIBLE: &str = "waste_non_combustible";
    pub const WASTE_TOTAL: &str = "waste_total";
    pub const REQUIRED_STAGING_AREA: &str = "required_staging_area";

    pub const STORAGE_NAMES: &str = "storage_names";
    pub const STORAGE_EFFECTIVE_AREA: &str = "storage_effective_area";

    /// Summed region area, summary set only.
    pub const AREA_TOTAL: &str = "area_total";
}

use self::building_fields as bf;
use self::columns as col;

/// Aggregate specs applied to buildings joined into regions, grouped by
/// [`columns::REGION_ID`].
pub(crate) fn building_specs(region_name_field: &str) -> Vec<AggregateSpec> {
    let code = bf::STRUCTURE_CODE;
    let mut specs = vec![
        AggregateSpec::sum(
            format!(r#""{code}"={WOODEN_STRUCTURE_CODE}"#),
            Field::new(col::BUILDINGS_WOODEN, FieldType::Integer),
        ),
        AggregateSpec::sum(
            format!(r#""{code}"={NON_WOODEN_STRUCTURE_CODE}"#),
            Field::new(col::BUILDINGS_NON_WOODEN, FieldType::Integer),
        ),
        AggregateSpec::sum(
            format!(r#""{code}">0"#),
            Field::new(col::BUILDINGS_TOTAL, FieldType::Integer),
        ),
    ];

    let damage_classes = [
        (bf::COLLAPSE, col::DAMAGE_WOODEN_COLLAPSE, col::DAMAGE_NON_WOODEN_COLLAPSE),
        (
            bf::HALF_COLLAPSE,
            col::DAMAGE_WOODEN_HALF_COLLAPSE,
            col::DAMAGE_NON_WOODEN_HALF_COLLAPSE,
        ),
        (bf::BURN, col::DAMAGE_WOODEN_BURN, col::DAMAGE_NON_WOODEN_BURN),
    ];
    for (quantity, wooden_out, _) in damage_classes {
        specs.push(AggregateSpec::sum(
            format!(r#"( "{code}" = {WOODEN_STRUCTURE_CODE} ) * "{quantity}" "#),
            Field::real(wooden_out, 1),
        ));
    }
    for (quantity, _, non_wooden_out) in damage_classes {
        specs.push(AggregateSpec::sum(
            format!(r#"( "{code}" = {NON_WOODEN_STRUCTURE_CODE} ) * "{quantity}" "#),
            Field::real(non_wooden_out, 1),
        ));
    }

    for (quantity, out) in [
        (bf::COLLAPSE, col::DAMAGE_TOTAL_COLLAPSE),
        (bf::HALF_COLLAPSE, col::DAMAGE_TOTAL_HALF_COLLAPSE),
        (bf::BURN, col::DAMAGE_TOTAL_BURN),
        (bf::WASTE_COMBUSTIBLE, col::WASTE_COMBUSTIBLE),
        (bf::WASTE_NON_COMBUSTIBLE, col::WASTE_NON_COMBUSTIBLE),
        (bf::WASTE_TOTAL, col::WASTE_TOTAL),
        (bf::REQUIRED_STAGING_AREA, col::REQUIRED_STAGING_AREA),
    ] {
        specs.push(AggregateSpec::sum(
            format!(r#""{quantity}""#),
            Field::real(out, 1),
        ));
    }

    specs.push(AggregateSpec::first_value(
        format!(r#""{region_name_field}""#),
        Field::new(region_name_field, FieldType::Text),
    ));
    specs
}

/// Result columns copied from the building aggregate onto the region base
/// set.
pub(crate) const BUILDING_COPY_FIELDS: [&str; 16] = [
    col::BUILDINGS_WOODEN,
    col::BUILDINGS_NON_WOODEN,
    col::BUILDINGS_TOTAL,
    col::DAMAGE_WOODEN_COLLAPSE,
    col::DAMAGE_WOODEN_HALF_COLLAPSE,
    col::DAMAGE_WOODEN_BURN,
    col::DAMAGE_NON_WOODEN_COLLAPSE,
    col::DAMAGE_NON_WOODEN_HALF_COLLAPSE,
    col::DAMAGE_NON_WOODEN_BURN,
    col::DAMAGE_TOTAL_COLLAPSE,
    col::DAMAGE_TOTAL_HALF_COLLAPSE,
    col::DAMAGE_TOTAL_BURN,
    col::WASTE_COMBUSTIBLE,
    col::WASTE_NON_COMBUSTIBLE,
    col::WASTE_TOTAL,
    col::REQUIRED_STAGING_AREA,
];

/// Aggregate specs applied to storage candidates joined into regions,
/// grouped by [`columns::REGION_ID`].
pub(crate) fn storage_specs(
    storage_name_field: &str,
    storage_area_field: &str,
    region_name_field: &str,
) -> Vec<AggregateSpec> {
    vec![
        AggregateSpec::concatenate(
            format!(r#""{storage_name_field}""#),
            ",",
            Field::new(col::STORAGE_NAMES, FieldType::Text),
        ),
        AggregateSpec::sum(
            format!(r#""{storage_area_field}""#),
            Field::real(col::STORAGE_EFFECTIVE_AREA, 1),
        ),
        AggregateSpec::first_value(
            format!(r#""{region_name_field}""#),
            Field::new(region_name_field, FieldType::Text),
        ),
    ]
}

pub(crate) const STORAGE_COPY_FIELDS: [&str; 2] = [col::STORAGE_NAMES, col::STORAGE_EFFECTIVE_AREA];

/// Result fields rounded to one decimal digit before the result is returned.
pub(crate) const ROUNDED_RESULT_FIELDS: [&str; 15] = [
    col::AREA,
    col::DAMAGE_WOODEN_COLLAPSE,
    col::DAMAGE_WOODEN_HALF_COLLAPSE,
    col::DAMAGE_WOODEN_BURN,
    col::DAMAGE_NON_WOODEN_COLLAPSE,
    col::DAMAGE_NON_WOODEN_HALF_COLLAPSE,
    col::DAMAGE_NON_WOODEN_BURN,
    col::DAMAGE_TOTAL_COLLAPSE,
    col::DAMAGE_TOTAL_HALF_COLLAPSE,
    col::DAMAGE_TOTAL_BURN,
    col::WASTE_COMBUSTIBLE,
    col::WASTE_NON_COMBUSTIBLE,
    col::WASTE_TOTAL,
    col::REQUIRED_STAGING_AREA,
    col::STORAGE_EFFECTIVE_AREA,
];

/// Aggregate specs of the cross-region summary pass, applied to the result
/// set as a single group.
pub(crate) fn summary_specs(region_name_field: &str) -> Vec<AggregateSpec> {
    let mut specs = vec![
        AggregateSpec::concatenate(
            format!(r#""{region_name_field}""#),
            ", ",
            Field::new(region_name_field, FieldType::Text),
        ),
        AggregateSpec::sum(
            format!(r#""{}""#, col::AREA),
            Field::real(col::AREA_TOTAL, 1),
        ),
    ];

    for count in [
        col::BUILDINGS_WOODEN,
        col::BUILDINGS_NON_WOODEN,
        col::BUILDINGS_TOTAL,
    ] {
        specs.push(AggregateSpec::sum(
            format!(r#""{count}""#),
            Field::new(count, FieldType::Integer),
        ));
    }

    for quantity in [
        col::DAMAGE_WOODEN_COLLAPSE,
        col::DAMAGE_WOODEN_HALF_COLLAPSE,
        col::DAMAGE_WOODEN_BURN,
        col::DAMAGE_NON_WOODEN_COLLAPSE,
        col::DAMAGE_NON_WOODEN_HALF_COLLAPSE,
        col::DAMAGE_NON_WOODEN_BURN,
        col::DAMAGE_TOTAL_COLLAPSE,
        col::DAMAGE_TOTAL_HALF_COLLAPSE,
        col::DAMAGE_TOTAL_BURN,
        col::WASTE_COMBUSTIBLE,
        col::WASTE_NON_COMBUSTIBLE,
        col::WASTE_TOTAL,
        col::REQUIRED_STAGING_AREA,
    ] {
        specs.push(AggregateSpec::sum(
            format!(r#""{quantity}""#),
            Field::real(quantity, 1),
        ));
    }

    // Regions without any storage candidate carry a Null storage-name list;
    // the sentinel keeps them visible to the concatenation and is stripped
    // again by the summary post-processing.
    specs.push(AggregateSpec::concatenate(
        format!(r#" coalesce("{}",'none')"#, col::STORAGE_NAMES),
        ", ",
        Field::new(col::STORAGE_NAMES, FieldType::Text),
    ));
    specs.push(AggregateSpec::sum(
        format!(r#""{}""#, col::STORAGE_EFFECTIVE_AREA),
        Field::real(col::STORAGE_EFFECTIVE_AREA, 1),
    ));
    specs
}
