//! Attribute table join by key.

use crate::error::{JoinKeyError, PipelineError, SchemaError};
use crate::types::{Feature, FeatureSet, Value};

/// Left-joins `lookup` onto `base` by key equality.
///
/// Rules:
///
/// - Every base feature is preserved: the output row count always equals the
///   base row count.
/// - The first lookup feature (in lookup input order) whose `lookup_key`
///   value equals the base feature's `base_key` value supplies the
///   `copy_fields` values; with no match they are Null.
/// - Null keys never match, on either side.
/// - Key fields are not duplicated into the output; only `copy_fields` are
///   appended after the base schema.
pub fn left_join(
    base: &FeatureSet,
    base_key: &str,
    lookup: &FeatureSet,
    lookup_key: &str,
    copy_fields: &[&str],
) -> Result<FeatureSet, SchemaError> {
    let base_key_idx = require_field(base, base_key)?;
    let lookup_key_idx = require_field(lookup, lookup_key)?;

    let copy_idxs: Vec<usize> = copy_fields
        .iter()
        .map(|name| require_field(lookup, name))
        .collect::<Result<_, _>>()?;

    let mut fields = base.schema.fields.clone();
    for &i in &copy_idxs {
        let field = &lookup.schema.fields[i];
        if fields.iter().any(|f| f.name == field.name) {
            return Err(SchemaError::DuplicateField {
                field: field.name.clone(),
            });
        }
        fields.push(field.clone());
    }

    let features = base
        .features
        .iter()
        .map(|feature| {
            let key = &feature.attributes[base_key_idx];
            let matched = lookup
                .features
                .iter()
                .find(|candidate| candidate.attributes[lookup_key_idx].key_eq(key));

            let mut attributes = feature.attributes.clone();
            match matched {
                Some(row) => {
                    for &i in &copy_idxs {
                        attributes.push(row.attributes[i].clone());
                    }
                }
                None => attributes.extend(std::iter::repeat_n(Value::Null, copy_idxs.len())),
            }
            Feature::new(feature.id, feature.geometry.clone(), attributes)
        })
        .collect();

    Ok(FeatureSet::new(
        crate::types::Schema::new(fields),
        base.crs.clone(),
        features,
    ))
}

/// Verifies that `key` holds pairwise-distinct non-Null values.
///
/// Used by preflight checks wherever a later join assumes unique keys; Null
/// keys are not counted as duplicates of each other (they never match).
pub fn ensure_unique_key(fs: &FeatureSet, key: &str) -> Result<(), PipelineError> {
    let idx = require_field(fs, key).map_err(PipelineError::Schema)?;
    for (i, feature) in fs.features.iter().enumerate() {
        let value = &feature.attributes[idx];
        if fs.features[..i]
            .iter()
            .any(|earlier| earlier.attributes[idx].key_eq(value))
        {
            return Err(PipelineError::JoinKey(JoinKeyError::DuplicateKey {
                field: key.to_string(),
                value: value.to_string(),
            }));
        }
    }
    Ok(())
}

fn require_field(fs: &FeatureSet, name: &str) -> Result<usize, SchemaError> {
    fs.schema.index_of(name).ok_or_else(|| SchemaError::MissingField {
        field: name.to_string(),
    })
}
