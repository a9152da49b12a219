//! Numeric rounding and human-readable number formatting.

use crate::error::SchemaError;
use crate::types::{Feature, FeatureSet, FieldType, Value};

/// Rounds `x` to `digits` decimal digits, half away from zero.
///
/// `f64::round` already rounds half away from zero, so this is a plain
/// scale/round/unscale. Rounding is idempotent: rounding an already-rounded
/// value changes nothing.
pub fn round_half_away_from_zero(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}

/// Returns a copy of `fs` with every named field's Real values rounded to
/// `digits` decimal digits.
///
/// Null values are left untouched, as are Integer values (rounding an
/// integer to decimal digits is the identity). Naming a Text field is a
/// [`SchemaError::WrongType`]; naming an absent field is
/// [`SchemaError::MissingField`].
pub fn round_fields(fs: &FeatureSet, fields: &[&str], digits: i32) -> Result<FeatureSet, SchemaError> {
    let mut idxs = Vec::with_capacity(fields.len());
    for name in fields {
        let idx = fs
            .schema
            .index_of(name)
            .ok_or_else(|| SchemaError::MissingField {
                field: (*name).to_string(),
            })?;
        if fs.schema.fields[idx].field_type == FieldType::Text {
            return Err(SchemaError::WrongType {
                field: (*name).to_string(),
                expected: "numeric",
                actual: "text",
            });
        }
        idxs.push(idx);
    }

    let features = fs
        .features
        .iter()
        .map(|feature| {
            let mut attributes = feature.attributes.clone();
            for &i in &idxs {
                if let Value::Real(v) = attributes[i] {
                    attributes[i] = Value::Real(round_half_away_from_zero(v, digits));
                }
            }
            Feature::new(feature.id, feature.geometry.clone(), attributes)
        })
        .collect();

    Ok(FeatureSet::new(fs.schema.clone(), fs.crs.clone(), features))
}

/// Formats `x` with `decimals` fractional digits and thousands separators,
/// e.g. `1234.56` → `"1,234.6"` for one decimal.
pub fn format_grouped(x: f64, decimals: usize) -> String {
    let formatted = format!("{x:.decimals$}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Integer counterpart of [`format_grouped`].
pub fn format_grouped_int(x: i64) -> String {
    format_grouped(x as f64, 0)
}

#[cfg(test)]
mod tests {
    use super::{format_grouped, format_grouped_int, round_fields, round_half_away_from_zero};
    use crate::error::SchemaError;
    use crate::types::{Feature, FeatureSet, Field, FieldType, Schema, Value};

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_half_away_from_zero(1.25, 1), 1.3);
        assert_eq!(round_half_away_from_zero(-1.25, 1), -1.3);
        assert_eq!(round_half_away_from_zero(2.5, 0), 3.0);
        assert_eq!(round_half_away_from_zero(-2.5, 0), -3.0);
        assert_eq!(round_half_away_from_zero(1.04, 1), 1.0);
    }

    #[test]
    fn rounding_is_idempotent() {
        for x in [0.05, 1.25, -7.777, 123.456, -0.949] {
            for d in 0..3 {
                let once = round_half_away_from_zero(x, d);
                assert_eq!(round_half_away_from_zero(once, d), once, "x={x} d={d}");
            }
        }
    }

    #[test]
    fn round_fields_touches_reals_only() {
        let schema = Schema::new(vec![
            Field::new("n", FieldType::Integer),
            Field::real("x", 1),
        ]);
        let fs = FeatureSet::new(
            schema,
            None,
            vec![
                Feature::new(0, None, vec![Value::Integer(3), Value::Real(1.26)]),
                Feature::new(1, None, vec![Value::Integer(4), Value::Null]),
            ],
        );
        let out = round_fields(&fs, &["n", "x"], 1).unwrap();
        assert_eq!(out.features[0].attributes[0], Value::Integer(3));
        assert_eq!(out.features[0].attributes[1], Value::Real(1.3));
        assert_eq!(out.features[1].attributes[1], Value::Null);
    }

    #[test]
    fn round_fields_rejects_text_and_missing_fields() {
        let schema = Schema::new(vec![Field::new("name", FieldType::Text)]);
        let fs = FeatureSet::new(
            schema,
            None,
            vec![Feature::new(0, None, vec![Value::Text("a".to_string())])],
        );
        assert!(matches!(
            round_fields(&fs, &["name"], 1),
            Err(SchemaError::WrongType { .. })
        ));
        assert!(matches!(
            round_fields(&fs, &["absent"], 1),
            Err(SchemaError::MissingField { .. })
        ));
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(format_grouped(1234.56, 1), "1,234.6");
        assert_eq!(format_grouped(1234567.0, 1), "1,234,567.0");
        assert_eq!(format_grouped(-1234.0, 1), "-1,234.0");
        assert_eq!(format_grouped(999.0, 1), "999.0");
        assert_eq!(format_grouped_int(1234567), "1,234,567");
        assert_eq!(format_grouped_int(0), "0");
    }
}
