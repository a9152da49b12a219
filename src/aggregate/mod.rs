//! Expression-driven grouped aggregation.
//!
//! An [`AggregateSpec`] is a declarative rule: evaluate an expression against
//! every feature of a group, then reduce the values with one of three
//! functions. [`aggregate`] partitions a feature set by a group field;
//! [`aggregate_all`] reduces the whole set as a single group (the summary
//! pass re-aggregates per-region results this way).

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult, SchemaError};
use crate::expr::Expression;
use crate::types::{Feature, FeatureSet, Field, FieldType, Schema, Value};

/// Reduction applied to a group's per-feature expression values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
    /// Arithmetic sum; Null contributes 0. Booleans count as 0/1, which is
    /// what turns `sum("Bld_Str"=601)` into a match counter.
    Sum,
    /// Text join in per-group feature order; Null values are omitted and
    /// nothing is deduplicated.
    Concatenate,
    /// The first feature's value, stable under input order.
    FirstValue,
}

/// One declarative aggregation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Reduction function.
    pub function: AggregateFunction,
    /// Per-feature expression source, parsed once per aggregate call.
    pub expression: String,
    /// Separator used by [`AggregateFunction::Concatenate`] only.
    pub delimiter: String,
    /// Output field describing the result column.
    pub output: Field,
}

impl AggregateSpec {
    /// A `sum` spec.
    pub fn sum(expression: impl Into<String>, output: Field) -> Self {
        Self {
            function: AggregateFunction::Sum,
            expression: expression.into(),
            delimiter: String::new(),
            output,
        }
    }

    /// A `concatenate` spec with the given delimiter.
    pub fn concatenate(
        expression: impl Into<String>,
        delimiter: impl Into<String>,
        output: Field,
    ) -> Self {
        Self {
            function: AggregateFunction::Concatenate,
            expression: expression.into(),
            delimiter: delimiter.into(),
            output,
        }
    }

    /// A `first_value` spec.
    pub fn first_value(expression: impl Into<String>, output: Field) -> Self {
        Self {
            function: AggregateFunction::FirstValue,
            expression: expression.into(),
            delimiter: String::new(),
            output,
        }
    }
}

/// Groups `input` by the value of `group_field` and reduces each group with
/// every spec.
///
/// Groups form in first-seen order and keep their features in input order.
/// Group keys compare by value equality with Null never equal to Null, so
/// every Null-keyed feature forms its own group. The output carries the
/// group field followed by all spec outputs, one feature per group, with no
/// geometry.
pub fn aggregate(
    input: &FeatureSet,
    specs: &[AggregateSpec],
    group_field: &str,
) -> PipelineResult<FeatureSet> {
    let group_idx = input
        .schema
        .index_of(group_field)
        .ok_or_else(|| SchemaError::MissingField {
            field: group_field.to_string(),
        })
        .map_err(PipelineError::Schema)?;

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, feature) in input.features.iter().enumerate() {
        let key = &feature.attributes[group_idx];
        let existing = groups.iter_mut().find(|members| {
            input.features[members[0]].attributes[group_idx].key_eq(key)
        });
        match existing {
            Some(members) => members.push(i),
            None => groups.push(vec![i]),
        }
    }

    let key_field = input.schema.fields[group_idx].clone();
    run(input, specs, Some(key_field), group_idx, &groups)
}

/// Reduces the whole set as one group.
///
/// The output is a single feature holding only the spec outputs. An empty
/// input still produces one row (sums are 0, concatenations empty,
/// first-values Null).
pub fn aggregate_all(input: &FeatureSet, specs: &[AggregateSpec]) -> PipelineResult<FeatureSet> {
    let all: Vec<usize> = (0..input.feature_count()).collect();
    run(input, specs, None, 0, &[all])
}

fn run(
    input: &FeatureSet,
    specs: &[AggregateSpec],
    key_field: Option<Field>,
    group_idx: usize,
    groups: &[Vec<usize>],
) -> PipelineResult<FeatureSet> {
    let mut fields = Vec::with_capacity(specs.len() + 1);
    if let Some(field) = &key_field {
        fields.push(field.clone());
    }
    for spec in specs {
        if fields.iter().any(|f: &Field| f.name == spec.output.name) {
            return Err(PipelineError::Schema(SchemaError::DuplicateField {
                field: spec.output.name.clone(),
            }));
        }
        fields.push(spec.output.clone());
    }

    let expressions: Vec<Expression> = specs
        .iter()
        .map(|spec| Expression::parse(&spec.expression))
        .collect::<Result<_, _>>()
        .map_err(PipelineError::Expression)?;

    let mut features = Vec::with_capacity(groups.len());
    for (group_no, members) in groups.iter().enumerate() {
        let mut attributes = Vec::with_capacity(fields.len());
        if key_field.is_some() {
            attributes.push(input.features[members[0]].attributes[group_idx].clone());
        }

        for (spec, expression) in specs.iter().zip(&expressions) {
            let values: Vec<Value> = members
                .iter()
                .map(|&i| expression.evaluate(&input.schema, &input.features[i]))
                .collect::<Result<_, _>>()
                .map_err(PipelineError::Expression)?;
            attributes.push(reduce(spec, &values));
        }

        features.push(Feature::new(group_no as i64, None, attributes));
    }

    Ok(FeatureSet::new(
        Schema::new(fields),
        input.crs.clone(),
        features,
    ))
}

fn reduce(spec: &AggregateSpec, values: &[Value]) -> Value {
    match spec.function {
        AggregateFunction::Sum => {
            let total: f64 = values.iter().filter_map(Value::as_f64).sum();
            match spec.output.field_type {
                FieldType::Integer => Value::Integer(total as i64),
                FieldType::Real => Value::Real(total),
                FieldType::Text => Value::Text(total.to_string()),
            }
        }
        AggregateFunction::Concatenate => Value::Text(
            values
                .iter()
                .filter_map(Value::to_display_text)
                .collect::<Vec<_>>()
                .join(&spec.delimiter),
        ),
        AggregateFunction::FirstValue => values.first().cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregateSpec, aggregate, aggregate_all};
    use crate::error::{ExpressionError, PipelineError};
    use crate::types::{Feature, FeatureSet, Field, FieldType, Schema, Value};

    fn building_set() -> FeatureSet {
        let schema = Schema::new(vec![
            Field::new("region", FieldType::Text),
            Field::new("code", FieldType::Integer),
            Field::new("name", FieldType::Text),
        ]);
        let rows: Vec<(&str, i64, &str)> = vec![
            ("R1", 601, "A"),
            ("R2", 610, "B"),
            ("R1", 610, "A"),
            ("R1", 601, "C"),
        ];
        let features = rows
            .into_iter()
            .enumerate()
            .map(|(i, (region, code, name))| {
                Feature::new(
                    i as i64 + 7,
                    None,
                    vec![
                        Value::Text(region.to_string()),
                        Value::Integer(code),
                        Value::Text(name.to_string()),
                    ],
                )
            })
            .collect();
        FeatureSet::new(schema, None, features)
    }

    #[test]
    fn one_output_row_per_distinct_group_value() {
        let specs = [AggregateSpec::sum(
            r#""code""#,
            Field::new("code_total", FieldType::Integer),
        )];
        let out = aggregate(&building_set(), &specs, "region").unwrap();

        assert_eq!(out.feature_count(), 2);
        assert_eq!(
            out.schema.field_names().collect::<Vec<_>>(),
            vec!["region", "code_total"]
        );
        // First-seen group order: R1 before R2.
        assert_eq!(out.features[0].attributes[0], Value::Text("R1".to_string()));
        assert_eq!(out.features[1].attributes[0], Value::Text("R2".to_string()));
    }

    #[test]
    fn boolean_sum_counts_matching_features() {
        let specs = [AggregateSpec::sum(
            r#""code"=601"#,
            Field::new("wooden", FieldType::Integer),
        )];
        let out = aggregate(&building_set(), &specs, "region").unwrap();

        assert_eq!(out.features[0].attributes[1], Value::Integer(2));
        assert_eq!(out.features[1].attributes[1], Value::Integer(0));
    }

    #[test]
    fn sum_treats_null_as_zero() {
        let schema = Schema::new(vec![
            Field::new("g", FieldType::Integer),
            Field::real("x", 1),
        ]);
        let fs = FeatureSet::new(
            schema,
            None,
            vec![
                Feature::new(0, None, vec![Value::Integer(1), Value::Real(2.5)]),
                Feature::new(1, None, vec![Value::Integer(1), Value::Null]),
            ],
        );
        let specs = [AggregateSpec::sum(r#""x""#, Field::real("x_total", 1))];
        let out = aggregate(&fs, &specs, "g").unwrap();
        assert_eq!(out.features[0].attributes[1], Value::Real(2.5));
    }

    #[test]
    fn concatenate_keeps_order_and_duplicates_and_omits_nulls() {
        let schema = Schema::new(vec![
            Field::new("g", FieldType::Integer),
            Field::new("name", FieldType::Text),
        ]);
        let names = [Some("A"), Some("B"), None, Some("A")];
        let features = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Feature::new(
                    i as i64,
                    None,
                    vec![
                        Value::Integer(1),
                        name.map_or(Value::Null, |n| Value::Text(n.to_string())),
                    ],
                )
            })
            .collect();
        let fs = FeatureSet::new(schema, None, features);

        let specs = [AggregateSpec::concatenate(
            r#""name""#,
            ",",
            Field::new("names", FieldType::Text),
        )];
        let out = aggregate(&fs, &specs, "g").unwrap();
        assert_eq!(
            out.features[0].attributes[1],
            Value::Text("A,B,A".to_string())
        );
    }

    #[test]
    fn first_value_is_stable_under_input_order() {
        let specs = [AggregateSpec::first_value(
            r#""name""#,
            Field::new("first_name", FieldType::Text),
        )];
        let out = aggregate(&building_set(), &specs, "region").unwrap();
        // R1's first feature is "A" even though "C" also belongs to R1.
        assert_eq!(out.features[0].attributes[1], Value::Text("A".to_string()));
        assert_eq!(out.features[1].attributes[1], Value::Text("B".to_string()));
    }

    #[test]
    fn null_group_keys_form_singleton_groups() {
        let schema = Schema::new(vec![Field::new("g", FieldType::Integer)]);
        let fs = FeatureSet::new(
            schema,
            None,
            vec![
                Feature::new(0, None, vec![Value::Null]),
                Feature::new(1, None, vec![Value::Null]),
                Feature::new(2, None, vec![Value::Integer(1)]),
            ],
        );
        let specs = [AggregateSpec::sum(
            "1",
            Field::new("n", FieldType::Integer),
        )];
        let out = aggregate(&fs, &specs, "g").unwrap();
        assert_eq!(out.feature_count(), 3);
    }

    #[test]
    fn expression_failure_aborts_the_whole_call() {
        let specs = [AggregateSpec::sum(
            r#""missing""#,
            Field::new("x", FieldType::Integer),
        )];
        assert_eq!(
            aggregate(&building_set(), &specs, "region"),
            Err(PipelineError::Expression(ExpressionError::UnknownField {
                name: "missing".to_string()
            }))
        );
    }

    #[test]
    fn aggregate_all_reduces_everything_as_one_group() {
        let specs = [
            AggregateSpec::sum(r#""code">0"#, Field::new("n", FieldType::Integer)),
            AggregateSpec::concatenate(r#""region""#, ",", Field::new("regions", FieldType::Text)),
        ];
        let out = aggregate_all(&building_set(), &specs).unwrap();

        assert_eq!(out.feature_count(), 1);
        assert_eq!(
            out.schema.field_names().collect::<Vec<_>>(),
            vec!["n", "regions"]
        );
        assert_eq!(out.features[0].attributes[0], Value::Integer(4));
        assert_eq!(
            out.features[0].attributes[1],
            Value::Text("R1,R2,R1,R1".to_string())
        );
    }

    #[test]
    fn aggregate_all_on_empty_input_yields_neutral_row() {
        let schema = Schema::new(vec![Field::real("x", 1)]);
        let fs = FeatureSet::new(schema, None, vec![]);
        let specs = [
            AggregateSpec::sum(r#""x""#, Field::real("x_total", 1)),
            AggregateSpec::first_value(r#""x""#, Field::real("x_first", 1)),
        ];
        let out = aggregate_all(&fs, &specs).unwrap();
        assert_eq!(out.feature_count(), 1);
        assert_eq!(out.features[0].attributes[0], Value::Real(0.0));
        assert_eq!(out.features[0].attributes[1], Value::Null);
    }
}
