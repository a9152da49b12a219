//! Tree-walking evaluator for parsed expressions.
//!
//! Evaluation is pure: the same expression against the same feature always
//! yields the same value. Null propagates through arithmetic and comparison;
//! `coalesce` is the defined exception.

use crate::error::ExpressionError;
use crate::types::{Feature, Schema, Value};

use super::{BinaryOp, Expr};

pub(crate) fn evaluate(
    expr: &Expr,
    schema: &Schema,
    feature: &Feature,
) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::FieldRef(name) => match schema.index_of(name) {
            Some(idx) => Ok(feature.attributes[idx].clone()),
            None => Err(ExpressionError::UnknownField { name: name.clone() }),
        },
        Expr::UnaryMinus(operand) => {
            let v = evaluate(operand, schema, feature)?;
            match v {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Real(r) => Ok(Value::Real(-r)),
                Value::Boolean(b) => Ok(Value::Integer(if b { -1 } else { 0 })),
                Value::Text(_) => Err(ExpressionError::TypeMismatch {
                    operator: "-",
                    lhs: "text",
                    rhs: "text",
                }),
            }
        }
        Expr::Coalesce(first, second) => {
            let v = evaluate(first, schema, feature)?;
            if v.is_null() {
                evaluate(second, schema, feature)
            } else {
                Ok(v)
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, schema, feature)?;
            let rhs = evaluate(rhs, schema, feature)?;
            apply_binary(*op, lhs, rhs)
        }
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExpressionError> {
    if lhs.is_null() || rhs.is_null() {
        // SQL semantics: any operation over Null yields Null. Division by a
        // Null divisor is Null, not an error.
        return Ok(Value::Null);
    }

    if op.is_comparison() {
        return compare(op, &lhs, &rhs);
    }

    let (a, b) = numeric_pair(op, &lhs, &rhs)?;
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => Ok(arithmetic(op, a, b)),
        BinaryOp::Div => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Ok(Value::Real(a.as_f64() / divisor))
        }
        _ => unreachable!("comparison handled earlier"),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ExpressionError> {
    let ordering = match (lhs, rhs) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        _ => {
            let (a, b) = numeric_pair(op, lhs, rhs)?;
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    };

    let result = match op {
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::NotEq => !ordering.is_eq(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::GtEq => ordering.is_ge(),
        BinaryOp::LtEq => ordering.is_le(),
        _ => unreachable!("arithmetic handled by caller"),
    };
    Ok(Value::Boolean(result))
}

/// Numeric operand view: integers stay exact, reals stay reals, booleans
/// coerce to 0/1.
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }
}

fn numeric_pair(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
) -> Result<(Numeric, Numeric), ExpressionError> {
    match (numeric(lhs), numeric(rhs)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExpressionError::TypeMismatch {
            operator: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        }),
    }
}

fn numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Integer(v) => Some(Numeric::Int(*v)),
        Value::Real(v) => Some(Numeric::Float(*v)),
        Value::Boolean(b) => Some(Numeric::Int(if *b { 1 } else { 0 })),
        Value::Null | Value::Text(_) => None,
    }
}

fn arithmetic(op: BinaryOp, a: Numeric, b: Numeric) -> Value {
    match (a, b) {
        (Numeric::Int(a), Numeric::Int(b)) => {
            let v = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                _ => unreachable!("division handled by caller"),
            };
            Value::Integer(v)
        }
        _ => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => unreachable!("division handled by caller"),
            };
            Value::Real(v)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ExpressionError;
    use crate::expr::Expression;
    use crate::types::{Feature, Field, FieldType, Schema, Value};

    fn building_schema() -> Schema {
        Schema::new(vec![
            Field::new("Bld_Str", FieldType::Integer),
            Field::real("Cdst_Dmg", 1),
            Field::new("name", FieldType::Text),
        ])
    }

    fn building(code: i64, damage: f64) -> Feature {
        Feature::new(
            1,
            None,
            vec![
                Value::Integer(code),
                Value::Real(damage),
                Value::Text("R1".to_string()),
            ],
        )
    }

    fn eval(source: &str, feature: &Feature) -> Result<Value, ExpressionError> {
        Expression::parse(source)?.evaluate(&building_schema(), feature)
    }

    #[test]
    fn comparison_yields_boolean() {
        let f = building(601, 1.0);
        assert_eq!(eval(r#""Bld_Str" = 601"#, &f), Ok(Value::Boolean(true)));
        assert_eq!(eval(r#""Bld_Str" = 610"#, &f), Ok(Value::Boolean(false)));
        assert_eq!(eval(r#""Bld_Str" > 0"#, &f), Ok(Value::Boolean(true)));
        assert_eq!(eval(r#""Bld_Str" <> 601"#, &f), Ok(Value::Boolean(false)));
    }

    #[test]
    fn boolean_coerces_in_arithmetic() {
        let f = building(601, 2.5);
        assert_eq!(
            eval(r#"( "Bld_Str" = 601 ) * "Cdst_Dmg" "#, &f),
            Ok(Value::Real(2.5))
        );
        assert_eq!(
            eval(r#"( "Bld_Str" = 610 ) * "Cdst_Dmg" "#, &f),
            Ok(Value::Real(0.0))
        );
    }

    #[test]
    fn integer_arithmetic_stays_integer() {
        let f = building(601, 1.0);
        assert_eq!(eval("2 + 3 * 4", &f), Ok(Value::Integer(14)));
        assert_eq!(eval(r#""Bld_Str" - 1"#, &f), Ok(Value::Integer(600)));
        assert_eq!(eval("3 / 2", &f), Ok(Value::Real(1.5)));
    }

    #[test]
    fn null_propagates() {
        let schema = Schema::new(vec![Field::real("x", 1)]);
        let f = Feature::new(1, None, vec![Value::Null]);
        let eval_null = |src: &str| Expression::parse(src).unwrap().evaluate(&schema, &f);

        assert_eq!(eval_null(r#""x" + 1"#), Ok(Value::Null));
        assert_eq!(eval_null(r#""x" = 1"#), Ok(Value::Null));
        assert_eq!(eval_null(r#"1 / "x""#), Ok(Value::Null));
        assert_eq!(eval_null(r#"-"x""#), Ok(Value::Null));
    }

    #[test]
    fn coalesce_returns_first_non_null() {
        let schema = Schema::new(vec![Field::new("name", FieldType::Text)]);
        let with_name = Feature::new(1, None, vec![Value::Text("site".to_string())]);
        let without_name = Feature::new(2, None, vec![Value::Null]);
        let expr = Expression::parse(r#" coalesce("name",'none')"#).unwrap();

        assert_eq!(
            expr.evaluate(&schema, &with_name),
            Ok(Value::Text("site".to_string()))
        );
        assert_eq!(
            expr.evaluate(&schema, &without_name),
            Ok(Value::Text("none".to_string()))
        );
    }

    #[test]
    fn division_by_zero_fails() {
        let f = building(601, 1.0);
        assert_eq!(eval("1 / 0", &f), Err(ExpressionError::DivisionByZero));
        assert_eq!(eval("1 / 0.0", &f), Err(ExpressionError::DivisionByZero));
    }

    #[test]
    fn unknown_field_fails() {
        let f = building(601, 1.0);
        assert_eq!(
            eval(r#""missing" + 1"#, &f),
            Err(ExpressionError::UnknownField {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn mixing_text_and_numbers_fails() {
        let f = building(601, 1.0);
        assert!(matches!(
            eval(r#""name" + 1"#, &f),
            Err(ExpressionError::TypeMismatch { .. })
        ));
        assert!(matches!(
            eval(r#""name" = 601"#, &f),
            Err(ExpressionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn text_comparison_compares_strings() {
        let f = building(601, 1.0);
        assert_eq!(eval(r#""name" = 'R1'"#, &f), Ok(Value::Boolean(true)));
        assert_eq!(eval(r#""name" < 'R2'"#, &f), Ok(Value::Boolean(true)));
    }
}
