//! The per-feature expression language used inside aggregate specs.
//!
//! Expressions compute one scalar [`Value`] from one feature. The grammar,
//! lowest to highest precedence: comparison (`=`, `<>`, `>`, `<`, `>=`,
//! `<=`) → additive (`+`, `-`) → multiplicative (`*`, `/`) → unary minus →
//! primary. A primary is a double-quoted field reference, a numeric literal,
//! a single-quoted text literal, a parenthesized sub-expression, or
//! `coalesce(a, b)`.
//!
//! Comparison yields Boolean, which coerces to 0/1 in numeric contexts; that
//! is what makes specs like `sum("Bld_Str"=601)` count matching features.
//!
//! ```rust
//! use disaster_waste_aggregation::expr::Expression;
//! use disaster_waste_aggregation::types::{Feature, Field, FieldType, Schema, Value};
//!
//! let schema = Schema::new(vec![Field::new("Bld_Str", FieldType::Integer)]);
//! let feature = Feature::new(1, None, vec![Value::Integer(601)]);
//!
//! let expr = Expression::parse(r#""Bld_Str" = 601"#).unwrap();
//! assert_eq!(expr.evaluate(&schema, &feature), Ok(Value::Boolean(true)));
//! ```

mod eval;
mod lexer;
mod parser;

use crate::error::ExpressionError;
use crate::types::{Feature, Schema, Value};

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Double-quoted reference to a schema field.
    FieldRef(String),
    /// Numeric or text literal.
    Literal(Value),
    /// Unary negation.
    UnaryMinus(Box<Expr>),
    /// Binary operator application.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `coalesce(a, b)`: `a` unless it is Null, else `b` (evaluated lazily).
    Coalesce(Box<Expr>, Box<Expr>),
}

/// Binary operators, comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub(crate) fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Gt
                | BinaryOp::Lt
                | BinaryOp::GtEq
                | BinaryOp::LtEq
        )
    }

    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::GtEq => ">=",
            BinaryOp::LtEq => "<=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// A parsed, reusable expression.
///
/// Parsing happens once; evaluation is pure and side-effect free, so one
/// `Expression` can be evaluated against any number of features.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse an expression from source text.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let root = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate against one feature, resolving field references through
    /// `schema`.
    pub fn evaluate(&self, schema: &Schema, feature: &Feature) -> Result<Value, ExpressionError> {
        eval::evaluate(&self.root, schema, feature)
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }
}
