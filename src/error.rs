use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error type returned by pipeline entry points.
///
/// Every stage failure aborts the whole run; the pipeline never returns
/// partial results. There is no retry path: the pipeline is deterministic,
/// so a retry without changed input cannot succeed.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// A required field is missing or has the wrong type.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An aggregate-spec expression failed to parse or evaluate.
    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Invalid or unrepairable geometry, or an unusable coordinate system.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Duplicate key values where the caller assumed uniqueness.
    #[error("join key error: {0}")]
    JoinKey(#[from] JoinKeyError),

    /// No region features were selected for aggregation.
    #[error("no region features selected for aggregation")]
    EmptySelection,
}

/// A feature set does not match the shape a stage requires.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A required field is absent from the schema.
    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    /// A field exists but carries the wrong type.
    #[error("field '{field}' has type {actual}, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A field name would appear twice in an output schema.
    #[error("field '{field}' would appear twice in the output schema")]
    DuplicateField { field: String },
}

/// An aggregate-spec expression is malformed or failed to evaluate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression text does not parse.
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A double-quoted field reference names no schema field.
    #[error("unknown field reference \"{name}\"")]
    UnknownField { name: String },

    /// An operator was applied to operands it does not accept.
    #[error("type mismatch: cannot apply '{operator}' to {lhs} and {rhs}")]
    TypeMismatch {
        operator: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// Geometry cannot participate in the spatial join.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// A polygon could not be repaired into a single simple polygon.
    #[error("feature {feature_id} has no repairable polygon geometry")]
    Unrepairable { feature_id: i64 },

    /// A feature expected to carry polygon geometry does not.
    #[error("feature {feature_id} does not carry polygon geometry")]
    NotAPolygon { feature_id: i64 },

    /// The region set declares no coordinate reference system.
    #[error("coordinate reference system is undefined")]
    UndefinedCrs,

    /// The region set uses a geographic (angular) coordinate system.
    #[error("coordinate reference system {auth_id} is geographic; a planar system is required")]
    GeographicCrs { auth_id: String },
}

/// A join key assumed unique carries duplicate values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinKeyError {
    #[error("key field '{field}' holds duplicate value {value} where unique keys were assumed")]
    DuplicateKey { field: String, value: String },
}
