//! Core data model types for the aggregation pipeline.
//!
//! Every pipeline stage consumes and produces an in-memory [`FeatureSet`]: an
//! ordered collection of [`Feature`]s (optional planar geometry plus typed
//! attributes) described by a [`Schema`] (a list of typed [`Field`]s).
//! FeatureSets are immutable value objects between stages; no stage mutates a
//! set it did not create.

use geo::{Point, Polygon};
use serde::{Deserialize, Serialize};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point number.
    Real,
    /// UTF-8 string.
    Text,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name, unique within its schema.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Decimal digits carried by [`FieldType::Real`] fields, if declared.
    pub precision: Option<u8>,
}

impl Field {
    /// Create a new field without a declared precision.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            precision: None,
        }
    }

    /// Create a [`FieldType::Real`] field with a declared decimal precision.
    pub fn real(name: impl Into<String>, precision: u8) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Real,
            precision: Some(precision),
        }
    }
}

/// An ordered list of fields describing the shape of a [`FeatureSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    ///
    /// # Panics
    ///
    /// Panics if two fields share a name.
    pub fn new(fields: Vec<Field>) -> Self {
        for (i, field) in fields.iter().enumerate() {
            assert!(
                !fields[..i].iter().any(|f| f.name == field.name),
                "duplicate field name '{}' in schema",
                field.name
            );
        }
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns a field by name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single typed attribute value.
///
/// `Null` is a first-class case: attribute slots always exist for every schema
/// field, and a missing value is `Null`, never an absent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 string.
    Text(String),
    /// Boolean, coerced to 0/1 in numeric contexts.
    Boolean(bool),
}

impl Value {
    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value: integers and reals as-is, booleans as 0/1.
    ///
    /// Returns `None` for `Null` and `Text`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Text(_) => None,
        }
    }

    /// Text rendering used when concatenating values.
    ///
    /// Returns `None` for `Null` (concatenation omits nulls entirely).
    pub fn to_display_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(v) => Some(v.to_string()),
            Value::Real(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Boolean(b) => Some(b.to_string()),
        }
    }

    /// Name of the value's variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Group/join key equality: value equality with `Null` never equal to
    /// anything, including another `Null`.
    pub fn key_eq(&self, other: &Value) -> bool {
        !self.is_null() && !other.is_null() && self == other
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Planar geometry carried by a [`Feature`].
///
/// All geometries in one pipeline run share a single planar coordinate
/// system; the core never reprojects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// A single point.
    Point(Point<f64>),
    /// A polygon with an exterior ring and zero or more interior rings.
    Polygon(Polygon<f64>),
}

impl Geometry {
    /// The point, if this geometry is one.
    pub fn as_point(&self) -> Option<&Point<f64>> {
        match self {
            Geometry::Point(p) => Some(p),
            Geometry::Polygon(_) => None,
        }
    }

    /// The polygon, if this geometry is one.
    pub fn as_polygon(&self) -> Option<&Polygon<f64>> {
        match self {
            Geometry::Polygon(p) => Some(p),
            Geometry::Point(_) => None,
        }
    }
}

/// Coordinate reference system descriptor carried by a [`FeatureSet`].
///
/// The pipeline only needs to know whether the system is planar; geographic
/// (angular) systems are rejected before any stage runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    /// Authority identifier, e.g. `EPSG:6677`.
    pub auth_id: String,
    /// `true` for geographic (latitude/longitude) systems.
    pub geographic: bool,
}

impl Crs {
    /// A planar/projected coordinate system.
    pub fn projected(auth_id: impl Into<String>) -> Self {
        Self {
            auth_id: auth_id.into(),
            geographic: false,
        }
    }

    /// A geographic coordinate system (rejected by the pipeline preflight).
    pub fn geographic(auth_id: impl Into<String>) -> Self {
        Self {
            auth_id: auth_id.into(),
            geographic: true,
        }
    }
}

/// One record: an id, optional geometry, and schema-ordered attributes.
///
/// The id is assigned by the stage that produced the feature and is stable
/// only within that [`FeatureSet`]; ids from unrelated sets are comparable
/// only through an explicit shared key field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Identifier, unique within the owning [`FeatureSet`].
    pub id: i64,
    /// Optional planar geometry.
    pub geometry: Option<Geometry>,
    /// Attribute values, one per schema field, in schema order.
    pub attributes: Vec<Value>,
}

impl Feature {
    /// Create a new feature.
    pub fn new(id: i64, geometry: Option<Geometry>, attributes: Vec<Value>) -> Self {
        Self {
            id,
            geometry,
            attributes,
        }
    }
}

/// In-memory, schema-typed collection of features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Schema describing attribute shape.
    pub schema: Schema,
    /// Coordinate reference system shared by all geometries, if known.
    pub crs: Option<Crs>,
    /// Ordered features.
    pub features: Vec<Feature>,
}

impl FeatureSet {
    /// Create a feature set from a schema, CRS, and features.
    ///
    /// # Panics
    ///
    /// Panics if any feature's attribute count differs from the schema field
    /// count (every schema field must have a value slot; `Null` marks a
    /// missing value, absence does not).
    pub fn new(schema: Schema, crs: Option<Crs>, features: Vec<Feature>) -> Self {
        let expected_len = schema.fields.len();
        for feature in &features {
            assert!(
                feature.attributes.len() == expected_len,
                "feature {} has {} attributes but the schema has {} fields",
                feature.id,
                feature.attributes.len(),
                expected_len
            );
        }
        Self {
            schema,
            crs,
            features,
        }
    }

    /// Number of features in the set.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// The attribute value of one feature by field name.
    pub fn value(&self, feature_index: usize, field: &str) -> Option<&Value> {
        let idx = self.schema.index_of(field)?;
        self.features.get(feature_index)?.attributes.get(idx)
    }

    /// Returns a new set with the named fields projected away.
    ///
    /// Field names not present in the schema are ignored; ids, geometry, and
    /// feature order are preserved.
    pub fn drop_fields(&self, names: &[&str]) -> FeatureSet {
        let keep: Vec<usize> = (0..self.schema.fields.len())
            .filter(|&i| !names.contains(&self.schema.fields[i].name.as_str()))
            .collect();

        let schema = Schema::new(keep.iter().map(|&i| self.schema.fields[i].clone()).collect());
        let features = self
            .features
            .iter()
            .map(|f| {
                Feature::new(
                    f.id,
                    f.geometry.clone(),
                    keep.iter().map(|&i| f.attributes[i].clone()).collect(),
                )
            })
            .collect();

        FeatureSet::new(schema, self.crs.clone(), features)
    }
}
