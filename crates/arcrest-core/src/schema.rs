//! Schema inference and record batch building for query results.
//!
//! Every attribute key observed in any feature becomes a nullable column, in
//! the order keys are first seen. Column types are inferred from the JSON
//! values; the geometry column is a WKB binary column appended last.

use std::collections::HashSet;
use std::sync::Arc;

use arcrest_core_common::{GeometryKind, wkb_field};
use arrow_array::{ArrayRef, BinaryArray, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use crate::error::ConversionError;
use crate::esri;
use crate::types::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredScalarType {
    Null,
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl InferredScalarType {
    fn update(self, field: &str, value: &Value) -> Result<Self, ConversionError> {
        let found = match value {
            Value::Null => return Ok(self),
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() => Self::Int64,
            Value::Number(_) => Self::Float64,
            Value::String(_) => Self::Utf8,
            Value::Array(_) | Value::Object(_) => {
                return Err(ConversionError::UnsupportedValue {
                    field: field.to_string(),
                    kind: describe_value(value).to_string(),
                });
            },
        };

        match (self, found) {
            (Self::Null, found) => Ok(found),
            (current, found) if current == found => Ok(current),
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Ok(Self::Float64),
            (current, _) => Err(ConversionError::TypeMismatch {
                field: field.to_string(),
                expected: current.name().to_string(),
                found: describe_value(value).to_string(),
            }),
        }
    }

    fn to_datatype(self) -> DataType {
        match self {
            Self::Null | Self::Utf8 => DataType::Utf8,
            Self::Boolean => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "bool",
            Self::Int64 => "integer",
            Self::Float64 => "float",
            Self::Utf8 => "string",
        }
    }
}

/// Helper to describe JSON value kinds for error messages.
fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An attribute column of the inferred schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeColumn {
    /// Attribute key in the service response
    pub source: String,
    /// Column name in the table
    pub name: String,
    /// Inferred column type
    pub data_type: DataType,
}

/// Schema inferred from the features of one layer.
#[derive(Debug, Clone)]
pub struct InferredSchema {
    columns: Vec<AttributeColumn>,
    schema: SchemaRef,
}

impl InferredSchema {
    /// The Arrow schema, attribute columns first and the geometry column last.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Attribute columns in schema order.
    #[must_use]
    pub fn columns(&self) -> &[AttributeColumn] {
        &self.columns
    }
}

/// Infers the table schema from a set of features.
///
/// Integers and floats in one column unify to a float column and nulls never
/// decide a type; a column holding only nulls becomes a text column. Column
/// names that collide case-insensitively with `reserved` names, the geometry
/// column or an earlier column get a `_1`, `_2`, ... suffix.
///
/// # Errors
///
/// Returns [`ConversionError::TypeMismatch`] when a column mixes incompatible
/// values (for example text and numbers) and
/// [`ConversionError::UnsupportedValue`] for array or object values.
pub fn infer_schema(
    features: &[Feature],
    geometry_column: &str,
    reserved: &[&str],
) -> Result<InferredSchema, ConversionError> {
    let mut inferred: IndexMap<&str, InferredScalarType> = IndexMap::new();
    for feature in features {
        for (key, value) in &feature.attributes {
            let entry = inferred
                .entry(key.as_str())
                .or_insert(InferredScalarType::Null);
            *entry = entry.update(key, value)?;
        }
    }

    let mut taken: HashSet<String> = reserved
        .iter()
        .chain(std::iter::once(&geometry_column))
        .map(|name| name.to_lowercase())
        .collect();

    let mut columns = Vec::with_capacity(inferred.len());
    for (source, ty) in inferred {
        let name = unique_column_name(source, &mut taken);
        if name != source {
            debug!("Attribute '{source}' stored as column '{name}'");
        }
        columns.push(AttributeColumn {
            source: source.to_string(),
            name,
            data_type: ty.to_datatype(),
        });
    }

    let mut fields: Vec<Field> = columns
        .iter()
        .map(|column| Field::new(column.name.clone(), column.data_type.clone(), true))
        .collect();
    fields.push(wkb_field(geometry_column));

    Ok(InferredSchema {
        columns,
        schema: Arc::new(Schema::new(fields)),
    })
}

fn unique_column_name(source: &str, taken: &mut HashSet<String>) -> String {
    let base = if source.trim().is_empty() {
        "field"
    } else {
        source
    };

    let mut name = base.to_string();
    let mut counter = 1usize;
    while taken.contains(&name.to_lowercase()) {
        name = format!("{base}_{counter}");
        counter += 1;
    }
    taken.insert(name.to_lowercase());
    name
}

/// Converts features into a record batch of the inferred schema.
///
/// Geometries are converted from Esri JSON to WKB; `kind` is the layer's
/// geometry kind and is enforced for every geometry when known.
///
/// # Errors
///
/// Returns [`ConversionError`] if a geometry is malformed or of the wrong
/// kind, or the batch cannot be assembled.
pub fn build_batch(
    schema: &InferredSchema,
    features: &[Feature],
    kind: GeometryKind,
) -> Result<RecordBatch, ConversionError> {
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.columns.len() + 1);
    for column in &schema.columns {
        arrays.push(build_array(column, features));
    }

    let geometries = features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let Some(value) = &feature.geometry else {
                return Ok(None);
            };
            esri::to_geometry(value, kind, index)?
                .map(|geometry| esri::to_wkb(&geometry))
                .transpose()
        })
        .collect::<Result<Vec<Option<Vec<u8>>>, ConversionError>>()?;
    arrays.push(Arc::new(geometries.into_iter().collect::<BinaryArray>()));

    RecordBatch::try_new(schema.schema(), arrays).map_err(|e| ConversionError::Encoding {
        what: "record batch".to_string(),
        message: e.to_string(),
    })
}

fn build_array(column: &AttributeColumn, features: &[Feature]) -> ArrayRef {
    let values = features
        .iter()
        .map(|feature| feature.attributes.get(&column.source));

    match column.data_type {
        DataType::Boolean => {
            let array: BooleanArray = values.map(|v| v.and_then(Value::as_bool)).collect();
            Arc::new(array)
        },
        DataType::Int64 => {
            let array: Int64Array = values.map(|v| v.and_then(Value::as_i64)).collect();
            Arc::new(array)
        },
        DataType::Float64 => {
            let array: Float64Array = values.map(|v| v.and_then(Value::as_f64)).collect();
            Arc::new(array)
        },
        _ => {
            let array: StringArray = values.map(|v| v.and_then(Value::as_str)).collect();
            Arc::new(array)
        },
    }
}
