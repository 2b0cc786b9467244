//! Conversion of Arrow cells into SQLite values.

use arcrest_core_common::{StoreError, StoreResult};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type, UInt16Type,
    UInt32Type,
};
use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;
use geozero::wkb::Wkb;
use geozero::{CoordDimensions, ToWkb};

/// A single value bound into an insert statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Reads an attribute cell.
pub(crate) fn attribute_value(column: &str, array: &ArrayRef, row: usize) -> StoreResult<SqlValue> {
    if array.is_null(row) {
        return Ok(SqlValue::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => array
            .as_boolean_opt()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::Int8 => array
            .as_primitive_opt::<Int8Type>()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::Int16 => array
            .as_primitive_opt::<Int16Type>()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::Int32 => array
            .as_primitive_opt::<Int32Type>()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::Int64 => array
            .as_primitive_opt::<Int64Type>()
            .map(|a| SqlValue::Integer(a.value(row))),
        DataType::UInt8 => array
            .as_primitive_opt::<UInt8Type>()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::UInt16 => array
            .as_primitive_opt::<UInt16Type>()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::UInt32 => array
            .as_primitive_opt::<UInt32Type>()
            .map(|a| SqlValue::Integer(i64::from(a.value(row)))),
        DataType::Float32 => array
            .as_primitive_opt::<Float32Type>()
            .map(|a| SqlValue::Real(f64::from(a.value(row)))),
        DataType::Float64 => array
            .as_primitive_opt::<Float64Type>()
            .map(|a| SqlValue::Real(a.value(row))),
        DataType::Utf8 => array
            .as_string_opt::<i32>()
            .map(|a| SqlValue::Text(a.value(row).to_string())),
        DataType::LargeUtf8 => array
            .as_string_opt::<i64>()
            .map(|a| SqlValue::Text(a.value(row).to_string())),
        DataType::Binary => array
            .as_binary_opt::<i32>()
            .map(|a| SqlValue::Blob(a.value(row).to_vec())),
        DataType::LargeBinary => array
            .as_binary_opt::<i64>()
            .map(|a| SqlValue::Blob(a.value(row).to_vec())),
        _ => None,
    };

    value.ok_or_else(|| StoreError::UnsupportedColumn {
        column: column.to_string(),
        data_type: array.data_type().to_string(),
    })
}

/// Reads a WKB geometry cell and re-encodes it as a GeoPackage geometry blob
/// (little-endian header with `srs_id`, no envelope).
pub(crate) fn geometry_value(
    column: &str,
    array: &ArrayRef,
    row: usize,
    srs_id: i32,
) -> StoreResult<SqlValue> {
    if array.is_null(row) {
        return Ok(SqlValue::Null);
    }

    let wkb = match array.data_type() {
        DataType::Binary => array.as_binary_opt::<i32>().map(|a| a.value(row)),
        DataType::LargeBinary => array.as_binary_opt::<i64>().map(|a| a.value(row)),
        _ => None,
    };

    let wkb = wkb.ok_or_else(|| StoreError::UnsupportedColumn {
        column: column.to_string(),
        data_type: array.data_type().to_string(),
    })?;
    let blob = Wkb(wkb)
        .to_gpkg_wkb(CoordDimensions::xy(), Some(srs_id), Vec::new())
        .map_err(|e| StoreError::statement("encode geometry", column, e))?;
    Ok(SqlValue::Blob(blob))
}
