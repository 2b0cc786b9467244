//! Mapping between Arrow data types and GeoPackage column types.

use arcrest_core_common::GeometryKind;
use arrow_schema::DataType;

/// Extension trait mapping an Arrow [`DataType`] to a GeoPackage column type.
///
/// # Examples
///
/// ```
/// use arrow_schema::DataType;
/// use arcrest_geopackage::types::GeoPackageTypeExt;
///
/// assert_eq!(DataType::Int64.gpkg_type(), Some("INTEGER"));
/// assert_eq!(DataType::Utf8.gpkg_type(), Some("TEXT"));
/// assert_eq!(DataType::Null.gpkg_type(), None);
/// ```
pub trait GeoPackageTypeExt {
    /// Returns the GeoPackage column type, or `None` if the type cannot be stored.
    fn gpkg_type(&self) -> Option<&'static str>;
}

impl GeoPackageTypeExt for DataType {
    fn gpkg_type(&self) -> Option<&'static str> {
        match self {
            DataType::Boolean => Some("BOOLEAN"),
            DataType::Int8 => Some("TINYINT"),
            DataType::Int16 | DataType::UInt8 => Some("SMALLINT"),
            DataType::Int32 | DataType::UInt16 => Some("MEDIUMINT"),
            DataType::Int64 | DataType::UInt32 => Some("INTEGER"),
            DataType::Float32 => Some("FLOAT"),
            DataType::Float64 => Some("DOUBLE"),
            DataType::Utf8 | DataType::LargeUtf8 => Some("TEXT"),
            DataType::Binary | DataType::LargeBinary => Some("BLOB"),
            _ => None,
        }
    }
}

/// Returns the `gpkg_geometry_columns.geometry_type_name` for a geometry kind.
///
/// Lines and areas are always stored as their multi variants so that every
/// row of a table shares one geometry type.
#[must_use]
pub fn geometry_type_name(kind: GeometryKind) -> &'static str {
    match kind {
        GeometryKind::Point => "POINT",
        GeometryKind::Multipoint => "MULTIPOINT",
        GeometryKind::Polyline => "MULTILINESTRING",
        GeometryKind::Polygon => "MULTIPOLYGON",
        GeometryKind::Unknown => "GEOMETRY",
    }
}
