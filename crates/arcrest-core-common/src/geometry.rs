//! Geometry kinds reported by map service layers.

use std::fmt;

/// The geometry kind of a map service layer.
///
/// Map services describe layer geometry with Esri type names such as
/// `esriGeometryPolygon`. Anything the extractor does not recognise is
/// reported as [`GeometryKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeometryKind {
    /// Single points (`esriGeometryPoint`).
    Point,
    /// Point collections (`esriGeometryMultipoint`).
    Multipoint,
    /// Lines made of one or more paths (`esriGeometryPolyline`).
    Polyline,
    /// Areas made of one or more rings (`esriGeometryPolygon`).
    Polygon,
    /// Missing or unrecognised geometry type.
    #[default]
    Unknown,
}

impl GeometryKind {
    /// Parses an Esri geometry type name.
    ///
    /// ```
    /// use arcrest_core_common::GeometryKind;
    ///
    /// assert_eq!(GeometryKind::from_esri("esriGeometryPolygon"), GeometryKind::Polygon);
    /// assert_eq!(GeometryKind::from_esri("esriGeometryEnvelope"), GeometryKind::Unknown);
    /// ```
    #[must_use]
    pub fn from_esri(name: &str) -> Self {
        match name {
            "esriGeometryPoint" => Self::Point,
            "esriGeometryMultipoint" => Self::Multipoint,
            "esriGeometryPolyline" => Self::Polyline,
            "esriGeometryPolygon" => Self::Polygon,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` unless the kind is [`GeometryKind::Unknown`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the first known kind of `self` and `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        if self.is_known() { self } else { fallback }
    }

    /// Returns the display label for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Multipoint => "Multipoint",
            Self::Polyline => "Polyline",
            Self::Polygon => "Polygon",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_esri_maps_known_kinds() {
        for (name, kind) in [
            ("esriGeometryPoint", GeometryKind::Point),
            ("esriGeometryMultipoint", GeometryKind::Multipoint),
            ("esriGeometryPolyline", GeometryKind::Polyline),
            ("esriGeometryPolygon", GeometryKind::Polygon),
        ] {
            assert_eq!(GeometryKind::from_esri(name), kind);
        }
    }

    #[test]
    fn unknown_names_map_to_unknown() {
        assert_eq!(GeometryKind::from_esri(""), GeometryKind::Unknown);
        assert_eq!(GeometryKind::from_esri("Polygon"), GeometryKind::Unknown);
        assert_eq!(GeometryKind::from_esri("esriGeometryEnvelope"), GeometryKind::Unknown);
    }

    #[test]
    fn or_prefers_known_kind() {
        assert_eq!(
            GeometryKind::Unknown.or(GeometryKind::Point),
            GeometryKind::Point
        );
        assert_eq!(
            GeometryKind::Polygon.or(GeometryKind::Point),
            GeometryKind::Polygon
        );
        assert_eq!(
            GeometryKind::Unknown.or(GeometryKind::Unknown),
            GeometryKind::Unknown
        );
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(GeometryKind::Polyline.to_string(), "Polyline");
        assert_eq!(GeometryKind::default().to_string(), "Unknown");
    }
}
