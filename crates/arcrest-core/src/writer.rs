//! Persisting query results as container tables.

use arcrest_core_common::{DestinationStore, GeometryColumn, GeometryKind, TableDefinition};
use log::{debug, warn};

use crate::error::ConversionError;
use crate::schema::{build_batch, infer_schema};
use crate::types::QueryResult;

/// Result of writing one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenTable {
    /// Rows in the table after writing
    pub feature_count: u64,
    /// Geometry kind the table was created with
    pub geometry_kind: GeometryKind,
}

/// Writes query results into tables of one destination container.
pub struct FeatureWriter<'a> {
    store: &'a dyn DestinationStore,
    geometry_column: String,
    out_sr: Option<i32>,
}

impl<'a> FeatureWriter<'a> {
    /// Creates a writer for `store`.
    ///
    /// `out_sr` is the spatial reference the features were requested in; it
    /// is used when the query result does not name one.
    #[must_use]
    pub fn new(
        store: &'a dyn DestinationStore,
        geometry_column: impl Into<String>,
        out_sr: Option<i32>,
    ) -> Self {
        Self {
            store,
            geometry_column: geometry_column.into(),
            out_sr,
        }
    }

    /// Writes the features of `result` into a new table named `table_name`.
    ///
    /// `geometry_kind` is the kind reported by the layer metadata; when it is
    /// unknown the kind announced by the query response is used, and when
    /// both are unknown the table takes any geometry. All features are
    /// converted before the table is created, and a table whose rows cannot
    /// be appended is dropped again.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if the features cannot be converted or the
    /// container rejects the table or its rows.
    pub async fn write(
        &self,
        table_name: &str,
        description: &str,
        result: &QueryResult,
        geometry_kind: GeometryKind,
    ) -> Result<WrittenTable, ConversionError> {
        let kind = geometry_kind.or(result.geometry_kind);
        let inferred = infer_schema(
            &result.features,
            &self.geometry_column,
            self.store.reserved_columns(),
        )?;
        let batch = build_batch(&inferred, &result.features, kind)?;
        debug!(
            "Converted {} feature(s) into {} column(s) for {table_name}",
            batch.num_rows(),
            batch.num_columns()
        );

        let definition = TableDefinition {
            name: table_name.to_string(),
            description: Some(description.to_string()),
            schema: inferred.schema(),
            geometry: GeometryColumn {
                name: self.geometry_column.clone(),
                kind,
                srs_id: result.spatial_reference.or(self.out_sr),
            },
        };
        self.store.create_table(&definition).await?;

        if let Err(err) = self.store.append_rows(table_name, &batch).await {
            if let Err(drop_err) = self.store.drop_table(table_name).await {
                warn!("Could not remove incomplete table {table_name}: {drop_err}");
            }
            return Err(err.into());
        }

        let feature_count = self.store.count_rows(table_name).await?;
        Ok(WrittenTable {
            feature_count,
            geometry_kind: kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;
    use arcrest_geopackage::GeoPackageStore;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn feature(attributes: Value, geometry: Value) -> Feature {
        let Value::Object(attributes) = attributes else {
            panic!("attributes must be an object");
        };
        Feature {
            attributes,
            geometry: Some(geometry),
        }
    }

    fn roads() -> QueryResult {
        QueryResult {
            features: vec![
                feature(
                    json!({"OBJECTID": 1, "NAME": "Main St"}),
                    json!({"paths": [[[0, 0], [1, 1]]]}),
                ),
                feature(
                    json!({"OBJECTID": 2, "NAME": "Oak Ave"}),
                    json!({"paths": [[[2, 2], [3, 3], [4, 3]]]}),
                ),
            ],
            geometry_kind: GeometryKind::Polyline,
            spatial_reference: Some(2278),
            truncated: false,
        }
    }

    #[tokio::test]
    async fn writes_table_with_fallback_kind() {
        let dir = TempDir::new().unwrap();
        let (store, _) = GeoPackageStore::open_or_create(dir.path().join("out.gpkg"))
            .await
            .unwrap();

        let writer = FeatureWriter::new(&store, "geom", Some(2278));
        let written = writer
            .write("Roads", "Roads", &roads(), GeometryKind::Unknown)
            .await
            .unwrap();

        assert_eq!(written.feature_count, 2);
        assert_eq!(written.geometry_kind, GeometryKind::Polyline);
        assert_eq!(store.count_rows("Roads").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn conversion_failure_creates_no_table() {
        let dir = TempDir::new().unwrap();
        let (store, _) = GeoPackageStore::open_or_create(dir.path().join("out.gpkg"))
            .await
            .unwrap();

        let mut result = roads();
        result.features[1].geometry = Some(json!({"x": 1, "y": 1}));

        let writer = FeatureWriter::new(&store, "geom", Some(2278));
        let err = writer
            .write("Roads", "Roads", &result, GeometryKind::Polyline)
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::GeometryKindMismatch { feature: 1, .. }));
        assert!(!store.table_exists("Roads").await.unwrap());
    }

    #[tokio::test]
    async fn existing_table_is_a_store_error() {
        let dir = TempDir::new().unwrap();
        let (store, _) = GeoPackageStore::open_or_create(dir.path().join("out.gpkg"))
            .await
            .unwrap();

        let writer = FeatureWriter::new(&store, "geom", None);
        writer
            .write("Roads", "Roads", &roads(), GeometryKind::Polyline)
            .await
            .unwrap();
        let err = writer
            .write("Roads", "Roads", &roads(), GeometryKind::Polyline)
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Store(_)));
        assert_eq!(store.count_rows("Roads").await.unwrap(), 2);
    }
}
