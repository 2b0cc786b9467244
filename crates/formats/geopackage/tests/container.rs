//! Integration tests for the GeoPackage container

use std::sync::Arc;

use arcrest_core_common::{
    ContainerStatus, DestinationFactory, DestinationStore, GeometryColumn, GeometryKind,
    StoreError, TableDefinition, wkb_field,
};
use arcrest_geopackage::{GeoPackageFactory, GeoPackageStore};
use arrow_array::{ArrayRef, BinaryArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use geozero::ToGeo;
use geozero::wkb::GpkgWkb;
use tempfile::TempDir;

// POINT(1 2) as little-endian ISO WKB
const POINT_WKB: [u8; 21] = [
    0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0x3f, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x40,
];

fn hydrant_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("OBJECTID", DataType::Int64, true),
        Field::new("NAME", DataType::Utf8, true),
        Field::new("FLOW", DataType::Float64, true),
        wkb_field("geom"),
    ]))
}

fn hydrant_definition(name: &str) -> TableDefinition {
    TableDefinition {
        name: name.to_string(),
        description: Some("Hydrants".to_string()),
        schema: hydrant_schema(),
        geometry: GeometryColumn {
            name: "geom".to_string(),
            kind: GeometryKind::Point,
            srs_id: Some(2278),
        },
    }
}

fn hydrant_batch() -> RecordBatch {
    let ids: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let names: ArrayRef = Arc::new(StringArray::from(vec![Some("A"), None, Some("C")]));
    let flows: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.5), Some(2.0), None]));
    let geoms: ArrayRef = Arc::new(BinaryArray::from(vec![
        Some(&POINT_WKB[..]),
        Some(&POINT_WKB[..]),
        None,
    ]));
    RecordBatch::try_new(hydrant_schema(), vec![ids, names, flows, geoms]).unwrap()
}

#[tokio::test]
async fn test_create_then_reopen_container() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("out.gpkg");

    let (store, status) = GeoPackageStore::open_or_create(&path).await.unwrap();
    assert_eq!(status, ContainerStatus::Created);
    assert!(path.exists());
    assert!(store.list_tables().await.unwrap().is_empty());

    let application_id: i64 = sqlx::query_scalar("PRAGMA application_id")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(application_id, 0x4750_4B47);
    drop(store);

    let (_store, status) = GeoPackageStore::open_or_create(&path).await.unwrap();
    assert_eq!(status, ContainerStatus::Existing);
}

#[tokio::test]
async fn test_create_append_and_count() {
    let temp_dir = TempDir::new().unwrap();
    let (store, _) = GeoPackageStore::open_or_create(temp_dir.path().join("out.gpkg"))
        .await
        .unwrap();

    store
        .create_table(&hydrant_definition("Hydrants"))
        .await
        .unwrap();
    assert!(store.table_exists("hydrants").await.unwrap());
    assert_eq!(store.list_tables().await.unwrap(), vec!["Hydrants".to_string()]);

    let written = store
        .append_rows("Hydrants", &hydrant_batch())
        .await
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(store.count_rows("Hydrants").await.unwrap(), 3);

    let (geometry_type, srs_id): (String, i64) = sqlx::query_as(
        "SELECT geometry_type_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?",
    )
    .bind("Hydrants")
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(geometry_type, "POINT");
    assert_eq!(srs_id, 2278);

    let blob: Vec<u8> = sqlx::query_scalar("SELECT geom FROM \"Hydrants\" WHERE OBJECTID = 1")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(&blob[4..8], &2278i32.to_le_bytes());
    assert_eq!(
        GpkgWkb(blob).to_geo().unwrap(),
        geo_types::Geometry::Point(geo_types::Point::new(1.0, 2.0))
    );

    let null_geoms: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM \"Hydrants\" WHERE geom IS NULL")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(null_geoms, 1);
}

#[tokio::test]
async fn test_existing_table_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (store, _) = GeoPackageStore::open_or_create(temp_dir.path().join("out.gpkg"))
        .await
        .unwrap();

    store
        .create_table(&hydrant_definition("Hydrants"))
        .await
        .unwrap();
    let err = store
        .create_table(&hydrant_definition("HYDRANTS"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TableExists { .. }));
}

#[tokio::test]
async fn test_validated_names_skip_existing_tables() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out.gpkg");
    {
        let (store, _) = GeoPackageStore::open_or_create(&path).await.unwrap();
        store
            .create_table(&hydrant_definition("Hydrants"))
            .await
            .unwrap();
    }

    let (store, _) = GeoPackageStore::open_or_create(&path).await.unwrap();
    let name = store.validate_table_name("Hydrants").await.unwrap();
    assert_eq!(name, "Hydrants_1");

    let name = store.validate_table_name("Fire Hydrants").await.unwrap();
    assert_eq!(name, "Fire_Hydrants");
}

#[tokio::test]
async fn test_drop_table_removes_registration() {
    let temp_dir = TempDir::new().unwrap();
    let (store, _) = GeoPackageStore::open_or_create(temp_dir.path().join("out.gpkg"))
        .await
        .unwrap();

    store
        .create_table(&hydrant_definition("Hydrants"))
        .await
        .unwrap();
    store.drop_table("Hydrants").await.unwrap();

    assert!(!store.table_exists("Hydrants").await.unwrap());
    assert!(store.list_tables().await.unwrap().is_empty());
    let registered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gpkg_geometry_columns")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(registered, 0);
}

#[tokio::test]
async fn test_append_to_missing_table_fails() {
    let temp_dir = TempDir::new().unwrap();
    let (store, _) = GeoPackageStore::open_or_create(temp_dir.path().join("out.gpkg"))
        .await
        .unwrap();

    let err = store
        .append_rows("Nope", &hydrant_batch())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TableNotFound { .. }));
}

#[tokio::test]
async fn test_non_sqlite_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.gpkg");
    std::fs::write(&path, "this is not a database, just some plain text notes").unwrap();

    let err = GeoPackageStore::open_or_create(&path).await.unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[tokio::test]
async fn test_factory_opens_container() {
    let temp_dir = TempDir::new().unwrap();
    let factory = GeoPackageFactory;
    assert_eq!(factory.short_name(), "GPKG");

    let opened = factory
        .create_container(&temp_dir.path().join("out.gpkg"))
        .await
        .unwrap();
    assert_eq!(opened.status, ContainerStatus::Created);
    assert_eq!(opened.store.reserved_columns(), &["fid"]);
}
