use std::process::Command;

use assert_cmd::prelude::*;
use axum::Router;
use axum::extract::Path;
use axum::routing::get;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

const SERVICE_PATH: &str = "/arcgis/rest/services/Test/MapServer";

fn arcrest() -> Command {
    Command::cargo_bin("arcrest").unwrap()
}

async fn layer_metadata(Path(layer_id): Path<i64>) -> axum::Json<Value> {
    axum::Json(json!({"id": layer_id, "name": "Hydrants", "geometryType": "esriGeometryPoint"}))
}

async fn layer_query() -> axum::Json<Value> {
    axum::Json(json!({
        "geometryType": "esriGeometryPoint",
        "spatialReference": {"wkid": 2278},
        "features": [
            {"attributes": {"OBJECTID": 1, "STATUS": "Active"}, "geometry": {"x": 10.0, "y": 20.0}},
            {"attributes": {"OBJECTID": 2, "STATUS": null}, "geometry": {"x": 11.0, "y": 21.0}}
        ]
    }))
}

async fn start_service() -> String {
    let app = Router::new()
        .route(
            SERVICE_PATH,
            get(|| async {
                axum::Json(json!({
                    "mapName": "Utilities",
                    "layers": [{"id": 0, "name": "Fire Hydrants"}]
                }))
            }),
        )
        .route(&format!("{SERVICE_PATH}/:layer_id"), get(layer_metadata))
        .route(&format!("{SERVICE_PATH}/:layer_id/query"), get(layer_query));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}{SERVICE_PATH}")
}

#[test]
fn test_help_lists_commands() {
    arcrest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("layers"));
}

#[test]
fn test_extract_requires_url_and_output() {
    arcrest()
        .arg("extract")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn test_extract_rejects_invalid_url() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.gpkg");

    arcrest()
        .args(["extract", "--url", "ftp://host/MapServer", "--output"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid url option"));
    assert!(!output.exists());
}

#[test]
fn test_extract_unreachable_service_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.gpkg");

    arcrest()
        .args(["extract", "--url", format!("http://{addr}{SERVICE_PATH}").as_str(), "--output"])
        .arg(&output)
        .args(["--metadata-timeout", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unreachable"));
    assert!(!output.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_extract_writes_geopackage() {
    let base_url = start_service().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("nested").join("utilities.gpkg");
    let output_arg = output.clone();

    let assert = tokio::task::spawn_blocking(move || {
        arcrest()
            .args(["extract", "-u", base_url.as_str(), "-o"])
            .arg(&output_arg)
            .args(["-l", "0"])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("CONFIGURATION SUMMARY"))
        .stdout(predicate::str::contains("Layer IDs: 0"))
        .stdout(predicate::str::contains("Fire_Hydrants"))
        .stdout(predicate::str::contains("EXTRACTION COMPLETE!"))
        .stdout(predicate::str::contains("Successfully extracted: 1 layer(s)"));
    assert!(output.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_layers_lists_service() {
    let base_url = start_service().await;

    let assert = tokio::task::spawn_blocking(move || {
        arcrest().args(["layers", "--url", base_url.as_str()]).assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Service: Utilities"))
        .stdout(predicate::str::contains("Fire Hydrants"))
        .stdout(predicate::str::contains("Point"));
}
