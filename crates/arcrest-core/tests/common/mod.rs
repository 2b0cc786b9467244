//! In-process mock of an ArcGIS REST map service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};

const SERVICE_PATH: &str = "/arcgis/rest/services/Test/MapServer";

/// One layer served by the mock.
#[derive(Debug, Clone)]
pub struct MockLayer {
    pub id: i64,
    pub name: String,
    /// `geometryType` of the layer metadata; `None` answers the metadata
    /// request with 404.
    pub geometry_type: Option<String>,
    /// Body of the query response
    pub query: Value,
}

impl MockLayer {
    pub fn new(id: i64, name: &str, geometry_type: &str, query: Value) -> Self {
        Self {
            id,
            name: name.to_string(),
            geometry_type: Some(geometry_type.to_string()),
            query,
        }
    }

    pub fn without_metadata(mut self) -> Self {
        self.geometry_type = None;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    map_name: String,
    layers: Vec<MockLayer>,
    service_body: Option<Value>,
    queries: Mutex<Vec<(i64, HashMap<String, String>)>>,
}

/// A running mock service.
pub struct MockService {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockService {
    /// Serves `layers` under a map service called `map_name`.
    pub async fn start(map_name: &str, layers: Vec<MockLayer>) -> Self {
        Self::start_with(map_name, layers, None).await
    }

    /// Serves a fixed body for the service metadata request.
    pub async fn start_with_service_body(body: Value) -> Self {
        Self::start_with("Broken", Vec::new(), Some(body)).await
    }

    async fn start_with(map_name: &str, layers: Vec<MockLayer>, service_body: Option<Value>) -> Self {
        let state = Arc::new(MockState {
            map_name: map_name.to_string(),
            layers,
            service_body,
            queries: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route(SERVICE_PATH, get(service_metadata))
            .route(&format!("{SERVICE_PATH}/:layer_id"), get(layer_metadata))
            .route(&format!("{SERVICE_PATH}/:layer_id/query"), get(layer_query))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}{SERVICE_PATH}"),
            state,
        }
    }

    /// Query parameters received so far, per layer id.
    pub fn queries(&self) -> Vec<(i64, HashMap<String, String>)> {
        self.state.queries.lock().unwrap().clone()
    }
}

/// An address nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}{SERVICE_PATH}")
}

async fn service_metadata(State(state): State<Arc<MockState>>) -> Response {
    if let Some(body) = &state.service_body {
        return axum::Json(body.clone()).into_response();
    }

    let layers: Vec<Value> = state
        .layers
        .iter()
        .map(|layer| json!({"id": layer.id, "name": layer.name, "parentLayerId": -1}))
        .collect();
    axum::Json(json!({
        "currentVersion": 10.91,
        "mapName": state.map_name,
        "layers": layers,
        "spatialReference": {"wkid": 102740, "latestWkid": 2278}
    }))
    .into_response()
}

async fn layer_metadata(
    State(state): State<Arc<MockState>>,
    Path(layer_id): Path<i64>,
) -> Response {
    let layer = state.layers.iter().find(|layer| layer.id == layer_id);
    match layer.and_then(|layer| layer.geometry_type.clone().map(|g| (layer, g))) {
        Some((layer, geometry_type)) => axum::Json(json!({
            "id": layer.id,
            "name": layer.name,
            "type": "Feature Layer",
            "geometryType": geometry_type
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn layer_query(
    State(state): State<Arc<MockState>>,
    Path(layer_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.queries.lock().unwrap().push((layer_id, params));
    match state.layers.iter().find(|layer| layer.id == layer_id) {
        Some(layer) => axum::Json(layer.query.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A polyline query response with `count` features.
pub fn polyline_features(count: i64) -> Value {
    let features: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "attributes": {"OBJECTID": i, "NAME": format!("Road {i}"), "LANES": 2},
                "geometry": {"paths": [[[0.0, 0.0], [i as f64, i as f64]]]}
            })
        })
        .collect();
    json!({
        "geometryType": "esriGeometryPolyline",
        "spatialReference": {"wkid": 102740, "latestWkid": 2278},
        "fields": [],
        "features": features
    })
}

/// A polygon query response with `count` features.
pub fn polygon_features(count: i64) -> Value {
    let features: Vec<Value> = (1..=count)
        .map(|i| {
            let x = i as f64 * 10.0;
            json!({
                "attributes": {"OBJECTID": i, "PARCEL_ID": format!("P-{i:04}"), "ACRES": 1.25},
                "geometry": {"rings": [[[x, 0.0], [x, 5.0], [x + 5.0, 5.0], [x + 5.0, 0.0], [x, 0.0]]]}
            })
        })
        .collect();
    json!({
        "geometryType": "esriGeometryPolygon",
        "spatialReference": {"wkid": 102740, "latestWkid": 2278},
        "features": features
    })
}
