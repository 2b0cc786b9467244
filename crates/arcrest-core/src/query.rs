//! Feature queries against one layer.

use arcrest_core_common::GeometryKind;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::{MapServiceClient, ServerErrorBody, describe_transport_error};
use crate::error::LayerError;
use crate::types::{Feature, QueryResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    features: Option<Vec<FeatureEntry>>,
    #[serde(default)]
    geometry_type: Option<String>,
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
    #[serde(default)]
    exceeded_transfer_limit: bool,
}

#[derive(Debug, Deserialize)]
struct FeatureEntry {
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpatialReference {
    #[serde(default)]
    wkid: Option<i32>,
    #[serde(default)]
    latest_wkid: Option<i32>,
}

impl MapServiceClient {
    /// Queries every feature of a layer with all attribute fields and full
    /// geometry (`GET {base}/{id}/query`).
    ///
    /// One request is issued. When the service cuts the result at its record
    /// limit the result is flagged as truncated and a warning is logged; no
    /// further pages are requested.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Transport`] on network failure, timeout, a non-2xx
    /// status or a body that is not a query response,
    /// [`LayerError::ServerReported`] if the body carries an error object and
    /// [`LayerError::EmptyResult`] if no features come back.
    pub async fn query(&self, layer_id: i64, out_sr: Option<i32>) -> Result<QueryResult, LayerError> {
        let url = format!("{}/query", self.layer_url(layer_id));
        let mut params = vec![
            ("where", "1=1".to_string()),
            ("outFields", "*".to_string()),
            ("returnGeometry", "true".to_string()),
            ("f", "json".to_string()),
        ];
        if let Some(out_sr) = out_sr {
            params.push(("outSR", out_sr.to_string()));
        }

        let body = self
            .get_json(&url, &params, self.query_timeout)
            .await
            .map_err(|e| LayerError::Transport {
                layer_id,
                message: describe_transport_error(&e),
            })?;

        let result = parse_query_response(layer_id, body)?;
        debug!(
            "Layer {layer_id}: {} feature(s), geometry type {}",
            result.features.len(),
            result.geometry_kind
        );
        if result.truncated {
            warn!(
                "Layer {layer_id}: the service limited the result to {} feature(s); \
                 remaining features were not retrieved",
                result.features.len()
            );
        }
        Ok(result)
    }
}

fn parse_query_response(layer_id: i64, body: Value) -> Result<QueryResult, LayerError> {
    if !body.is_object() {
        return Err(LayerError::Transport {
            layer_id,
            message: "query response is not a JSON object".to_string(),
        });
    }
    if let Some(error) = ServerErrorBody::from_body(&body) {
        if error.code.is_some() || error.details.is_some() {
            debug!(
                "Layer {layer_id}: error code {:?}, details: {:?}",
                error.code, error.details
            );
        }
        return Err(LayerError::ServerReported {
            layer_id,
            message: error.message(),
        });
    }

    let response: QueryResponse =
        serde_json::from_value(body).map_err(|e| LayerError::Transport {
            layer_id,
            message: format!("unexpected query response: {e}"),
        })?;

    let features: Vec<Feature> = response
        .features
        .unwrap_or_default()
        .into_iter()
        .map(|entry| Feature {
            attributes: entry.attributes.unwrap_or_default(),
            geometry: entry.geometry,
        })
        .collect();
    if features.is_empty() {
        return Err(LayerError::EmptyResult { layer_id });
    }

    Ok(QueryResult {
        features,
        geometry_kind: response
            .geometry_type
            .as_deref()
            .map_or(GeometryKind::Unknown, GeometryKind::from_esri),
        spatial_reference: response
            .spatial_reference
            .and_then(|sr| sr.latest_wkid.or(sr.wkid)),
        truncated: response.exceeded_transfer_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_features() {
        let body = json!({
            "displayFieldName": "NAME",
            "geometryType": "esriGeometryPoint",
            "spatialReference": {"wkid": 102740, "latestWkid": 2278},
            "fields": [{"name": "OBJECTID", "type": "esriFieldTypeOID"}],
            "features": [
                {"attributes": {"OBJECTID": 1, "NAME": "A"}, "geometry": {"x": 1.0, "y": 2.0}},
                {"attributes": {"OBJECTID": 2, "NAME": null}, "geometry": null},
                {"attributes": {"OBJECTID": 3}}
            ]
        });

        let result = parse_query_response(0, body).unwrap();
        assert_eq!(result.features.len(), 3);
        assert_eq!(result.geometry_kind, GeometryKind::Point);
        assert_eq!(result.spatial_reference, Some(2278));
        assert!(!result.truncated);
        assert!(result.features[0].geometry.is_some());
        assert!(result.features[1].geometry.is_none());
        assert!(result.features[2].geometry.is_none());

        let keys: Vec<&str> = result.features[0].attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["OBJECTID", "NAME"]);
    }

    #[test]
    fn error_object_is_server_reported() {
        let body = json!({"error": {"code": 400, "message": "Invalid SQL", "details": ["bad where"]}});
        let err = parse_query_response(1, body).unwrap_err();
        match err {
            LayerError::ServerReported { layer_id, message } => {
                assert_eq!(layer_id, 1);
                assert_eq!(message, "Invalid SQL");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loosely_shaped_error_object_is_server_reported() {
        for body in [
            json!({"error": {"code": 400, "message": "Invalid SQL", "details": null}}),
            json!({"error": {"code": "400", "message": "Invalid SQL"}}),
        ] {
            let err = parse_query_response(1, body).unwrap_err();
            assert!(
                matches!(&err, LayerError::ServerReported { message, .. } if message == "Invalid SQL"),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn no_features_is_empty_result() {
        let err = parse_query_response(2, json!({"features": []})).unwrap_err();
        assert!(matches!(err, LayerError::EmptyResult { layer_id: 2 }));

        let err = parse_query_response(2, json!({"geometryType": "esriGeometryPoint"})).unwrap_err();
        assert!(matches!(err, LayerError::EmptyResult { layer_id: 2 }));
    }

    #[test]
    fn transfer_limit_is_carried() {
        let body = json!({
            "features": [{"attributes": {"OBJECTID": 1}}],
            "exceededTransferLimit": true
        });
        assert!(parse_query_response(0, body).unwrap().truncated);
    }

    #[test]
    fn non_object_body_is_transport_error() {
        let err = parse_query_response(5, json!("<html>")).unwrap_err();
        assert!(matches!(err, LayerError::Transport { layer_id: 5, .. }));
    }
}
