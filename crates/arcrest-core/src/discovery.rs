//! Service and layer metadata lookups.

use arcrest_core_common::GeometryKind;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use crate::client::{MapServiceClient, ServerErrorBody, describe_transport_error};
use crate::error::{LayerError, ServiceError};
use crate::types::{LayerDescriptor, ServiceDescriptor};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceMetadata {
    #[serde(default)]
    map_name: Option<String>,
    #[serde(default)]
    layers: Option<Vec<LayerEntry>>,
}

#[derive(Debug, Deserialize)]
struct LayerEntry {
    id: i64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayerMetadata {
    #[serde(default)]
    geometry_type: Option<String>,
}

impl MapServiceClient {
    /// Fetches the service metadata (`GET {base}?f=json`).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unreachable`] on network failure, timeout or a
    /// non-2xx status, and [`ServiceError::InvalidMetadata`] if the body is not
    /// map service metadata.
    pub async fn describe_service(&self) -> Result<ServiceDescriptor, ServiceError> {
        let url = self.base_url().to_string();
        let params = [("f", "json".to_string())];

        let body = self
            .get_json(&url, &params, self.metadata_timeout)
            .await
            .map_err(|source| {
                if source.is_decode() {
                    ServiceError::InvalidMetadata {
                        url: url.clone(),
                        message: describe_transport_error(&source),
                    }
                } else {
                    ServiceError::Unreachable {
                        url: url.clone(),
                        source,
                    }
                }
            })?;

        let service = parse_service_metadata(&url, body)?;
        info!(
            "Service accessible: {} ({} layer(s))",
            service.map_name,
            service.layers.len()
        );
        Ok(service)
    }

    /// Looks up the geometry kind of one layer (`GET {base}/{id}?f=json`).
    ///
    /// A missing or unrecognised `geometryType` is reported as
    /// [`GeometryKind::Unknown`]. Callers treat errors as non-fatal.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Transport`] if the request fails and
    /// [`LayerError::ServerReported`] if the service answers with an error
    /// object.
    pub async fn describe_layer(&self, layer_id: i64) -> Result<GeometryKind, LayerError> {
        let url = self.layer_url(layer_id);
        let params = [("f", "json".to_string())];

        let body = self
            .get_json(&url, &params, self.metadata_timeout)
            .await
            .map_err(|e| LayerError::Transport {
                layer_id,
                message: describe_transport_error(&e),
            })?;

        let kind = parse_layer_metadata(layer_id, body)?;
        debug!("Layer {layer_id} geometry type: {kind}");
        Ok(kind)
    }
}

fn parse_service_metadata(url: &str, body: Value) -> Result<ServiceDescriptor, ServiceError> {
    let invalid = |message: String| ServiceError::InvalidMetadata {
        url: url.to_string(),
        message,
    };

    if !body.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    if let Some(error) = ServerErrorBody::from_body(&body) {
        return Err(invalid(format!("server reported: {}", error.message())));
    }
    let metadata: ServiceMetadata =
        serde_json::from_value(body).map_err(|e| invalid(e.to_string()))?;

    let layers = metadata
        .layers
        .ok_or_else(|| invalid("missing 'layers'".to_string()))?;

    Ok(ServiceDescriptor {
        map_name: metadata.map_name.unwrap_or_else(|| "Unknown".to_string()),
        layers: layers
            .into_iter()
            .map(|layer| {
                let name = layer.name.unwrap_or_else(|| format!("Layer_{}", layer.id));
                LayerDescriptor::new(layer.id, name)
            })
            .collect(),
    })
}

fn parse_layer_metadata(layer_id: i64, body: Value) -> Result<GeometryKind, LayerError> {
    if let Some(error) = ServerErrorBody::from_body(&body) {
        return Err(LayerError::ServerReported {
            layer_id,
            message: error.message(),
        });
    }
    let metadata: LayerMetadata =
        serde_json::from_value(body).map_err(|e| LayerError::Transport {
            layer_id,
            message: format!("unexpected layer metadata: {e}"),
        })?;

    Ok(metadata
        .geometry_type
        .as_deref()
        .map_or(GeometryKind::Unknown, GeometryKind::from_esri))
}
