//! Core extraction operations.
//!
//! [`extract`] drives a whole run: it discovers the service, opens the
//! destination container, selects the layers and processes them one at a
//! time. A failing layer is recorded in the report and the run moves on;
//! only service discovery and container creation abort the run.

use arcrest_core_common::{ContainerStatus, DestinationFactory, DestinationStore, GeometryKind};
use arcrest_geopackage::GeoPackageFactory;
use log::{debug, info, warn};

use crate::client::MapServiceClient;
use crate::error::{LayerError, Result};
use crate::options::{ExtractionOptions, ExtractionRequest};
use crate::sanitize::{sanitize, table_name_for};
use crate::selector::{select, unmatched_ids};
use crate::types::{
    ExtractionReport, LayerDescriptor, LayerOutcome, LayerState, LayerStatus, ServiceDescriptor,
};
use crate::writer::{FeatureWriter, WrittenTable};

/// Extracts the requested layers of a map service into a container created
/// by `factory`.
///
/// # Errors
///
/// Returns an error if the options are invalid, the service cannot be
/// described, or the destination container cannot be created. Failures of
/// individual layers are reported in the returned [`ExtractionReport`].
pub async fn extract(
    request: &ExtractionRequest,
    options: &ExtractionOptions,
    factory: &dyn DestinationFactory,
) -> Result<ExtractionReport> {
    options.validate()?;
    let client = MapServiceClient::new(request.base_url(), options)?;

    info!("Starting extraction:");
    info!("Service: {}", request.base_url());
    info!(
        "Output: {} (Driver: {})",
        request.destination().display(),
        factory.short_name()
    );

    let service = client.describe_service().await?;
    let container = factory.create_container(request.destination()).await?;
    let store = container.store.as_ref();
    match container.status {
        ContainerStatus::Created => info!("Writing to new container"),
        ContainerStatus::Existing => {
            let tables = store.list_tables().await?;
            info!(
                "Appending to existing container with {} feature table(s)",
                tables.len()
            );
            debug!("Existing tables: {tables:?}");
        },
    }

    let layers = select(&service.layers, request.layer_ids());
    match request.layer_ids() {
        Some(ids) => {
            let unmatched = unmatched_ids(&service.layers, ids);
            if !unmatched.is_empty() {
                debug!("Requested layer id(s) not in the service: {unmatched:?}");
            }
            info!(
                "Extracting {} specified layer(s) out of {} total layers",
                layers.len(),
                service.layers.len()
            );
        },
        None => info!("Extracting all {} layers", layers.len()),
    }
    if layers.is_empty() {
        info!("No layers found to extract");
    }

    let writer = FeatureWriter::new(store, options.geometry_column_name.as_str(), options.out_sr);
    let total = layers.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, layer) in layers.iter().enumerate() {
        let outcome = run_layer(&client, store, &writer, options, layer, index + 1, total).await;
        outcomes.push(outcome);
    }

    let report = ExtractionReport::new(request.destination(), outcomes);
    info!("Extraction complete: {report}");
    Ok(report)
}

/// Extracts into an OGC GeoPackage.
///
/// # Errors
///
/// See [`extract`].
pub async fn extract_to_geopackage(
    request: &ExtractionRequest,
    options: &ExtractionOptions,
) -> Result<ExtractionReport> {
    extract(request, options, &GeoPackageFactory).await
}

/// Describes a service and the geometry kind of each of its layers without
/// extracting anything.
///
/// Layers whose metadata cannot be read are listed with an unknown geometry
/// kind.
///
/// # Errors
///
/// Returns an error if the options are invalid or the service cannot be
/// described.
pub async fn describe(base_url: &str, options: &ExtractionOptions) -> Result<ServiceDescriptor> {
    options.validate()?;
    let client = MapServiceClient::new(base_url, options)?;
    let mut service = client.describe_service().await?;
    for layer in &mut service.layers {
        layer.geometry_kind = layer_geometry_kind(&client, layer.id).await;
    }
    Ok(service)
}

async fn run_layer(
    client: &MapServiceClient,
    store: &dyn DestinationStore,
    writer: &FeatureWriter<'_>,
    options: &ExtractionOptions,
    layer: &LayerDescriptor,
    position: usize,
    total: usize,
) -> LayerOutcome {
    let mut state = LayerState::Pending;

    let table_name = match table_name_for(store, &layer.name).await {
        Ok(name) => name,
        Err(err) => {
            warn!("[{position}/{total}] Layer {}: {err}", layer.id);
            return LayerOutcome {
                layer_id: layer.id,
                layer_name: layer.name.clone(),
                table_name: sanitize(&layer.name),
                status: LayerStatus::Failed {
                    message: LayerError::conversion(layer.id, err).to_string(),
                },
            };
        },
    };

    info!(
        "[{position}/{total}] Layer {} '{}' -> {}",
        layer.id, layer.name, table_name
    );
    state = state.start();
    debug!("Layer {} {state}", layer.id);

    let status = match process_layer(client, writer, options, layer, &table_name).await {
        Ok(written) => {
            info!(
                "Successfully extracted {} features (geometry type: {})",
                written.feature_count, written.geometry_kind
            );
            LayerStatus::Succeeded {
                feature_count: written.feature_count,
                geometry_kind: written.geometry_kind,
            }
        },
        Err(err) => {
            warn!("Layer '{}' failed: {err}", layer.name);
            store.release_table_name(&table_name);
            LayerStatus::Failed {
                message: err.to_string(),
            }
        },
    };

    state = state.finish(matches!(status, LayerStatus::Succeeded { .. }));
    debug!("Layer {} {state}", layer.id);

    LayerOutcome {
        layer_id: layer.id,
        layer_name: layer.name.clone(),
        table_name,
        status,
    }
}

async fn process_layer(
    client: &MapServiceClient,
    writer: &FeatureWriter<'_>,
    options: &ExtractionOptions,
    layer: &LayerDescriptor,
    table_name: &str,
) -> std::result::Result<WrittenTable, LayerError> {
    let kind = layer_geometry_kind(client, layer.id).await;
    let result = client.query(layer.id, options.out_sr).await?;
    writer
        .write(table_name, &layer.name, &result, kind)
        .await
        .map_err(|e| LayerError::conversion(layer.id, e))
}

async fn layer_geometry_kind(client: &MapServiceClient, layer_id: i64) -> GeometryKind {
    client
        .describe_layer(layer_id)
        .await
        .unwrap_or_else(|err| {
            warn!("Could not read the geometry type of layer {layer_id}: {err}");
            GeometryKind::Unknown
        })
}
