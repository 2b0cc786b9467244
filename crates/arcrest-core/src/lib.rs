//! `arcrest-core` is the extraction pipeline of the `arcrest` project: it copies
//! the vector layers of an ArcGIS REST map service into tables of a local
//! spatial dataset container.
//!
//! This crate includes:
//! - **Service discovery**: service and layer metadata lookups ([`discovery`]).
//! - **Feature queries**: one attribute and geometry query per layer ([`query`]).
//! - **Conversion**: Esri JSON geometries to WKB ([`esri`]) and features to Arrow
//!   record batches with an inferred schema ([`schema`]).
//! - **Writing**: query results persisted as container tables ([`writer`]).
//! - **Operations**: the sequential per-layer run and its report ([`operations`]).
//!
//! The destination container is reached through the traits of
//! `arcrest-core-common`; the GeoPackage implementation is the default.

pub mod client;
pub mod discovery;
pub mod error;
pub mod esri;
pub mod operations;
pub mod options;
pub mod query;
pub mod sanitize;
pub mod schema;
pub mod selector;
pub mod types;
pub mod writer;

pub use client::MapServiceClient;
pub use error::{ConfigError, ConversionError, ExtractError, LayerError, Result, ServiceError};
pub use operations::{describe, extract, extract_to_geopackage};
pub use options::{ExtractionOptions, ExtractionRequest};
pub use types::{
    ExtractionReport, Feature, LayerDescriptor, LayerOutcome, LayerState, LayerStatus,
    QueryResult, ServiceDescriptor,
};
