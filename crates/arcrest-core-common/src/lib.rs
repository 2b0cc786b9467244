//! Common types and traits shared across `arcrest` crates.
//!
//! This crate provides the abstractions shared between `arcrest-core` and the
//! destination container implementations, preventing circular dependencies.

pub mod error;
pub mod geometry;
pub mod store;

// Re-export commonly used types
pub use error::{StoreError, StoreResult};
pub use geometry::GeometryKind;
pub use store::{
    ContainerStatus, DestinationFactory, DestinationStore, GeometryColumn, OpenedContainer,
    TableDefinition, is_wkb_field, wkb_field,
};
