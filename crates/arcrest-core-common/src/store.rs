//! Destination container traits.
//!
//! A destination container is a file-system located collection of spatial
//! tables. The extraction pipeline only talks to it through the traits in this
//! module: a [`DestinationFactory`] creates or reopens a container, and the
//! resulting [`DestinationStore`] validates table names, creates tables from an
//! inferred schema and appends Arrow record batches.

use std::collections::HashMap;
use std::path::Path;

use arrow_array::RecordBatch;
use arrow_schema::{DataType, Field, FieldRef, SchemaRef};
use async_trait::async_trait;

use crate::error::StoreResult;
use crate::geometry::GeometryKind;

/// Arrow metadata key naming the extension type of a field.
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// Extension name marking a binary field as ISO WKB geometries.
pub const WKB_EXTENSION_NAME: &str = "geoarrow.wkb";

/// Creates a nullable binary field tagged as a WKB geometry column.
#[must_use]
pub fn wkb_field(name: impl Into<String>) -> Field {
    Field::new(name, DataType::Binary, true).with_metadata(HashMap::from([(
        EXTENSION_NAME_KEY.to_string(),
        WKB_EXTENSION_NAME.to_string(),
    )]))
}

/// Returns `true` if the field carries WKB geometries.
#[must_use]
pub fn is_wkb_field(field: &Field) -> bool {
    field
        .metadata()
        .get(EXTENSION_NAME_KEY)
        .is_some_and(|name| name == WKB_EXTENSION_NAME)
}

/// Geometry column of a destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryColumn {
    /// Column name
    pub name: String,
    /// Geometry kind used to type the column
    pub kind: GeometryKind,
    /// Spatial reference identifier of the stored coordinates
    pub srs_id: Option<i32>,
}

/// Everything a container needs to create a table.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    /// Validated table name
    pub name: String,
    /// Human readable description (e.g., the source layer name)
    pub description: Option<String>,
    /// Arrow schema of the rows; the geometry column is a [`wkb_field`]
    pub schema: SchemaRef,
    /// Geometry column details
    pub geometry: GeometryColumn,
}

impl TableDefinition {
    /// Iterates over the attribute fields, skipping the geometry column.
    pub fn attribute_fields(&self) -> impl Iterator<Item = &FieldRef> {
        self.schema
            .fields()
            .iter()
            .filter(move |field| field.name() != &self.geometry.name)
    }
}

/// Whether a container was created by the current run or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The container did not exist and was created.
    Created,
    /// The container already existed and was opened for append.
    Existing,
}

/// A freshly opened container and how it came to be.
pub struct OpenedContainer {
    /// The opened store
    pub store: Box<dyn DestinationStore>,
    /// Whether the container was created or reused
    pub status: ContainerStatus,
}

/// A spatial dataset container that tables can be written into.
///
/// Implementations are used by one writer at a time.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Column names the container adds to every table itself. Attribute
    /// columns must not use them (compared case-insensitively).
    fn reserved_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Lists the feature tables in the container.
    async fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Returns `true` if a table with this name exists (case-insensitive).
    async fn table_exists(&self, name: &str) -> StoreResult<bool>;

    /// Turns a candidate identifier into a legal table name that is unique
    /// within the container and among names already handed out by this store.
    ///
    /// The returned name stays reserved until it is released.
    async fn validate_table_name(&self, candidate: &str) -> StoreResult<String>;

    /// Gives back a name handed out by [`Self::validate_table_name`] whose
    /// table was never written.
    fn release_table_name(&self, name: &str);

    /// Creates a table from the definition.
    async fn create_table(&self, definition: &TableDefinition) -> StoreResult<()>;

    /// Appends every row of the batch and returns the number of rows written.
    async fn append_rows(&self, table: &str, batch: &RecordBatch) -> StoreResult<u64>;

    /// Counts the rows of a table.
    async fn count_rows(&self, table: &str) -> StoreResult<u64>;

    /// Drops a table and any registration metadata it has.
    async fn drop_table(&self, table: &str) -> StoreResult<()>;
}

/// Creates or reopens destination containers of one format.
#[async_trait]
pub trait DestinationFactory: Send + Sync {
    /// Short format name (e.g., `"GPKG"`).
    fn short_name(&self) -> &'static str;

    /// Opens the container at `path`, creating it and its parent directory
    /// when absent.
    async fn create_container(&self, path: &Path) -> StoreResult<OpenedContainer>;
}
