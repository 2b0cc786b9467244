//! GeoPackage container backed by SQLite.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use arcrest_core_common::{
    ContainerStatus, DestinationFactory, DestinationStore, OpenedContainer, StoreError,
    StoreResult, TableDefinition, is_wkb_field,
};
use arrow_array::RecordBatch;
use async_trait::async_trait;
use log::{debug, info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::naming::{legalize_table_name, unique_table_name};
use crate::types::{GeoPackageTypeExt, geometry_type_name};
use crate::values::{SqlValue, attribute_value, geometry_value};

/// Name of the integer primary key column of every feature table.
pub const FID_COLUMN: &str = "fid";

/// `PRAGMA application_id` value of a GeoPackage (`"GPKG"`).
const APPLICATION_ID: i64 = 0x4750_4B47;

/// `PRAGMA user_version` value for GeoPackage 1.3.
const USER_VERSION: i64 = 10300;

/// Spatial reference used when a table does not name one.
const UNDEFINED_CARTESIAN_SRS: i32 = -1;

const CORE_TABLES: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
        srs_name TEXT NOT NULL,
        srs_id INTEGER NOT NULL PRIMARY KEY,
        organization TEXT NOT NULL,
        organization_coordsys_id INTEGER NOT NULL,
        definition TEXT NOT NULL,
        description TEXT
    )",
    r"CREATE TABLE IF NOT EXISTS gpkg_contents (
        table_name TEXT NOT NULL PRIMARY KEY,
        data_type TEXT NOT NULL,
        identifier TEXT UNIQUE,
        description TEXT DEFAULT '',
        last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
        min_x DOUBLE,
        min_y DOUBLE,
        max_x DOUBLE,
        max_y DOUBLE,
        srs_id INTEGER,
        CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
    )",
    r"CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        geometry_type_name TEXT NOT NULL,
        srs_id INTEGER NOT NULL,
        z TINYINT NOT NULL,
        m TINYINT NOT NULL,
        CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
        CONSTRAINT uk_gc_table_name UNIQUE (table_name),
        CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
        CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
    )",
    r"INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES (
        'Undefined cartesian SRS', -1, 'NONE', -1, 'undefined',
        'undefined cartesian coordinate reference system'
    )",
    r"INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES (
        'Undefined geographic SRS', 0, 'NONE', 0, 'undefined',
        'undefined geographic coordinate reference system'
    )",
    r#"INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES (
        'WGS 84 geodetic', 4326, 'EPSG', 4326,
        'GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]',
        'longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid'
    )"#,
];

/// Quotes an SQL identifier.
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// An OGC GeoPackage opened for reading and appending feature tables.
#[derive(Debug)]
pub struct GeoPackageStore {
    path: PathBuf,
    pool: SqlitePool,
    /// Lower-cased names handed out by `validate_table_name` in this session.
    issued: Mutex<HashSet<String>>,
}

impl GeoPackageStore {
    /// Opens the GeoPackage at `path`, creating the file and its parent
    /// directory when they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CreateDirectory`] if the parent directory cannot be
    /// created and [`StoreError::Open`] if the file cannot be opened as a
    /// GeoPackage (for example because it is not an SQLite database).
    pub async fn open_or_create(path: impl AsRef<Path>) -> StoreResult<(Self, ContainerStatus)> {
        let path = path.as_ref().to_path_buf();
        let status = if path.exists() {
            ContainerStatus::Existing
        } else {
            ContainerStatus::Created
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
            info!("Created directory: {}", parent.display());
        }

        let is_gpkg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gpkg"));
        if !is_gpkg {
            warn!(
                "Container '{}' does not use the .gpkg extension; writing a GeoPackage anyway",
                path.display()
            );
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open {
                path: path.clone(),
                source: Box::new(e),
            })?;

        let store = Self {
            path,
            pool,
            issued: Mutex::new(HashSet::new()),
        };
        store
            .initialize(status)
            .await
            .map_err(|e| StoreError::Open {
                path: store.path.clone(),
                source: Box::new(e),
            })?;

        match status {
            ContainerStatus::Created => info!("Created geodatabase: {}", store.path.display()),
            ContainerStatus::Existing => {
                info!("Using existing geodatabase: {}", store.path.display());
            },
        }
        Ok((store, status))
    }

    async fn initialize(&self, status: ContainerStatus) -> sqlx::Result<()> {
        if status == ContainerStatus::Created {
            sqlx::query(&format!("PRAGMA application_id = {APPLICATION_ID}"))
                .execute(&self.pool)
                .await?;
            sqlx::query(&format!("PRAGMA user_version = {USER_VERSION}"))
                .execute(&self.pool)
                .await?;
        }

        for statement in CORE_TABLES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn existing_names(&self) -> StoreResult<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT lower(name) FROM sqlite_master WHERE type IN ('table', 'view')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::statement("list tables", self.path.display().to_string(), e))?;
        Ok(names.into_iter().collect())
    }

    async fn table_srs_id(&self, table: &str) -> StoreResult<i32> {
        let srs_id: Option<i32> = sqlx::query_scalar(
            "SELECT srs_id FROM gpkg_geometry_columns WHERE lower(table_name) = lower(?)",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::statement("look up srs", table, e))?;
        Ok(srs_id.unwrap_or(UNDEFINED_CARTESIAN_SRS))
    }
}

#[async_trait]
impl DestinationStore for GeoPackageStore {
    fn reserved_columns(&self) -> &'static [&'static str] {
        &[FID_COLUMN]
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        sqlx::query_scalar(
            "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::statement("list tables", self.path.display().to_string(), e))
    }

    async fn table_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.existing_names().await?.contains(&name.to_lowercase()))
    }

    async fn validate_table_name(&self, candidate: &str) -> StoreResult<String> {
        let existing = self.existing_names().await?;
        let legal = legalize_table_name(candidate);

        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        let name = unique_table_name(&legal, |name| {
            let key = name.to_lowercase();
            existing.contains(&key) || issued.contains(&key)
        });
        issued.insert(name.to_lowercase());

        if name != candidate {
            debug!("Table name '{candidate}' validated as '{name}'");
        }
        Ok(name)
    }

    fn release_table_name(&self, name: &str) {
        let released = self
            .issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase());
        if released {
            debug!("Table name '{name}' released");
        }
    }

    async fn create_table(&self, definition: &TableDefinition) -> StoreResult<()> {
        let table = definition.name.as_str();
        if self.table_exists(table).await? {
            return Err(StoreError::TableExists {
                table: table.to_string(),
            });
        }

        let geometry = &definition.geometry;
        let mut columns = vec![
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(FID_COLUMN)),
            format!(
                "{} {}",
                quote(&geometry.name),
                geometry_type_name(geometry.kind)
            ),
        ];
        for field in definition.attribute_fields() {
            if field.name().eq_ignore_ascii_case(FID_COLUMN) {
                return Err(StoreError::SchemaMismatch {
                    table: table.to_string(),
                    message: format!("column '{}' collides with the primary key", field.name()),
                });
            }
            let column_type =
                field
                    .data_type()
                    .gpkg_type()
                    .ok_or_else(|| StoreError::UnsupportedColumn {
                        column: field.name().clone(),
                        data_type: field.data_type().to_string(),
                    })?;
            columns.push(format!("{} {column_type}", quote(field.name())));
        }

        let srs_id = geometry.srs_id.unwrap_or(UNDEFINED_CARTESIAN_SRS);
        let create = format!("CREATE TABLE {} ({})", quote(table), columns.join(", "));
        debug!("{create}");

        let statement_error = |e: sqlx::Error| StoreError::statement("create table", table, e);
        let mut tx = self.pool.begin().await.map_err(statement_error)?;

        sqlx::query(
            "INSERT OR IGNORE INTO gpkg_spatial_ref_sys \
             (srs_name, srs_id, organization, organization_coordsys_id, definition) \
             VALUES (?, ?, 'EPSG', ?, 'undefined')",
        )
        .bind(format!("EPSG:{srs_id}"))
        .bind(srs_id)
        .bind(srs_id)
        .execute(&mut *tx)
        .await
        .map_err(statement_error)?;

        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .map_err(statement_error)?;

        sqlx::query(
            "INSERT INTO gpkg_contents (table_name, data_type, identifier, description, srs_id) \
             VALUES (?, 'features', ?, ?, ?)",
        )
        .bind(table)
        .bind(table)
        .bind(definition.description.clone().unwrap_or_default())
        .bind(srs_id)
        .execute(&mut *tx)
        .await
        .map_err(statement_error)?;

        sqlx::query(
            "INSERT INTO gpkg_geometry_columns \
             (table_name, column_name, geometry_type_name, srs_id, z, m) \
             VALUES (?, ?, ?, ?, 0, 0)",
        )
        .bind(table)
        .bind(&geometry.name)
        .bind(geometry_type_name(geometry.kind))
        .bind(srs_id)
        .execute(&mut *tx)
        .await
        .map_err(statement_error)?;

        tx.commit().await.map_err(statement_error)?;
        info!("Created table {table} ({})", geometry_type_name(geometry.kind));
        Ok(())
    }

    async fn append_rows(&self, table: &str, batch: &RecordBatch) -> StoreResult<u64> {
        if !self.table_exists(table).await? {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        if batch.num_rows() == 0 {
            return Ok(0);
        }

        let srs_id = self.table_srs_id(table).await?;
        let schema = batch.schema();
        let column_names: Vec<String> = schema.fields().iter().map(|f| quote(f.name())).collect();
        let placeholders = vec!["?"; column_names.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote(table),
            column_names.join(", ")
        );

        let statement_error = |e: sqlx::Error| StoreError::statement("insert", table, e);
        let mut tx = self.pool.begin().await.map_err(statement_error)?;

        for row in 0..batch.num_rows() {
            let mut query = sqlx::query(&insert);
            for (field, array) in schema.fields().iter().zip(batch.columns()) {
                let value = if is_wkb_field(field) {
                    geometry_value(field.name(), array, row, srs_id)?
                } else {
                    attribute_value(field.name(), array, row)?
                };
                query = match value {
                    SqlValue::Null => query.bind(None::<String>),
                    SqlValue::Integer(v) => query.bind(v),
                    SqlValue::Real(v) => query.bind(v),
                    SqlValue::Text(v) => query.bind(v),
                    SqlValue::Blob(v) => query.bind(v),
                };
            }
            query.execute(&mut *tx).await.map_err(statement_error)?;
        }

        tx.commit().await.map_err(statement_error)?;
        debug!("Appended {} row(s) to {table}", batch.num_rows());
        Ok(batch.num_rows() as u64)
    }

    async fn count_rows(&self, table: &str) -> StoreResult<u64> {
        if !self.table_exists(table).await? {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote(table)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::statement("count rows", table, e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn drop_table(&self, table: &str) -> StoreResult<()> {
        let statement_error = |e: sqlx::Error| StoreError::statement("drop table", table, e);
        let mut tx = self.pool.begin().await.map_err(statement_error)?;

        sqlx::query("DELETE FROM gpkg_geometry_columns WHERE lower(table_name) = lower(?)")
            .bind(table)
            .execute(&mut *tx)
            .await
            .map_err(statement_error)?;
        sqlx::query("DELETE FROM gpkg_contents WHERE lower(table_name) = lower(?)")
            .bind(table)
            .execute(&mut *tx)
            .await
            .map_err(statement_error)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote(table)))
            .execute(&mut *tx)
            .await
            .map_err(statement_error)?;

        tx.commit().await.map_err(statement_error)?;
        self.release_table_name(table);
        warn!("Dropped table {table}");
        Ok(())
    }
}

/// Factory creating [`GeoPackageStore`] containers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoPackageFactory;

#[async_trait]
impl DestinationFactory for GeoPackageFactory {
    fn short_name(&self) -> &'static str {
        "GPKG"
    }

    async fn create_container(&self, path: &Path) -> StoreResult<OpenedContainer> {
        let (store, status) = GeoPackageStore::open_or_create(path).await?;
        Ok(OpenedContainer {
            store: Box::new(store),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_double_quotes() {
        assert_eq!(quote("Roads"), "\"Roads\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn application_id_spells_gpkg() {
        assert_eq!(APPLICATION_ID.to_be_bytes()[4..], *b"GPKG");
    }

    #[tokio::test]
    async fn validate_reserves_names_within_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let (store, status) = GeoPackageStore::open_or_create(dir.path().join("out.gpkg"))
            .await
            .unwrap();
        assert_eq!(status, ContainerStatus::Created);

        let first = store.validate_table_name("Parcels").await.unwrap();
        let second = store.validate_table_name("Parcels").await.unwrap();
        let third = store.validate_table_name("PARCELS").await.unwrap();
        assert_eq!(first, "Parcels");
        assert_eq!(second, "Parcels_1");
        assert_eq!(third, "PARCELS_2");
    }

    #[tokio::test]
    async fn released_names_are_handed_out_again() {
        let dir = tempfile::TempDir::new().unwrap();
        let (store, _) = GeoPackageStore::open_or_create(dir.path().join("out.gpkg"))
            .await
            .unwrap();

        let first = store.validate_table_name("Roads").await.unwrap();
        store.release_table_name(&first);
        assert_eq!(store.validate_table_name("roads").await.unwrap(), "roads");
        assert_eq!(store.validate_table_name("Roads").await.unwrap(), "Roads_1");
    }

    #[tokio::test]
    async fn validate_avoids_metadata_tables() {
        let dir = tempfile::TempDir::new().unwrap();
        let (store, _) = GeoPackageStore::open_or_create(dir.path().join("out.gpkg"))
            .await
            .unwrap();

        let name = store.validate_table_name("gpkg_contents").await.unwrap();
        assert_eq!(name, "T_gpkg_contents");
    }
}
