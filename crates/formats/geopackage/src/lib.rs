//! OGC GeoPackage destination for `arcrest`.
//!
//! A GeoPackage is a single SQLite file holding feature tables plus the
//! `gpkg_*` metadata tables that register them. This crate creates such
//! files, turns arbitrary layer names into legal table names, and writes Arrow
//! record batches whose geometry column carries WKB, stored as GeoPackage
//! geometry blobs encoded with `geozero`.

pub mod container;
pub mod naming;
pub mod types;
mod values;

pub use container::{FID_COLUMN, GeoPackageFactory, GeoPackageStore};
