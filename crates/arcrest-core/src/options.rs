//! Extraction request and options.
//!
//! [`ExtractionRequest`] holds what to extract and where to, normalised from
//! user input. [`ExtractionOptions`] holds the knobs that have sensible
//! defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arcrest_geopackage::FID_COLUMN;
use url::Url;

use crate::error::ConfigError;

/// Output spatial reference requested from the service by default
/// (NAD83 / Texas South Central, US feet).
pub const DEFAULT_OUT_SR: i32 = 2278;

/// Timeout for service and layer metadata requests.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for feature queries.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the geometry column of every extracted table.
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geom";

/// What to extract and where to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    base_url: String,
    destination: PathBuf,
    layer_ids: Option<BTreeSet<i64>>,
}

impl ExtractionRequest {
    /// Builds a request from raw user input.
    ///
    /// The base address is trimmed and loses its trailing slashes, the
    /// destination loses surrounding quote characters (as pasted from a file
    /// manager), and an empty layer id list means "all layers".
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the address or destination is empty, or the
    /// address is not an `http`/`https` URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcrest_core::options::ExtractionRequest;
    ///
    /// let request = ExtractionRequest::new(
    ///     " https://gis.example.com/arcgis/rest/services/City/MapServer/ ",
    ///     "\"/data/city.gpkg\"",
    ///     Some(vec![]),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(request.base_url(), "https://gis.example.com/arcgis/rest/services/City/MapServer");
    /// assert_eq!(request.destination().to_str(), Some("/data/city.gpkg"));
    /// assert!(request.layer_ids().is_none());
    /// ```
    pub fn new(
        base_url: &str,
        destination: &str,
        layer_ids: Option<Vec<i64>>,
    ) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(base_url)?;

        let destination = destination.trim().trim_matches('"').trim_matches('\'').trim();
        if destination.is_empty() {
            return Err(ConfigError::MissingRequired {
                option: "output".to_string(),
            });
        }

        let layer_ids = layer_ids
            .map(|ids| ids.into_iter().collect::<BTreeSet<_>>())
            .filter(|ids| !ids.is_empty());

        Ok(Self {
            base_url,
            destination: PathBuf::from(destination),
            layer_ids,
        })
    }

    /// The service base address, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path of the destination container.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Requested layer ids, or `None` for all layers.
    #[must_use]
    pub fn layer_ids(&self) -> Option<&BTreeSet<i64>> {
        self.layer_ids.as_ref()
    }
}

/// Normalises and validates a map service base address.
///
/// # Errors
///
/// Returns [`ConfigError`] if the address is empty or not an `http`/`https` URL.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let base_url = raw.trim().trim_end_matches('/');
    if base_url.is_empty() {
        return Err(ConfigError::MissingRequired {
            option: "url".to_string(),
        });
    }

    let parsed = Url::parse(base_url).map_err(|e| ConfigError::InvalidOption {
        option: "url".to_string(),
        message: format!("'{base_url}' is not a valid URL: {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidOption {
            option: "url".to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.query().is_some() {
        return Err(ConfigError::InvalidOption {
            option: "url".to_string(),
            message: "the service address must not carry a query string".to_string(),
        });
    }

    Ok(base_url.to_string())
}

/// Tunable settings of an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Spatial reference the service should project geometries into
    /// (default: 2278). `None` keeps the service's native reference.
    pub out_sr: Option<i32>,
    /// Timeout for metadata requests (default: 10 s)
    pub metadata_timeout: Duration,
    /// Timeout for feature queries (default: 30 s)
    pub query_timeout: Duration,
    /// Name of the geometry column (default: "geom")
    pub geometry_column_name: String,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            out_sr: Some(DEFAULT_OUT_SR),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            geometry_column_name: DEFAULT_GEOMETRY_COLUMN.to_string(),
            user_agent: format!("arcrest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ExtractionOptions {
    /// Create new options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output spatial reference
    #[must_use]
    pub fn with_out_sr(mut self, out_sr: Option<i32>) -> Self {
        self.out_sr = out_sr;
        self
    }

    /// Set the metadata request timeout
    #[must_use]
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Set the feature query timeout
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the geometry column name
    #[must_use]
    pub fn with_geometry_column_name(mut self, name: impl Into<String>) -> Self {
        self.geometry_column_name = name.into();
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Checks that the options can be used for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for zero timeouts or a geometry
    /// column name that is not a plain identifier or that collides with the
    /// primary key column.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_timeout.is_zero() {
            return Err(ConfigError::InvalidOption {
                option: "metadata-timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.query_timeout.is_zero() {
            return Err(ConfigError::InvalidOption {
                option: "query-timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let name = &self.geometry_column_name;
        let is_identifier = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !is_identifier {
            return Err(ConfigError::InvalidOption {
                option: "geometry-column".to_string(),
                message: format!("'{name}' is not a valid column name"),
            });
        }
        if name.eq_ignore_ascii_case(FID_COLUMN) {
            return Err(ConfigError::InvalidOption {
                option: "geometry-column".to_string(),
                message: format!("'{name}' is reserved for the primary key"),
            });
        }
        Ok(())
    }
}
