//! Custom error types for extraction runs.
//!
//! Errors are split by blast radius: [`ServiceError`] and container failures
//! abort the whole run, while [`LayerError`] is caught at the layer boundary
//! and folded into the failure count of the report.

use arcrest_core_common::StoreError;
use thiserror::Error;

/// Main error type for extraction runs.
///
/// This is the root error type that encompasses all domain-specific errors.
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Service discovery failed
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A single layer failed
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// The destination container could not be created or written
    #[error(transparent)]
    Container(#[from] StoreError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Service-level errors. Both variants abort the run.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service could not be reached, timed out or answered with a non-2xx status
    #[error("Service '{url}' is unreachable: {source}")]
    Unreachable {
        /// The requested address
        url: String,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The service answered but not with map service metadata
    #[error("Invalid metadata from '{url}': {message}")]
    InvalidMetadata {
        /// The requested address
        url: String,
        /// Why the metadata was rejected
        message: String,
    },
}

/// Per-layer errors. These never abort the run.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Network failure, timeout, non-2xx status or undecodable body
    #[error("Layer {layer_id}: request failed: {message}")]
    Transport {
        /// The layer id
        layer_id: i64,
        /// Description of the transport failure
        message: String,
    },

    /// The service returned an error object
    #[error("Layer {layer_id}: server reported an error: {message}")]
    ServerReported {
        /// The layer id
        layer_id: i64,
        /// The server message, verbatim
        message: String,
    },

    /// The query returned no features
    #[error("Layer {layer_id}: no features returned")]
    EmptyResult {
        /// The layer id
        layer_id: i64,
    },

    /// The features could not be converted into a table
    #[error("Layer {layer_id}: {source}")]
    Conversion {
        /// The layer id
        layer_id: i64,
        /// The conversion failure
        #[source]
        source: ConversionError,
    },
}

/// Errors raised while turning generic features into a persisted table.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A geometry is malformed
    #[error("Invalid geometry in feature {feature}: {message}")]
    InvalidGeometry {
        /// Index of the feature in the query result
        feature: usize,
        /// Description of the geometry problem
        message: String,
    },

    /// A geometry has a different shape than the layer's geometry kind
    #[error("Feature {feature} does not hold a {expected} geometry")]
    GeometryKindMismatch {
        /// Index of the feature in the query result
        feature: usize,
        /// The expected geometry kind
        expected: String,
    },

    /// Values of one attribute cannot be unified into a single column type
    #[error("Field '{field}' has incompatible type: expected {expected}, found {found}")]
    TypeMismatch {
        /// The attribute name
        field: String,
        /// Type inferred so far
        expected: String,
        /// Type of the conflicting value
        found: String,
    },

    /// An attribute value has no column representation (arrays or objects)
    #[error("Field '{field}' holds an unsupported {kind} value")]
    UnsupportedValue {
        /// The attribute name
        field: String,
        /// JSON kind of the value
        kind: String,
    },

    /// Encoding a geometry or building a batch failed
    #[error("Failed to encode {what}: {message}")]
    Encoding {
        /// What was being encoded
        what: String,
        /// Description of the failure
        message: String,
    },

    /// The destination container rejected the table or its rows
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration errors.
///
/// These errors occur when the request or options are invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option: {option}")]
    MissingRequired {
        /// The missing option name
        option: String,
    },
}

/// Type alias for Results using `ExtractError`.
pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(e) => e.user_message(),
            Self::Layer(e) => e.to_string(),
            Self::Container(e) => format!("Output container error: {e}"),
            Self::Config(e) => format!("Configuration error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Service(e) => e.recovery_suggestion(),
            Self::Container(StoreError::Open { .. }) => Some(
                "Make sure the output path points to a GeoPackage or to a file that does not exist yet."
                    .to_string(),
            ),
            Self::Container(StoreError::CreateDirectory { .. }) => {
                Some("Check permissions on the output directory.".to_string())
            },
            Self::Config(_) => Some("Run 'arcrest extract --help' for usage.".to_string()),
            _ => None,
        }
    }

    /// Check if this error aborts the whole run.
    ///
    /// Layer errors are the only recoverable kind: the run records them and
    /// moves on to the next layer.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Layer(_))
    }
}

impl ServiceError {
    fn user_message(&self) -> String {
        match self {
            Self::Unreachable { url, source } => {
                if source.is_timeout() {
                    format!("Service '{url}' did not answer in time")
                } else {
                    self.to_string()
                }
            },
            Self::InvalidMetadata { .. } => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Unreachable { .. } => Some(
                "Check the URL in a browser; it should end in '/MapServer'.".to_string(),
            ),
            Self::InvalidMetadata { .. } => {
                Some("Make sure the URL points to a map service, not a folder or layer.".to_string())
            },
        }
    }
}

impl LayerError {
    pub(crate) fn conversion(layer_id: i64, source: impl Into<ConversionError>) -> Self {
        Self::Conversion {
            layer_id,
            source: source.into(),
        }
    }
}
