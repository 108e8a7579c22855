use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur when loading or querying step catalogs
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    /// The catalog document could not be parsed
    #[error("Catalog parse error: {0}")]
    ParseError(String),

    /// The catalog file could not be read
    #[error("Catalog I/O error: {0}")]
    IoError(String),

    /// Error communicating with the live catalog endpoint
    #[error("Communication error: {0}")]
    CommunicationError(String),

    /// The live catalog endpoint answered with an unexpected status or body
    #[error("Unexpected live catalog response ({status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// No credentials are configured for the live catalog
    #[error("Live catalog credentials are not configured")]
    MissingCredentials,
}

impl CatalogError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::ParseError(_) => "ERR_CATALOG_PARSE",
            CatalogError::IoError(_) => "ERR_CATALOG_IO",
            CatalogError::CommunicationError(_) => "ERR_CATALOG_COMMUNICATION",
            CatalogError::UnexpectedResponse { .. } => "ERR_CATALOG_UNEXPECTED_RESPONSE",
            CatalogError::MissingCredentials => "ERR_CATALOG_MISSING_CREDENTIALS",
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::IoError(err.to_string())
    }
}
