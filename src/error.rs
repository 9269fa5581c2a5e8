use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BiolinksError {
    #[error("no conversion found for id: {0}")]
    ConversionFailed(String),

    #[error("cached record expired: {0}")]
    CacheStale(String),

    #[error("no cached record for: {0}")]
    CacheMiss(String),

    #[error("no link template defined for database: {0}")]
    HostNotDefined(String),

    #[error("upstream rejected the request with status {status}: {message}")]
    ClientRequest { status: u16, message: String },

    #[error("upstream failed with status {status}: {message}")]
    ServerRequest { status: u16, message: String },

    #[error("upstream returned unexpected status {status}: {message}")]
    UnknownRequest { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(String),

    #[error("id {id} does not fit the {limit}-byte url budget")]
    UrlBudget { id: String, limit: usize },

    #[error("store read failed: {0}")]
    StoreRead(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to decode XML: {0}")]
    Xml(String),

    #[error("failed to encode JSON: {0}")]
    Json(String),
}
