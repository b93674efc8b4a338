use std::path::PathBuf;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::browser::BrowserError;
use crate::db::DatabaseError;
use crate::error::DocumentError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No job found for '{id}'")]
    JobNotFound { id: String },

    #[error("No job source named '{name}' is registered")]
    UnknownSource { name: String },

    #[error("No apply adapter matches URL '{url}'")]
    NoApplyAdapter { url: String },

    #[error("Failed to read URL file '{path}': {source}")]
    ReadUrlFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create run directory '{path}': {source}")]
    CreateRunDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}
