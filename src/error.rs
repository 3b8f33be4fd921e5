use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to load the FIPS reference table. Always fatal to a run.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read reference table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse reference table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed row {line} in {path}: {message}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("conflicting row {line} in {path}: {message}")]
    ConflictingRow {
        path: PathBuf,
        line: u64,
        message: String,
    },
}

/// A reference query with no matching row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no state with FIPS code '{0}'")]
    StateNotFound(String),
    #[error("no state named '{0}'")]
    StateNameNotFound(String),
    #[error("no county '{county}' in state '{state}'")]
    CountyNotFound { state: String, county: String },
    #[error("'{0}' is not a 5-digit county FIPS code")]
    InvalidFips(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid OSM XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid OSM PBF: {0}")]
    Pbf(#[from] osmpbfreader::Error),
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
