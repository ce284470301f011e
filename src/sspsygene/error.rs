use std::path::PathBuf;

use thiserror::Error;

use crate::types::{DatasetName, TableName};

// errors that abort the whole run, the output store is not swapped
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read pipeline config {path}: {message}")]
    ConfigRead { path: PathBuf, message: String },

    #[error("homology/synonym source file not found: {0}")]
    MissingSourceFile(PathBuf),

    #[error("malformed source file {path}: {reason}")]
    MalformedSourceFile { path: PathBuf, reason: String },

    #[error("can't read datasets directory {path}: {source}")]
    DatasetsRootUnreadable { path: PathBuf, source: std::io::Error },

    #[error("table {table} from dataset {dataset} collides with a table that is already loaded")]
    TableNameCollision { table: TableName, dataset: DatasetName },

    #[error("table {0} is already registered in data_tables")]
    MetadataDuplicate(TableName),

    #[error("failed to move {staging} into place as {output}: {source}")]
    Swap { staging: PathBuf, output: PathBuf, source: std::io::Error },

    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// errors that abort loading of one dataset, other datasets are still loaded
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid config in {dataset}, field \"{field}\": {message}")]
    ConfigValidation { dataset: DatasetName, field: String, message: String },

    #[error("failed to read {path}: {message}")]
    InputFile { path: PathBuf, message: String },

    #[error("table {table}: column \"{column}\" not found, available columns: {available}")]
    MissingColumn { table: TableName, column: String, available: String },

    #[error("table {table}: {message}")]
    InvalidColumns { table: TableName, message: String },

    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl DatasetError {
    pub fn config(dataset: &str, field: &str, message: impl Into<String>) -> DatasetError {
        DatasetError::ConfigValidation {
            dataset: dataset.to_owned(),
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

// non-fatal, reported in the run summary
#[derive(Debug, Error, Clone, PartialEq)]
#[error("table {table}: skipped {skipped} of {total} rows ({percent:.1}%), more than the allowed {max_percent:.1}%")]
pub struct DatasetQualityError {
    pub table: TableName,
    pub skipped: usize,
    pub total: usize,
    pub percent: f64,
    pub max_percent: f64,
}

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type DatasetResult<T> = Result<T, DatasetError>;
