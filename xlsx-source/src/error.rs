//! FILENAME: xlsx-source/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum XlsxSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLSX read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}
