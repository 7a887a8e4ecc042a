use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid report year '{0}': expected four digits, e.g. 2026")]
    InvalidYear(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Spreadsheet XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
