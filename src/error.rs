use thiserror::Error;

/// Upload problems shown to the operator as a message.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("File not found. Browse to select again.")]
    NotFound,
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported file type \"{0}\". Upload a CSV, TXT or XLSX file.")]
    UnsupportedFormat(String),
    #[error("Could not parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not open spreadsheet: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Spreadsheet has no sheets.")]
    NoSheets,
    #[error("No records found. Check the file layout.")]
    NoRecords,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Preferences database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("Could not create preferences folder: {0}")]
    Io(#[from] std::io::Error),
    #[error("Preferences store is unavailable")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("Nothing to print: no row has a selection yet.")]
    NothingToPrint,
    #[error("Could not find Downloads or Desktop folder.")]
    NoExportDir,
    #[error("Invalid path characters.")]
    InvalidPath,
    #[error("Could not write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
