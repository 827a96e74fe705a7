//! Spreadsheet side: a small worksheet API, its Google Sheets implementation,
//! and the projector that mirrors the ledger onto the monthly and daily views.

pub mod a1;
mod auth;
mod google;
pub mod projector;

pub use google::GoogleSheets;

use async_trait::async_trait;
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Sheets API rate limited: {0}")]
    RateLimited(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("unexpected Sheets response: {0}")]
    Parse(String),

    #[error("column '{header}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, header: String },
}

impl Retryable for SheetsError {
    fn is_transient(&self) -> bool {
        match self {
            SheetsError::Http(_) | SheetsError::RateLimited(_) => true,
            SheetsError::Api { status, .. } => *status >= 500,
            SheetsError::Credentials(_)
            | SheetsError::Parse(_)
            | SheetsError::MissingColumn { .. } => false,
        }
    }
}

/// One tab of the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub id: i64,
    pub title: String,
    pub index: u32,
}

/// A block of values written starting at an A1 cell (e.g. `C4`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub anchor: String,
    pub values: Vec<Vec<String>>,
}

impl CellWrite {
    pub fn single(row: u32, col: u32, value: impl Into<String>) -> Self {
        Self {
            anchor: a1::rowcol_to_a1(row, col),
            values: vec![vec![value.into()]],
        }
    }

    pub fn row(row: u32, col: u32, values: Vec<String>) -> Self {
        Self {
            anchor: a1::rowcol_to_a1(row, col),
            values: vec![values],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Rgb {
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }
}

/// Rectangle of cells, 1-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpan {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

/// Conditional format: paint `background` where the cell text equals `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRule {
    pub span: GridSpan,
    pub text: String,
    pub background: Rgb,
}

/// Worksheet operations the projector needs. Row and column numbers are 1-based.
#[async_trait]
pub trait Spreadsheet: Send + Sync {
    async fn worksheets(&self) -> Result<Vec<Worksheet>, SheetsError>;

    async fn add_worksheet(&self, title: &str, rows: u32, cols: u32)
    -> Result<Worksheet, SheetsError>;

    async fn rename_worksheet(
        &self,
        sheet: &Worksheet,
        title: &str,
    ) -> Result<Worksheet, SheetsError>;

    /// Removes all values from the worksheet.
    async fn clear(&self, sheet: &Worksheet) -> Result<(), SheetsError>;

    /// Values of one row, trailing empty cells omitted.
    async fn row_values(&self, sheet: &Worksheet, row: u32) -> Result<Vec<String>, SheetsError>;

    /// Values of one column, trailing empty cells omitted.
    async fn col_values(&self, sheet: &Worksheet, col: u32) -> Result<Vec<String>, SheetsError>;

    async fn batch_write(&self, sheet: &Worksheet, writes: &[CellWrite])
    -> Result<(), SheetsError>;

    /// Appends rows below the last non-empty row.
    async fn append_rows(&self, sheet: &Worksheet, rows: &[Vec<String>])
    -> Result<(), SheetsError>;

    /// Drops every conditional format rule on the worksheet, then adds `rules` in order.
    async fn replace_conditional_rules(
        &self,
        sheet: &Worksheet,
        rules: &[TextRule],
    ) -> Result<(), SheetsError>;

    /// Bold, grey header row over the first `cols` columns.
    async fn format_header(&self, sheet: &Worksheet, cols: u32) -> Result<(), SheetsError>;
}
