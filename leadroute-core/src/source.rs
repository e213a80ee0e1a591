//! Tabular lead source
//!
//! Rows live in a spreadsheet with a header row. Columns (0-based):
//! created_at = 0, id = 1, phone = 2, project tag = 4, processed marker = 8.
//! A row is processed once the marker cell holds [`PROCESSED_MARKER`].

use crate::normalize::RawLead;
use crate::sheets::{SheetsClient, SheetsError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

pub const COL_CREATED_AT: usize = 0;
pub const COL_ID: usize = 1;
pub const COL_PHONE: usize = 2;
pub const COL_PROJECT_TAG: usize = 4;
pub const COL_PROCESSED: usize = 8;

pub const PROCESSED_MARKER: &str = "✅";

/// First data row (1-based, below the header)
const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Lead source not configured: {0}")]
    NotConfigured(String),

    #[error("Lead source unavailable: {0}")]
    Sheets(#[from] SheetsError),
}

/// One data row with its position in the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based sheet row number
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl SourceRow {
    /// Pads short rows so every known column exists
    pub fn new(row_number: usize, mut cells: Vec<String>) -> Self {
        if cells.len() <= COL_PROCESSED {
            cells.resize(COL_PROCESSED + 1, String::new());
        }
        Self { row_number, cells }
    }

    fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn is_processed(&self) -> bool {
        self.cell(COL_PROCESSED).trim() == PROCESSED_MARKER
    }

    pub fn to_raw_lead(&self) -> RawLead {
        RawLead {
            created_at: Some(self.cell(COL_CREATED_AT).to_string()),
            id: self.cell(COL_ID).to_string(),
            phone: self.cell(COL_PHONE).to_string(),
            tag: self.cell(COL_PROJECT_TAG).to_string(),
        }
    }
}

#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Rows without the processed marker; with `force`, every data row
    async fn fetch_unprocessed_rows(&self, force: bool) -> Result<Vec<SourceRow>, SourceError>;

    async fn mark_processed(&self, row_number: usize) -> Result<(), SourceError>;
}

/// Spreadsheet-backed source
pub struct SheetsSource {
    sheets: SheetsClient,
    spreadsheet_id: String,
    sheet_name: String,
}

impl SheetsSource {
    pub fn new(sheets: SheetsClient, spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            sheets,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
        }
    }
}

/// Data rows of a `A2:I` value range, optionally keeping processed ones
pub fn select_rows(values: Vec<Vec<String>>, force: bool) -> Vec<SourceRow> {
    values
        .into_iter()
        .enumerate()
        .map(|(idx, cells)| SourceRow::new(idx + FIRST_DATA_ROW, cells))
        .filter(|row| force || !row.is_processed())
        .collect()
}

#[async_trait]
impl TabularSource for SheetsSource {
    async fn fetch_unprocessed_rows(&self, force: bool) -> Result<Vec<SourceRow>, SourceError> {
        let range = format!("{}!A{}:I", self.sheet_name, FIRST_DATA_ROW);
        let values = self.sheets.get_values(&self.spreadsheet_id, &range).await?;
        let total = values.len();

        let rows = select_rows(values, force);
        info!(total, selected = rows.len(), force, "Fetched source rows");
        Ok(rows)
    }

    async fn mark_processed(&self, row_number: usize) -> Result<(), SourceError> {
        let range = format!("{}!I{}", self.sheet_name, row_number);
        self.sheets
            .update_values(&self.spreadsheet_id, &range, vec![vec![PROCESSED_MARKER.to_string()]])
            .await?;
        debug!(row_number, "Source row marked processed");
        Ok(())
    }
}
