//! Google Sheets v4 REST client
//!
//! Shared by the tabular lead source, the spreadsheet delivery channel and
//! destination verification. Authentication is a pre-provisioned OAuth
//! bearer token from configuration.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Sheets access token not configured")]
    MissingToken,

    #[error("Invalid Sheets API URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Sheets API error {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Unexpected Sheets response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SheetsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SheetsError::Malformed(err.to_string())
        } else {
            SheetsError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    api_base: String,
    access_token: Option<String>,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            access_token,
        }
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Cell values of `range`; every cell rendered as text
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "values", range], &[])?;
        let response = self.http.get(url).bearer_auth(self.token()?).send().await?;
        let body: ValueRange = check_status(response).await?.json().await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// Overwrite `range` with `values` (RAW input)
    pub async fn update_values(&self, spreadsheet_id: &str, range: &str, values: Vec<Vec<String>>) -> Result<(), SheetsError> {
        let url = self.url(
            &["spreadsheets", spreadsheet_id, "values", range],
            &[("valueInputOption", "RAW")],
        )?;
        let response = self
            .http
            .put(url)
            .bearer_auth(self.token()?)
            .json(&json!({ "range": range, "values": values }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Append one row after the last non-empty row of `range`
    pub async fn append_row(&self, spreadsheet_id: &str, range: &str, row: Vec<String>) -> Result<(), SheetsError> {
        let segment = format!("{}:append", range);
        let url = self.url(
            &["spreadsheets", spreadsheet_id, "values", &segment],
            &[("valueInputOption", "USER_ENTERED"), ("insertDataOption", "INSERT_ROWS")],
        )?;
        let response = self
            .http
            .post(url)
            .bearer_auth(self.token()?)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Whether `spreadsheet_id` is reachable and contains a tab titled `sheet_name`
    pub async fn sheet_exists(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<bool, SheetsError> {
        let url = self.url(&["spreadsheets", spreadsheet_id], &[("fields", "sheets.properties.title")])?;
        let response = self.http.get(url).bearer_auth(self.token()?).send().await?;
        let meta: SpreadsheetMeta = check_status(response).await?.json().await?;
        Ok(meta.sheets.iter().any(|s| s.properties.title == sheet_name))
    }

    fn token(&self) -> Result<&str, SheetsError> {
        self.access_token.as_deref().ok_or(SheetsError::MissingToken)
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| SheetsError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SheetsError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
