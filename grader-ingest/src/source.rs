//! Tabular import sources: a JSON export of spreadsheet rows, or a range read
//! through the Google Sheets values API.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

/// A header row plus data rows, every cell rendered as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Build from an array of row objects. Headers are the union of keys in
    /// first-seen order.
    pub fn from_records(records: &[Value]) -> Result<Self, SourceError> {
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            let obj = record
                .as_object()
                .ok_or_else(|| SourceError::Unsupported("rows must be JSON objects".to_string()))?;
            for key in obj.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Ok(Self { headers, rows })
    }

    /// Build from a values grid whose first row is the header. Short rows are
    /// padded with empty cells.
    pub fn from_values(values: &[Vec<Value>]) -> Self {
        let Some((head, body)) = values.split_first() else {
            return Self::default();
        };
        let headers: Vec<String> = head.iter().map(cell_text).collect();
        let rows = body
            .iter()
            .map(|row| {
                (0..headers.len())
                    .map(|i| row.get(i).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    /// Rows as header → trimmed value maps; blank cells are omitted.
    pub fn records(&self) -> impl Iterator<Item = HashMap<&str, &str>> + '_ {
        self.rows.iter().map(move |row| {
            self.headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.as_str(), v.trim()))
                .filter(|(_, v)| !v.is_empty())
                .collect()
        })
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a JSON file holding an array of row objects, or a
/// `{"values": [[...], ...]}` grid as saved from the Sheets API.
pub async fn load_json_file(path: &Path) -> Result<Sheet, SourceError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let value: Value = serde_json::from_str(&raw)?;
    match value {
        Value::Array(records) => Sheet::from_records(&records),
        Value::Object(_) => {
            let grid: ValueRange = serde_json::from_value(value)?;
            Ok(Sheet::from_values(&grid.values))
        }
        _ => Err(SourceError::Unsupported(format!(
            "{} is neither a row array nor a values grid",
            path.display()
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SheetsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, SHEETS_API_BASE)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// `GET /spreadsheets/{id}/values/{range}`
    pub async fn fetch(&self, spreadsheet_id: &str, range: &str) -> Result<Sheet, SourceError> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url, spreadsheet_id, range
        );
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let grid: ValueRange = response.json().await?;
        tracing::info!(spreadsheet_id, range, rows = grid.values.len(), "Fetched sheet");
        Ok(Sheet::from_values(&grid.values))
    }
}
