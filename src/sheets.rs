#![cfg(feature = "web")]
//! Remote workbook over the Google Sheets v4 REST API.
//!
//! Values are written with `USER_ENTERED` so numbers land as numbers, and
//! read back formatted, which is why every cell crosses this boundary as
//! text. The bearer token comes from configuration; minting it belongs to
//! the deployment, not to this client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::{InventoryError, Result};
use crate::workbook::Workbook;

pub const DEFAULT_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct SheetsWorkbook {
    client: reqwest::Client,
    endpoint: String,
    spreadsheet_id: String,
    token: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsWorkbook {
    pub fn new(spreadsheet_id: &str, token: &str) -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, spreadsheet_id, token)
    }

    pub fn with_endpoint(endpoint: &str, spreadsheet_id: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| InventoryError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(SheetsWorkbook {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            self.endpoint,
            self.spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    async fn sheets_meta(&self) -> Result<Vec<SheetProperties>> {
        let url = format!(
            "{}/{}?fields=sheets.properties",
            self.endpoint, self.spreadsheet_id
        );
        let response = self.client.get(url).bearer_auth(&self.token).send().await;
        let meta: SpreadsheetMeta = decode(response, None).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn batch_update(&self, requests: Value) -> Result<()> {
        let url = format!("{}/{}:batchUpdate", self.endpoint, self.spreadsheet_id);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "requests": requests }))
            .send()
            .await;
        decode::<Value>(response, None).await.map(|_| ())
    }

    async fn put_values(&self, title: &str, range: &str, values: Vec<String>) -> Result<()> {
        let url = self.values_url(range, "?valueInputOption=USER_ENTERED");
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await;
        decode::<Value>(response, Some(title)).await.map(|_| ())
    }
}

#[async_trait]
impl Workbook for SheetsWorkbook {
    async fn titles(&self) -> Result<Vec<String>> {
        Ok(self.sheets_meta().await?.into_iter().map(|p| p.title).collect())
    }

    async fn add_worksheet(&self, title: &str, rows: usize, cols: usize) -> Result<()> {
        self.batch_update(json!([{
            "addSheet": {
                "properties": {
                    "title": title,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                }
            }
        }]))
        .await
    }

    async fn read_rows(&self, title: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(&quote_title(title), "?majorDimension=ROWS");
        let response = self.client.get(url).bearer_auth(&self.token).send().await;
        let range: ValueRange = decode(response, Some(title)).await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn update_row(&self, title: &str, row: usize, values: Vec<String>) -> Result<()> {
        let range = format!("{}!A{}", quote_title(title), row);
        self.put_values(title, &range, values).await
    }

    async fn update_cell(&self, title: &str, row: usize, col: usize, value: String) -> Result<()> {
        let range = format!("{}!{}{}", quote_title(title), column_letter(col), row);
        self.put_values(title, &range, vec![value]).await
    }

    async fn append_row(&self, title: &str, values: Vec<String>) -> Result<()> {
        let range = format!("{}!A1", quote_title(title));
        let url = self.values_url(
            &range,
            ":append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await;
        decode::<Value>(response, Some(title)).await.map(|_| ())
    }

    async fn delete_row(&self, title: &str, row: usize) -> Result<()> {
        if row == 0 {
            return Err(InventoryError::RowOutOfRange {
                title: title.to_string(),
                row,
            });
        }
        let sheet_id = self
            .sheets_meta()
            .await?
            .into_iter()
            .find(|p| p.title == title)
            .map(|p| p.sheet_id)
            .ok_or_else(|| InventoryError::WorksheetNotFound(title.to_string()))?;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": row - 1,
                    "endIndex": row
                }
            }
        }]))
        .await
    }
}

/// Turn an HTTP exchange into a typed body. A range the service cannot parse
/// means the worksheet does not exist.
async fn decode<T: for<'de> Deserialize<'de>>(
    response: reqwest::Result<reqwest::Response>,
    title: Option<&str>,
) -> Result<T> {
    let response = response.map_err(|e| InventoryError::Backend(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if let Some(title) = title {
            if status.as_u16() == 400 && body.contains("Unable to parse range") {
                return Err(InventoryError::WorksheetNotFound(title.to_string()));
            }
        }
        return Err(InventoryError::Backend(format!("{}: {}", status, body.trim())));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| InventoryError::Backend(format!("unexpected response: {}", e)))
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A1-notation sheet reference: single quotes around the title, embedded
/// quotes doubled.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Convert a 1-based column number to letters (1 = A, 27 = AA).
pub fn column_letter(col: usize) -> String {
    let mut name = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}
