//! The spreadsheet seam.
//!
//! A [`Workbook`] is a set of named worksheets holding rows of text cells,
//! addressed the way spreadsheet users address them: row 1 is the header and
//! rows and columns are 1-based. The ledger only ever talks to this trait,
//! so the same reconciliation code runs against the remote sheet in
//! production and an in-memory [`LocalWorkbook`] in tests and single-host
//! deployments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{InventoryError, Result};
use crate::lot::Lot;
use crate::saving;
use crate::schema::Schema;

#[async_trait]
pub trait Workbook: Send + Sync {
    /// Titles of every worksheet, in tab order.
    async fn titles(&self) -> Result<Vec<String>>;

    /// Create an empty worksheet sized `rows` x `cols`.
    async fn add_worksheet(&self, title: &str, rows: usize, cols: usize) -> Result<()>;

    /// Every row of the worksheet, header included.
    async fn read_rows(&self, title: &str) -> Result<Vec<Vec<String>>>;

    /// Overwrite row `row` starting at column A.
    async fn update_row(&self, title: &str, row: usize, values: Vec<String>) -> Result<()>;

    async fn update_cell(&self, title: &str, row: usize, col: usize, value: String) -> Result<()>;

    /// Append after the last row that holds data.
    async fn append_row(&self, title: &str, values: Vec<String>) -> Result<()>;

    /// Remove row `row`, shifting the rows below it up.
    async fn delete_row(&self, title: &str, row: usize) -> Result<()>;
}

/// Rewrite the header row when it differs from `schema`.
pub async fn ensure_header(workbook: &dyn Workbook, title: &str, schema: &Schema) -> Result<()> {
    let rows = workbook.read_rows(title).await?;
    let headers = schema.headers();
    let current: Vec<&str> = rows
        .first()
        .map(|r| r.iter().map(|s| s.as_str()).collect())
        .unwrap_or_default();

    // Trailing empty cells after the header are not a mismatch.
    let trimmed: Vec<&str> = {
        let end = current
            .iter()
            .rposition(|c| !c.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);
        current[..end].to_vec()
    };

    if trimmed != headers {
        log::info!("rewriting header row of worksheet '{}'", title);
        workbook.update_row(title, 1, headers).await?;
    }
    Ok(())
}

/// Data rows of a worksheet as `(sheet row number, lot)`, blank rows skipped.
pub async fn list_records(
    workbook: &dyn Workbook,
    title: &str,
    schema: &Schema,
) -> Result<Vec<(usize, Lot)>> {
    ensure_header(workbook, title, schema).await?;
    let rows = workbook.read_rows(title).await?;
    Ok(rows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, row)| (i + 1, schema.decode(row)))
        .filter(|(_, lot)| !lot.is_blank())
        .collect())
}

pub async fn has_worksheet(workbook: &dyn Workbook, title: &str) -> Result<bool> {
    Ok(workbook.titles().await?.iter().any(|t| t == title))
}

/// One tab of a [`LocalWorkbook`]. `rows[0]` is sheet row 1.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Worksheet {
    pub title: String,
    pub rows: Vec<Vec<String>>,
}

impl Worksheet {
    fn cell_mut(&mut self, row: usize, col: usize) -> &mut String {
        if self.rows.len() < row {
            self.rows.resize(row, Vec::new());
        }
        let cells = &mut self.rows[row - 1];
        if cells.len() < col {
            cells.resize(col, String::new());
        }
        &mut cells[col - 1]
    }

    fn last_data_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

/// Worksheets kept in memory, optionally mirrored to a gzip-compressed file
/// after every mutation.
#[derive(Debug, Default)]
pub struct LocalWorkbook {
    sheets: RwLock<Vec<Worksheet>>,
    path: Option<PathBuf>,
}

impl LocalWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the workbook stored at `path`, starting empty if the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sheets = if path.exists() {
            saving::load_worksheets(&path)?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Vec::new()
        };
        log::info!(
            "opened local workbook {} with {} worksheet(s)",
            path.display(),
            sheets.len()
        );
        Ok(LocalWorkbook {
            sheets: RwLock::new(sheets),
            path: Some(path),
        })
    }

    /// Build a workbook from prepared worksheets, mostly for tests.
    pub fn with_worksheets(sheets: Vec<Worksheet>) -> Self {
        LocalWorkbook {
            sheets: RwLock::new(sheets),
            path: None,
        }
    }

    /// Copy of every worksheet.
    pub fn snapshot(&self) -> Vec<Worksheet> {
        self.sheets
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn with_sheet<T>(&self, title: &str, f: impl FnOnce(&mut Worksheet) -> Result<T>) -> Result<T> {
        let mut sheets = self
            .sheets
            .write()
            .map_err(|_| InventoryError::Backend("workbook lock poisoned".to_string()))?;
        let sheet = sheets
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| InventoryError::WorksheetNotFound(title.to_string()))?;
        let out = f(sheet)?;
        self.persist(&sheets)?;
        Ok(out)
    }

    fn persist(&self, sheets: &[Worksheet]) -> Result<()> {
        if let Some(path) = &self.path {
            saving::save_worksheets(sheets, path)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Workbook for LocalWorkbook {
    async fn titles(&self) -> Result<Vec<String>> {
        Ok(self.snapshot().into_iter().map(|s| s.title).collect())
    }

    async fn add_worksheet(&self, title: &str, _rows: usize, _cols: usize) -> Result<()> {
        let mut sheets = self
            .sheets
            .write()
            .map_err(|_| InventoryError::Backend("workbook lock poisoned".to_string()))?;
        if sheets.iter().any(|s| s.title == title) {
            return Err(InventoryError::WorksheetExists(title.to_string()));
        }
        sheets.push(Worksheet {
            title: title.to_string(),
            rows: Vec::new(),
        });
        self.persist(&sheets)
    }

    async fn read_rows(&self, title: &str) -> Result<Vec<Vec<String>>> {
        let sheets = self
            .sheets
            .read()
            .map_err(|_| InventoryError::Backend("workbook lock poisoned".to_string()))?;
        sheets
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.rows.clone())
            .ok_or_else(|| InventoryError::WorksheetNotFound(title.to_string()))
    }

    async fn update_row(&self, title: &str, row: usize, values: Vec<String>) -> Result<()> {
        if row == 0 {
            return Err(InventoryError::RowOutOfRange {
                title: title.to_string(),
                row,
            });
        }
        self.with_sheet(title, |sheet| {
            for (i, value) in values.into_iter().enumerate() {
                *sheet.cell_mut(row, i + 1) = value;
            }
            Ok(())
        })
    }

    async fn update_cell(&self, title: &str, row: usize, col: usize, value: String) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(InventoryError::RowOutOfRange {
                title: title.to_string(),
                row,
            });
        }
        self.with_sheet(title, |sheet| {
            *sheet.cell_mut(row, col) = value;
            Ok(())
        })
    }

    async fn append_row(&self, title: &str, values: Vec<String>) -> Result<()> {
        self.with_sheet(title, |sheet| {
            let at = sheet.last_data_row();
            sheet.rows.truncate(at);
            sheet.rows.push(values);
            Ok(())
        })
    }

    async fn delete_row(&self, title: &str, row: usize) -> Result<()> {
        self.with_sheet(title, |sheet| {
            if row == 0 || row > sheet.rows.len() {
                return Err(InventoryError::RowOutOfRange {
                    title: sheet.title.clone(),
                    row,
                });
            }
            sheet.rows.remove(row - 1);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_worksheet_is_reported_by_title() {
        let wb = LocalWorkbook::new();
        let err = wb.read_rows("Stock").await.unwrap_err();
        assert!(matches!(err, InventoryError::WorksheetNotFound(t) if t == "Stock"));
    }

    #[tokio::test]
    async fn duplicate_worksheet_is_rejected() {
        let wb = LocalWorkbook::new();
        wb.add_worksheet("Stock", 100, 10).await.unwrap();
        let err = wb.add_worksheet("Stock", 100, 10).await.unwrap_err();
        assert!(matches!(err, InventoryError::WorksheetExists(_)));
        assert_eq!(wb.titles().await.unwrap(), vec!["Stock"]);
    }

    #[tokio::test]
    async fn update_cell_grows_the_grid() {
        let wb = LocalWorkbook::new();
        wb.add_worksheet("Stock", 100, 10).await.unwrap();
        wb.update_cell("Stock", 3, 2, "x".to_string()).await.unwrap();

        let rows = wb.read_rows("Stock").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], strings(&["", "x"]));
    }

    #[tokio::test]
    async fn append_lands_after_the_last_data_row() {
        let wb = LocalWorkbook::with_worksheets(vec![Worksheet {
            title: "Stock".into(),
            rows: vec![strings(&["No"]), strings(&["1"]), strings(&["", ""])],
        }]);
        wb.append_row("Stock", strings(&["2"])).await.unwrap();

        let rows = wb.read_rows("Stock").await.unwrap();
        assert_eq!(rows, vec![strings(&["No"]), strings(&["1"]), strings(&["2"])]);
    }

    #[tokio::test]
    async fn delete_row_shifts_rows_up_and_checks_range() {
        let wb = LocalWorkbook::with_worksheets(vec![Worksheet {
            title: "Stock".into(),
            rows: vec![strings(&["No"]), strings(&["1"]), strings(&["2"])],
        }]);
        wb.delete_row("Stock", 2).await.unwrap();
        assert_eq!(
            wb.read_rows("Stock").await.unwrap(),
            vec![strings(&["No"]), strings(&["2"])]
        );

        let err = wb.delete_row("Stock", 9).await.unwrap_err();
        assert!(matches!(err, InventoryError::RowOutOfRange { row: 9, .. }));
    }

    #[tokio::test]
    async fn ensure_header_rewrites_only_on_mismatch() {
        let schema = Schema::consumed();
        let mut header = schema.headers();
        header.push(String::new());
        let wb = LocalWorkbook::with_worksheets(vec![Worksheet {
            title: "Consumed".into(),
            rows: vec![header],
        }]);

        ensure_header(&wb, "Consumed", &schema).await.unwrap();
        // The trailing blank cell is tolerated and left alone.
        assert_eq!(wb.read_rows("Consumed").await.unwrap()[0].len(), 10);

        let wb = LocalWorkbook::with_worksheets(vec![Worksheet {
            title: "Consumed".into(),
            rows: vec![strings(&["Nama", "Jumlah"])],
        }]);
        ensure_header(&wb, "Consumed", &schema).await.unwrap();
        assert_eq!(wb.read_rows("Consumed").await.unwrap()[0], schema.headers());
    }

    #[tokio::test]
    async fn list_records_numbers_rows_from_two_and_skips_blanks() {
        let schema = Schema::stock();
        let wb = LocalWorkbook::with_worksheets(vec![Worksheet {
            title: "Stock".into(),
            rows: vec![
                schema.headers(),
                strings(&["1", "INV-1", "Sensor", "2024-01-01", "2023", "A", "4", "Good", "Rina", ""]),
                vec![],
                strings(&["2", "INV-2", "Filter", "2024-01-02", "2023", "A", "1", "Good", "Rina", ""]),
            ],
        }]);

        let records = list_records(&wb, "Stock", &schema).await.unwrap();
        let rows: Vec<usize> = records.iter().map(|(r, _)| *r).collect();
        assert_eq!(rows, vec![2, 4]);
        assert_eq!(records[1].1.name, "Filter");
    }

    #[tokio::test]
    async fn opened_workbook_persists_every_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("stock.bin.gz");

        let wb = LocalWorkbook::open(&path).unwrap();
        wb.add_worksheet("Stock", 100, 10).await.unwrap();
        wb.append_row("Stock", strings(&["No", "Item Name"])).await.unwrap();
        drop(wb);

        let reopened = LocalWorkbook::open(&path).unwrap();
        assert_eq!(
            reopened.read_rows("Stock").await.unwrap(),
            vec![strings(&["No", "Item Name"])]
        );
    }
}
