#[cfg(feature = "web")]
use std::error::Error;

use crate::ledger::View;

/// Convert a stock view to CSV format
///
/// The first line is the worksheet's header row, followed by one line per
/// row of the (filtered) view. Fields containing commas, quotes or newlines
/// are quoted, with embedded quotes doubled.
///
/// # Arguments
/// * `view` - The view to export, as returned by `Ledger::view`
///
/// # Returns
/// * `String` - CSV content
pub fn to_csv(view: &View) -> String {
    let mut csv_content = String::new();

    push_record(&mut csv_content, &view.headers);
    for row in &view.rows {
        push_record(&mut csv_content, &row.cells);
    }

    csv_content
}

fn push_record(out: &mut String, fields: &[String]) {
    for (i, value) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

/// Convert a stock view to XLSX format
///
/// Writes the header row in bold, then the view's rows. The quantity and
/// sequence columns are written as numbers so they sum in Excel.
///
/// # Arguments
/// * `view` - The view to export
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(view: &View) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name(&view.sheet))?;

    let bold = Format::new().set_bold();
    for (c, header) in view.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, header, &bold)?;
    }

    for (r, row) in view.rows.iter().enumerate() {
        let xr = (r + 1) as u32;
        for (c, cell) in row.cells.iter().enumerate() {
            match cell.parse::<f64>() {
                Ok(n) if !cell.is_empty() && looks_numeric(cell) => {
                    worksheet.write_number(xr, c as u16, n)?;
                }
                _ => {
                    worksheet.write_string(xr, c as u16, cell)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// Codes such as "007" or dates stay text; plain integers become numbers.
fn looks_numeric(cell: &str) -> bool {
    let digits = cell.strip_prefix('-').unwrap_or(cell);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && !(digits.len() > 1 && digits.starts_with('0'))
}

/// Excel limits sheet names to 31 characters and forbids a few symbols.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ViewRow;
    use crate::lot::{Highlight, Lot};

    fn view(cells: Vec<Vec<&str>>) -> View {
        View {
            location: "Main Warehouse".into(),
            sheet: "Stock".into(),
            headers: vec!["No".into(), "Item Name".into(), "Notes".into()],
            rows: cells
                .into_iter()
                .enumerate()
                .map(|(i, c)| ViewRow {
                    row: i + 2,
                    lot: Lot::default(),
                    cells: c.into_iter().map(String::from).collect(),
                    highlight: Highlight::None,
                })
                .collect(),
            total: 0,
        }
    }

    #[test]
    fn csv_has_header_and_escapes_fields() {
        let csv = to_csv(&view(vec![
            vec!["1", "Sensor", "plain"],
            vec!["2", "Filter, HEPA", "said \"fragile\""],
        ]));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "No,Item Name,Notes");
        assert_eq!(lines[1], "1,Sensor,plain");
        assert_eq!(lines[2], "2,\"Filter, HEPA\",\"said \"\"fragile\"\"\"");
    }

    #[test]
    fn numeric_detection_keeps_codes_as_text() {
        assert!(looks_numeric("12"));
        assert!(looks_numeric("0"));
        assert!(!looks_numeric("007"));
        assert!(!looks_numeric("2024-01-05"));
        assert!(!looks_numeric(""));
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sheet_name("A/B"), "A_B");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
        assert_eq!(sheet_name(" "), "Sheet1");
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_export_produces_a_zip_container() {
        let bytes = to_xlsx(&view(vec![vec!["1", "Sensor", "plain"]])).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
