use serde::{Deserialize, Serialize};

use crate::lot::Lot;

/// The lot attribute a worksheet column holds.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Seq,
    Code,
    Name,
    DateIn,
    Year,
    Location,
    Quantity,
    Condition,
    Handler,
    Notes,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub field: Field,
}

impl Column {
    pub fn new(header: &str, field: Field) -> Self {
        Column {
            header: header.to_string(),
            field,
        }
    }
}

/// Header layout of one worksheet.
///
/// Deployments disagree on header texts and on which columns exist, so rows
/// are never addressed by a fixed position: every read and write goes
/// through the schema.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    /// The ten-column layout of a storage location.
    pub fn stock() -> Self {
        Schema {
            columns: vec![
                Column::new("No", Field::Seq),
                Column::new("Inventory Code", Field::Code),
                Column::new("Item Name", Field::Name),
                Column::new("Date In", Field::DateIn),
                Column::new("Year Made", Field::Year),
                Column::new("Storage Location", Field::Location),
                Column::new("Quantity", Field::Quantity),
                Column::new("Condition", Field::Condition),
                Column::new("Handler", Field::Handler),
                Column::new("Notes", Field::Notes),
            ],
        }
    }

    /// The consumed-goods ledger: the stock layout without a storage location.
    pub fn consumed() -> Self {
        Schema {
            columns: vec![
                Column::new("No", Field::Seq),
                Column::new("Inventory Code", Field::Code),
                Column::new("Item Name", Field::Name),
                Column::new("Date Used", Field::DateIn),
                Column::new("Year Made", Field::Year),
                Column::new("Quantity", Field::Quantity),
                Column::new("Condition", Field::Condition),
                Column::new("Handler", Field::Handler),
                Column::new("Notes", Field::Notes),
            ],
        }
    }

    /// The audit log layout; the date column carries the entry timestamp.
    pub fn audit() -> Self {
        let mut schema = Schema::stock();
        schema.columns[3].header = "Timestamp".to_string();
        schema.columns[5].header = "Location".to_string();
        schema
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    pub fn has(&self, field: Field) -> bool {
        self.column_of(field).is_some()
    }

    /// 1-based column index of `field`, as used for single-cell updates.
    pub fn column_of(&self, field: Field) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.field == field)
            .map(|i| i + 1)
    }

    /// Lay a lot out in column order. Fields the schema lacks are dropped.
    pub fn encode(&self, lot: &Lot) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| match c.field {
                Field::Seq => lot.seq.to_string(),
                Field::Code => lot.code.clone(),
                Field::Name => lot.name.clone(),
                Field::DateIn => lot.date_in.clone(),
                Field::Year => lot.year.clone(),
                Field::Location => lot.location.clone(),
                Field::Quantity => lot.quantity.to_string(),
                Field::Condition => lot.condition.clone(),
                Field::Handler => lot.handler.clone(),
                Field::Notes => lot.notes.clone(),
            })
            .collect()
    }

    /// Read a row by header position. Short rows leave the remaining fields
    /// empty and unreadable numbers count as zero.
    pub fn decode(&self, row: &[String]) -> Lot {
        let mut lot = Lot::default();
        for (i, column) in self.columns.iter().enumerate() {
            let cell = row.get(i).map(|s| s.trim()).unwrap_or("");
            match column.field {
                Field::Seq => lot.seq = parse_int(cell),
                Field::Code => lot.code = cell.to_string(),
                Field::Name => lot.name = cell.to_string(),
                Field::DateIn => lot.date_in = cell.to_string(),
                Field::Year => lot.year = cell.to_string(),
                Field::Location => lot.location = cell.to_string(),
                Field::Quantity => lot.quantity = parse_int(cell),
                Field::Condition => lot.condition = cell.to_string(),
                Field::Handler => lot.handler = cell.to_string(),
                Field::Notes => lot.notes = cell.to_string(),
            }
        }
        lot
    }

    /// Fields a schema must carry for the ledger to match and adjust rows.
    pub fn require(&self, fields: &[Field]) -> Result<(), String> {
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| !self.has(**f))
            .map(|f| format!("{:?}", f))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("schema is missing columns: {}", missing.join(", ")))
        }
    }
}

/// Sheets hand back formatted numbers ("1,200", "3.0").
///
/// Decimals are rounded to the nearest whole unit, half away from zero, so
/// "3.7" reads as 4. Cells that are not numbers, or whose value does not fit
/// in an `i64`, read as 0: such a row holds nothing that can be taken out.
fn parse_int(cell: &str) -> i64 {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if let Ok(n) = cleaned.parse::<i64>() {
        return n;
    }
    match cleaned.parse::<f64>() {
        // 2^63 itself is out of range; everything strictly inside fits.
        Ok(f) if f.is_finite() && f.round().abs() < 9_223_372_036_854_775_808.0 => f.round() as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lot {
        Lot {
            seq: 3,
            code: "INV-20240105-003".into(),
            name: "PM2.5 sensor".into(),
            date_in: "2024-01-05".into(),
            year: "2023".into(),
            location: "Main Warehouse".into(),
            quantity: 12,
            condition: "Good".into(),
            handler: "Rina".into(),
            notes: "New stock".into(),
        }
    }

    #[test]
    fn stock_row_has_ten_columns_in_order() {
        let row = Schema::stock().encode(&sample());
        assert_eq!(row.len(), 10);
        assert_eq!(row[0], "3");
        assert_eq!(row[5], "Main Warehouse");
        assert_eq!(row[6], "12");
        assert_eq!(row[9], "New stock");
    }

    #[test]
    fn consumed_row_drops_location() {
        let schema = Schema::consumed();
        let row = schema.encode(&sample());
        assert_eq!(row.len(), 9);
        assert!(!row.contains(&"Main Warehouse".to_string()));
        assert_eq!(row[5], "12");

        let back = schema.decode(&row);
        assert_eq!(back.location, "");
        assert_eq!(back.quantity, 12);
        assert_eq!(back.code, "INV-20240105-003");
    }

    #[test]
    fn column_indices_are_one_based() {
        assert_eq!(Schema::stock().column_of(Field::Quantity), Some(7));
        assert_eq!(Schema::stock().column_of(Field::Notes), Some(10));
        assert_eq!(Schema::consumed().column_of(Field::Quantity), Some(6));
        assert_eq!(Schema::consumed().column_of(Field::Location), None);
    }

    #[test]
    fn decode_tolerates_short_rows_and_formatted_numbers() {
        let row = vec!["7".to_string(), "".into(), "Filter".into(), "".into(), "".into(), "".into(), "1,200".into()];
        let lot = Schema::stock().decode(&row);
        assert_eq!(lot.seq, 7);
        assert_eq!(lot.name, "Filter");
        assert_eq!(lot.quantity, 1200);
        assert_eq!(lot.handler, "");

        assert_eq!(parse_int("3.0"), 3);
        assert_eq!(parse_int("n/a"), 0);
    }

    #[test]
    fn decimals_round_and_out_of_range_cells_read_as_zero() {
        assert_eq!(parse_int("3.7"), 4);
        assert_eq!(parse_int("3.2"), 3);
        assert_eq!(parse_int("2.5"), 3);
        assert_eq!(parse_int("-1.5"), -2);
        assert_eq!(parse_int(" 12 "), 12);
        assert_eq!(parse_int("1e30"), 0);
        assert_eq!(parse_int("inf"), 0);
        assert_eq!(parse_int("NaN"), 0);
        assert_eq!(parse_int("9223372036854775807"), i64::MAX);
    }

    #[test]
    fn audit_schema_renames_date_and_location() {
        let headers = Schema::audit().headers();
        assert_eq!(headers[3], "Timestamp");
        assert_eq!(headers[5], "Location");
        assert_eq!(headers.len(), 10);
    }

    #[test]
    fn require_reports_missing_fields() {
        let err = Schema::consumed()
            .require(&[Field::Name, Field::Location])
            .unwrap_err();
        assert!(err.contains("Location"));
        assert!(Schema::stock().require(&[Field::Name, Field::Quantity]).is_ok());
    }

    #[test]
    fn schema_deserializes_from_a_plain_list() {
        let json = r#"[{"header":"Nama","field":"name"},{"header":"Jumlah","field":"quantity"}]"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.headers(), vec!["Nama", "Jumlah"]);
        assert_eq!(schema.column_of(Field::Quantity), Some(2));
    }
}
