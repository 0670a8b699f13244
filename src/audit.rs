//! Monthly audit log.
//!
//! Every mutation appends one row to a worksheet named after the current
//! month (`Log_2025_10`) in a separate log workbook. The sheet is created
//! with its header the first time a month sees activity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::lot::{Lot, next_seq};
use crate::schema::Schema;
use crate::workbook::{Workbook, has_worksheet, list_records};

/// Rows requested when a month's log sheet is created.
pub const LOG_SHEET_ROWS: usize = 100;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Add,
    Transfer,
    Consume,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Action::Add => "ADD",
            Action::Transfer => "TRANSFER",
            Action::Consume => "CONSUME",
        };
        f.write_str(tag)
    }
}

/// What happened, before it is laid out as a log row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub year: &'a str,
    pub location: &'a str,
    pub quantity: i64,
    pub condition: &'a str,
    pub handler: &'a str,
    pub notes: &'a str,
}

/// A row as written to the log.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: Action,
    pub sheet: String,
    pub row: Lot,
}

impl AuditEntry {
    pub fn timestamp(&self) -> &str {
        &self.row.date_in
    }
}

pub fn log_sheet_title(now: NaiveDateTime) -> String {
    format!("Log_{}", now.format("%Y_%m"))
}

pub struct AuditLog {
    workbook: Arc<dyn Workbook>,
    schema: Schema,
    default_condition: String,
}

impl AuditLog {
    pub fn new(workbook: Arc<dyn Workbook>, schema: Schema, default_condition: &str) -> Self {
        AuditLog {
            workbook,
            schema,
            default_condition: default_condition.to_string(),
        }
    }

    pub fn workbook(&self) -> &Arc<dyn Workbook> {
        &self.workbook
    }

    /// Title of this month's log sheet, creating the sheet if needed.
    pub async fn worksheet(&self, now: NaiveDateTime) -> Result<String> {
        let title = log_sheet_title(now);
        if !has_worksheet(self.workbook.as_ref(), &title).await? {
            log::info!("creating audit worksheet '{}'", title);
            self.workbook
                .add_worksheet(&title, LOG_SHEET_ROWS, self.schema.len())
                .await?;
            self.workbook
                .update_row(&title, 1, self.schema.headers())
                .await?;
        }
        Ok(title)
    }

    /// Append one entry and return it as written.
    pub async fn record(
        &self,
        action: Action,
        event: &Event<'_>,
        now: NaiveDateTime,
    ) -> Result<AuditEntry> {
        let title = self.worksheet(now).await?;
        let existing = list_records(self.workbook.as_ref(), &title, &self.schema).await?;

        let row = Lot {
            seq: next_seq(existing.iter().map(|(_, lot)| lot)),
            code: or_default(event.code, "AUTO"),
            name: or_default(event.name, "Unknown"),
            date_in: now.format(TIMESTAMP_FORMAT).to_string(),
            year: or_default(event.year, "-"),
            location: event.location.to_string(),
            quantity: event.quantity,
            condition: or_default(event.condition, &self.default_condition),
            handler: event.handler.to_string(),
            notes: format!("[{}] {}", action, event.notes).trim_end().to_string(),
        };

        self.workbook
            .append_row(&title, self.schema.encode(&row))
            .await?;

        Ok(AuditEntry {
            action,
            sheet: title,
            row,
        })
    }
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
