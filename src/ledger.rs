//! Row matching and quantity reconciliation.
//!
//! The four dashboard operations live here: add (upsert a lot), transfer
//! (decrement a source row and append to a destination), consume (transfer
//! into the consumed-goods ledger) and view. Every mutation is a
//! read-modify-write of whole worksheets followed by an audit log entry.
//!
//! The spreadsheet offers no transactions. Within one process the ledger
//! serializes mutations behind a single async mutex; two processes writing
//! the same sheet can still interleave and lose updates.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::audit::{Action, AuditEntry, AuditLog, Event};
use crate::error::{InventoryError, Result};
use crate::lot::{Highlight, Lot, NewLot, inventory_code, is_iso_date, next_seq};
use crate::profile::{Destination, Profile};
use crate::schema::{Field, Schema};
use crate::workbook::{Workbook, ensure_header, has_worksheet, list_records};

/// Source of "now" for dates, years and audit timestamps.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

fn local_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

/// Whether an add merged into an existing row or appended a new one.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Upsert {
    Merged,
    Appended,
}

#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    pub upsert: Upsert,
    /// The row as it now reads in the worksheet.
    pub lot: Lot,
    pub audit: Option<AuditEntry>,
}

/// What happened to the matched source row.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceChange {
    Decremented { remaining: i64 },
    Removed,
}

#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    pub source: SourceChange,
    /// Worksheet the goods were written to.
    pub destination: String,
    /// The row written (or merged) at the destination.
    pub moved: Lot,
    pub audit: Option<AuditEntry>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct TransferRequest {
    /// Display name of the source location.
    pub source: String,
    /// A location display name, or the consumed worksheet title.
    pub target: String,
    pub name: String,
    pub condition: String,
    pub quantity: i64,
    pub handler: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ConsumeRequest {
    pub location: String,
    pub name: String,
    pub condition: String,
    pub quantity: i64,
    pub handler: String,
    /// `YYYY-MM-DD`; recorded in the notes of the consumed row.
    #[serde(default)]
    pub used_on: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Case-insensitive substring of the item name.
    #[serde(default)]
    pub name: Option<String>,
    /// Substring of the date-in column.
    #[serde(default)]
    pub date: Option<String>,
}

impl ViewFilter {
    fn matches(&self, lot: &Lot) -> bool {
        let name_ok = match self.name.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => lot
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        };
        let date_ok = match self.date.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => lot.date_in.contains(needle),
            _ => true,
        };
        name_ok && date_ok
    }
}

#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub struct ViewRow {
    pub row: usize,
    pub lot: Lot,
    /// The row's cells in header order.
    pub cells: Vec<String>,
    pub highlight: Highlight,
}

#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub struct View {
    pub location: String,
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<ViewRow>,
    /// Data rows before filtering.
    pub total: usize,
}

pub struct Ledger {
    profile: Profile,
    stock: Arc<dyn Workbook>,
    audit: AuditLog,
    clock: Clock,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(profile: Profile, stock: Arc<dyn Workbook>, log: Arc<dyn Workbook>) -> Self {
        let audit = AuditLog::new(log, profile.log_schema.clone(), &profile.conditions.good);
        Ledger {
            profile,
            stock,
            audit,
            clock: local_clock(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Create any worksheet the profile names but the stock workbook lacks,
    /// and put the expected header on each.
    pub async fn provision(&self) -> Result<()> {
        for (title, schema) in self.profile.sheets() {
            if !has_worksheet(self.stock.as_ref(), title).await? {
                log::info!("creating worksheet '{}'", title);
                self.stock.add_worksheet(title, 1000, schema.len()).await?;
            }
            ensure_header(self.stock.as_ref(), title, schema).await?;
        }
        Ok(())
    }

    /// Add stock at a location, merging into a row with the same name,
    /// date-in and condition when one exists.
    pub async fn add(&self, location: &str, item: NewLot) -> Result<AddOutcome> {
        let loc = self.profile.location(location)?.clone();
        let now = (self.clock)();

        require_text("item name", &item.name)?;
        require_text("handler", &item.handler)?;
        require_quantity(item.quantity)?;

        let date_in = match item.date_in.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => {
                if !is_iso_date(d) {
                    return Err(InventoryError::Validation(format!(
                        "date '{}' is not a YYYY-MM-DD date",
                        d
                    )));
                }
                d.to_string()
            }
            _ => now.format("%Y-%m-%d").to_string(),
        };
        let condition = non_empty(item.condition.as_deref())
            .unwrap_or(&self.profile.conditions.good)
            .to_string();
        let year = non_empty(item.year.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| now.year().to_string());
        let notes = item
            .notes
            .clone()
            .unwrap_or_else(|| self.profile.phrases.new_stock.clone());

        let _guard = self.write_lock.lock().await;
        let schema = &self.profile.stock_schema;
        let records = list_records(self.stock.as_ref(), &loc.sheet, schema).await?;

        let found = records
            .iter()
            .find(|(_, lot)| lot.same_batch(item.name.trim(), &date_in, &condition));

        let (upsert, lot) = match found {
            Some((row, existing)) => {
                let mut lot = existing.clone();
                lot.quantity = add_quantity(lot.quantity, item.quantity)?;
                lot.notes = notes;
                self.write_quantity(&loc.sheet, schema, *row, lot.quantity).await?;
                if let Some(col) = schema.column_of(Field::Notes) {
                    self.stock
                        .update_cell(&loc.sheet, *row, col, lot.notes.clone())
                        .await?;
                }
                (Upsert::Merged, lot)
            }
            None => {
                let seq = next_seq(records.iter().map(|(_, lot)| lot));
                let lot = Lot {
                    seq,
                    code: inventory_code(&date_in, seq),
                    name: item.name.trim().to_string(),
                    date_in,
                    year,
                    location: loc.name.clone(),
                    quantity: item.quantity,
                    condition,
                    handler: item.handler.trim().to_string(),
                    notes,
                };
                self.stock.append_row(&loc.sheet, schema.encode(&lot)).await?;
                (Upsert::Appended, lot)
            }
        };

        log::info!(
            "add: {:?} {} x{} ({}) at '{}'",
            upsert,
            lot.name,
            item.quantity,
            lot.condition,
            loc.name
        );

        let event = Event {
            code: &lot.code,
            name: &lot.name,
            year: &lot.year,
            location: &loc.name,
            quantity: item.quantity,
            condition: &lot.condition,
            handler: item.handler.trim(),
            notes: &lot.notes,
        };
        let audit = self.record_audit(Action::Add, &event, now).await;

        Ok(AddOutcome { upsert, lot, audit })
    }

    /// Move stock between two locations, or out to the consumed ledger.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferOutcome> {
        self.move_stock(req, Action::Transfer).await
    }

    /// Take stock out of a location into the consumed-goods ledger.
    pub async fn consume(&self, req: ConsumeRequest) -> Result<TransferOutcome> {
        let notes = match non_empty(req.used_on.as_deref()) {
            Some(date) => {
                if !is_iso_date(date) {
                    return Err(InventoryError::Validation(format!(
                        "date '{}' is not a YYYY-MM-DD date",
                        date
                    )));
                }
                Some(format!("{} {}", self.profile.phrases.used_on, date))
            }
            None => None,
        };
        let transfer = TransferRequest {
            source: req.location,
            target: self.profile.consumed_sheet.clone(),
            name: req.name,
            condition: req.condition,
            quantity: req.quantity,
            handler: req.handler,
            notes,
        };
        self.move_stock(transfer, Action::Consume).await
    }

    async fn move_stock(&self, req: TransferRequest, action: Action) -> Result<TransferOutcome> {
        let source = self.profile.location(&req.source)?.clone();
        let destination = self.profile.destination(&req.target)?;
        if let Destination::Location(target) = &destination {
            if target.name == source.name {
                return Err(InventoryError::Validation(
                    "source and target are the same location".to_string(),
                ));
            }
        }
        require_text("item name", &req.name)?;
        require_text("condition", &req.condition)?;
        require_text("handler", &req.handler)?;
        require_quantity(req.quantity)?;

        let name = req.name.trim();
        let condition = req.condition.trim();
        let handler = req.handler.trim();
        let now = (self.clock)();

        let _guard = self.write_lock.lock().await;
        let schema = &self.profile.stock_schema;
        let records = list_records(self.stock.as_ref(), &source.sheet, schema).await?;

        let (row, matched) = records
            .iter()
            .find(|(_, lot)| lot.same_item(name, condition))
            .cloned()
            .ok_or_else(|| InventoryError::ItemNotFound {
                name: name.to_string(),
                condition: condition.to_string(),
                location: source.name.clone(),
            })?;

        if matched.quantity < req.quantity {
            return Err(InventoryError::InsufficientStock {
                available: matched.quantity,
                requested: req.quantity,
            });
        }

        // Everything that can fail on the destination side is read before the
        // source row changes, so a missing target tab leaves stock untouched.
        let notes = non_empty(req.notes.as_deref()).map(str::to_string);
        let landing = self
            .plan_landing(&destination, &source.name, &matched, req.quantity, handler, notes)
            .await?;

        let source_change = if matched.quantity == req.quantity {
            self.stock.delete_row(&source.sheet, row).await?;
            SourceChange::Removed
        } else {
            let remaining = matched.quantity - req.quantity;
            self.write_quantity(&source.sheet, schema, row, remaining).await?;
            SourceChange::Decremented { remaining }
        };

        self.land(&landing).await?;

        log::info!(
            "{}: {} x{} ({}) '{}' -> '{}', source {:?}",
            action,
            name,
            req.quantity,
            condition,
            source.name,
            landing.label,
            source_change
        );

        let event = Event {
            code: &matched.code,
            name: &matched.name,
            year: &matched.year,
            location: &landing.label,
            quantity: req.quantity,
            condition: &matched.condition,
            handler,
            notes: &landing.lot.notes,
        };
        let audit = self.record_audit(action, &event, now).await;

        Ok(TransferOutcome {
            source: source_change,
            destination: landing.sheet,
            moved: landing.lot,
            audit,
        })
    }

    /// Work out where moved goods go. At a location a row of the same batch
    /// is topped up; otherwise the lot arrives as a new row that keeps its
    /// inventory code. The consumed sheet always gets a new row.
    async fn plan_landing(
        &self,
        destination: &Destination<'_>,
        source: &str,
        matched: &Lot,
        quantity: i64,
        handler: &str,
        notes: Option<String>,
    ) -> Result<Landing<'_>> {
        match destination {
            Destination::Consumed => {
                let sheet = self.profile.consumed_sheet.clone();
                let schema = &self.profile.consumed_schema;
                let existing = list_records(self.stock.as_ref(), &sheet, schema).await?;
                let lot = Lot {
                    seq: next_seq(existing.iter().map(|(_, lot)| lot)),
                    quantity,
                    handler: handler.to_string(),
                    location: String::new(),
                    notes: notes.unwrap_or_else(|| {
                        format!("{} {}", self.profile.phrases.used_from, source)
                    }),
                    ..matched.clone()
                };
                Ok(Landing {
                    label: sheet.clone(),
                    sheet,
                    schema,
                    merge_into: None,
                    update_notes: false,
                    lot,
                })
            }
            Destination::Location(target) => {
                let schema = &self.profile.stock_schema;
                let records = list_records(self.stock.as_ref(), &target.sheet, schema).await?;
                let found = records.iter().find(|(_, lot)| {
                    lot.same_batch(&matched.name, &matched.date_in, &matched.condition)
                });

                let (merge_into, update_notes, lot) = match found {
                    Some((row, existing)) => {
                        let mut lot = existing.clone();
                        lot.quantity = add_quantity(lot.quantity, quantity)?;
                        let update_notes = notes.is_some();
                        if let Some(notes) = notes {
                            lot.notes = notes;
                        }
                        (Some(*row), update_notes, lot)
                    }
                    None => {
                        let lot = Lot {
                            seq: next_seq(records.iter().map(|(_, lot)| lot)),
                            location: target.name.clone(),
                            quantity,
                            handler: handler.to_string(),
                            notes: notes.unwrap_or_default(),
                            ..matched.clone()
                        };
                        (None, false, lot)
                    }
                };

                Ok(Landing {
                    label: target.name.clone(),
                    sheet: target.sheet.clone(),
                    schema,
                    merge_into,
                    update_notes,
                    lot,
                })
            }
        }
    }

    async fn land(&self, landing: &Landing<'_>) -> Result<()> {
        match landing.merge_into {
            Some(row) => {
                self.write_quantity(&landing.sheet, landing.schema, row, landing.lot.quantity)
                    .await?;
                let notes_col = landing.schema.column_of(Field::Notes);
                if let Some(col) = notes_col.filter(|_| landing.update_notes) {
                    self.stock
                        .update_cell(&landing.sheet, row, col, landing.lot.notes.clone())
                        .await?;
                }
            }
            None => {
                self.stock
                    .append_row(&landing.sheet, landing.schema.encode(&landing.lot))
                    .await?;
            }
        }
        Ok(())
    }

    /// Current rows of a location, filtered and tagged for display.
    pub async fn view(&self, location: &str, filter: &ViewFilter) -> Result<View> {
        let loc = self.profile.location(location)?;
        let schema = &self.profile.stock_schema;
        let records = list_records(self.stock.as_ref(), &loc.sheet, schema).await?;
        let total = records.len();

        let rows = records
            .into_iter()
            .filter(|(_, lot)| filter.matches(lot))
            .map(|(row, lot)| ViewRow {
                row,
                cells: schema.encode(&lot),
                highlight: self.profile.conditions.highlight(&lot.condition),
                lot,
            })
            .collect();

        Ok(View {
            location: loc.name.clone(),
            sheet: loc.sheet.clone(),
            headers: schema.headers(),
            rows,
            total,
        })
    }

    async fn write_quantity(&self, sheet: &str, schema: &Schema, row: usize, qty: i64) -> Result<()> {
        let col = schema
            .column_of(Field::Quantity)
            .ok_or_else(|| InventoryError::Config("schema has no quantity column".to_string()))?;
        self.stock.update_cell(sheet, row, col, qty.to_string()).await
    }

    /// The mutation already happened; a failing log write is reported but
    /// does not fail the request.
    async fn record_audit(&self, action: Action, event: &Event<'_>, now: NaiveDateTime) -> Option<AuditEntry> {
        match self.audit.record(action, event, now).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::error!("failed to write {} audit entry for '{}': {}", action, event.name, e);
                None
            }
        }
    }
}

/// Destination write prepared by `plan_landing`.
struct Landing<'a> {
    /// Location display name, or the consumed sheet title.
    label: String,
    sheet: String,
    schema: &'a Schema,
    /// Existing row of the same batch; `None` appends.
    merge_into: Option<usize>,
    update_notes: bool,
    lot: Lot,
}

fn add_quantity(current: i64, added: i64) -> Result<i64> {
    current.checked_add(added).ok_or_else(|| {
        InventoryError::Validation(format!(
            "quantity {} plus {} is larger than a row can hold",
            current, added
        ))
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(InventoryError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_quantity(quantity: i64) -> Result<()> {
    if quantity < 1 {
        return Err(InventoryError::Validation(format!(
            "quantity must be at least 1, got {}",
            quantity
        )));
    }
    Ok(())
}
