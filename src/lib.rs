/*!
# Inventoria

A web dashboard for tracking physical stock across one or more storage
locations, backed by worksheets.

## Overview

Every storage location is a worksheet whose rows are batches of one item:
an inventory code, a name, the date the batch came in, the condition it is
in and how many units are left. Items leave a location either by moving to
another location or by being used up, in which case they land on a shared
consumed-items sheet. Every change is also written to a monthly audit
worksheet (`Log_YYYY_MM`) and, when configured, announced to a webhook.

## Architecture

### Storage Layer
- A `Workbook` trait with two backends:
  - `LocalWorkbook` - worksheets in memory, persisted as Gzip-compressed bincode (`.bin.gz`)
  - `SheetsWorkbook` - a Google spreadsheet through the Sheets v4 values API
- Column layouts come from a `Schema`, so deployments can rename headers

### Ledger Layer
- Adding stock merges into a batch with the same name, date in and condition
- Transfers and consumption decrement the matched row, or delete it when empty
- Every mutation produces an audit row; a failing audit write never undoes stock changes

### Web Layer
- **Technologies**: Rust, axum, handlebars
- Landing page with add, consume and transfer forms
- Filtered table view with damaged and needs-repair rows highlighted
- CSV and XLSX export of any view

## Modules

- **schema**: Column layouts and row encoding
- **lot**: Stock rows, inventory codes and conditions
- **workbook**: Worksheet storage trait and the local backend
- **sheets**: Google Sheets backend
- **saving**: Compressed persistence for local worksheets
- **profile**: Deployment profile (locations, sheets, headers, wording)
- **ledger**: Add, transfer, consume and view operations
- **audit**: Monthly audit worksheets
- **notify**: Webhook notifications
- **downloader**: Export functionality (CSV, XLSX)
- **config**: Environment configuration
- **app**: Routing and page rendering

## REST API Endpoints

- `GET /` - Landing page
- `GET /view?location=..&name=..&date=..` - Rendered table for a location
- `GET /api/profile` - Locations, conditions and sheet names
- `GET /api/items?location=..` - Rows of a location as JSON
- `POST /api/items` - Add stock
- `POST /api/consume` - Use stock from a location
- `POST /api/transfer` - Move stock between locations or to the consumed sheet
- `GET /api/export/csv`, `GET /api/export/xlsx` - Download a view
*/

pub mod app;
pub mod audit;
pub mod config;
pub mod downloader;
pub mod error;
pub mod ledger;
pub mod lot;
pub mod notify;
pub mod profile;
pub mod saving;
pub mod schema;
pub mod sheets;
pub mod workbook;

pub use audit::{Action, AuditEntry, AuditLog};
pub use config::{AppConfig, Backend};
pub use error::{InventoryError, Result};
pub use ledger::{
    AddOutcome, ConsumeRequest, Ledger, SourceChange, TransferOutcome, TransferRequest, Upsert,
    View, ViewFilter, ViewRow,
};
pub use lot::{Conditions, Highlight, Lot, NewLot};
pub use notify::{NoopNotifier, Notification, Notifier};
pub use profile::{Destination, Location, Profile};
pub use schema::{Column, Field, Schema};
pub use workbook::{LocalWorkbook, Workbook, Worksheet};
