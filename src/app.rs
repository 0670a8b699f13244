#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{FromRequest, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::audit::AuditEntry;
use crate::config::{AppConfig, Backend};
use crate::downloader;
use crate::error::{InventoryError, Result};
use crate::ledger::{ConsumeRequest, Ledger, TransferRequest, View, ViewFilter};
use crate::lot::NewLot;
use crate::notify::{NoopNotifier, Notification, Notifier, WebhookNotifier, spawn_notify};
use crate::sheets::SheetsWorkbook;
use crate::workbook::{LocalWorkbook, Workbook};

pub struct AppState {
    ledger: Ledger,
    notifier: Arc<dyn Notifier>,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(ledger: Ledger, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        templates
            .register_template_string("landing", include_str!("./static/landing.hbs"))
            .map_err(|e| InventoryError::Render(e.to_string()))?;
        templates
            .register_template_string("view", include_str!("./static/view.hbs"))
            .map_err(|e| InventoryError::Render(e.to_string()))?;
        Ok(AppState {
            ledger,
            notifier,
            templates,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> Result<Html<String>> {
        self.templates
            .render(name, data)
            .map(Html)
            .map_err(|e| InventoryError::Render(e.to_string()))
    }

    fn announce(&self, audit: Option<&AuditEntry>) {
        if let Some(entry) = audit {
            spawn_notify(self.notifier.clone(), Notification::from(entry));
        }
    }
}

/// JSON request body whose rejections use the API's error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(InventoryError))]
struct ApiJson<T>(T);

#[derive(Deserialize)]
struct AddRequest {
    location: String,
    #[serde(flatten)]
    item: NewLot,
}

#[derive(Deserialize)]
struct ViewQuery {
    location: String,
    name: Option<String>,
    date: Option<String>,
}

impl ViewQuery {
    fn filter(&self) -> ViewFilter {
        ViewFilter {
            name: self.name.clone(),
            date: self.date.clone(),
        }
    }
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    status: &'static str,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<OkResponse<T>> {
    Json(OkResponse { status: "ok", data })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_landing))
        .route("/view", get(serve_view))
        .route("/api/profile", get(get_profile))
        .route("/api/items", get(list_items).post(add_item))
        .route("/api/consume", post(consume_item))
        .route("/api/transfer", post(transfer_item))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .with_state(state)
}

/// Open the configured workbooks and serve until the process is stopped.
pub async fn run(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let profile = config.profile()?;

    let (stock, log_book): (Arc<dyn Workbook>, Arc<dyn Workbook>) = match &config.backend {
        Backend::Local => (
            Arc::new(LocalWorkbook::open(config.stock_file())?),
            Arc::new(LocalWorkbook::open(config.log_file())?),
        ),
        Backend::Sheets {
            spreadsheet_id,
            log_spreadsheet_id,
            token,
        } => (
            Arc::new(SheetsWorkbook::new(spreadsheet_id, token)?),
            Arc::new(SheetsWorkbook::new(log_spreadsheet_id, token)?),
        ),
    };

    let ledger = Ledger::new(profile, stock, log_book);
    if config.backend == Backend::Local {
        ledger.provision().await?;
    }

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => {
            log::info!("notifications go to {}", url);
            Arc::new(WebhookNotifier::new(url)?)
        }
        None => Arc::new(NoopNotifier),
    };

    let app = router(Arc::new(AppState::new(ledger, notifier)?));

    let listener = TcpListener::bind(&config.bind).await?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let profile = state.ledger.profile();
    let locations: Vec<&str> = profile.locations.iter().map(|l| l.name.as_str()).collect();
    state.render(
        "landing",
        &json!({
            "title": profile.title,
            "locations": locations,
            "conditions": profile.conditions.labels(),
            "consumed_sheet": profile.consumed_sheet,
        }),
    )
}

async fn serve_view(
    Query(query): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>> {
    let view = state.ledger.view(&query.location, &query.filter()).await?;
    let rows: Vec<_> = view
        .rows
        .iter()
        .map(|r| json!({ "class": r.highlight.css_class(), "cells": r.cells }))
        .collect();
    state.render(
        "view",
        &json!({
            "title": state.ledger.profile().title,
            "location": view.location,
            "headers": view.headers,
            "rows": rows,
            "shown": view.rows.len(),
            "total": view.total,
        }),
    )
}

async fn get_profile(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let profile = state.ledger.profile();
    ok(json!({
        "title": profile.title,
        "locations": profile.locations.iter().map(|l| &l.name).collect::<Vec<_>>(),
        "consumed_sheet": profile.consumed_sheet,
        "conditions": profile.conditions,
    }))
}

async fn list_items(
    Query(query): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<OkResponse<View>>> {
    let view = state.ledger.view(&query.location, &query.filter()).await?;
    Ok(ok(view))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<AddRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.ledger.add(&payload.location, payload.item).await?;
    state.announce(outcome.audit.as_ref());
    Ok(ok(outcome))
}

async fn consume_item(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ConsumeRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.ledger.consume(payload).await?;
    state.announce(outcome.audit.as_ref());
    Ok(ok(outcome))
}

async fn transfer_item(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<TransferRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.ledger.transfer(payload).await?;
    state.announce(outcome.audit.as_ref());
    Ok(ok(outcome))
}

async fn export_csv(
    Query(query): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response> {
    let view = state.ledger.view(&query.location, &query.filter()).await?;
    Ok(download(
        "text/csv; charset=utf-8",
        &format!("{}.csv", view.sheet),
        downloader::to_csv(&view).into_bytes(),
    ))
}

async fn export_xlsx(
    Query(query): Query<ViewQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response> {
    let view = state.ledger.view(&query.location, &query.filter()).await?;
    let bytes = downloader::to_xlsx(&view).map_err(|e| InventoryError::Render(e.to_string()))?;
    Ok(download(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &format!("{}.xlsx", view.sheet),
        bytes,
    ))
}

fn download(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        filename.replace(['"', '\\'], "_")
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
