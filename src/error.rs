use thiserror::Error;

/// Errors raised by the inventory ledger and its storage backends.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A request field is missing or out of range.
    #[error("{0}")]
    Validation(String),

    /// The display name is not one of the profile's locations.
    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    /// The workbook has no tab with this title.
    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),

    /// Tried to create a tab whose title is already taken.
    #[error("worksheet '{0}' already exists")]
    WorksheetExists(String),

    /// No row in the source matches the requested name and condition.
    #[error("item {name} ({condition}) not found in {location}")]
    ItemNotFound {
        name: String,
        condition: String,
        location: String,
    },

    /// The matched row holds fewer units than requested.
    #[error("insufficient stock: {available} left, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("row {row} is out of range in worksheet '{title}'")]
    RowOutOfRange { title: String, row: usize },

    /// The remote spreadsheet service refused or failed a call.
    #[error("spreadsheet backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Rendering a page or a download failed.
    #[error("render error: {0}")]
    Render(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;

impl InventoryError {
    /// Short machine-readable tag used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "validation_failed",
            InventoryError::UnknownLocation(_) => "unknown_location",
            InventoryError::WorksheetNotFound(_) => "worksheet_not_found",
            InventoryError::WorksheetExists(_) => "worksheet_exists",
            InventoryError::ItemNotFound { .. } => "item_not_found",
            InventoryError::InsufficientStock { .. } => "insufficient_stock",
            InventoryError::RowOutOfRange { .. } => "row_out_of_range",
            InventoryError::Backend(_) => "backend_error",
            InventoryError::Config(_) => "config_error",
            InventoryError::Render(_) => "render_error",
            InventoryError::Io(_) => "storage_error",
            InventoryError::Json(_) => "serialization_error",
        }
    }
}

#[cfg(feature = "web")]
mod http {
    use super::InventoryError;
    use axum::{
        Json,
        extract::rejection::JsonRejection,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde::Serialize;

    #[derive(Serialize)]
    struct ErrorBody {
        status: &'static str,
        code: &'static str,
        message: String,
    }

    impl InventoryError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
                InventoryError::UnknownLocation(_) | InventoryError::ItemNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                InventoryError::InsufficientStock { .. } => StatusCode::CONFLICT,
                InventoryError::WorksheetNotFound(_)
                | InventoryError::WorksheetExists(_)
                | InventoryError::RowOutOfRange { .. }
                | InventoryError::Backend(_) => StatusCode::BAD_GATEWAY,
                InventoryError::Config(_)
                | InventoryError::Render(_)
                | InventoryError::Io(_)
                | InventoryError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    /// Bodies that are not JSON, or lack a field, are the caller's mistake.
    impl From<JsonRejection> for InventoryError {
        fn from(rejection: JsonRejection) -> Self {
            InventoryError::Validation(rejection.body_text())
        }
    }

    impl IntoResponse for InventoryError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            if status.is_server_error() {
                log::error!("request failed: {}", self);
            }
            let body = ErrorBody {
                status: "error",
                code: self.code(),
                message: self.to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_both_quantities() {
        let err = InventoryError::InsufficientStock {
            available: 3,
            requested: 5,
        };
        assert_eq!(err.to_string(), "insufficient stock: 3 left, 5 requested");
        assert_eq!(err.code(), "insufficient_stock");
    }

    #[cfg(feature = "web")]
    #[test]
    fn errors_map_to_http_statuses() {
        use axum::http::StatusCode;

        assert_eq!(
            InventoryError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InventoryError::UnknownLocation("Attic".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            InventoryError::InsufficientStock {
                available: 1,
                requested: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            InventoryError::Backend("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
