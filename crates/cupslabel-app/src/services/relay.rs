// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP relay: exposes the label driver to hosts on the local network.
//
//   GET  /api/printers                                printer choices
//   POST /api/print?printer=&copies=&filename=        raw PDF body
//   GET  /api/status                                  device status
//   GET  /api/settings                                settings, secrets masked
//
// Failures come back as JSON carrying the human-readable message.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cupslabel_core::error::{CupsLabelError, Result};
use cupslabel_core::human_errors::{HumanError, humanize_error};
use cupslabel_core::settings::{SettingKind, SettingsSource, setting_definitions};
use cupslabel_core::types::{
    DispatchReceipt, LabelSource, PrintOptions, PrinterChoice, StatusSnapshot,
};
use cupslabel_print::{LabelDriver, LabelRequest};

/// Labels are small; this bounds a misbehaving client.
const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_FILENAME: &str = "label";

/// State shared across handlers.
pub struct RelayState {
    pub driver: LabelDriver,
    pub settings: Arc<dyn SettingsSource>,
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/api/printers", get(printers))
        .route(
            "/api/print",
            post(print).layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES)),
        )
        .route("/api/status", get(status))
        .route("/api/settings", get(settings))
        .with_state(state)
}

/// Bind `listen_addr` and serve until the process is stopped.
pub async fn serve(state: Arc<RelayState>, listen_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(listen_addr, "cupslabel relay listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// -- Errors -------------------------------------------------------------------

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(flatten)]
    human: HumanError,
}

struct ApiError(CupsLabelError);

impl From<CupsLabelError> for ApiError {
    fn from(e: CupsLabelError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CupsLabelError::NoPrinterSelected
            | CupsLabelError::InvalidOption { .. }
            | CupsLabelError::InvalidSetting { .. } => StatusCode::BAD_REQUEST,
            CupsLabelError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CupsLabelError::Connect { .. } | CupsLabelError::Submit { .. } => {
                StatusCode::BAD_GATEWAY
            }
            CupsLabelError::Io(_) | CupsLabelError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        warn!(%status, error = %self.0, "relay request failed");
        let body = ErrorBody {
            success: false,
            error: self.0.to_string(),
            human: humanize_error(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

// -- Handlers -----------------------------------------------------------------

/// GET /api/printers. Always 200; an unreachable server yields the sentinel.
async fn printers(State(state): State<Arc<RelayState>>) -> Json<Vec<PrinterChoice>> {
    Json(state.driver.printer_choices().await)
}

#[derive(Debug, Deserialize)]
struct PrintQuery {
    printer: Option<String>,
    /// Kept raw so a malformed count is reported as an invalid option.
    copies: Option<String>,
    filename: Option<String>,
}

impl PrintQuery {
    fn options(&self) -> Result<PrintOptions> {
        let Some(raw) = self.copies.as_deref() else {
            return Ok(PrintOptions::default());
        };
        let value = match raw.trim().parse::<i64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Value::from(raw),
        };
        PrintOptions::from_map(&HashMap::from([("copies".to_string(), value)]))
    }
}

/// POST /api/print
async fn print(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<PrintQuery>,
    body: Bytes,
) -> std::result::Result<Json<DispatchReceipt>, ApiError> {
    let options = query.options()?;
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    let receipt = state
        .driver
        .print_label(LabelRequest {
            printer: query.printer,
            filename,
            options,
            source: LabelSource::Rendered(body.to_vec()),
        })
        .await?;
    Ok(Json(receipt))
}

#[derive(Serialize)]
struct StatusBody {
    #[serde(flatten)]
    snapshot: StatusSnapshot,
    message: Option<String>,
}

/// GET /api/status
async fn status(State(state): State<Arc<RelayState>>) -> Json<StatusBody> {
    Json(StatusBody {
        snapshot: state.driver.status(),
        message: state.driver.status_message(),
    })
}

#[derive(Serialize)]
struct SettingView {
    key: String,
    name: &'static str,
    description: &'static str,
    kind: SettingKind,
    default: &'static str,
    value: String,
}

/// GET /api/settings
async fn settings(State(state): State<Arc<RelayState>>) -> Json<Vec<SettingView>> {
    let views = setting_definitions()
        .into_iter()
        .map(|def| {
            let raw = state.settings.get(def.key).unwrap_or_default();
            SettingView {
                key: def.key.to_string(),
                name: def.name,
                description: def.description,
                kind: def.kind,
                default: def.default,
                value: def.display_value(&raw),
            }
        })
        .collect();
    Json(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use cupslabel_core::settings::{MapSettings, SettingKey};
    use cupslabel_print::ReusePolicy;
    use cupslabel_print::mock::MockBackend;

    fn app(backend: &MockBackend, settings: MapSettings) -> Router {
        let settings: Arc<dyn SettingsSource> = Arc::new(settings);
        let driver = LabelDriver::new(
            Arc::clone(&settings),
            Arc::new(backend.clone()),
            ReusePolicy::default(),
        );
        router(Arc::new(RelayState { driver, settings }))
    }

    fn configured() -> MapSettings {
        MapSettings::new()
            .with(SettingKey::Server, "cups.local")
            .with(SettingKey::Password, "hunter2")
            .with(SettingKey::Printer, "zebra")
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &'static [u8]) -> Request<Body> {
        Request::post(uri).body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn lists_printers() {
        let backend =
            MockBackend::new().with_printers(vec![PrinterChoice::new("zebra", Some("Desk".into()))]);
        let (status, body) = send(app(&backend, configured()), get("/api/printers")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "zebra");
        assert_eq!(body[0]["display_name"], "Desk");
    }

    #[tokio::test]
    async fn unreachable_server_lists_sentinel() {
        let backend = MockBackend::new();
        backend.fail_connects(1);
        let (status, body) = send(app(&backend, configured()), get("/api/printers")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["display_name"], "error scanning for printers");
    }

    #[tokio::test]
    async fn prints_body_as_label() {
        let backend = MockBackend::new();
        let (status, body) = send(
            app(&backend, configured()),
            post("/api/print?copies=2&filename=box-7", b"%PDF-1.7 box"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["copies_submitted"], 2);
        assert_eq!(body["printer"], "zebra");
        let submissions = backend.submissions();
        assert_eq!(submissions[1].title, "box-7-1");
        assert_eq!(submissions[0].contents, b"%PDF-1.7 box");
    }

    #[tokio::test]
    async fn invalid_copies_is_bad_request() {
        let backend = MockBackend::new();
        let (status, body) =
            send(app(&backend, configured()), post("/api/print?copies=0", b"%PDF")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(backend.connect_count(), 0);
    }

    #[tokio::test]
    async fn non_numeric_copies_is_json_bad_request() {
        let backend = MockBackend::new();
        let (status, body) =
            send(app(&backend, configured()), post("/api/print?copies=two", b"%PDF")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("copies"));
        assert_eq!(backend.connect_count(), 0);
    }

    #[tokio::test]
    async fn missing_printer_is_bad_request() {
        let backend = MockBackend::new();
        let settings = configured().with(SettingKey::Printer, "");
        let (status, body) = send(app(&backend, settings), post("/api/print", b"%PDF")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No printer selected.");
    }

    #[tokio::test]
    async fn connect_failure_is_bad_gateway_and_disconnects() {
        let backend = MockBackend::new();
        backend.fail_connects(1);
        let app = app(&backend, configured());

        let (status, body) = send(app.clone(), post("/api/print", b"%PDF")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Cannot get connection to printer"));

        let (_, body) = send(app, get("/api/status")).await;
        assert_eq!(body["status"], "Disconnected");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn settings_mask_password() {
        let backend = MockBackend::new();
        let (status, body) = send(app(&backend, configured()), get("/api/settings")).await;

        assert_eq!(status, StatusCode::OK);
        let password = body
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["key"] == "PASSWORD")
            .unwrap();
        assert_eq!(password["value"], "********");
        assert_eq!(password["kind"], "secret");
    }
}
