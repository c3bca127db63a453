use crate::http::pages::setup_page;
use crate::http::types::{
    HttpError, HttpResult, HttpSuccess, SetLogLevelRequest, SetupResponse, SetupSubmission,
};
use crate::http::HttpState;
use crate::relay::StartOutcome;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use std::str::FromStr;
use tracing::log::{info, warn};
use tracing_subscriber::EnvFilter;

pub async fn status(State(state): State<HttpState>) -> String {
    let relay = if state.session.is_relay_running() {
        "online"
    } else {
        "waiting for key"
    };
    let key = if state.session.has_credential().await {
        "configured"
    } else {
        "missing"
    };

    format!(
        "🤖 WhatsApp Gemini relay\n\
         Status: {relay}\n\
         API key: {key}\n\
         \n\
         GET  /ping   -> healthcheck\n\
         GET  /setup  -> form to submit the GEMINI_API_KEY\n\
         POST /setup  -> {{\"key\": \"AIza...\"}} as JSON or form\n"
    )
}

pub async fn ping() -> &'static str {
    "ok"
}

pub async fn setup_form() -> Html<String> {
    Html(setup_page(None))
}

pub async fn setup_submit(State(state): State<HttpState>, submission: SetupSubmission) -> Response {
    let format = submission.format;
    let Some(key) = submission.request.submitted_key() else {
        return format.error(StatusCode::BAD_REQUEST, "Missing key".to_string());
    };

    if let Err(e) = state.session.set_credential(&key).await {
        warn!("Rejected GEMINI_API_KEY submitted via /setup: {e}");
        return format.error(StatusCode::BAD_REQUEST, format!("Invalid key: {e}"));
    }
    info!("GEMINI_API_KEY received via /setup");

    match state.adapter.start().await {
        Ok(StartOutcome::Started) => format.success(SetupResponse {
            status: "started",
            message: "Key saved, relay is starting. Watch the logs for the WhatsApp QR code.",
        }),
        Ok(StartOutcome::AlreadyRunning) => format.success(SetupResponse {
            status: "updated",
            message: "Key updated, the relay was already running.",
        }),
        Err(e) => format.error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn sys_version() -> HttpResult<&'static str> {
    Ok(HttpSuccess(crate::VERSION))
}

pub async fn sys_set_log_level(
    State(state): State<HttpState>,
    Json(payload): Json<SetLogLevelRequest>,
) -> HttpResult<bool> {
    let filter = EnvFilter::from_str(&payload.level).map_err(|e| HttpError {
        status: StatusCode::BAD_REQUEST,
        message: e.to_string(),
    })?;

    info!("Setting log level to {filter} via API");
    state.tracing_reload.reload(filter).map_err(|e| HttpError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: e.to_string(),
    })?;

    Ok(HttpSuccess(true))
}

pub async fn not_found() -> impl IntoResponse {
    HttpError {
        status: StatusCode::NOT_FOUND,
        message: "Not found".to_string(),
    }
}
