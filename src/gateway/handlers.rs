use super::{AppState, RunBody, SERVICE_NAME};
use crate::actions::{ActionName, Parameters};
use crate::router::{InboundEmail, RouteOutcome};
use axum::{
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{Value, json};

/// GET /: service index
pub(super) async fn handle_index() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["GET /", "GET /health", "POST /email", "POST /run"],
    }))
}

/// GET /health: process liveness only; collaborator probes live in the
/// `HEALTH_CHECK` action.
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "runtime": crate::health::snapshot_json(),
    }))
}

/// POST /email: route one inbound email, always answering with reply text.
pub(super) async fn handle_email(
    State(state): State<AppState>,
    body: Result<Json<InboundEmail>, JsonRejection>,
) -> impl IntoResponse {
    let Json(email) = match body {
        Ok(b) => b,
        Err(e) => {
            let err = json!({
                "error": format!(
                    "Invalid JSON: {e}. Expected: {{\"from\": \"...\", \"subject\": \"...\", \"body\": \"...\"}}"
                )
            });
            return (StatusCode::BAD_REQUEST, Json(err));
        }
    };

    let reply = state.router.handle(&email).await;
    let status = if reply.outcome == RouteOutcome::Rejected {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({
            "reply_text": reply.reply_text,
            "action": reply.action,
            "success": reply.success,
        })),
    )
}

/// POST /run: batch memo generation, the scheduled-trigger entry point.
pub(super) async fn handle_run(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let run: RunBody = if body.iter().all(u8::is_ascii_whitespace) {
        RunBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(run) => run,
            Err(e) => {
                let err = json!({"error": format!("Invalid JSON: {e}. Expected: {{\"force\": false}}")});
                return (StatusCode::BAD_REQUEST, Json(err));
            }
        }
    };

    let mut parameters = Parameters::new();
    parameters.insert("force".into(), Value::Bool(run.force));

    match state
        .router
        .run_action(ActionName::GenerateMemos, &parameters)
        .await
    {
        Ok(result) => {
            let message = state.router.render(ActionName::GenerateMemos, &result);
            let status = if result.success { "ok" } else { "error" };
            (
                StatusCode::OK,
                Json(json!({
                    "status": status,
                    "processed": result.count("processed"),
                    "skipped": result.count("skipped"),
                    "errors": result.count("errors"),
                    "message": message,
                })),
            )
        }
        Err(e) => {
            tracing::error!("batch run failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "processed": 0,
                    "skipped": 0,
                    "errors": 0,
                    "message": "Batch run failed; see the service logs.",
                })),
            )
        }
    }
}
