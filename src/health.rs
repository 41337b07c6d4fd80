//! Process-wide component health, shared by the health action, the gateway's
//! `/health` route and the poller.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{OnceLock, PoisonError, RwLock};
use std::time::Instant;

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub updated_at: String,
    pub last_ok: Option<String>,
    pub last_error: Option<String>,
    /// Consecutive failures since the last success.
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub version: &'static str,
    pub updated_at: String,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentHealth>,
}

struct HealthRegistry {
    started_at: Instant,
    components: RwLock<BTreeMap<String, ComponentHealth>>,
}

static REGISTRY: OnceLock<HealthRegistry> = OnceLock::new();

fn registry() -> &'static HealthRegistry {
    REGISTRY.get_or_init(|| HealthRegistry {
        started_at: Instant::now(),
        components: RwLock::new(BTreeMap::new()),
    })
}

fn record<F>(component: &str, update: F)
where
    F: FnOnce(&mut ComponentHealth, &str),
{
    let now = Utc::now().to_rfc3339();
    let mut map = registry()
        .components
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let entry = map
        .entry(component.to_string())
        .or_insert_with(|| ComponentHealth {
            status: "unknown".into(),
            updated_at: now.clone(),
            last_ok: None,
            last_error: None,
            failures: 0,
        });
    update(entry, &now);
    entry.updated_at = now;
}

pub fn mark_component_ok(component: &str) {
    record(component, |entry, now| {
        entry.status = STATUS_OK.into();
        entry.last_ok = Some(now.to_string());
        entry.last_error = None;
        entry.failures = 0;
    });
}

#[allow(clippy::needless_pass_by_value)]
pub fn mark_component_error(component: &str, error: impl ToString) {
    let err = error.to_string();
    record(component, move |entry, _| {
        entry.status = STATUS_ERROR.into();
        entry.last_error = Some(err);
        entry.failures = entry.failures.saturating_add(1);
    });
}

/// Record the outcome of a probe under `component`.
pub fn record_probe(component: &str, outcome: &anyhow::Result<()>) {
    match outcome {
        Ok(()) => mark_component_ok(component),
        Err(e) => mark_component_error(component, format!("{e:#}")),
    }
}

pub fn snapshot() -> HealthSnapshot {
    let components = registry()
        .components
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let status = if components.values().any(|c| c.status == STATUS_ERROR) {
        "degraded"
    } else {
        STATUS_OK
    };

    HealthSnapshot {
        status,
        version: env!("CARGO_PKG_VERSION"),
        updated_at: Utc::now().to_rfc3339(),
        uptime_seconds: registry().started_at.elapsed().as_secs(),
        components,
    }
}

pub fn snapshot_json() -> serde_json::Value {
    serde_json::to_value(snapshot()).unwrap_or_else(|_| {
        serde_json::json!({
            "status": STATUS_ERROR,
            "message": "failed to serialize health snapshot"
        })
    })
}
