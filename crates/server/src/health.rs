use std::time::Instant;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/internal/status", get(status))
        .route("/internal/warmup", post(warmup))
        .route("/internal/clear-cache", post(clear_cache))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "ringline IVR operational" }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ringline-server",
        "cache": {
            "entries": state.cache.len(),
            "capacity": state.cache.capacity(),
            "ttl_secs": state.cache.ttl().as_secs(),
        },
        "sessions": {
            "entries": state.sessions.len(),
            "capacity": state.sessions.capacity(),
        },
        "checked_at": Utc::now().to_rfc3339(),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let uptime_secs = (Utc::now() - state.stats.started_at()).num_seconds().max(0) as u64;

    Json(json!({
        "status": "ok",
        "uptime_secs": uptime_secs,
        "uptime": format_uptime(uptime_secs),
        "calls": {
            "total": state.stats.call_count(),
            "last_call_at": state.stats.last_call_at().map(|at| at.to_rfc3339()),
        },
        "backends": {
            "sheets": state.flags.sheets,
            "transcription": state.flags.transcription,
            "summarization": state.flags.summarization,
            "email": state.flags.email,
        },
        "cache": {
            "entries": state.cache.len(),
            "capacity": state.cache.capacity(),
            "ttl_secs": state.cache.ttl().as_secs(),
        },
        "sessions": {
            "entries": state.sessions.len(),
        },
    }))
}

/// Pre-fetches every known tenant so the first call of the day does not pay
/// the fetch latency. Reports per-tenant config origin.
async fn warmup(State(state): State<AppState>) -> Json<Value> {
    let started = Instant::now();
    let mut warmed = Vec::new();
    let mut fallbacks = 0usize;

    for tenant in state.known_tenants.iter() {
        let (_, origin) = state.cache.get(tenant).await;
        if origin == ringline_tenant::ConfigOrigin::Fallback {
            fallbacks += 1;
        }
        warmed.push(json!({ "tenant": tenant.as_str(), "origin": origin.as_str() }));
    }

    let elapsed = started.elapsed();
    if fallbacks > 0 {
        warn!(tenants = warmed.len(), fallbacks, "warmup finished with fallback configs");
    } else {
        info!(tenants = warmed.len(), elapsed_ms = elapsed.as_millis() as u64, "warmup complete");
    }

    Json(json!({
        "status": if fallbacks == 0 { "ok" } else { "partial" },
        "warmed": warmed,
        "elapsed_ms": elapsed.as_millis() as u64,
    }))
}

async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let evicted = state.cache.len();
    state.cache.clear();
    warn!(evicted, "configuration cache cleared by operator request");
    Json(json!({ "status": "ok", "evicted": evicted }))
}

fn format_uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::format_uptime;

    #[test]
    fn uptime_formats_scale_with_magnitude() {
        assert_eq!(format_uptime(12), "12s");
        assert_eq!(format_uptime(125), "2m 5s");
        assert_eq!(format_uptime(3_725), "1h 2m 5s");
        assert_eq!(format_uptime(90_061), "1d 1h 1m 1s");
    }
}
