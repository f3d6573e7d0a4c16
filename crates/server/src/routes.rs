use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Utc};
use ringline_core::{is_open, CallSessionStore, SessionPatch, TenantId, TenantResolver};
use ringline_pipeline::{RecordingJob, RecordingPipeline};
use ringline_tenant::ConfigCache;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{health, twiml};

/// Rolling counters for the status endpoint.
pub struct CallStats {
    started_at: DateTime<Utc>,
    call_count: AtomicU64,
    last_call_at: Mutex<Option<DateTime<Utc>>>,
}

impl CallStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            call_count: AtomicU64::new(0),
            last_call_at: Mutex::new(None),
        }
    }

    pub fn record_call(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last_call_at.lock().unwrap_or_else(|p| p.into_inner());
        *last = Some(Utc::now());
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_call_at(&self) -> Option<DateTime<Utc>> {
        *self.last_call_at.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for CallStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Which optional backends were configured at startup. Reported by the
/// status endpoint so operators can spot a missing credential at a glance.
#[derive(Clone, Copy, Debug)]
pub struct BackendFlags {
    pub sheets: bool,
    pub transcription: bool,
    pub summarization: bool,
    pub email: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ConfigCache>,
    pub sessions: Arc<CallSessionStore>,
    pub resolver: Arc<TenantResolver>,
    pub pipeline: Arc<RecordingPipeline>,
    pub stats: Arc<CallStats>,
    pub flags: BackendFlags,
    pub known_tenants: Arc<Vec<TenantId>>,
}

/// Superset of the form fields Twilio posts across the voice webhooks.
/// Every field is optional; handlers substitute placeholders as needed.
#[derive(Debug, Default, Deserialize)]
pub struct VoicePayload {
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "Digits")]
    pub digits: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingDuration")]
    pub recording_duration: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/voice/incoming", post(incoming))
        .route("/voice/menu", post(menu))
        .route("/voice/no-input", post(no_input))
        .route("/voice/recorded-thank-you", post(recorded_thank_you))
        .route("/voice/recording-status", post(recording_status))
        .route("/voice/call-status", post(call_status))
        .merge(health::router())
        .with_state(state)
}

fn xml_response(xml: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], xml)
}

fn resolve_tenant(state: &AppState, payload: &VoicePayload) -> TenantId {
    state.resolver.resolve(payload.to.as_deref().unwrap_or(""))
}

async fn incoming(State(state): State<AppState>, Form(payload): Form<VoicePayload>) -> impl IntoResponse {
    state.stats.record_call();
    let tenant = resolve_tenant(&state, &payload);
    let (config, origin) = state.cache.get(&tenant).await;
    let open = is_open(&config, None);

    info!(
        tenant = %tenant,
        call_sid = payload.call_sid.as_deref().unwrap_or("unknown"),
        from = payload.from.as_deref().unwrap_or("unknown"),
        open,
        config_origin = origin.as_str(),
        "incoming call"
    );

    if let Some(call_sid) = &payload.call_sid {
        state.sessions.merge(
            call_sid,
            SessionPatch {
                tenant_id: Some(tenant.as_str().to_owned()),
                from_number: payload.from.clone(),
                to_number: payload.to.clone(),
                is_open: Some(open),
                menu_selection: (!open).then(|| "off".to_owned()),
                ..SessionPatch::default()
            },
        );
    }

    xml_response(twiml::incoming_response(&config, open))
}

async fn menu(State(state): State<AppState>, Form(payload): Form<VoicePayload>) -> impl IntoResponse {
    let tenant = resolve_tenant(&state, &payload);
    let (config, _) = state.cache.get(&tenant).await;
    let digit = payload.digits.clone().unwrap_or_default();

    let selection = match digit.as_str() {
        "1" => "repair".to_owned(),
        "2" => "accessory".to_owned(),
        "3" => "hours".to_owned(),
        other => format!("invalid({other})"),
    };

    info!(
        tenant = %tenant,
        call_sid = payload.call_sid.as_deref().unwrap_or("unknown"),
        digit = %digit,
        selection = %selection,
        "menu selection"
    );

    if let Some(call_sid) = &payload.call_sid {
        state.sessions.merge(
            call_sid,
            SessionPatch {
                menu_selection: Some(selection),
                digit: Some(digit.clone()),
                ..SessionPatch::default()
            },
        );
    }

    xml_response(twiml::menu_response(&config, &digit))
}

async fn no_input(State(state): State<AppState>, Form(payload): Form<VoicePayload>) -> impl IntoResponse {
    let tenant = resolve_tenant(&state, &payload);
    let (config, _) = state.cache.get(&tenant).await;

    if let Some(call_sid) = &payload.call_sid {
        state.sessions.merge(
            call_sid,
            SessionPatch {
                menu_selection: Some("no-input".to_owned()),
                ..SessionPatch::default()
            },
        );
    }

    xml_response(twiml::no_input_response(&config))
}

async fn recorded_thank_you(
    State(state): State<AppState>,
    Form(payload): Form<VoicePayload>,
) -> impl IntoResponse {
    let tenant = resolve_tenant(&state, &payload);
    let (config, _) = state.cache.get(&tenant).await;
    xml_response(twiml::thank_you_response(&config))
}

/// Acknowledges immediately; the recording is processed on a detached task.
async fn recording_status(
    State(state): State<AppState>,
    Form(payload): Form<VoicePayload>,
) -> StatusCode {
    let Some(recording_url) = payload.recording_url.clone() else {
        warn!(
            call_sid = payload.call_sid.as_deref().unwrap_or("unknown"),
            "recording status callback without a recording URL"
        );
        return StatusCode::OK;
    };

    let session = payload
        .call_sid
        .as_deref()
        .map(|sid| state.sessions.get(sid))
        .unwrap_or_default();
    let tenant = session
        .tenant_id
        .as_deref()
        .map(TenantId::from)
        .unwrap_or_else(|| resolve_tenant(&state, &payload));

    let job = RecordingJob {
        tenant_id: tenant,
        recording_url,
        from_number: payload.from.clone().or_else(|| session.from_number.clone()),
        call_sid: payload.call_sid.clone(),
        duration: payload.recording_duration.clone().or_else(|| session.call_duration.clone()),
        menu_selection: session.menu_selection.clone(),
    };

    state.pipeline.dispatch(job);
    StatusCode::OK
}

async fn call_status(State(state): State<AppState>, Form(payload): Form<VoicePayload>) -> StatusCode {
    if let Some(call_sid) = &payload.call_sid {
        info!(
            call_sid = %call_sid,
            status = payload.call_status.as_deref().unwrap_or("unknown"),
            duration = payload.call_duration.as_deref().unwrap_or("unknown"),
            "call status update"
        );
        state.sessions.merge(
            call_sid,
            SessionPatch {
                call_status: payload.call_status.clone(),
                call_duration: payload.call_duration.clone(),
                ..SessionPatch::default()
            },
        );
    }
    StatusCode::OK
}
