//! Collection trigger endpoints.
//!
//! The watchdog raises wake-up, user-switch and custom collection events
//! itself. These endpoints let an operator raise them against the server's
//! delta source. Every triggered event moves the source to its next sample,
//! so no interval is recorded twice.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use herakles_perf_profiler::{parse_package_filter, SystemState};
use serde::Deserialize;
use std::time::SystemTime;
use tracing::{info, instrument, warn};

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct UserSwitchParams {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomParams {
    /// Comma-separated package names; empty collects the Top-N.
    #[serde(default)]
    pub packages: Option<String>,
    #[serde(default)]
    pub state: SystemState,
}

fn outcome_response(result: herakles_perf_profiler::Result<()>) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, "Collection recorded\n").into_response(),
        Err(e) => {
            warn!("Triggered collection failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, format!("Collection failed: {e}\n")).into_response()
        }
    }
}

/// Handler for POST /collect/wake-up.
#[instrument(skip(state))]
pub async fn wake_up_handler(State(state): State<SharedState>) -> Response {
    state.source.advance();
    let result = state
        .profiler
        .on_wake_up_collection(SystemTime::now(), &state.source, &state.source);
    state.record_outcome(&result).await;
    outcome_response(result)
}

/// Handler for POST /collect/user-switch.
#[instrument(skip(state))]
pub async fn user_switch_handler(
    State(state): State<SharedState>,
    Query(params): Query<UserSwitchParams>,
) -> Response {
    info!("User switch from {} to {}", params.from, params.to);
    state.source.advance();
    let result = state.profiler.on_user_switch_collection(
        SystemTime::now(),
        params.from,
        params.to,
        &state.source,
        &state.source,
    );
    state.record_outcome(&result).await;
    outcome_response(result)
}

/// Handler for POST /collect/custom.
#[instrument(skip(state))]
pub async fn custom_handler(
    State(state): State<SharedState>,
    Query(params): Query<CustomParams>,
) -> Response {
    let filter = params
        .packages
        .as_deref()
        .map(parse_package_filter)
        .unwrap_or_default();
    state.source.advance();
    let result = state.profiler.on_custom_collection(
        SystemTime::now(),
        params.state,
        &filter,
        &state.source,
        &state.source,
        None,
    );
    state.record_outcome(&result).await;
    outcome_response(result)
}

/// Handler for DELETE /dump/custom, ending the custom collection.
#[instrument(skip(state))]
pub async fn end_custom_handler(State(state): State<SharedState>) -> Response {
    match state.profiler.on_custom_collection_dump(None) {
        Ok(()) => (StatusCode::OK, "Custom collection cleared\n").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")).into_response(),
    }
}
