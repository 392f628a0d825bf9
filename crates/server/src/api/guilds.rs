//! Per-guild ticket settings handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use helpdesk_core::ticket::GuildTicketConfig;

use super::tickets::ErrorResponse;
use crate::state::AppState;

pub async fn get_guild_config(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
) -> Result<Json<GuildTicketConfig>, impl IntoResponse> {
    match state.lifecycle().guild_config(guild_id).await {
        Ok(config) => Ok(Json(config)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

pub async fn put_guild_config(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(config): Json<GuildTicketConfig>,
) -> Result<StatusCode, impl IntoResponse> {
    match state.lifecycle().save_guild_config(guild_id, &config).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
