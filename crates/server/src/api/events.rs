//! Platform event handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::tickets::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChannelDeletedBody {
    pub channel_id: u64,
}

#[derive(Debug, Serialize)]
pub struct ChannelDeletedResponse {
    pub tickets_removed: u64,
}

/// Reconcile after a ticket channel was deleted directly on the platform.
pub async fn channel_deleted(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(body): Json<ChannelDeletedBody>,
) -> Result<Json<ChannelDeletedResponse>, impl IntoResponse> {
    match state
        .lifecycle()
        .handle_channel_deleted(guild_id, body.channel_id)
        .await
    {
        Ok(removed) => Ok(Json(ChannelDeletedResponse {
            tickets_removed: removed,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
