use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{events, guilds, handlers, middleware, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Tickets
        .route("/guilds/{guild_id}/tickets", post(tickets::open_ticket))
        .route(
            "/guilds/{guild_id}/channels/{channel_id}/ticket",
            get(tickets::get_ticket),
        )
        .route(
            "/guilds/{guild_id}/channels/{channel_id}/close",
            post(tickets::close_ticket),
        )
        .route(
            "/guilds/{guild_id}/channels/{channel_id}/participants",
            post(tickets::add_participant),
        )
        // Per-guild settings
        .route("/guilds/{guild_id}/config", get(guilds::get_guild_config))
        .route("/guilds/{guild_id}/config", put(guilds::put_guild_config))
        // Platform events
        .route(
            "/guilds/{guild_id}/events/channel-deleted",
            post(events::channel_deleted),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(axum_middleware::from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
}
