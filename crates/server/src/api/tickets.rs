//! Ticket API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use helpdesk_core::lifecycle::CloseError;
use helpdesk_core::provision::{OpenError, OpenRequest};
use helpdesk_core::ticket::Ticket;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for opening a ticket
#[derive(Debug, Deserialize)]
pub struct OpenTicketBody {
    pub author_id: u64,
    pub author_display_name: String,
    pub title: String,
    #[serde(default)]
    pub question: String,
}

/// Request body for adding a participant
#[derive(Debug, Deserialize)]
pub struct AddParticipantBody {
    pub user_id: u64,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub guild_id: u64,
    pub local_id: i64,
    pub channel_id: u64,
    pub title: String,
    pub question: String,
    pub author_id: u64,
    pub author_display_name: String,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub open: bool,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            guild_id: ticket.guild_id,
            local_id: ticket.local_id,
            channel_id: ticket.channel_id,
            title: ticket.title.clone(),
            question: ticket.question.clone(),
            author_id: ticket.author_id,
            author_display_name: ticket.author_display_name.clone(),
            created_at: ticket.created_at.to_rfc3339(),
            closed_at: ticket.closed_at.map(|t| t.to_rfc3339()),
            open: ticket.is_open(),
        }
    }
}

/// Response for a completed close
#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub local_id: i64,
    pub messages: usize,
    pub transcript_uploaded: bool,
    pub archive_uploads: usize,
    pub attachments_archived: usize,
}

/// Response for adding a participant
#[derive(Debug, Serialize)]
pub struct AddParticipantResponse {
    pub added: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_json(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn open_error_status(error: &OpenError) -> StatusCode {
    match error {
        OpenError::MaxOpenTickets => StatusCode::CONFLICT,
        e if e.is_user_error() => StatusCode::BAD_REQUEST,
        OpenError::Chat(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn close_error_status(error: &CloseError) -> StatusCode {
    match error {
        CloseError::NotATicket => StatusCode::NOT_FOUND,
        CloseError::AlreadyClosing => StatusCode::CONFLICT,
        CloseError::Chat(_) => StatusCode::BAD_GATEWAY,
        CloseError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a ticket in a guild
pub async fn open_ticket(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<u64>,
    Json(body): Json<OpenTicketBody>,
) -> Result<(StatusCode, Json<TicketResponse>), impl IntoResponse> {
    let request = OpenRequest {
        author_id: body.author_id,
        author_display_name: body.author_display_name,
        title: body.title,
        question: body.question,
    };

    match state.lifecycle().open(guild_id, request).await {
        Ok(ticket) => Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket)))),
        Err(e) => Err(error_json(open_error_status(&e), e)),
    }
}

/// Get the ticket bound to a channel
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path((guild_id, channel_id)): Path<(u64, u64)>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    match state.lifecycle().ticket_by_channel(guild_id, channel_id).await {
        Ok(Some(ticket)) => Ok(Json(TicketResponse::from(ticket))),
        Ok(None) => Err(error_json(StatusCode::NOT_FOUND, "ticket not found")),
        Err(e) => Err(error_json(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

/// Close the ticket bound to a channel
pub async fn close_ticket(
    State(state): State<Arc<AppState>>,
    Path((guild_id, channel_id)): Path<(u64, u64)>,
) -> Result<Json<CloseResponse>, impl IntoResponse> {
    match state.lifecycle().close(guild_id, channel_id).await {
        Ok(outcome) => Ok(Json(CloseResponse {
            local_id: outcome.local_id,
            messages: outcome.messages,
            transcript_uploaded: outcome.transcript_uploaded,
            archive_uploads: outcome.archive.uploads,
            attachments_archived: outcome.archive.files_archived,
        })),
        Err(e) => Err(error_json(close_error_status(&e), e)),
    }
}

/// Grant a user access to a ticket channel
pub async fn add_participant(
    State(state): State<Arc<AppState>>,
    Path((guild_id, channel_id)): Path<(u64, u64)>,
    Json(body): Json<AddParticipantBody>,
) -> Result<Json<AddParticipantResponse>, impl IntoResponse> {
    match state
        .lifecycle()
        .add_participant(guild_id, channel_id, body.user_id)
        .await
    {
        Ok(added) => Ok(Json(AddParticipantResponse { added })),
        Err(e) => Err(error_json(close_error_status(&e), e)),
    }
}
