//! Chat platform abstraction.
//!
//! This module provides the [`ChannelService`] and [`TransferService`]
//! traits the ticket components consume, plus the production REST
//! implementation in [`DiscordRestService`]. The traits deliberately cover
//! only what the ticket subsystem needs: channel provisioning and teardown,
//! paginated history retrieval, permission edits, message sends and file
//! transfers.

mod discord;
mod types;

pub use discord::DiscordRestService;
pub use types::*;
