//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the chat platform traits,
//! allowing comprehensive lifecycle testing without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use helpdesk_core::testing::{MockChannelService, MockTransferService};
//!
//! let channels = MockChannelService::new();
//! let transfer = MockTransferService::new();
//!
//! // Configure mock state
//! channels.seed_history(10, messages).await;
//! transfer.seed_download("https://cdn.example/a.png", bytes).await;
//!
//! // Use behind Arc<dyn ChannelService> / Arc<dyn TransferService>...
//! ```

mod mock_channel_service;
mod mock_transfer_service;

pub use mock_channel_service::MockChannelService;
pub use mock_transfer_service::{MockTransferService, RecordedUpload};
