use helpdesk_core::{Config, SanitizedConfig, TicketLifecycle};

/// Shared application state
pub struct AppState {
    config: Config,
    lifecycle: TicketLifecycle,
}

impl AppState {
    pub fn new(config: Config, lifecycle: TicketLifecycle) -> Self {
        Self { config, lifecycle }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn lifecycle(&self) -> &TicketLifecycle {
        &self.lifecycle
    }
}
