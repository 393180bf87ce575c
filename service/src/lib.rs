use config::Config;
use sse::Hub;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_hub: Hub,
}

impl AppState {
    pub fn new(app_config: Config, sse_hub: Hub) -> Self {
        Self {
            config: app_config,
            sse_hub,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.sse_hub
    }
}
