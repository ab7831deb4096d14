//! Shared application state for the API backend.

use stardrop_common::Config;
use stardrop_engine::Engine;

/// Everything the handlers need. Wrapped in an `Arc` by [`crate::app`].
pub struct AppState {
    pub engine: Engine,
    pub config: Config,
}

impl AppState {
    pub fn new(engine: Engine, config: Config) -> Self {
        Self { engine, config }
    }
}
