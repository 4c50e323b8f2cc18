//! Shared application state for the HTTP server

use std::sync::Arc;

use crate::engine::RagEngine;

/// Cheaply cloneable handle to the engine
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RagEngine>,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &RagEngine {
        &self.engine
    }
}
