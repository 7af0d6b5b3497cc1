use std::sync::Arc;

use boardroom_core::{MessageGenerator, Roster};

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<MessageGenerator>,
    /// Same roster the generator speaks with, listed by `/agents` and `/topics`.
    pub roster: Arc<Roster>,
}

impl AppState {
    pub fn new(generator: Arc<MessageGenerator>) -> Self {
        let roster = generator.roster().clone();
        Self { generator, roster }
    }
}
