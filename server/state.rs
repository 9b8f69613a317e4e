use std::sync::Arc;

use neurite::TrainingSession;

use crate::config::ServerConfig;

/// Everything a handler can reach. Shared by every request thread.
pub struct AppState {
    pub session: TrainingSession,
    pub config: ServerConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: ServerConfig) -> AppState {
        let mut session = match config.seed {
            Some(seed) => TrainingSession::seeded(seed),
            None => TrainingSession::new(),
        };
        if let Some(dir) = &config.journal_dir {
            session = session.with_journal_dir(dir);
        }
        AppState { session, config }
    }
}
