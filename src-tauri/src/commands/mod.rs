mod config;
mod classes;
mod sources;
mod session;
mod export;

pub use config::*;
pub use classes::*;
pub use sources::*;
pub use session::*;
pub use export::*;

use crate::services::file_service::Storage;
use crate::services::session_service::SessionRegistry;

/// Shared state behind every command.
pub struct AppState {
    pub storage: Storage,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            sessions: SessionRegistry::default(),
        }
    }
}
