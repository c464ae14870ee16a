// Application state management
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::DatabaseConnection;
use crate::session::PlayerSession;

pub struct AppState {
    pub session: Arc<PlayerSession>,
    /// `None` when the state database could not be opened; the player
    /// still runs, it just cannot remember the directory
    pub db: Option<DatabaseConnection>,
    pub app_dir: PathBuf,
}

impl AppState {
    pub fn new(
        session: Arc<PlayerSession>,
        db: Option<DatabaseConnection>,
        app_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            db,
            app_dir,
        }
    }
}
