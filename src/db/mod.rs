// Database module
// This module handles SQLite-backed session persistence

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::DatabaseConnection;
pub use store::{StateStore, MUSIC_DIR_KEY};
