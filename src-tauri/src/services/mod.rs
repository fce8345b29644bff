pub mod config_service;
pub mod connection;
pub mod export_service;
pub mod file_service;
pub mod ingest_service;
pub mod protocol;
pub mod router;
pub mod session_service;
