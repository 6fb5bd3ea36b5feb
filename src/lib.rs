// Static file server + WebSocket message relay
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod static_files;
pub mod supervisor;

// Append-only message store
pub mod message_store;
