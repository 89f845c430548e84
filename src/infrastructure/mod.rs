pub mod config;
pub mod credential_store;
pub mod error;
pub mod habit_api_client;
