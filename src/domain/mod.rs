pub mod focus;
pub mod models;
