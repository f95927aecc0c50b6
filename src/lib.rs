pub mod api;
pub mod app;
pub mod config;
pub mod events;
pub mod insights;
pub mod location;
pub mod logging;
pub mod lookup;
pub mod models;
pub mod parser;
pub mod ui;
