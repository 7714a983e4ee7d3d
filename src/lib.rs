pub mod app;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod error;
pub mod models;
pub mod notify;
pub mod render;
pub mod state;
pub mod store;
pub mod tmdb;
pub mod view;
