pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod logging;
pub mod routes;
mod server;
pub mod services;
mod state;

pub use server::{ServerError, run, shutdown_signal};
pub use state::AppState;
