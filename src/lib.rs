//! CRWN client data layer: remote data gateway, per-screen hooks and the
//! collaborator seams (backend, navigation, device).

pub mod backend;
pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod platform;
pub mod services;
pub mod state;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::{AppState, AuthContext};
