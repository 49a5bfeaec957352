//! Process wiring for the LLM provider fleet control plane: assembles
//! the five control-plane crates behind a small admin HTTP surface.

pub mod admin;
pub mod config;

pub use admin::{build_app, AppState};
pub use config::FleetConfig;
