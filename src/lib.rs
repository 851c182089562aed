use std::path::PathBuf;

pub mod client;
pub mod config;
pub mod demo;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod mcp;
pub mod stdio;
pub mod transport;

#[derive(Debug, Clone)]
pub struct AppState {
    pub project_root: PathBuf,
}

impl AppState {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }
}
