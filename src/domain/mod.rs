//! Tools, prompts and resources exposed over the MCP protocol

pub mod calculator;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod utils;
