//! Model Context Protocol server handling and JSON-RPC implementations
//!
//! Provides protocol-level specifics surrounding JSON-RPC formatting, version negotiation,
//! and method routing.

pub mod rpc;
pub mod server;
