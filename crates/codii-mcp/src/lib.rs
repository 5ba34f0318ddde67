//! Codii MCP Server
//!
//! Model Context Protocol server exposing the indexing and search
//! operations to AI assistants over stdio.

mod protocol;
mod server;
mod tools;

pub use server::start_server;
