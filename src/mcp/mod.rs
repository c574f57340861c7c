//! Tool-call surface (spec §6): the ~20 RagStore operations exposed as
//! named tool calls with JSON arguments and JSON-or-error-text responses.
//!
//! This module implements argument parsing/validation and response
//! shaping — matching the teacher's `mcp::tools` + `mcp::tool_types`
//! split — but not the wire transport (stdio/http framing, JSON-RPC
//! envelope), which is the out-of-scope RPC transport per spec §1. The
//! `rmcp` crate remains a dependency for its tool/schema types even
//! though the live transport is not wired up here.

mod server;
mod tool_types;
mod tools;

pub use server::{McpServer, ToolResponse};
pub use tool_types::DocumentIds;
pub use tools::ToolRegistry;
