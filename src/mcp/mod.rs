// JSON-RPC framing and tool dispatch for the MCP surface
pub mod handler;
pub mod protocol;
