//! Keka MCP server: exposes the Keka HR REST API as Model Context Protocol
//! tools, backed by a tenant-scoped OAuth token provider.

pub mod mcp;
