mod crm_error;
mod mcp_error;
mod tool_error;

pub use crm_error::CrmError;
pub use mcp_error::{ErrorCode, McpError};
pub use tool_error::{ToolError, ToolErrorKind};
