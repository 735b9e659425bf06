//! Function tools exposed to the conversational language model
//!
//! The upstream model decides when a tool is warranted; this module holds
//! the tool contract and the registry the transport dispatches through.

pub mod definition;
pub mod manager;
pub mod traits;

pub use definition::{SchemaBuilder, ToolDefinition};
pub use manager::ToolManager;
pub use traits::{Tool, ToolResult};
