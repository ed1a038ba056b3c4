//! Programmatic Tool Calling (PTC) host.
//!
//! A trusted orchestrator that lets an agent express a multi-tool
//! workflow as one piece of source code, executes it inside an isolated
//! sandbox, and services the sandbox's tool-call requests on the host --
//! where the real tool implementations, credentials, and validation logic
//! live. The sandbox can only *request* a tool call; it can never perform
//! one directly.

pub mod assembler;
pub mod cache_key;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor_tool;
pub mod orchestrator;
pub mod protocol;
pub mod sandbox;
pub mod schema;
pub mod tool;
pub mod utils;

pub use catalog::{Catalog, ToolInfo};
pub use config::{ClientConfig, SandboxLanguage};
pub use error::{CatalogError, PtcError};
pub use executor_tool::create_executor_tool;
pub use orchestrator::{Client, ExecutionResult};
pub use schema::Schema;
pub use tool::{Tool, ToolSpec};
