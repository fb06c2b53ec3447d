//! Execution engine
//!
//! Provides the cancellable execution context and the bounded command
//! executor.

mod command;
mod context;

pub use command::{execute_command, execute_command_with_context, ExecError};
pub use context::{ExecutionContext, Params};
