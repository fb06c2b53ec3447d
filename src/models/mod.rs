//! Data models for the host agent
//!
//! Operations, their results, and ad-hoc command records.

mod command;
mod operation;
mod result;

pub use command::{combine_output, CommandInvocation, CommandResult};
pub use operation::{Operation, OperationInfo};
pub use result::{OperationResult, OperationStatus};
