//! Ad-hoc command models
//!
//! Request and result records for the bounded command executor.

#![allow(dead_code)]

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::executor::ExecError;

/// Timeout applied when an invocation does not specify a positive one
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// A request to run an external process
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// Executable to run
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Timeout in seconds; zero or negative selects the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,

    /// Working directory override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, secs: i64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn directory(mut self, dir: impl Into<String>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    /// Timeout actually applied to the process
    pub fn effective_timeout(&self) -> Duration {
        match self.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of a command execution
///
/// Failures are carried as data; `failure` serializes as the `error` string
/// and is absent when the process ran to completion, even with a non-zero
/// exit code.
#[derive(Clone, Debug, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: i32,
    pub output: String,
    #[serde(
        rename = "error",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_failure"
    )]
    pub failure: Option<ExecError>,
    pub execution_time_ms: u64,
}

impl CommandResult {
    /// The process ran to completion with `exit_code`
    pub fn exited(exit_code: i32, output: String, execution_time_ms: u64) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            output,
            failure: None,
            execution_time_ms,
        }
    }

    /// The process could not be run to completion
    pub fn failed(failure: ExecError, output: String, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            exit_code: -1,
            output,
            failure: Some(failure),
            execution_time_ms,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

fn serialize_failure<S>(failure: &Option<ExecError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match failure {
        Some(err) => serializer.collect_str(err),
        None => serializer.serialize_none(),
    }
}

/// Join stdout and stderr, separated by a newline only when both are present
pub fn combine_output(stdout: &str, stderr: &str) -> String {
    let mut output = stdout.to_string();
    if !stderr.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(stderr);
    }
    output
}
