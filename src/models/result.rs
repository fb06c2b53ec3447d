//! Operation result models
//!
//! Defines the status lifecycle and the result record of one execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an operation execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "○",
            OperationStatus::Running => "…",
            OperationStatus::Completed => "✓",
            OperationStatus::Failed => "✗",
            OperationStatus::Cancelled => "!",
        }
    }

    /// Whether the status can no longer change for this result
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Running => "running",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single operation execution
///
/// A result is created in the `running` state when execution starts and is
/// finalized exactly once through [`complete`](Self::complete),
/// [`fail`](Self::fail) or [`cancel`](Self::cancel).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub test_id: String,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OperationResult {
    /// Start a new result for `test_id` at the current time
    pub fn start(test_id: impl Into<String>) -> Self {
        Self::started_at(test_id, Utc::now())
    }

    /// Start a new result with an explicit start timestamp
    pub fn started_at(test_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            test_id: test_id.into(),
            status: OperationStatus::Running,
            start_time,
            end_time: start_time,
            duration_ms: 0,
            output: String::new(),
            error: None,
            data: None,
        }
    }

    pub fn complete(self) -> Self {
        self.finish(OperationStatus::Completed)
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.finish(OperationStatus::Failed)
    }

    pub fn cancel(mut self) -> Self {
        if self.error.is_none() {
            self.error = Some("operation cancelled".to_string());
        }
        self.finish(OperationStatus::Cancelled)
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    fn finish(mut self, status: OperationStatus) -> Self {
        let end_time = Utc::now();
        self.status = status;
        self.end_time = end_time;
        self.duration_ms = (end_time - self.start_time).num_milliseconds().max(0) as u64;
        self
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.test_id,
            self.duration_ms
        )?;
        if let Some(err) = &self.error {
            write!(f, " - {err}")?;
        }
        Ok(())
    }
}
