//! Operation models
//!
//! An operation is a named, registered unit of executable logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::executor::ExecutionContext;
use crate::models::OperationResult;

/// Boxed future returned by an operation's executable unit
pub type OperationFuture = Pin<Box<dyn Future<Output = OperationResult> + Send + 'static>>;

type ExecuteFn = Arc<dyn Fn(ExecutionContext) -> OperationFuture + Send + Sync>;

/// A registered operation
///
/// The executable unit is private to the crate; callers only ever see
/// [`OperationInfo`].
#[derive(Clone)]
pub struct Operation {
    pub id: String,
    pub name: String,
    pub description: String,
    execute: ExecuteFn,
}

impl Operation {
    pub fn new<F, Fut>(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        execute: F,
    ) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            execute: Arc::new(move |ctx| Box::pin(execute(ctx))),
        }
    }

    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    pub(crate) fn invoke(&self, ctx: ExecutionContext) -> OperationFuture {
        (self.execute)(ctx)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Public description of a registered operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl fmt::Display for OperationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.name)
    }
}
