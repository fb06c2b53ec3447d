//! Operation registry
//!
//! Holds the registered operations and the latest result of each. The two
//! tables sit behind independent reader/writer locks; operation logic always
//! runs outside of both.
//!
//! Concurrent runs of the same operation are not serialized. Whichever run
//! stores last wins.

#![allow(dead_code)]

use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::executor::ExecutionContext;
use crate::models::{Operation, OperationInfo, OperationResult};
use crate::utils::Timer;

type ResultTable = Arc<RwLock<HashMap<String, Arc<OperationResult>>>>;

/// Registry errors
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("operation '{0}' not found")]
    NotFound(String),
}

/// Concurrent catalog of operations and their latest results
#[derive(Default)]
pub struct Registry {
    operations: RwLock<HashMap<String, Operation>>,
    results: ResultTable,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation; identifiers are unique
    pub fn register(&self, operation: Operation) -> Result<(), RegistryError> {
        let mut operations = write(&self.operations);
        if operations.contains_key(&operation.id) {
            return Err(RegistryError::DuplicateOperation(operation.id));
        }

        debug!("Registered operation {}", operation.info());
        operations.insert(operation.id.clone(), operation);
        Ok(())
    }

    /// Look up an operation without running it
    pub fn get(&self, id: &str) -> Option<OperationInfo> {
        read(&self.operations).get(id).map(Operation::info)
    }

    /// Snapshot of all registered operations, sorted by id
    pub fn list(&self) -> Vec<OperationInfo> {
        let mut infos: Vec<OperationInfo> =
            read(&self.operations).values().map(Operation::info).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn len(&self) -> usize {
        read(&self.operations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run an operation and store its result
    ///
    /// The operation receives a child of `ctx`, which is cancelled when this
    /// future completes or is dropped. The operation itself runs on its own
    /// task and always stores its result, even if the caller went away.
    /// A panic inside the operation becomes a `failed` result.
    pub async fn run(
        &self,
        id: &str,
        ctx: &ExecutionContext,
    ) -> Result<Arc<OperationResult>, RegistryError> {
        let operation = read(&self.operations)
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let (child, _cancel) = ctx.child();
        let results = Arc::clone(&self.results);
        let op_id = id.to_string();

        info!("Running operation {}", op_id);

        let task = tokio::spawn(async move {
            let timer = Timer::start(op_id.as_str());

            let outcome = AssertUnwindSafe(async move { operation.invoke(child).await })
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(result) => finalize(&op_id, result),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Operation {} panicked: {}", op_id, message);
                    OperationResult::started_at(op_id.as_str(), timer.started_at())
                        .fail(format!("operation panicked: {message}"))
                }
            };

            info!("  {} ({}ms wall)", result, timer.stop().as_millis());
            store(&results, &op_id, result)
        });

        match task.await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Operation task for {} did not complete: {}", id, e);
                let result = OperationResult::start(id).fail(format!("operation aborted: {e}"));
                Ok(store(&self.results, id, result))
            }
        }
    }

    /// Latest stored result for `id`, if it has ever finished
    pub fn get_result(&self, id: &str) -> Option<Arc<OperationResult>> {
        read(&self.results).get(id).cloned()
    }
}

/// Normalize what an operation handed back before it is stored
fn finalize(id: &str, mut result: OperationResult) -> OperationResult {
    if result.test_id != id {
        warn!(
            "Operation {} reported result for '{}', correcting id",
            id, result.test_id
        );
        result.test_id = id.to_string();
    }

    if !result.status.is_terminal() {
        let status = result.status;
        warn!("Operation {} returned non-terminal status {}", id, status);
        return result.fail(format!("operation finished with non-terminal status '{status}'"));
    }

    result
}

fn store(results: &ResultTable, id: &str, result: OperationResult) -> Arc<OperationResult> {
    let result = Arc::new(result);
    write(results).insert(id.to_string(), Arc::clone(&result));
    result
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Tables are only ever mutated by single inserts, so a poisoned lock still
// holds consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
