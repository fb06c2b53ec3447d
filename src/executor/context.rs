//! Cancellable execution context
//!
//! Carries request parameters and cancellation signals into operations and
//! command executions.

#![allow(dead_code)]

use futures::future::select_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// Parameters passed along with an execution request
pub type Params = Map<String, Value>;

/// Context handed to every operation execution
///
/// A context is cancelled once any of its signals fires. Deriving a child
/// adds a signal, so a child observes its parent's cancellation but not the
/// other way round.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    params: Arc<Params>,
    signals: Vec<watch::Receiver<bool>>,
}

impl ExecutionContext {
    /// A context that is never cancelled
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    /// Derive a child context and the handle that cancels it
    pub fn child(&self) -> (ExecutionContext, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut signals = self.signals.clone();
        signals.push(rx);

        let ctx = ExecutionContext {
            params: Arc::clone(&self.params),
            signals,
        };
        (ctx, CancelHandle { tx })
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|rx| *rx.borrow())
    }

    /// Resolve once the context is cancelled; pends forever for a
    /// background context
    pub async fn cancelled(&self) {
        if self.signals.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.signals.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }
}

/// Cancels the context it was created with; cancels on drop as well
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}
