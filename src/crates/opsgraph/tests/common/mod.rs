//! Scripted executors shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use opsgraph::{Context, ExecutionResult, ExecutorKind, ExecutorRegistry, OrchestratorError, TaskExecutor};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Always succeeds with a fixed payload, counting its calls
#[derive(Debug, Default, Clone)]
pub struct Scripted {
    payload: Map<String, Value>,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TaskExecutor for Scripted {
    async fn execute(&self, _task: &str, _context: &Context, _cancel: CancellationToken) -> opsgraph::Result<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionResult::success(self.payload.clone()))
    }
}

/// Fails the first `failures` calls, then succeeds
#[derive(Debug, Clone)]
pub struct Flaky {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl Flaky {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never succeeds
    pub fn broken() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TaskExecutor for Flaky {
    async fn execute(&self, _task: &str, _context: &Context, _cancel: CancellationToken) -> opsgraph::Result<ExecutionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Ok(ExecutionResult::failure(format!("attempt {} failed", call + 1)))
        } else {
            Ok(ExecutionResult::success(Map::new()))
        }
    }
}

/// Plays back a fixed list of results, repeating the last one
#[derive(Debug, Clone)]
pub struct Sequenced {
    results: Vec<ExecutionResult>,
    calls: Arc<AtomicUsize>,
}

impl Sequenced {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TaskExecutor for Sequenced {
    async fn execute(&self, _task: &str, _context: &Context, _cancel: CancellationToken) -> opsgraph::Result<ExecutionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .results
            .get(call)
            .or_else(|| self.results.last())
            .cloned()
            .unwrap_or_else(|| ExecutionResult::failure("no scripted result"));
        Ok(result)
    }
}

/// Returns `Err` instead of a failure result
#[derive(Debug, Clone)]
pub struct Erroring;

#[async_trait]
impl TaskExecutor for Erroring {
    async fn execute(&self, _task: &str, _context: &Context, _cancel: CancellationToken) -> opsgraph::Result<ExecutionResult> {
        Err(OrchestratorError::Executor {
            executor: "build".to_string(),
            message: "tool crashed".to_string(),
        })
    }
}

/// Panics on every call
#[derive(Debug, Clone)]
pub struct Panicking;

#[async_trait]
impl TaskExecutor for Panicking {
    async fn execute(&self, _task: &str, _context: &Context, _cancel: CancellationToken) -> opsgraph::Result<ExecutionResult> {
        panic!("executor blew up");
    }
}

/// Sleeps before succeeding; ignores cancellation so the driver has to stop it
#[derive(Debug, Clone)]
pub struct Slow {
    delay: Duration,
}

impl Slow {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl TaskExecutor for Slow {
    async fn execute(&self, _task: &str, _context: &Context, _cancel: CancellationToken) -> opsgraph::Result<ExecutionResult> {
        tokio::time::sleep(self.delay).await;
        Ok(ExecutionResult::success(Map::new()))
    }
}

/// Registry with a succeeding executor for every kind
pub fn all_ok() -> ExecutorRegistry {
    ExecutorKind::ALL
        .into_iter()
        .fold(ExecutorRegistry::new(), |registry, kind| registry.with(kind, Scripted::ok()))
}
