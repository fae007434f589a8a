//! Executor registry

use super::{EchoExecutor, ExecutorKind, TaskExecutor};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lookup from executor kind to its implementation
///
/// Built once before any run starts and shared read-only between runs.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: BTreeMap<ExecutorKind, Arc<dyn TaskExecutor>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.kinds())
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an [`EchoExecutor`] for every kind
    pub fn dry_run() -> Self {
        ExecutorKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, kind| {
                registry.with(kind, EchoExecutor::new(kind))
            })
    }

    /// Register an executor, replacing any previous one for `kind`
    pub fn register(&mut self, kind: ExecutorKind, executor: impl TaskExecutor + 'static) {
        self.executors.insert(kind, Arc::new(executor));
    }

    /// Register an already shared executor
    pub fn register_shared(&mut self, kind: ExecutorKind, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(kind, executor);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, kind: ExecutorKind, executor: impl TaskExecutor + 'static) -> Self {
        self.register(kind, executor);
        self
    }

    pub fn get(&self, kind: ExecutorKind) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ExecutorKind) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Registered kinds in priority order
    pub fn kinds(&self) -> Vec<ExecutorKind> {
        self.executors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ExecutorRegistry::new();
        assert!(registry.is_empty());

        registry.register(ExecutorKind::Security, EchoExecutor::new(ExecutorKind::Security));
        assert!(registry.contains(ExecutorKind::Security));
        assert!(registry.get(ExecutorKind::Build).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dry_run_covers_every_kind() {
        let registry = ExecutorRegistry::dry_run();
        assert_eq!(registry.kinds(), ExecutorKind::ALL.to_vec());
    }
}
