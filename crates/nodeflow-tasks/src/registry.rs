use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::{TaskExecutor, TaskHandler};
use nodeflow_core::types::{Ports, TaskContext, TaskKind};

/// Registry of task handlers, dispatched by [`TaskKind`].
///
/// A kind may also carry a fallback handler, which answers instead when
/// the primary handler fails on a provider error.
pub struct TaskRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
    fallbacks: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallbacks: HashMap::new(),
        }
    }

    /// Register a handler, replacing any existing one for the same kind.
    pub fn register(&mut self, handler: impl TaskHandler) {
        let kind = handler.kind();
        self.handlers.insert(kind, Arc::new(handler));
    }

    /// Register the handler used when the primary one hits a provider error.
    pub fn register_fallback(&mut self, handler: impl TaskHandler) {
        let kind = handler.kind();
        self.fallbacks.insert(kind, Arc::new(handler));
    }

    pub fn has_fallback(&self, kind: TaskKind) -> bool {
        self.fallbacks.contains_key(&kind)
    }

    /// Registered kinds, in declaration order.
    pub fn kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .iter()
            .copied()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for TaskRegistry {
    fn execute(
        &self,
        kind: TaskKind,
        inputs: Ports,
        ctx: TaskContext,
    ) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let handler = self
                .handlers
                .get(&kind)
                .ok_or(NodeflowError::UnsupportedTask(kind))?;
            debug!(node_id = %ctx.node_id, kind = %kind, "Dispatching task");

            let Some(fallback) = self.fallbacks.get(&kind) else {
                return handler.execute(inputs, ctx).await;
            };
            match handler.execute(inputs.clone(), ctx.clone()).await {
                Err(e @ (NodeflowError::ProviderRequest(_) | NodeflowError::ProviderParse(_))) => {
                    warn!(node_id = %ctx.node_id, kind = %kind, error = %e, "Provider call failed, using simulated output");
                    fallback.execute(inputs, ctx).await
                }
                other => other,
            }
        })
    }
}
