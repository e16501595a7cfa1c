use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Performs the work behind one node.
///
/// The engine calls this once per executed node and awaits the result.
/// Timeouts, retries and provider selection are the executor's concern.
pub trait TaskExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        kind: TaskKind,
        inputs: Ports,
        ctx: TaskContext,
    ) -> BoxFuture<'_, Result<Ports>>;
}

/// One capability, registered for a single task kind.
pub trait TaskHandler: Send + Sync + 'static {
    /// The kind this handler serves.
    fn kind(&self) -> TaskKind;

    /// Run the task with the node's current inputs.
    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>>;
}
