use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::Result;

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => debug!("spawned task: {name} finished"),
            Err(e) => error!("spawned task: {name} stopped or encountered an error: {:?}", e),
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
