#![forbid(unsafe_code)]

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::TaskOutlineError;
use crate::task::model::{Task, TaskEnded, TaskExecution};

/// The host's task subsystem: enumeration and execution.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    async fn fetch_tasks(&self) -> anyhow::Result<Vec<Task>>;

    /// Requests execution. Completion is reported through [`TaskRegistry::subscribe_ended`].
    async fn execute_task(&self, task: &Task) -> Result<TaskExecution, TaskOutlineError>;

    fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded>;
}
