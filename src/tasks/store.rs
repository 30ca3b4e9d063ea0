//! Task storage.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::a2a::Task;

/// Pluggable store of task snapshots keyed by `(context_id, task_id)`.
#[async_trait]
pub trait TaskStore: Send + Sync + std::fmt::Debug {
    /// Insert a task that must not exist yet.
    ///
    /// Atomic: of two concurrent inserts for the same key exactly one
    /// succeeds. The loser gets the stored task back.
    async fn insert_new(&self, task: Task) -> Result<(), Task>;

    /// Look a task up. Without a context ID the first task with this ID wins.
    async fn get(&self, context_id: Option<&str>, task_id: &str) -> Option<Task>;

    /// Replace the stored snapshot of an existing task.
    async fn update(&self, task: Task);
}

type TaskKey = (String, String);

fn key(context_id: &str, task_id: &str) -> TaskKey {
    (context_id.to_string(), task_id.to_string())
}

/// Process-lifetime task store.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskKey, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert_new(&self, task: Task) -> Result<(), Task> {
        match self.tasks.entry(key(&task.context_id, &task.id)) {
            Entry::Occupied(existing) => Err(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(task);
                Ok(())
            }
        }
    }

    async fn get(&self, context_id: Option<&str>, task_id: &str) -> Option<Task> {
        match context_id {
            Some(ctx) => self.tasks.get(&key(ctx, task_id)).map(|t| t.value().clone()),
            None => self
                .tasks
                .iter()
                .find(|t| t.key().1 == task_id)
                .map(|t| t.value().clone()),
        }
    }

    async fn update(&self, task: Task) {
        self.tasks.insert(key(&task.context_id, &task.id), task);
    }
}
