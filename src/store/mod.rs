//! The task collection and its persistence contract (§6).
//!
//! `TaskStore` is the single in-memory mutator: the state machine is the only
//! caller of `update_state`, and the engine only ever sees the collection it
//! hands over by value. A generation counter bumps on every mutation so a
//! caller can cheaply detect whether a cached sorted view is stale.

pub mod memory;
pub mod sqlite;

use tracing::debug;

use crate::error::AppResult;
use crate::models::task::{Task, TaskStatus};

pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;

/// The durable-storage contract (§6). `put` is an upsert; callers tolerate
/// last-writer-wins under this single-user room model.
pub trait PersistenceStore {
    fn load_all(&self) -> AppResult<Vec<Task>>;
    fn put(&self, task: &Task) -> AppResult<()>;
    fn remove(&self, id: &str) -> AppResult<()>;
    fn clear_all_then_bulk_put(&self, tasks: &[Task]) -> AppResult<()>;
}

/// The canonical in-process task collection, backed by a `PersistenceStore`.
pub struct TaskStore<P: PersistenceStore> {
    persistence: P,
    tasks: Vec<Task>,
    generation: u64,
}

impl<P: PersistenceStore> TaskStore<P> {
    pub fn load(persistence: P) -> AppResult<Self> {
        let tasks = persistence.load_all()?;
        Ok(Self {
            persistence,
            tasks,
            generation: 0,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get_state(&self) -> &[Task] {
        &self.tasks
    }

    /// Runs `f` against a mutable view of the collection, bumps the
    /// generation counter, and persists only the tasks `f` touched (by id).
    /// If persistence fails the in-memory state is rolled back (§7): the
    /// caller never observes a mutation that didn't make it to storage.
    pub fn update_state<F, R>(&mut self, f: F) -> AppResult<R>
    where
        F: FnOnce(&mut Vec<Task>) -> R,
    {
        let before = self.tasks.clone();
        let result = f(&mut self.tasks);

        if let Err(err) = self.persist_diff(&before) {
            self.tasks = before;
            return Err(err);
        }

        self.generation += 1;
        debug!(target: "taskflow::store", generation = self.generation, "state updated");
        Ok(result)
    }

    fn persist_diff(&self, before: &[Task]) -> AppResult<()> {
        for task in &self.tasks {
            let unchanged = before.iter().any(|b| b == task);
            if !unchanged {
                self.persistence.put(task)?;
            }
        }
        for old in before {
            if !self.tasks.iter().any(|t| t.id() == old.id()) {
                self.persistence.remove(old.id())?;
            }
        }
        Ok(())
    }

    /// Replaces the whole collection, e.g. bulk delete, and rewrites storage atomically.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> AppResult<()> {
        self.persistence.clear_all_then_bulk_put(&tasks)?;
        self.tasks = tasks;
        self.generation += 1;
        Ok(())
    }

    pub fn sorted_scheduled(&self) -> Vec<&Task> {
        let mut scheduled: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| matches!(t, Task::Scheduled(_)))
            .collect();
        scheduled.sort_by_key(|t| t.as_scheduled().map(|s| s.start));
        scheduled
    }

    /// Unscheduled tasks ordered incomplete-first, then by priority, then by
    /// estimated duration ascending (unset sorts last), then by rank.
    pub fn sorted_unscheduled(&self) -> Vec<&Task> {
        let mut unscheduled: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| matches!(t, Task::Unscheduled(_)))
            .collect();
        unscheduled.sort_by_key(|t| {
            let u = t.as_unscheduled().expect("filtered to unscheduled");
            let completed = t.status() == TaskStatus::Completed;
            let est_duration = u.est_duration.unwrap_or(i64::MAX);
            (completed, u.priority, est_duration, u.rank)
        });
        unscheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskHeader, UnscheduledTask};

    fn unscheduled(id: &str, rank: i64) -> Task {
        Task::Unscheduled(UnscheduledTask {
            header: TaskHeader::new(id.to_string(), id.to_string()),
            priority: crate::models::task::Priority::Medium,
            est_duration: None,
            rank,
        })
    }

    #[test]
    fn generation_bumps_on_update() {
        let mut store = TaskStore::load(MemoryTaskStore::new()).unwrap();
        store.update_state(|tasks| tasks.push(unscheduled("a", 0))).unwrap();
        assert_eq!(store.generation(), 1);
        assert_eq!(store.get_state().len(), 1);
    }

    #[test]
    fn sorted_unscheduled_orders_by_rank() {
        let mut store = TaskStore::load(MemoryTaskStore::new()).unwrap();
        store
            .update_state(|tasks| {
                tasks.push(unscheduled("b", 1));
                tasks.push(unscheduled("a", 0));
            })
            .unwrap();
        let sorted = store.sorted_unscheduled();
        assert_eq!(sorted[0].id(), "a");
        assert_eq!(sorted[1].id(), "b");
    }
}
