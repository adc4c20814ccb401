//! An in-memory `PersistenceStore`, for tests and SQLite-free embedding (§6).

use std::sync::Mutex;

use crate::error::AppResult;
use crate::models::task::Task;

use super::PersistenceStore;

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
        }
    }
}

impl PersistenceStore for MemoryTaskStore {
    fn load_all(&self) -> AppResult<Vec<Task>> {
        Ok(self.tasks.lock().expect("memory store lock poisoned").clone())
    }

    fn put(&self, task: &Task) -> AppResult<()> {
        let mut guard = self.tasks.lock().expect("memory store lock poisoned");
        match guard.iter_mut().find(|t| t.id() == task.id()) {
            Some(existing) => *existing = task.clone(),
            None => guard.push(task.clone()),
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> AppResult<()> {
        let mut guard = self.tasks.lock().expect("memory store lock poisoned");
        guard.retain(|t| t.id() != id);
        Ok(())
    }

    fn clear_all_then_bulk_put(&self, tasks: &[Task]) -> AppResult<()> {
        let mut guard = self.tasks.lock().expect("memory store lock poisoned");
        *guard = tasks.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskHeader, UnscheduledTask};

    fn sample(id: &str) -> Task {
        Task::Unscheduled(UnscheduledTask {
            header: TaskHeader::new(id.to_string(), "demo".to_string()),
            priority: crate::models::task::Priority::Medium,
            est_duration: None,
            rank: 0,
        })
    }

    #[test]
    fn put_upserts_by_id() {
        let store = MemoryTaskStore::new();
        store.put(&sample("a")).unwrap();
        store.put(&sample("a")).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn remove_drops_by_id() {
        let store = MemoryTaskStore::new();
        store.put(&sample("a")).unwrap();
        store.remove("a").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
