//! Narrow interfaces to the surrounding system. Task storage and outbound
//! mail are external collaborators here; their business rules live elsewhere.
//! The in-memory implementations exist so the guard pipeline has something
//! real to protect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: u64,
    pub title: String,
    pub done: bool,
    pub owner_id: String,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list(&self) -> Vec<TaskRecord>;
    async fn create(&self, title: String, owner_id: String) -> TaskRecord;
    async fn update(&self, id: u64, title: Option<String>, done: Option<bool>) -> Option<TaskRecord>;
    async fn delete(&self, id: u64) -> bool;
}

#[derive(Default)]
pub struct MemoryTaskStore {
    next_id: AtomicU64,
    tasks: RwLock<HashMap<u64, TaskRecord>>,
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list(&self) -> Vec<TaskRecord> {
        let mut all: Vec<TaskRecord> = self.tasks.read().values().cloned().collect();
        all.sort_by_key(|t| t.id);
        all
    }

    async fn create(&self, title: String, owner_id: String) -> TaskRecord {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let rec = TaskRecord { id, title, done: false, owner_id };
        self.tasks.write().insert(id, rec.clone());
        rec
    }

    async fn update(&self, id: u64, title: Option<String>, done: Option<bool>) -> Option<TaskRecord> {
        let mut map = self.tasks.write();
        let rec = map.get_mut(&id)?;
        if let Some(t) = title { rec.title = t; }
        if let Some(d) = done { rec.done = d; }
        Some(rec.clone())
    }

    async fn delete(&self, id: u64) -> bool {
        self.tasks.write().remove(&id).is_some()
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str);
}

/// Logs instead of delivering. Stands in for the real email service.
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send(&self, to: &str, subject: &str, _body: &str) {
        info!(target: "mail", to = %to, subject = %subject, "outbound mail suppressed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_crud() {
        let store = MemoryTaskStore::default();
        let t = store.create("write spec".into(), "u1".into()).await;
        assert_eq!(t.id, 1);
        assert!(!t.done);
        let t2 = store.update(t.id, None, Some(true)).await.unwrap();
        assert!(t2.done);
        assert_eq!(store.list().await.len(), 1);
        assert!(store.delete(t.id).await);
        assert!(store.list().await.is_empty());
        assert!(store.update(t.id, None, None).await.is_none());
    }
}
