//! Document store seam.
//!
//! Documents live in hierarchical collections addressed by slash-separated paths
//! (`users/{uid}/favorites`, `books/{bookId}/reviews`) and are keyed by opaque
//! string ids. Backends are synchronous; async callers dispatch them onto the
//! blocking pool.

mod listeners;
mod memory;
mod sqlite;

pub use listeners::{Listener, ListenerHub, Subscription};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use crate::error::{LibraryError, StoreError};
use crate::models::CollectionKind;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub const USERS: &str = "users";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
    /// Store-assigned creation time in milliseconds, strictly increasing per store.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    ById,
    NewestFirst,
}

pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    fn list(&self, collection: &str, order: Order) -> Result<Vec<Document>, StoreError>;

    /// Create-or-replace. Replacing keeps the first creation time.
    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document. Fails with `NotFound` if it is missing.
    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Inserts under a generated id and returns it.
    fn add(&self, collection: &str, data: Map<String, Value>) -> Result<String, StoreError>;

    /// Deleting a missing document succeeds.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Deletes only when the stored `owner_field` equals `owner`; `PermissionDenied` otherwise.
    fn delete_owned(
        &self,
        collection: &str,
        id: &str,
        owner_field: &str,
        owner: &str,
    ) -> Result<(), StoreError>;

    /// Delivers the current snapshot immediately and again after every write to `collection`.
    fn subscribe(
        &self,
        collection: &str,
        order: Order,
        listener: Listener,
    ) -> Result<Subscription, StoreError>;
}

/// Runs a store call on the blocking pool so the awaiting task never blocks.
pub(crate) async fn run_blocking<T, F>(
    store: &Arc<dyn DocumentStore>,
    f: F,
) -> Result<T, LibraryError>
where
    F: FnOnce(&dyn DocumentStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || f(store.as_ref())).await?;
    Ok(result?)
}

pub fn user_collection(user_id: &str, kind: CollectionKind) -> String {
    format!("{}/{}/{}", USERS, user_id, kind.as_str())
}

pub fn reviews_collection(book_id: &str) -> String {
    format!("books/{}/reviews", book_id)
}

/// Collection paths have an odd number of non-empty segments.
pub(crate) fn check_collection(collection: &str) -> Result<(), StoreError> {
    let segments: Vec<&str> = collection.split('/').collect();
    if segments.iter().any(|segment| segment.trim().is_empty()) || segments.len() % 2 == 0 {
        return Err(StoreError::InvalidPath(collection.to_string()));
    }
    Ok(())
}

pub(crate) fn check_id(collection: &str, id: &str) -> Result<(), StoreError> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(StoreError::InvalidPath(format!("{}/{}", collection, id)));
    }
    Ok(())
}

pub(crate) fn sort_documents(documents: &mut [Document], order: Order) {
    match order {
        Order::ById => documents.sort_by(|a, b| a.id.cmp(&b.id)),
        Order::NewestFirst => documents.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

/// Millisecond timestamps that never repeat or go backwards within one store.
#[derive(Debug, Default)]
pub(crate) struct ServerClock {
    last: AtomicI64,
}

impl ServerClock {
    pub(crate) fn starting_after(last: i64) -> Self {
        ServerClock {
            last: AtomicI64::new(last),
        }
    }

    pub(crate) fn now(&self) -> i64 {
        let wall = chrono::Utc::now().timestamp_millis();
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let next = wall.max(current + 1);
            match self
                .last
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}
