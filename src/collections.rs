//! Per-user membership collections (favorites, reading list, shopping cart).
//!
//! Every method fails soft: local validation or auth failures return `false` / empty
//! without touching the document store, and store failures are logged and mapped to
//! the same values. There are no retries.

use crate::auth::Session;
use crate::models::{Book, CollectionKind};
use crate::normalize::book_from_document;
use crate::store::{
    run_blocking, user_collection, Document, DocumentStore, Listener, Order, Subscription,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct CollectionStore {
    store: Arc<dyn DocumentStore>,
    session: Session,
}

impl CollectionStore {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session) -> Self {
        CollectionStore { store, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Collection path for the signed-in user, or `None` when the request cannot proceed.
    fn target(&self, kind: CollectionKind, book_id: Option<&str>, action: &str) -> Option<String> {
        let user_id = match self.session.user_id() {
            Some(user_id) => user_id,
            None => {
                log::warn!("user not logged in; cannot {} {}", action, kind.as_str());
                return None;
            }
        };
        if let Some(book_id) = book_id {
            if book_id.trim().is_empty() {
                log::warn!("invalid book id; cannot {} {}", action, kind.as_str());
                return None;
            }
        }
        Some(user_collection(&user_id, kind))
    }

    pub async fn exists(&self, kind: CollectionKind, book_id: &str) -> bool {
        let collection = match self.target(kind, Some(book_id), "check") {
            Some(collection) => collection,
            None => return false,
        };
        let id = book_id.to_string();
        match run_blocking(&self.store, move |store| store.get(&collection, &id)).await {
            Ok(document) => {
                let present = document.is_some();
                log::debug!("book {} in {}: {}", book_id, kind.as_str(), present);
                present
            }
            Err(err) => {
                log::error!("error checking {} status for {}: {}", kind.as_str(), book_id, err);
                false
            }
        }
    }

    /// Create-or-replace the kind's projection of `book`.
    pub async fn upsert(&self, kind: CollectionKind, book: &Book) -> bool {
        let collection = match self.target(kind, Some(&book.id), "add to") {
            Some(collection) => collection,
            None => return false,
        };
        let id = book.id.clone();
        let projection = book.projection(kind);
        let stored =
            run_blocking(&self.store, move |store| store.set(&collection, &id, projection));
        match stored.await {
            Ok(()) => {
                log::info!("book added to {}: {}", kind.as_str(), book.id);
                true
            }
            Err(err) => {
                log::error!("error adding book {} to {}: {}", book.id, kind.as_str(), err);
                false
            }
        }
    }

    /// Removing a book that is not in the collection succeeds.
    pub async fn remove(&self, kind: CollectionKind, book_id: &str) -> bool {
        let collection = match self.target(kind, Some(book_id), "remove from") {
            Some(collection) => collection,
            None => return false,
        };
        let id = book_id.to_string();
        match run_blocking(&self.store, move |store| store.delete(&collection, &id)).await {
            Ok(()) => {
                log::info!("book removed from {}: {}", kind.as_str(), book_id);
                true
            }
            Err(err) => {
                log::error!("error removing book {} from {}: {}", book_id, kind.as_str(), err);
                false
            }
        }
    }

    pub async fn list_all(&self, kind: CollectionKind) -> Vec<Book> {
        let collection = match self.target(kind, None, "load") {
            Some(collection) => collection,
            None => return vec![],
        };
        match run_blocking(&self.store, move |store| store.list(&collection, Order::ById)).await {
            Ok(documents) => documents
                .iter()
                .map(|document| book_from_document(&document.id, &document.data))
                .collect(),
            Err(err) => {
                log::error!("error loading {}: {}", kind.as_str(), err);
                vec![]
            }
        }
    }

    /// Live snapshots of the collection; `None` when signed out or the store refuses.
    /// The initial snapshot is read on the blocking pool; later ones arrive on the
    /// writer's thread.
    pub async fn subscribe<F>(&self, kind: CollectionKind, on_change: F) -> Option<Subscription>
    where
        F: Fn(Vec<Book>) + Send + Sync + 'static,
    {
        let collection = self.target(kind, None, "listen to")?;
        let listener: Listener = Arc::new(move |documents: Vec<Document>| {
            let books = documents
                .iter()
                .map(|document| book_from_document(&document.id, &document.data))
                .collect();
            on_change(books);
        });
        match run_blocking(&self.store, move |store| {
            store.subscribe(&collection, Order::ById, listener)
        })
        .await
        {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                log::error!("error listening to {}: {}", kind.as_str(), err);
                None
            }
        }
    }
}
