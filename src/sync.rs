//! Local mirrors of remote collections and the pure transforms over them.

use crate::collections::CollectionStore;
use crate::models::{Book, CollectionKind};
use crate::store::Subscription;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// Case-insensitive substring match on title. A blank query keeps every item.
pub fn filter_by_title(items: &[Book], query: &str) -> Vec<Book> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|book| book.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListChange {
    /// Index into the previous list. Emitted highest index first.
    Removed { index: usize, id: String },
    /// Index into the new list. Emitted lowest index first.
    Inserted { index: usize, book: Book },
    Updated { index: usize, book: Book },
    /// Retained entries changed relative order; replace the whole list.
    Reset(Vec<Book>),
}

/// Patch that turns `old` into `new`, keyed by book id.
pub fn diff(old: &[Book], new: &[Book]) -> Vec<ListChange> {
    let new_ids: HashSet<&str> = new.iter().map(|book| book.id.as_str()).collect();
    let old_by_id: HashMap<&str, &Book> = old.iter().map(|book| (book.id.as_str(), book)).collect();

    let retained_old: Vec<&str> = old
        .iter()
        .map(|book| book.id.as_str())
        .filter(|id| new_ids.contains(id))
        .collect();
    let retained_new: Vec<&str> = new
        .iter()
        .map(|book| book.id.as_str())
        .filter(|id| old_by_id.contains_key(id))
        .collect();
    if retained_old != retained_new || new_ids.len() != new.len() {
        return vec![ListChange::Reset(new.to_vec())];
    }

    let mut changes = Vec::new();
    for (index, book) in old.iter().enumerate().rev() {
        if !new_ids.contains(book.id.as_str()) {
            changes.push(ListChange::Removed {
                index,
                id: book.id.clone(),
            });
        }
    }
    for (index, book) in new.iter().enumerate() {
        match old_by_id.get(book.id.as_str()) {
            None => changes.push(ListChange::Inserted {
                index,
                book: book.clone(),
            }),
            Some(previous) if *previous != book => changes.push(ListChange::Updated {
                index,
                book: book.clone(),
            }),
            Some(_) => {}
        }
    }
    changes
}

/// Applies changes in emission order.
pub fn apply(list: &[Book], changes: &[ListChange]) -> Vec<Book> {
    let mut books = list.to_vec();
    for change in changes {
        match change {
            ListChange::Removed { index, .. } => {
                if *index < books.len() {
                    books.remove(*index);
                }
            }
            ListChange::Inserted { index, book } => {
                let at = (*index).min(books.len());
                books.insert(at, book.clone());
            }
            ListChange::Updated { index, book } => {
                if let Some(slot) = books.get_mut(*index) {
                    *slot = book.clone();
                }
            }
            ListChange::Reset(all) => books = all.clone(),
        }
    }
    books
}

/// One-shot mirror, refreshed by calling [`LibraryMirror::load`] on screen entry.
#[derive(Debug, Clone)]
pub struct LibraryMirror {
    kind: CollectionKind,
    books: Vec<Book>,
}

impl LibraryMirror {
    pub fn new(kind: CollectionKind) -> Self {
        LibraryMirror { kind, books: vec![] }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Overwrites the mirror with the remote collection. Failures leave it empty.
    pub async fn load(&mut self, collections: &CollectionStore) -> &[Book] {
        self.books = collections.list_all(self.kind).await;
        &self.books
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn filtered(&self, query: &str) -> Vec<Book> {
        filter_by_title(&self.books, query)
    }
}

/// Mirror fed by a live subscription. Snapshots cross a channel so they are applied
/// on the consumer's task; dropping the mirror releases the listener.
pub struct LiveMirror {
    kind: CollectionKind,
    books: Vec<Book>,
    receiver: mpsc::UnboundedReceiver<Vec<Book>>,
    subscription: Subscription,
}

impl LiveMirror {
    pub async fn start(collections: &CollectionStore, kind: CollectionKind) -> Option<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = collections
            .subscribe(kind, move |books| {
                if sender.send(books).is_err() {
                    log::debug!("live mirror closed; dropping snapshot");
                }
            })
            .await?;
        Some(LiveMirror {
            kind,
            books: vec![],
            receiver,
            subscription,
        })
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Waits for the next snapshot, replaces the mirror and returns the patch.
    pub async fn next_change(&mut self) -> Option<Vec<ListChange>> {
        let snapshot = self.receiver.recv().await?;
        Some(self.replace(snapshot))
    }

    /// Applies every snapshot already delivered without waiting.
    pub fn drain(&mut self) -> Vec<ListChange> {
        let mut changes = Vec::new();
        while let Ok(snapshot) = self.receiver.try_recv() {
            changes.extend(self.replace(snapshot));
        }
        changes
    }

    fn replace(&mut self, snapshot: Vec<Book>) -> Vec<ListChange> {
        let changes = diff(&self.books, &snapshot);
        self.books = snapshot;
        changes
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn filtered(&self, query: &str) -> Vec<Book> {
        filter_by_title(&self.books, query)
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn stop(self) {
        self.subscription.unsubscribe();
    }
}
