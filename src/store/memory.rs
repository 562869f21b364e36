use super::{
    check_collection, check_id, sort_documents, Document, DocumentStore, Listener, ListenerHub,
    Order, ServerClock, Subscription,
};
use crate::error::StoreError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// Process-local document store. Used in tests and when no database path is configured.
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    clock: ServerClock,
    hub: Arc<ListenerHub>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        MemoryDocumentStore {
            collections: Mutex::new(HashMap::new()),
            clock: ServerClock::default(),
            hub: ListenerHub::new(),
        }
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        MemoryDocumentStore::default()
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    fn with_collections<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Collections) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .collections
            .lock()
            .map_err(|_| StoreError::Poisoned(operation))?;
        f(&mut guard)
    }

    fn snapshot(&self, collection: &str, order: Order) -> Result<Vec<Document>, StoreError> {
        self.with_collections("list", |collections| {
            let mut documents: Vec<Document> = collections
                .get(collection)
                .map(|entries| entries.values().cloned().collect())
                .unwrap_or_default();
            sort_documents(&mut documents, order);
            Ok(documents)
        })
    }

    fn changed(&self, collection: &str) {
        self.hub
            .notify(collection, |order| self.snapshot(collection, order));
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        self.with_collections("get", |collections| {
            Ok(collections
                .get(collection)
                .and_then(|entries| entries.get(id))
                .cloned())
        })
    }

    fn list(&self, collection: &str, order: Order) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        self.snapshot(collection, order)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        self.with_collections("set", |collections| {
            let entries = collections.entry(collection.to_string()).or_default();
            let created_at = match entries.get(id) {
                Some(existing) => existing.created_at,
                None => self.clock.now(),
            };
            entries.insert(
                id.to_string(),
                Document {
                    id: id.to_string(),
                    data,
                    created_at,
                },
            );
            Ok(())
        })?;
        self.changed(collection);
        Ok(())
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        self.with_collections("update", |collections| {
            let document = collections
                .get_mut(collection)
                .and_then(|entries| entries.get_mut(id))
                .ok_or_else(|| StoreError::NotFound {
                    path: format!("{}/{}", collection, id),
                })?;
            for (key, value) in fields {
                document.data.insert(key, value);
            }
            Ok(())
        })?;
        self.changed(collection);
        Ok(())
    }

    fn add(&self, collection: &str, data: Map<String, Value>) -> Result<String, StoreError> {
        check_collection(collection)?;
        let id = Uuid::new_v4().simple().to_string();
        self.with_collections("add", |collections| {
            collections.entry(collection.to_string()).or_default().insert(
                id.clone(),
                Document {
                    id: id.clone(),
                    data,
                    created_at: self.clock.now(),
                },
            );
            Ok(())
        })?;
        self.changed(collection);
        Ok(id)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        let removed = self.with_collections("delete", |collections| {
            Ok(collections
                .get_mut(collection)
                .and_then(|entries| entries.remove(id))
                .is_some())
        })?;
        if removed {
            self.changed(collection);
        }
        Ok(())
    }

    fn delete_owned(
        &self,
        collection: &str,
        id: &str,
        owner_field: &str,
        owner: &str,
    ) -> Result<(), StoreError> {
        check_collection(collection)?;
        check_id(collection, id)?;
        let removed = self.with_collections("delete_owned", |collections| {
            let entries = match collections.get_mut(collection) {
                Some(entries) => entries,
                None => return Ok(false),
            };
            let stored_owner = match entries.get(id) {
                Some(document) => document
                    .data
                    .get(owner_field)
                    .and_then(|value| value.as_str())
                    .map(|value| value.to_string()),
                None => return Ok(false),
            };
            if stored_owner.as_deref() != Some(owner) {
                return Err(StoreError::PermissionDenied {
                    path: format!("{}/{}", collection, id),
                });
            }
            entries.remove(id);
            Ok(true)
        })?;
        if removed {
            self.changed(collection);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &str,
        order: Order,
        listener: Listener,
    ) -> Result<Subscription, StoreError> {
        check_collection(collection)?;
        self.hub
            .subscribe(collection, order, listener, |order| self.snapshot(collection, order))
    }
}
