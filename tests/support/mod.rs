#![allow(dead_code)]

use booknest::store::{Document, DocumentStore, Listener, MemoryDocumentStore, Order, Subscription};
use booknest::StoreError;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Memory store that counts every call and can be told to fail `update`.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: MemoryDocumentStore,
    calls: AtomicUsize,
    fail_updates: AtomicBool,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        InstrumentedStore::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl DocumentStore for InstrumentedStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.record();
        self.inner.get(collection, id)
    }

    fn list(&self, collection: &str, order: Order) -> Result<Vec<Document>, StoreError> {
        self.record();
        self.inner.list(collection, order)
    }

    fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        self.record();
        self.inner.set(collection, id, data)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.record();
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Poisoned("update"));
        }
        self.inner.update(collection, id, fields)
    }

    fn add(&self, collection: &str, data: Map<String, Value>) -> Result<String, StoreError> {
        self.record();
        self.inner.add(collection, data)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.record();
        self.inner.delete(collection, id)
    }

    fn delete_owned(
        &self,
        collection: &str,
        id: &str,
        owner_field: &str,
        owner: &str,
    ) -> Result<(), StoreError> {
        self.record();
        self.inner.delete_owned(collection, id, owner_field, owner)
    }

    fn subscribe(
        &self,
        collection: &str,
        order: Order,
        listener: Listener,
    ) -> Result<Subscription, StoreError> {
        self.record();
        self.inner.subscribe(collection, order, listener)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
