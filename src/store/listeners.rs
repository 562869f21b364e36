use super::{Document, Order};
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

pub type Listener = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

struct Registration {
    collection: String,
    order: Order,
    listener: Listener,
    /// Held across snapshot and delivery so a listener never sees an older state last.
    delivery: Arc<Mutex<()>>,
}

type Target = (Order, Listener, Arc<Mutex<()>>);

/// Live listeners keyed by registration id, shared by a backend and its subscriptions.
///
/// Listeners must not write to the collection they observe from inside the callback.
#[derive(Default)]
pub struct ListenerHub {
    next_id: AtomicU64,
    registrations: Mutex<HashMap<u64, Registration>>,
}

impl ListenerHub {
    pub fn new() -> Arc<Self> {
        Arc::new(ListenerHub::default())
    }

    pub fn register(
        self: &Arc<Self>,
        collection: &str,
        order: Order,
        listener: Listener,
    ) -> Subscription {
        self.insert(collection, order, listener).0
    }

    /// Registers first, then delivers the initial snapshot, so a write landing in between
    /// is never lost.
    pub fn subscribe<F>(
        self: &Arc<Self>,
        collection: &str,
        order: Order,
        listener: Listener,
        snapshot: F,
    ) -> Result<Subscription, StoreError>
    where
        F: Fn(Order) -> Result<Vec<Document>, StoreError>,
    {
        let (subscription, delivery) = self.insert(collection, order, listener.clone());
        deliver(&delivery, &listener, || snapshot(order))?;
        Ok(subscription)
    }

    fn insert(
        self: &Arc<Self>,
        collection: &str,
        order: Order,
        listener: Listener,
    ) -> (Subscription, Arc<Mutex<()>>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let delivery = Arc::new(Mutex::new(()));
        match self.registrations.lock() {
            Ok(mut guard) => {
                guard.insert(
                    id,
                    Registration {
                        collection: collection.to_string(),
                        order,
                        listener,
                        delivery: delivery.clone(),
                    },
                );
            }
            Err(_) => log::error!(
                "listener registry poisoned; subscription to {} not kept",
                collection
            ),
        }
        let subscription = Subscription {
            hub: Arc::downgrade(self),
            id,
            active: true,
        };
        (subscription, delivery)
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Sends a fresh snapshot to every listener of `collection`.
    ///
    /// Each listener's snapshot is read and delivered under that registration's delivery
    /// lock, so the last delivery always reflects every write that notified before it.
    /// Listeners run on the caller's thread with no registry lock held.
    pub fn notify<F>(&self, collection: &str, snapshot: F)
    where
        F: Fn(Order) -> Result<Vec<Document>, StoreError>,
    {
        let targets: Vec<Target> = match self.registrations.lock() {
            Ok(guard) => guard
                .values()
                .filter(|registration| registration.collection == collection)
                .map(|registration| {
                    (
                        registration.order,
                        registration.listener.clone(),
                        registration.delivery.clone(),
                    )
                })
                .collect(),
            Err(_) => {
                log::error!("listener registry poisoned; skipping notify for {}", collection);
                return;
            }
        };

        for (order, listener, delivery) in targets {
            if let Err(err) = deliver(&delivery, &listener, || snapshot(order)) {
                log::warn!("snapshot for {} failed: {}", collection, err);
            }
        }
    }

    fn release(&self, id: u64) {
        if let Ok(mut guard) = self.registrations.lock() {
            guard.remove(&id);
        }
    }
}

fn deliver<F>(delivery: &Mutex<()>, listener: &Listener, snapshot: F) -> Result<(), StoreError>
where
    F: FnOnce() -> Result<Vec<Document>, StoreError>,
{
    let _turn = delivery.lock().map_err(|_| StoreError::Poisoned("deliver"))?;
    let documents = snapshot()?;
    listener(documents);
    Ok(())
}

/// A standing live registration. Released by [`Subscription::unsubscribe`] or on drop.
pub struct Subscription {
    hub: Weak<ListenerHub>,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active && self.hub.strong_count() > 0
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(hub) = self.hub.upgrade() {
            hub.release(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: Arc<AtomicUsize>) -> Listener {
        Arc::new(move |_documents| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn notify_only_reaches_matching_collection() {
        let hub = ListenerHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _subscription =
            hub.register("users/u1/favorites", Order::ById, counting_listener(hits.clone()));

        hub.notify("users/u1/reading_list", |_| Ok(vec![]));
        hub.notify("users/u1/favorites", |_| Ok(vec![]));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_releases_listener() {
        let hub = ListenerHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let subscription = hub.register("c", Order::ById, counting_listener(hits.clone()));
            assert!(subscription.is_active());
            assert_eq!(hub.listener_count(), 1);
        }
        assert_eq!(hub.listener_count(), 0);

        hub.notify("c", |_| Ok(vec![]));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_unsubscribe_releases_listener() {
        let hub = ListenerHub::new();
        let subscription = hub.register("c", Order::ById, Arc::new(|_| {}));
        subscription.unsubscribe();
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn failed_snapshot_skips_listener() {
        let hub = ListenerHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _subscription = hub.register("c", Order::ById, counting_listener(hits.clone()));

        hub.notify("c", |_| Err(StoreError::Poisoned("list")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscribe_registers_before_initial_snapshot() {
        let hub = ListenerHub::new();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        let inner = hub.clone();
        let subscription = hub
            .subscribe(
                "c",
                Order::ById,
                Arc::new(move |documents: Vec<Document>| {
                    sink.lock().expect("lock").push(documents.len())
                }),
                |_| {
                    assert_eq!(inner.listener_count(), 1);
                    Ok(vec![])
                },
            )
            .expect("subscribe");

        assert!(subscription.is_active());
        assert_eq!(*seen.lock().expect("lock"), vec![0]);
    }

    #[test]
    fn failed_initial_snapshot_releases_registration() {
        let hub = ListenerHub::new();
        let result = hub.subscribe("c", Order::ById, Arc::new(|_| {}), |_| {
            Err(StoreError::Poisoned("list"))
        });
        assert!(result.is_err());
        assert_eq!(hub.listener_count(), 0);
    }
}
