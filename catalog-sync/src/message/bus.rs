//! 变更总线 - 目录变更通知的进程内广播
//!
//! # 架构
//!
//! ```text
//! writer ──▶ publish(ChangeEvent) ──┬──▶ handlers[channel]   (同步回调)
//!                                   └──▶ broadcast::Sender   (异步订阅者)
//! ```
//!
//! Publishing is synchronous with the write that triggered it: every handler
//! subscribed to the event's channel has run when `publish` returns. There is
//! no queue and no coalescing, so handlers must be idempotent (re-read the
//! view, never accumulate deltas).

use parking_lot::RwLock;
use shared::message::{ChangeChannel, ChangeEvent};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

/// Capacity of the async broadcast channel
const CHANNEL_CAPACITY: usize = 256;

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, ChangeChannel, Handler)>,
}

struct BusInner {
    registry: RwLock<Registry>,
    tx: broadcast::Sender<ChangeEvent>,
}

/// Typed publish/subscribe bus
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("handlers", &self.handler_count())
            .field("receivers", &self.inner.tx.receiver_count())
            .finish()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                registry: RwLock::new(Registry::default()),
                tx,
            }),
        }
    }

    /// Publish to every handler of the event's channel, then to async receivers
    pub fn publish(&self, event: ChangeEvent) {
        let channel = event.channel();
        // Snapshot so handlers can subscribe/unsubscribe or read the catalog
        let handlers: Vec<Handler> = self
            .inner
            .registry
            .read()
            .handlers
            .iter()
            .filter(|(_, ch, _)| *ch == channel)
            .map(|(_, _, h)| h.clone())
            .collect();

        tracing::debug!(%channel, handlers = handlers.len(), "Publishing change event");
        for handler in handlers {
            handler(&event);
        }

        // No receivers is not an error
        let _ = self.inner.tx.send(event);
    }

    /// Subscribe a handler to one channel
    pub fn subscribe(
        &self,
        channel: ChangeChannel,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.register(channel, Arc::new(handler));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            ids: vec![id],
        }
    }

    /// Subscribe one handler to every channel that means "re-read the catalog"
    pub fn subscribe_refresh(
        &self,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let handler: Handler = Arc::new(handler);
        let ids = ChangeChannel::ALL
            .iter()
            .map(|channel| self.register(*channel, handler.clone()))
            .collect();
        Subscription {
            bus: Arc::downgrade(&self.inner),
            ids,
        }
    }

    /// Async receiver of every published event
    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.tx.subscribe()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.registry.read().handlers.len()
    }

    fn register(&self, channel: ChangeChannel, handler: Handler) -> u64 {
        let mut registry = self.inner.registry.write();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.push((id, channel, handler));
        id
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by subscribe; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    ids: Vec<u64>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            // Removed handlers are dropped after the lock is released
            let _removed: Vec<_> = {
                let mut registry = bus.registry.write();
                let (keep, removed) = std::mem::take(&mut registry.handlers)
                    .into_iter()
                    .partition(|(id, _, _)| !self.ids.contains(id));
                registry.handlers = keep;
                removed
            };
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("ids", &self.ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_publish_reaches_only_matching_channel() {
        let bus = ChangeBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            bus.subscribe(ChangeChannel::ItemChanged, move |e| seen.lock().push(e.clone()))
        };

        bus.publish(ChangeEvent::CatalogUpdated);
        bus.publish(ChangeEvent::ItemChanged { id: 4 });
        assert_eq!(*seen.lock(), vec![ChangeEvent::ItemChanged { id: 4 }]);
    }

    #[test]
    fn test_refresh_subscription_covers_all_channels() {
        let bus = ChangeBus::new();
        let count = Arc::new(Mutex::new(0));
        let sub = {
            let count = count.clone();
            bus.subscribe_refresh(move |_| *count.lock() += 1)
        };
        assert_eq!(bus.handler_count(), 4);

        bus.publish(ChangeEvent::CatalogUpdated);
        bus.publish(ChangeEvent::ForceRefresh);
        bus.publish(ChangeEvent::ItemChanged { id: 1 });
        bus.publish(ChangeEvent::StorageChanged {
            key: "catalog.overlay".to_string(),
        });
        assert_eq!(*count.lock(), 4);

        sub.unsubscribe();
        assert_eq!(bus.handler_count(), 0);
        bus.publish(ChangeEvent::CatalogUpdated);
        assert_eq!(*count.lock(), 4);
    }

    #[test]
    fn test_burst_is_not_coalesced() {
        let bus = ChangeBus::new();
        let count = Arc::new(Mutex::new(0));
        let _sub = {
            let count = count.clone();
            bus.subscribe(ChangeChannel::CatalogUpdated, move |_| *count.lock() += 1)
        };
        for _ in 0..5 {
            bus.publish(ChangeEvent::CatalogUpdated);
        }
        assert_eq!(*count.lock(), 5);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = ChangeBus::new();
        let nested = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let bus2 = bus.clone();
            let nested = nested.clone();
            bus.subscribe(ChangeChannel::ForceRefresh, move |_| {
                nested
                    .lock()
                    .push(bus2.subscribe(ChangeChannel::CatalogUpdated, |_| {}));
            })
        };
        bus.publish(ChangeEvent::ForceRefresh);
        assert_eq!(bus.handler_count(), 2);
    }

    #[tokio::test]
    async fn test_async_receiver() {
        let bus = ChangeBus::new();
        let mut rx = bus.receiver();
        bus.publish(ChangeEvent::ItemChanged { id: 12 });
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::ItemChanged { id: 12 });
    }
}
