//! Process-wide typed publish/subscribe.
//!
//! Subscribers register per message type. Publishing a `T` invokes every
//! handler for `T`, newest first. The router never holds its lock while a
//! handler runs, so handlers may subscribe, unsubscribe and publish
//! reentrantly.
//!
//! # Example
//!
//! ```rust
//! use canopy::MessageRouter;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! struct Spotted { distance: u32 }
//!
//! let router = MessageRouter::new();
//! let closest = Arc::new(AtomicU32::new(u32::MAX));
//! let sink = Arc::clone(&closest);
//! let subscription = router.subscribe_fn(move |msg: &Spotted| {
//!     sink.fetch_min(msg.distance, Ordering::Relaxed);
//!     Ok(())
//! });
//!
//! router.publish(&Spotted { distance: 12 }).unwrap();
//! assert_eq!(closest.load(Ordering::Relaxed), 12);
//!
//! drop(subscription);
//! assert!(!router.has_subscribers::<Spotted>());
//! ```

use crate::error::Result;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tracing::{trace, warn};

/// Subscriber callback for messages of type `T`.
pub type Handler<T> = Arc<dyn Fn(&T) -> Result<()> + Send + Sync>;

static GLOBAL: OnceLock<MessageRouter> = OnceLock::new();

/// Handler lists keyed by message type. Each value is a `Vec<Handler<T>>`
/// for the `T` of its key.
#[derive(Default)]
struct Registry {
    topics: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Registry {
    fn handlers<T: Any>(&self) -> Option<&Vec<Handler<T>>> {
        self.topics.get(&TypeId::of::<T>())?.downcast_ref()
    }

    fn insert<T: Any>(&mut self, handler: Handler<T>) -> bool {
        let entry = self
            .topics
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Vec::<Handler<T>>::new()));
        let Some(handlers) = entry.downcast_mut::<Vec<Handler<T>>>() else {
            return false;
        };
        if handlers.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    fn remove<T: Any>(&mut self, handler: &Handler<T>) -> bool {
        let type_id = TypeId::of::<T>();
        let Some(handlers) = self
            .topics
            .get_mut(&type_id)
            .and_then(|entry| entry.downcast_mut::<Vec<Handler<T>>>())
        else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|h| !same_handler(h, handler));
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.topics.remove(&type_id);
        }
        removed
    }

    fn len<T: Any>(&self) -> usize {
        self.handlers::<T>().map_or(0, Vec::len)
    }
}

fn same_handler<T: Any>(a: &Handler<T>, b: &Handler<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn remove_erased<T: Any>(registry: &mut Registry, handler: &(dyn Any + Send + Sync)) {
    if let Some(handler) = handler.downcast_ref::<Handler<T>>() {
        registry.remove(handler);
    }
}

/// Typed message router. Cloning yields another handle to the same
/// subscriptions.
#[derive(Clone, Default)]
pub struct MessageRouter {
    registry: Arc<Mutex<Registry>>,
}

impl MessageRouter {
    /// An isolated router with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide router, created on first use.
    pub fn global() -> &'static MessageRouter {
        GLOBAL.get_or_init(MessageRouter::new)
    }

    /// Register `handler` for messages of type `T`.
    ///
    /// Subscribing the same `Arc` twice does not register it twice; dropping
    /// any subscription returned for it removes the handler.
    pub fn subscribe<T: Any>(&self, handler: Handler<T>) -> Subscription {
        if self.lock().insert(Arc::clone(&handler)) {
            trace!("subscribed to {}", type_name::<T>());
        }
        Subscription {
            registry: Arc::downgrade(&self.registry),
            handler: Some(Box::new(handler)),
            remove: remove_erased::<T>,
        }
    }

    /// Register a closure for messages of type `T`.
    pub fn subscribe_fn<T, F>(&self, handler: F) -> Subscription
    where
        T: Any,
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe::<T>(Arc::new(handler))
    }

    /// Remove `handler`. Returns whether it was registered.
    pub fn unsubscribe<T: Any>(&self, handler: &Handler<T>) -> bool {
        self.lock().remove(handler)
    }

    /// Deliver `message` to every handler for `T`, last subscribed first.
    ///
    /// The first failing handler aborts the publish and its error is
    /// returned; handlers after it are not invoked.
    pub fn publish<T: Any>(&self, message: &T) -> Result<()> {
        let handlers: Vec<Handler<T>> = match self.lock().handlers::<T>() {
            Some(handlers) => handlers.clone(),
            None => return Ok(()),
        };

        trace!(
            "publishing {} to {} subscriber(s)",
            type_name::<T>(),
            handlers.len()
        );
        for handler in handlers.iter().rev() {
            if let Err(err) = handler(message) {
                warn!("publish of {} aborted: {err}", type_name::<T>());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Drop every subscription of every type.
    pub fn teardown(&self) {
        self.lock().topics.clear();
    }

    pub fn subscriber_count<T: Any>(&self) -> usize {
        self.lock().len::<T>()
    }

    pub fn has_subscribers<T: Any>(&self) -> bool {
        self.subscriber_count::<T>() > 0
    }

    /// Number of message types with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("topics", &self.topic_count())
            .finish()
    }
}

/// Token of one subscription. Dropping it unsubscribes the handler.
#[must_use = "dropping a Subscription unsubscribes its handler immediately"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    handler: Option<Box<dyn Any + Send + Sync>>,
    remove: fn(&mut Registry, &(dyn Any + Send + Sync)),
}

impl Subscription {
    /// Unsubscribe now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the handler subscribed for as long as the router lives.
    pub fn detach(mut self) {
        self.handler = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let (Some(handler), Some(registry)) = (self.handler.take(), self.registry.upgrade()) else {
            return;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        (self.remove)(&mut registry, &*handler);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.handler.is_some())
            .finish()
    }
}
