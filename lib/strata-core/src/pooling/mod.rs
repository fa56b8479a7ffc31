//! Object pooling.
use std::{
    fmt,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use metrics::{counter, Counter};

mod bounded;

pub use self::bounded::BoundedObjectPool;

/// An item that can be cleared.
///
/// Items are cleared before they are returned to an object pool. Implementations should reset the item to a logically
/// empty state while retaining any allocated capacity, since retaining capacity is the point of pooling the item.
pub trait Clearable {
    /// Clears the item.
    fn clear(&mut self) {}
}

/// Object pool reclamation strategy.
///
/// This trait is used to define the strategy for reclaiming items to an object pool.
pub trait ReclaimStrategy<T> {
    /// Returns an item to the object pool.
    fn reclaim(&self, data: T);
}

/// An object pool.
pub trait ObjectPool: Send + Sync {
    /// The pooled value.
    type Item;

    /// Acquires an item from the object pool.
    ///
    /// Acquiring never blocks: when no idle item is available, a new one is created.
    fn acquire(&self) -> Self::Item;
}

/// A checked-out item from an object pool.
///
/// `Pooled<T>` dereferences to `T`, and returns the item to the pool it came from when dropped. This guarantees that
/// an item is handed back on every exit path, including early returns and unwinding, without callers having to
/// remember to release it.
pub struct Pooled<T> {
    strategy: Option<Arc<dyn ReclaimStrategy<T> + Send + Sync>>,
    data: ManuallyDrop<T>,
}

impl<T> Pooled<T> {
    pub(crate) fn new(strategy: Arc<dyn ReclaimStrategy<T> + Send + Sync>, data: T) -> Self {
        Self {
            strategy: Some(strategy),
            data: ManuallyDrop::new(data),
        }
    }

    /// Detaches the item from its object pool, returning the inner value.
    ///
    /// The item will not be returned to the pool.
    pub fn into_inner(self) -> T {
        let mut this = ManuallyDrop::new(self);
        drop(this.strategy.take());

        // SAFETY: `this` is never dropped, so `data` is not read or dropped again after being taken here.
        unsafe { ManuallyDrop::take(&mut this.data) }
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&*self.data).finish()
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        // SAFETY: We never use `self.data` again since we're already dropping `self`.
        let data = unsafe { ManuallyDrop::take(&mut self.data) };
        if let Some(strategy) = self.strategy.take() {
            strategy.reclaim(data);
        }
    }
}

struct PoolMetrics {
    acquired: Counter,
    created: Counter,
    released: Counter,
    discarded: Counter,
}

impl PoolMetrics {
    fn new(pool_name: &str) -> Self {
        Self {
            acquired: counter!("object_pool_acquired_total", "pool_name" => pool_name.to_string()),
            created: counter!("object_pool_created_total", "pool_name" => pool_name.to_string()),
            released: counter!("object_pool_released_total", "pool_name" => pool_name.to_string()),
            discarded: counter!("object_pool_discarded_total", "pool_name" => pool_name.to_string()),
        }
    }
}
