use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tracing::{debug, trace};

use super::{Clearable, ObjectPool, PoolMetrics, Pooled, ReclaimStrategy};

/// A bounded object pool.
///
/// The pool holds at most `capacity` idle items. It starts empty and fills up as checked-out items are returned.
///
/// Neither acquiring nor releasing ever blocks:
///
/// - when an item is requested and no idle item is available, a new item is built on demand
/// - when an item is returned and the pool already holds `capacity` idle items, the returned item is dropped
///
/// This bounds the memory retained by the pool without throttling callers when demand temporarily exceeds it.
pub struct BoundedObjectPool<T> {
    strategy: Arc<BoundedStrategy<T>>,
}

impl<T> BoundedObjectPool<T>
where
    T: Clearable + Default + Send + 'static,
{
    /// Creates a new `BoundedObjectPool` with the given capacity.
    pub fn with_capacity<S>(pool_name: S, capacity: usize) -> Self
    where
        S: Into<String>,
    {
        Self::with_builder(pool_name, capacity, T::default)
    }
}

impl<T> BoundedObjectPool<T>
where
    T: Clearable + Send + 'static,
{
    /// Creates a new `BoundedObjectPool` with the given capacity and item builder.
    ///
    /// `builder` is called to construct each item.
    pub fn with_builder<S, B>(pool_name: S, capacity: usize, builder: B) -> Self
    where
        S: Into<String>,
        B: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            strategy: Arc::new(BoundedStrategy::with_builder(pool_name.into(), capacity, builder)),
        }
    }

    /// Returns the maximum number of idle items the pool will hold.
    pub fn capacity(&self) -> usize {
        self.strategy.capacity()
    }

    /// Returns the number of idle items currently held by the pool.
    pub fn idle(&self) -> usize {
        self.strategy.items.as_ref().map_or(0, |items| items.len())
    }

    /// Acquires an item from the object pool, running `init` on it before handing it out.
    ///
    /// This is intended for items whose reuse requires a fallible reset, such as decoder state that must be re-bound
    /// to a new input stream.
    ///
    /// # Errors
    ///
    /// If `init` fails, its error is returned and the item is dropped rather than returned to the pool, so state left
    /// behind by a failed initialization is never handed out again.
    pub fn try_acquire_with<F, E>(&self, init: F) -> Result<Pooled<T>, E>
    where
        F: FnOnce(&mut T) -> Result<(), E>,
    {
        let mut data = self.strategy.take_or_build();
        match init(&mut data) {
            Ok(()) => Ok(self.wrap(data)),
            Err(e) => {
                self.strategy.metrics.discarded.increment(1);
                debug!(pool_name = %self.strategy.pool_name, "Discarding pooled item after failed initialization.");
                Err(e)
            }
        }
    }

    fn wrap(&self, data: T) -> Pooled<T> {
        let strategy: Arc<dyn ReclaimStrategy<T> + Send + Sync> = Arc::clone(&self.strategy) as _;
        Pooled::new(strategy, data)
    }
}

impl<T> Clone for BoundedObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<T> ObjectPool for BoundedObjectPool<T>
where
    T: Clearable + Send + 'static,
{
    type Item = Pooled<T>;

    fn acquire(&self) -> Self::Item {
        let data = self.strategy.take_or_build();
        self.wrap(data)
    }
}

struct BoundedStrategy<T> {
    pool_name: String,
    // `ArrayQueue` cannot be zero-sized, so a zero-capacity pool simply has no queue.
    items: Option<ArrayQueue<T>>,
    builder: Box<dyn Fn() -> T + Send + Sync>,
    metrics: PoolMetrics,
}

impl<T> BoundedStrategy<T> {
    fn with_builder<B>(pool_name: String, capacity: usize, builder: B) -> Self
    where
        B: Fn() -> T + Send + Sync + 'static,
    {
        let metrics = PoolMetrics::new(&pool_name);

        Self {
            pool_name,
            items: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            builder: Box::new(builder),
            metrics,
        }
    }

    fn capacity(&self) -> usize {
        self.items.as_ref().map_or(0, |items| items.capacity())
    }

    fn take_or_build(&self) -> T {
        match self.items.as_ref().and_then(|items| items.pop()) {
            Some(data) => {
                self.metrics.acquired.increment(1);
                data
            }
            None => {
                trace!(pool_name = %self.pool_name, "No idle items available. Building new item.");
                self.metrics.created.increment(1);
                (self.builder)()
            }
        }
    }
}

impl<T: Clearable> ReclaimStrategy<T> for BoundedStrategy<T> {
    fn reclaim(&self, mut data: T) {
        data.clear();

        let rejected = match self.items.as_ref() {
            Some(items) => items.push(data).is_err(),
            None => true,
        };

        if rejected {
            self.metrics.discarded.increment(1);
            trace!(pool_name = %self.pool_name, "Pool at capacity. Discarding released item.");
        } else {
            self.metrics.released.increment(1);
        }
    }
}
