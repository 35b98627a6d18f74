//! Reusable scratch objects.
//!
//! [`Pool`] hands out objects behind an RAII guard that returns them on
//! drop, including during unwinding. In [`PoolMode::Weak`] idle objects are
//! released after `idle_ttl`, so a burst of traffic does not pin memory for
//! the life of the process.
//!
//! [`scratch`] is a per-thread stack of `BytesMut` buffers for encoders
//! that need a temporary buffer without touching a shared lock.

use std::borrow::{Borrow, BorrowMut};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use parking_lot::Mutex;

/// Default number of idle objects kept per pool.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Default upper bound on a recycled object's retained allocation.
pub const DEFAULT_MAX_RETAINED_BYTES: usize = 1024 * 1024;

/// Default idle lifetime in weak mode.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30);

/// Reset an object for reuse.
pub trait Recycle {
    /// Clear contents. Return `false` if the object holds more than
    /// `max_retained` bytes and should be dropped instead of pooled.
    fn recycle(&mut self, max_retained: usize) -> bool;
}

impl Recycle for BytesMut {
    fn recycle(&mut self, max_retained: usize) -> bool {
        self.clear();
        self.capacity() <= max_retained
    }
}

impl Recycle for String {
    fn recycle(&mut self, max_retained: usize) -> bool {
        self.clear();
        self.capacity() <= max_retained
    }
}

impl<T> Recycle for Vec<T> {
    fn recycle(&mut self, max_retained: usize) -> bool {
        self.clear();
        self.capacity().saturating_mul(std::mem::size_of::<T>().max(1)) <= max_retained
    }
}

/// Retention policy for idle objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolMode {
    /// Keep idle objects until the pool is dropped.
    #[default]
    Strong,
    /// Drop idle objects older than `idle_ttl`.
    Weak,
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle objects retained.
    pub capacity: usize,
    /// Objects larger than this are dropped on release.
    pub max_retained_bytes: usize,
    pub mode: PoolMode,
    /// Idle lifetime, only consulted in weak mode.
    pub idle_ttl: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            max_retained_bytes: DEFAULT_MAX_RETAINED_BYTES,
            mode: PoolMode::Strong,
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }
}

impl PoolConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_max_retained_bytes(mut self, max: usize) -> Self {
        self.max_retained_bytes = max;
        self
    }

    pub fn with_mode(mut self, mode: PoolMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }
}

struct Idle<T> {
    item: T,
    released_at: Instant,
}

/// A bounded pool of reusable objects.
pub struct Pool<T> {
    config: PoolConfig,
    idle: Mutex<Vec<Idle<T>>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Recycle> Pool<T> {
    pub fn new<F>(config: PoolConfig, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            idle: Mutex::new(Vec::with_capacity(config.capacity)),
            config,
            factory: Box::new(factory),
        }
    }

    /// Take an idle object, or build a fresh one.
    pub fn acquire(&self) -> Pooled<'_, T> {
        self.acquire_at(Instant::now())
    }

    pub fn acquire_at(&self, now: Instant) -> Pooled<'_, T> {
        let reused = {
            let mut idle = self.idle.lock();
            if self.config.mode == PoolMode::Weak {
                self.expire(&mut idle, now);
            }
            idle.pop().map(|entry| entry.item)
        };
        let item = reused.unwrap_or_else(|| (self.factory)());
        Pooled {
            pool: self,
            item: Some(item),
        }
    }

    /// Drop idle objects past their TTL. Returns how many were released.
    ///
    /// A no-op in strong mode.
    pub fn reclaim_idle(&self, now: Instant) -> usize {
        if self.config.mode != PoolMode::Weak {
            return 0;
        }
        let mut idle = self.idle.lock();
        self.expire(&mut idle, now)
    }

    /// Number of idle objects currently held.
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn expire(&self, idle: &mut Vec<Idle<T>>, now: Instant) -> usize {
        let before = idle.len();
        let ttl = self.config.idle_ttl;
        idle.retain(|entry| now.saturating_duration_since(entry.released_at) < ttl);
        let released = before - idle.len();
        if released > 0 {
            tracing::trace!(released, "released idle pooled objects");
        }
        released
    }

    fn release(&self, mut item: T) {
        if !item.recycle(self.config.max_retained_bytes) {
            tracing::trace!("dropping oversized pooled object");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.config.capacity {
            idle.push(Idle {
                item,
                released_at: Instant::now(),
            });
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("idle", &self.idle.lock().len())
            .finish_non_exhaustive()
    }
}

/// An object borrowed from a [`Pool`], returned when dropped.
pub struct Pooled<'a, T: Recycle> {
    pool: &'a Pool<T>,
    item: Option<T>,
}

impl<T: Recycle> Pooled<'_, T> {
    /// Keep the object instead of returning it to the pool.
    pub fn detach(mut self) -> T {
        match self.item.take() {
            Some(item) => item,
            None => (self.pool.factory)(),
        }
    }
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            // `item` is only taken by `detach` and `drop`, both of which
            // consume the guard.
            None => unreachable!("pooled object accessed after release"),
        }
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled object accessed after release"),
        }
    }
}

impl<T: Recycle> Borrow<T> for Pooled<'_, T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: Recycle> BorrowMut<T> for Pooled<'_, T> {
    fn borrow_mut(&mut self) -> &mut T {
        self
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

impl<T: Recycle + fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

pub mod scratch {
    //! Per-thread scratch buffers.

    use std::cell::RefCell;

    use bytes::BytesMut;

    use super::{Recycle, DEFAULT_MAX_RETAINED_BYTES};

    const RETAINED_PER_THREAD: usize = 4;
    const INITIAL_CAPACITY: usize = 4096;

    thread_local! {
        static BUFFERS: RefCell<Vec<BytesMut>> = const { RefCell::new(Vec::new()) };
    }

    /// Run `f` with an empty buffer owned by this thread.
    ///
    /// Calls may nest; each level gets its own buffer. The buffer is
    /// cleared and kept for the next caller when `f` returns.
    pub fn with_scratch<R>(f: impl FnOnce(&mut BytesMut) -> R) -> R {
        let mut buf = BUFFERS
            .with(|cell| cell.borrow_mut().pop())
            .unwrap_or_else(|| BytesMut::with_capacity(INITIAL_CAPACITY));
        buf.clear();

        let mut guard = Returner { buf };
        f(&mut guard.buf)
    }

    /// Number of buffers parked on the current thread.
    pub fn parked() -> usize {
        BUFFERS.with(|cell| cell.borrow().len())
    }

    struct Returner {
        buf: BytesMut,
    }

    impl Drop for Returner {
        fn drop(&mut self) {
            let mut buf = std::mem::take(&mut self.buf);
            if !buf.recycle(DEFAULT_MAX_RETAINED_BYTES) {
                return;
            }
            // `try_with` tolerates thread-local teardown.
            let _ = BUFFERS.try_with(|cell| {
                if let Ok(mut parked) = cell.try_borrow_mut() {
                    if parked.len() < RETAINED_PER_THREAD {
                        parked.push(buf);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting_pool(config: PoolConfig) -> (Pool<Vec<u8>>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = Pool::new(config, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Vec::with_capacity(64)
        });
        (pool, created)
    }

    #[test]
    fn reuses_released_objects() {
        let (pool, created) = counting_pool(PoolConfig::default());
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"abc");
        }
        assert_eq!(pool.idle_len(), 1);
        let buf = pool.acquire();
        assert!(buf.is_empty(), "recycled object must be cleared");
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn returns_on_unwind() {
        let (pool, _) = counting_pool(PoolConfig::default());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _buf = pool.acquire();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn capacity_and_size_bounds() {
        let (pool, _) = counting_pool(
            PoolConfig::default()
                .with_capacity(1)
                .with_max_retained_bytes(128),
        );
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_len(), 1);

        let mut big = pool.acquire();
        big.reserve(4096);
        drop(big);
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn detach_keeps_object() {
        let (pool, _) = counting_pool(PoolConfig::default());
        let mut owned = pool.acquire().detach();
        owned.push(1);
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn weak_mode_expires_idle() {
        let (pool, created) = counting_pool(
            PoolConfig::default()
                .with_mode(PoolMode::Weak)
                .with_idle_ttl(Duration::from_millis(50)),
        );
        drop(pool.acquire());
        assert_eq!(pool.reclaim_idle(Instant::now()), 0);

        let later = Instant::now() + Duration::from_millis(100);
        assert_eq!(pool.reclaim_idle(later), 1);
        drop(pool.acquire_at(later));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn strong_mode_never_expires() {
        let (pool, _) = counting_pool(PoolConfig::default().with_idle_ttl(Duration::ZERO));
        drop(pool.acquire());
        assert_eq!(pool.reclaim_idle(Instant::now() + Duration::from_secs(3600)), 0);
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn scratch_nests_and_parks() {
        let outer_len = scratch::with_scratch(|outer| {
            outer.extend_from_slice(b"outer");
            let inner_len = scratch::with_scratch(|inner| {
                assert!(inner.is_empty());
                inner.extend_from_slice(b"in");
                inner.len()
            });
            assert_eq!(inner_len, 2);
            outer.len()
        });
        assert_eq!(outer_len, 5);
        assert!(scratch::parked() >= 2);
        scratch::with_scratch(|buf| assert!(buf.is_empty()));
    }
}
