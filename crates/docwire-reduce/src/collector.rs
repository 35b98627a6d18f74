//! Concurrent accumulators.
//!
//! A [`Collector`] folds through a shared reference, so a live dispatcher
//! and a catch-up [`accept`](crate::Reduction::accept) can feed the same
//! reduction from different threads. Lock-free collectors use atomics;
//! the rest hold a short critical section. [`exclusive`] adapts a plain
//! `&mut` fold and says so in the log.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Supplies, feeds, and reads out a shared accumulator.
pub trait Collector<T>: Send + Sync {
    type Acc: Send + Sync;
    type Out;

    fn supply(&self) -> Self::Acc;

    /// Fold one value. May run concurrently with itself and with `finish`.
    fn accumulate(&self, acc: &Self::Acc, value: T);

    fn finish(&self, acc: &Self::Acc) -> Self::Out;
}

/// Fold longs with `op`, starting from `identity`.
pub fn reducing_long<F>(identity: i64, op: F) -> ReducingLong<F>
where
    F: Fn(i64, i64) -> i64 + Send + Sync,
{
    ReducingLong { identity, op }
}

pub struct ReducingLong<F> {
    identity: i64,
    op: F,
}

impl<F> Collector<i64> for ReducingLong<F>
where
    F: Fn(i64, i64) -> i64 + Send + Sync,
{
    type Acc = AtomicI64;
    type Out = i64;

    fn supply(&self) -> AtomicI64 {
        AtomicI64::new(self.identity)
    }

    fn accumulate(&self, acc: &AtomicI64, value: i64) {
        let mut current = acc.load(Ordering::Acquire);
        loop {
            let next = (self.op)(current, value);
            match acc.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn finish(&self, acc: &AtomicI64) -> i64 {
        acc.load(Ordering::Acquire)
    }
}

/// Fold doubles with `op`, starting from `identity`.
pub fn reducing_double<F>(identity: f64, op: F) -> ReducingDouble<F>
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    ReducingDouble { identity, op }
}

pub struct ReducingDouble<F> {
    identity: f64,
    op: F,
}

impl<F> Collector<f64> for ReducingDouble<F>
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    /// Bits of the running `f64`.
    type Acc = AtomicU64;
    type Out = f64;

    fn supply(&self) -> AtomicU64 {
        AtomicU64::new(self.identity.to_bits())
    }

    fn accumulate(&self, acc: &AtomicU64, value: f64) {
        let mut current = acc.load(Ordering::Acquire);
        loop {
            let next = (self.op)(f64::from_bits(current), value).to_bits();
            match acc.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn finish(&self, acc: &AtomicU64) -> f64 {
        f64::from_bits(acc.load(Ordering::Acquire))
    }
}

/// Number of values folded.
pub fn counting() -> Counting {
    Counting
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Counting;

impl<T> Collector<T> for Counting {
    type Acc = AtomicU64;
    type Out = u64;

    fn supply(&self) -> AtomicU64 {
        AtomicU64::new(0)
    }

    fn accumulate(&self, acc: &AtomicU64, _value: T) {
        acc.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self, acc: &AtomicU64) -> u64 {
        acc.load(Ordering::Acquire)
    }
}

/// Every value, in fold order.
pub fn to_list() -> ToList {
    ToList
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToList;

impl<T: Clone + Send> Collector<T> for ToList {
    type Acc = Mutex<Vec<T>>;
    type Out = Vec<T>;

    fn supply(&self) -> Mutex<Vec<T>> {
        Mutex::new(Vec::new())
    }

    fn accumulate(&self, acc: &Mutex<Vec<T>>, value: T) {
        acc.lock().push(value);
    }

    fn finish(&self, acc: &Mutex<Vec<T>>) -> Vec<T> {
        acc.lock().clone()
    }
}

/// Number of distinct values folded.
pub fn counting_distinct() -> CountingDistinct {
    CountingDistinct
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountingDistinct;

impl<T: Eq + Hash + Send> Collector<T> for CountingDistinct {
    type Acc = Mutex<HashSet<T>>;
    type Out = usize;

    fn supply(&self) -> Mutex<HashSet<T>> {
        Mutex::new(HashSet::new())
    }

    fn accumulate(&self, acc: &Mutex<HashSet<T>>, value: T) {
        acc.lock().insert(value);
    }

    fn finish(&self, acc: &Mutex<HashSet<T>>) -> usize {
        acc.lock().len()
    }
}

/// The most recently folded value.
pub fn latest() -> Latest {
    Latest
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Latest;

impl<T: Clone + Send> Collector<T> for Latest {
    type Acc = Mutex<Option<T>>;
    type Out = Option<T>;

    fn supply(&self) -> Mutex<Option<T>> {
        Mutex::new(None)
    }

    fn accumulate(&self, acc: &Mutex<Option<T>>, value: T) {
        *acc.lock() = Some(value);
    }

    fn finish(&self, acc: &Mutex<Option<T>>) -> Option<T> {
        acc.lock().clone()
    }
}

/// Adapt a single-threaded fold.
///
/// Every fold takes a mutex around the whole accumulator, so concurrent
/// feeders serialize. A warning is logged once per collector built.
pub fn exclusive<B, T, R, I, F, X>(init: I, fold: F, finish: X) -> Exclusive<B, R, I, F, X>
where
    B: Send,
    I: Fn() -> B + Send + Sync,
    F: Fn(&mut B, T) + Send + Sync,
    X: Fn(&B) -> R + Send + Sync,
{
    tracing::warn!(
        accumulator = std::any::type_name::<B>(),
        "non-concurrent accumulator wrapped in a mutex; concurrent folds will serialize"
    );
    Exclusive {
        init,
        fold,
        finish,
        _marker: PhantomData,
    }
}

pub struct Exclusive<B, R, I, F, X> {
    init: I,
    fold: F,
    finish: X,
    _marker: PhantomData<fn() -> (B, R)>,
}

impl<B, T, R, I, F, X> Collector<T> for Exclusive<B, R, I, F, X>
where
    B: Send,
    I: Fn() -> B + Send + Sync,
    F: Fn(&mut B, T) + Send + Sync,
    X: Fn(&B) -> R + Send + Sync,
{
    type Acc = Mutex<B>;
    type Out = R;

    fn supply(&self) -> Mutex<B> {
        Mutex::new((self.init)())
    }

    fn accumulate(&self, acc: &Mutex<B>, value: T) {
        (self.fold)(&mut acc.lock(), value);
    }

    fn finish(&self, acc: &Mutex<B>) -> R {
        (self.finish)(&acc.lock())
    }
}

impl<B, R, I, F, X> fmt::Debug for Exclusive<B, R, I, F, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exclusive").finish_non_exhaustive()
    }
}
