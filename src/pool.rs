use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
};

pub const DEFAULT_MAX_IDLE: usize = 1024;

/// A concurrency-safe pool of reusable values.
///
/// `acquire` hands out an idle value or builds a new one with the factory.
/// Values come back when their guard drops. Nothing is reset on the way
/// back in; a reused value goes through the reset hook on its way out.
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    reset: Option<Box<dyn Fn(&mut T) + Send + Sync>>,
    max_idle: usize,
    created: AtomicUsize,
}

impl<T> Pool<T> {
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::with_max_idle(factory, DEFAULT_MAX_IDLE)
    }

    /// At most `max_idle` released values are kept, the rest are dropped.
    pub fn with_max_idle(factory: impl Fn() -> T + Send + Sync + 'static, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(vec![]),
            factory: Box::new(factory),
            reset: None,
            max_idle,
            created: AtomicUsize::new(0),
        }
    }

    /// Runs `reset` on every reused value before `acquire` returns it.
    pub fn with_reset(mut self, reset: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.reset = Some(Box::new(reset));
        self
    }

    pub fn acquire(&self) -> Pooled<'_, T> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let value = match reused {
            Some(mut value) => {
                if let Some(reset) = &self.reset {
                    reset(&mut value);
                }
                value
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        };
        Pooled {
            pool: self,
            value: Some(value),
        }
    }

    fn release(&self, value: T) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(value);
        }
    }

    /// Values built by the factory so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle())
            .field("created", &self.created())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

/// Exclusive handle on a pooled value. Dropping it returns the value.
pub struct Pooled<'a, T> {
    pool: &'a Pool<T>,
    value: Option<T>,
}

impl<T> Pooled<'_, T> {
    /// Returns the value to the pool now.
    pub fn release(self) {}
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Only `Drop` takes the value out.
        self.value.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}
