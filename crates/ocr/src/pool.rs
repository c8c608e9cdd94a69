//! A bounded pool of OCR engine sessions.
//!
//! Engines are created lazily up to `size`. Each recognition leases exactly one
//! engine, so two requests never share a session. The lease hands the engine
//! back when dropped, which covers early returns, panics and cancelled tasks.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::recognizer::{EngineFactory, OcrBackend, OcrEngine, OcrError};
use crate::types::RecognizedText;

struct PoolState<E> {
    idle: Vec<E>,
    /// Engines alive, idle or leased.
    live: usize,
    closed: bool,
}

pub struct EnginePool<F: EngineFactory> {
    factory: F,
    size: usize,
    state: Mutex<PoolState<F::Engine>>,
    available: Condvar,
}

impl<F: EngineFactory> EnginePool<F> {
    /// `size` is clamped to at least one engine.
    pub fn new(factory: F, size: usize) -> Self {
        Self {
            factory,
            size: size.max(1),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                live: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn live(&self) -> usize {
        self.lock().live
    }

    pub fn idle(&self) -> usize {
        self.lock().idle.len()
    }

    /// Block until an engine is free, creating one if the pool has room.
    pub fn acquire(&self) -> Result<EngineLease<'_, F>, OcrError> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(OcrError::PoolClosed);
            }
            if let Some(engine) = state.idle.pop() {
                return Ok(EngineLease::new(self, engine));
            }
            if state.live < self.size {
                state.live += 1;
                drop(state);
                return self.spawn_engine();
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Drop every idle engine and refuse further leases. Leased engines are
    /// released as their leases end.
    pub fn close(&self) {
        let idle = {
            let mut state = self.lock();
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.live -= idle.len();
            idle
        };
        debug!(released = idle.len(), "closing OCR engine pool");
        drop(idle);
        self.available.notify_all();
    }

    fn spawn_engine(&self) -> Result<EngineLease<'_, F>, OcrError> {
        match self.factory.create() {
            Ok(engine) => {
                debug!("created OCR engine session");
                Ok(EngineLease::new(self, engine))
            }
            Err(e) => {
                warn!("failed to create OCR engine: {e}");
                self.forget_one();
                Err(e)
            }
        }
    }

    fn give_back(&self, engine: F::Engine) {
        let mut state = self.lock();
        if state.closed {
            state.live -= 1;
            drop(state);
            drop(engine);
        } else {
            state.idle.push(engine);
            drop(state);
        }
        self.available.notify_one();
    }

    fn forget_one(&self) {
        self.lock().live -= 1;
        self.available.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<F::Engine>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: EngineFactory> OcrBackend for EnginePool<F> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        let mut lease = self.acquire()?;
        let result = lease.recognize(image_bytes);
        if result.is_err() {
            // Don't hand a session that just failed to the next caller.
            lease.discard();
        }
        result
    }
}

/// Exclusive use of one pooled engine.
pub struct EngineLease<'a, F: EngineFactory> {
    pool: &'a EnginePool<F>,
    engine: Option<F::Engine>,
}

impl<'a, F: EngineFactory> EngineLease<'a, F> {
    fn new(pool: &'a EnginePool<F>, engine: F::Engine) -> Self {
        Self {
            pool,
            engine: Some(engine),
        }
    }

    pub fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        match self.engine.as_mut() {
            Some(engine) => engine.recognize(image_bytes),
            None => Err(OcrError::PoolClosed),
        }
    }

    /// Release the engine instead of returning it to the pool.
    pub fn discard(&mut self) {
        if let Some(engine) = self.engine.take() {
            drop(engine);
            self.pool.forget_one();
        }
    }
}

impl<F: EngineFactory> Drop for EngineLease<'_, F> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.give_back(engine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        released: AtomicUsize,
        in_use: AtomicUsize,
        max_in_use: AtomicUsize,
    }

    struct CountingEngine {
        id: usize,
        counters: Arc<Counters>,
        fail: bool,
    }

    impl OcrEngine for CountingEngine {
        fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
            let now = self.counters.in_use.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_in_use.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.counters.in_use.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                return Err(OcrError::Engine("boom".into()));
            }
            // Echo the request so interleaving would be visible.
            let text = format!("engine-{} {}", self.id, String::from_utf8_lossy(image_bytes));
            Ok(RecognizedText::from_text(&text))
        }
    }

    impl Drop for CountingEngine {
        fn drop(&mut self) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingFactory {
        counters: Arc<Counters>,
        fail_create: bool,
        fail_recognize: bool,
    }

    impl CountingFactory {
        fn new(counters: &Arc<Counters>) -> Self {
            Self {
                counters: Arc::clone(counters),
                fail_create: false,
                fail_recognize: false,
            }
        }
    }

    impl EngineFactory for CountingFactory {
        type Engine = CountingEngine;

        fn create(&self) -> Result<CountingEngine, OcrError> {
            if self.fail_create {
                return Err(OcrError::Engine("no language data".into()));
            }
            let id = self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(CountingEngine {
                id,
                counters: Arc::clone(&self.counters),
                fail: self.fail_recognize,
            })
        }
    }

    #[test]
    fn engines_are_created_lazily_and_reused() {
        let counters = Arc::new(Counters::default());
        let pool = EnginePool::new(CountingFactory::new(&counters), 2);
        assert_eq!(pool.live(), 0);

        pool.recognize(b"a").unwrap();
        pool.recognize(b"b").unwrap();

        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.live(), 1);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn single_engine_serializes_concurrent_requests() {
        let counters = Arc::new(Counters::default());
        let pool = Arc::new(EnginePool::new(CountingFactory::new(&counters), 1));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let req = format!("req{i}");
                    let out = pool.recognize(req.as_bytes()).unwrap();
                    assert!(out.as_text().ends_with(&req), "got {}", out.as_text());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.max_in_use.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pool_never_exceeds_its_size() {
        let counters = Arc::new(Counters::default());
        let pool = Arc::new(EnginePool::new(CountingFactory::new(&counters), 2));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.recognize(b"x").unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(counters.created.load(Ordering::SeqCst) <= 2);
        assert!(counters.max_in_use.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn failed_recognition_discards_the_engine() {
        let counters = Arc::new(Counters::default());
        let mut factory = CountingFactory::new(&counters);
        factory.fail_recognize = true;
        let pool = EnginePool::new(factory, 1);

        assert!(pool.recognize(b"x").is_err());
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(pool.live(), 0);

        // The slot is free again for a fresh session.
        assert!(pool.recognize(b"y").is_err());
        assert_eq!(counters.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn creation_failure_frees_the_slot() {
        let counters = Arc::new(Counters::default());
        let mut factory = CountingFactory::new(&counters);
        factory.fail_create = true;
        let pool = EnginePool::new(factory, 1);

        let err = pool.recognize(b"x").unwrap_err();
        assert!(matches!(err, OcrError::Engine(_)));
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn lease_returns_engine_on_panic() {
        let counters = Arc::new(Counters::default());
        let pool = Arc::new(EnginePool::new(CountingFactory::new(&counters), 1));

        let p = Arc::clone(&pool);
        let joined = thread::spawn(move || {
            let _lease = p.acquire().unwrap();
            panic!("caller blew up mid-recognition");
        })
        .join();
        assert!(joined.is_err());

        assert_eq!(pool.idle(), 1);
        pool.recognize(b"after").unwrap();
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_releases_idle_engines_and_rejects_leases() {
        let counters = Arc::new(Counters::default());
        let pool = EnginePool::new(CountingFactory::new(&counters), 2);
        pool.recognize(b"x").unwrap();

        pool.close();

        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(pool.live(), 0);
        assert!(matches!(pool.acquire(), Err(OcrError::PoolClosed)));
    }

    #[test]
    fn lease_outstanding_at_close_is_released_on_drop() {
        let counters = Arc::new(Counters::default());
        let pool = EnginePool::new(CountingFactory::new(&counters), 1);
        let lease = pool.acquire().unwrap();

        pool.close();
        assert_eq!(counters.released.load(Ordering::SeqCst), 0);

        drop(lease);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn size_is_at_least_one() {
        let counters = Arc::new(Counters::default());
        let pool = EnginePool::new(CountingFactory::new(&counters), 0);
        assert_eq!(pool.size(), 1);
        pool.recognize(b"x").unwrap();
    }
}
