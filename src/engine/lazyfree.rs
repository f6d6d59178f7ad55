//! Отложенное освобождение крупных значений.
//!
//! Разрушение большого контейнера стоит O(n) и не должно выполняться на
//! горячем пути. Значения, чья оценка стоимости не ниже порога, уходят в
//! очередь фиксированного набора рабочих потоков; мелкие освобождаются сразу.
//! Очередь не ограничена, отмены нет: поставленное значение будет
//! уничтожено ровно один раз.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::{
    config::RdbConfig,
    database::{HashValue, SetValue, Value, ZSetValue},
};

/// Оценка стоимости освобождения значения, O(1).
pub trait FreeEffort {
    fn free_effort(&self) -> usize;
}

/// Пул потоков, которые уничтожают значения в фоне.
pub struct LazyFreePool<T: FreeEffort + Send + 'static = Value> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
    threshold: usize,
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
    shutdown: AtomicBool,
    pending: AtomicU64,
    freed: AtomicU64,
    deferred: AtomicU64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T: FreeEffort + Send + 'static> LazyFreePool<T> {
    /// Запускает `threads` рабочих потоков. При нуле потоков всё
    /// освобождается на месте.
    pub fn new(
        threads: usize,
        threshold: usize,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            pending: AtomicU64::new(0),
            freed: AtomicU64::new(0),
            deferred: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("lazyfree-{i}"))
                .spawn(move || Self::worker(shared));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(error = %e, "Failed to spawn lazy-free worker"),
            }
        }
        info!(threads = workers.len(), threshold, "Lazy-free pool started");

        Self {
            shared,
            workers,
            threshold,
        }
    }

    pub fn from_config(cfg: &RdbConfig) -> Self {
        Self::new(cfg.lazyfree_threads, cfg.lazyfree_threshold)
    }

    /// Освобождает значение: в фоне, если оно дорогое, иначе сразу.
    pub fn release(
        &self,
        value: T,
    ) {
        let effort = value.free_effort();
        if effort < self.threshold || self.workers.is_empty() {
            drop(value);
            return;
        }

        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.deferred.fetch_add(1, Ordering::Relaxed);
        self.shared.queue.lock().push_back(value);
        self.shared.ready.notify_one();
        debug!(effort, "Value queued for deferred free");
    }

    /// Освобождает значение под `Arc`.
    ///
    /// # Panics
    ///
    /// Если у `Arc` есть другие владельцы.
    pub fn release_shared(
        &self,
        value: Arc<T>,
    ) {
        match Arc::try_unwrap(value) {
            Ok(v) => self.release(v),
            Err(_) => panic!("release_shared called on a value that is still shared"),
        }
    }

    /// Значения в очереди, ещё не уничтоженные.
    pub fn pending(&self) -> u64 {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Значения, уничтоженные рабочими потоками.
    pub fn freed(&self) -> u64 {
        self.shared.freed.load(Ordering::Acquire)
    }

    /// Значения, отправленные в очередь за всё время.
    pub fn deferred(&self) -> u64 {
        self.shared.deferred.load(Ordering::Relaxed)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    fn worker(shared: Arc<Shared<T>>) {
        loop {
            let next = {
                let mut queue = shared.queue.lock();
                loop {
                    if let Some(v) = queue.pop_front() {
                        break Some(v);
                    }
                    if shared.shutdown.load(Ordering::Acquire) {
                        break None;
                    }
                    shared.ready.wait(&mut queue);
                }
            };
            let Some(value) = next else {
                return;
            };
            drop(value);
            shared.pending.fetch_sub(1, Ordering::AcqRel);
            shared.freed.fetch_add(1, Ordering::AcqRel);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl FreeEffort for Value {
    fn free_effort(&self) -> usize {
        match self {
            Value::List(ql) => ql.len(),
            Value::Hash(HashValue::Table(map)) => map.len() * 2,
            Value::Set(SetValue::Table(set)) => set.len(),
            Value::ZSet(ZSetValue::SkipList(zs)) => zs.len() * 2,
            // Строки и компактные кодирования занимают один блок.
            _ => 0,
        }
    }
}

impl<T: FreeEffort + Send + 'static> Drop for LazyFreePool<T> {
    fn drop(&mut self) {
        {
            // Флаг ставится под замком, иначе поток может пропустить
            // пробуждение между проверкой и ожиданием.
            let _queue = self.shared.queue.lock();
            self.shared.shutdown.store(true, Ordering::Release);
        }
        self.shared.ready.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Lazy-free worker panicked");
            }
        }

        // Без рабочих потоков очередь пуста; остаток освобождается здесь.
        let rest: Vec<T> = self.shared.queue.lock().drain(..).collect();
        let n = rest.len() as u64;
        drop(rest);
        if n > 0 {
            self.shared.pending.fetch_sub(n, Ordering::AcqRel);
            self.shared.freed.fetch_add(n, Ordering::AcqRel);
        }
        info!(
            freed = self.shared.freed.load(Ordering::Acquire),
            "Lazy-free pool stopped"
        );
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
