//! Bounded worker pool on scoped OS threads

use std::collections::VecDeque;
use parking_lot::Mutex;
use std::thread;

/// Runs tasks on at most `size` threads; workers pull from a shared queue
#[derive(Debug, Clone, Copy)]
pub struct BoundedPool {
    size: usize,
}

impl BoundedPool {
    pub fn new(size: usize) -> Self {
        BoundedPool { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` over every item and return all results in completion order.
    /// Blocks until every item is processed; a failing item does not stop
    /// the others.
    pub fn run<T, R, F>(&self, items: impl IntoIterator<Item = T>, task: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let queue: VecDeque<T> = items.into_iter().collect();
        if queue.is_empty() {
            return Vec::new();
        }

        let workers = self.size.min(queue.len());
        let capacity = queue.len();
        let queue = Mutex::new(queue);
        let results = Mutex::new(Vec::with_capacity(capacity));

        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let next = queue.lock().pop_front();
                    match next {
                        Some(item) => {
                            let result = task(item);
                            results.lock().push(result);
                        }
                        None => break,
                    }
                });
            }
        });

        results.into_inner()
    }
}

impl Default for BoundedPool {
    fn default() -> Self {
        BoundedPool::new(crate::config::DEFAULT_CONCURRENCY)
    }
}
