// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicI64, Ordering};
use tracing::warn;

/// Lock-free count of live client connections.
#[derive(Debug, Default)]
pub struct ConnectionCounter {
    count: AtomicI64,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn decrement(&self) {
        self.add(-1);
    }

    /// Current count, clamped at zero. A negative value means some caller
    /// decremented without a matching increment.
    pub fn snapshot(&self) -> u64 {
        let count = self.count.load(Ordering::Relaxed);
        if count < 0 {
            warn!("connection count is negative ({count}), must be a bug; reporting 0");
            return 0;
        }
        count as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tracing_test::traced_test;

    #[test]
    fn test_increment_decrement() {
        let counter = ConnectionCounter::new();
        counter.increment();
        counter.increment();
        counter.decrement();
        counter.add(5);
        assert_eq!(counter.snapshot(), 6);
    }

    #[test]
    #[traced_test]
    fn test_negative_is_clamped() {
        let counter = ConnectionCounter::new();
        counter.decrement();
        counter.decrement();
        assert_eq!(counter.snapshot(), 0);
        assert!(logs_contain("must be a bug"));

        // the drift itself is not corrected
        counter.add(3);
        assert_eq!(counter.snapshot(), 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let counter = Arc::new(ConnectionCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment();
                        counter.decrement();
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(counter.snapshot(), 8000);
    }
}
