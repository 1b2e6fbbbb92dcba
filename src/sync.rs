// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Mutex helper that recovers from poisoning instead of panicking.
//!
//! A panic inside one update handler must not take the dispatch loop down
//! with it, so shared bookkeeping (the recording transport's call log, for
//! instance) is always reachable even after a poisoned guard.

use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex, recovering the guard if a previous holder panicked.
#[inline]
pub fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "sync",
                event = "LOCK_POISONED",
                "Mutex was poisoned by a panicking holder. Recovering data."
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_resilient_lock_normal() {
        let lock = Mutex::new(1);
        *resilient_lock(&lock) += 1;
        assert_eq!(*resilient_lock(&lock), 2);
    }

    #[test]
    fn test_resilient_lock_poisoned() {
        let lock = Arc::new(Mutex::new(vec![1, 2]));
        let lock_clone = Arc::clone(&lock);

        let handle = thread::spawn(move || {
            let _guard = lock_clone.lock().unwrap();
            panic!("intentional panic to poison lock");
        });
        let _ = handle.join();

        let mut guard = resilient_lock(&lock);
        guard.push(3);
        assert_eq!(*guard, vec![1, 2, 3]);
    }
}
