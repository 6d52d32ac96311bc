//! Busy-wait mutual exclusion over scratch memory.
//!
//! Handlers never suspend: a blocked core spins until the holder releases.
//! The handlers need a blocking `lock` and a non-blocking `try_lock`; both
//! come from `spin`'s test-and-set mutex, which ties the lock word to the
//! data it protects.

/// Spin lock guarding one region of a scratchpad.
pub type SpinMutex<T> = spin::mutex::SpinMutex<T>;

/// Releases the lock on drop.
pub type SpinGuard<'a, T> = spin::mutex::SpinMutexGuard<'a, T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_try_lock_fails_while_held() {
        let m = SpinMutex::<u32>::new(0);
        let g = m.lock();
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());
        drop(g);
        assert!(!m.is_locked());
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn test_contended_counter() {
        let m = Arc::new(SpinMutex::<u64>::new(0));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        *m.lock() += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(*m.lock(), 40_000);
    }
}
