use kernel_sync::SpinLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

/// Stand-in for shared kernel state: a pool of free frame numbers.
struct FramePool {
    free: Vec<u64>,
    handed_out: usize,
}

impl FramePool {
    fn with_frames(count: u64) -> Self {
        Self {
            free: (0..count).rev().collect(),
            handed_out: 0,
        }
    }

    fn take(&mut self) -> Option<u64> {
        let frame = self.free.pop()?;
        self.handed_out += 1;
        Some(frame)
    }
}

#[test]
fn guard_holds_the_lock_until_dropped() {
    let pool = SpinLock::new(FramePool::with_frames(4));

    let guard = pool.lock();
    assert!(pool.is_locked());
    assert!(pool.try_lock().is_none());
    drop(guard);

    assert!(!pool.is_locked());
    let mut guard = pool.try_lock().unwrap();
    assert_eq!(guard.take(), Some(0));
}

#[test]
fn with_lock_returns_the_closure_result() {
    let pool = SpinLock::new(FramePool::with_frames(2));
    let taken = pool.with_lock(|p| [p.take(), p.take(), p.take()]);
    assert_eq!(taken, [Some(0), Some(1), None]);
    assert!(!pool.is_locked());
}

#[test]
fn exclusive_access_bypasses_the_lock() {
    let mut pool = SpinLock::new(FramePool::with_frames(1));
    pool.get_mut().free.push(99);
    assert_eq!(pool.lock().free, [0, 99]);
    assert_eq!(pool.into_inner().handed_out, 0);
}

#[test]
fn irq_guard_is_inert_on_the_host() {
    let pool = SpinLock::new(FramePool::with_frames(1));
    {
        let mut guard = pool.lock_irq();
        assert!(pool.is_locked());
        assert_eq!(guard.take(), Some(0));
    }
    assert!(!pool.is_locked());
}

#[test]
fn contending_cores_never_share_a_frame() {
    const CORES: usize = 8;
    const PER_CORE: usize = 500;

    let pool = Arc::new(SpinLock::new(FramePool::with_frames((CORES * PER_CORE) as u64)));
    let inside = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(CORES));

    let handles: Vec<_> = (0..CORES)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let inside = Arc::clone(&inside);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                (0..PER_CORE)
                    .map(|_| {
                        let frame = pool.with_lock(|p| {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            let frame = p.take();
                            inside.fetch_sub(1, Ordering::SeqCst);
                            frame
                        });
                        thread::yield_now();
                        frame.unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for frame in handle.join().unwrap() {
            assert!(seen.insert(frame), "frame {frame} handed out twice");
        }
    }
    assert_eq!(seen.len(), CORES * PER_CORE);
    assert_eq!(pool.with_lock(|p| p.handed_out), CORES * PER_CORE);
}

#[test]
fn panicking_holder_releases_the_lock() {
    let pool = SpinLock::new(FramePool::with_frames(3));

    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        pool.with_lock(|p| {
            p.take();
            panic!("fault while holding the pool");
        });
    }));
    assert!(result.is_err());

    assert!(!pool.is_locked());
    assert_eq!(pool.with_lock(|p| p.take()), Some(1));
}
