use kernel_sync::{CoreCounter, CoreId, SmpBarrier};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(10);

fn spawn_participants(
    barrier: &Arc<SmpBarrier>,
    passed: &Arc<AtomicUsize>,
    count: usize,
) -> Vec<thread::JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let barrier = Arc::clone(barrier);
            let passed = Arc::clone(passed);
            thread::spawn(move || {
                barrier.reach();
                passed.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect()
}

#[test]
fn releases_all_participants_once_everyone_arrived() {
    for n in [1, 2, 8] {
        let barrier = Arc::new(SmpBarrier::new(n));
        let passed = Arc::new(AtomicUsize::new(0));
        let handles = spawn_participants(&barrier, &passed, n);

        let start = Instant::now();
        while passed.load(Ordering::SeqCst) < n {
            assert!(start.elapsed() < DEADLINE, "barrier of {n} never opened");
            thread::sleep(Duration::from_millis(1));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert!(barrier.is_open());
        assert_eq!(barrier.value(), 0);
    }
}

#[cfg(feature = "smp")]
#[test]
fn one_missing_participant_keeps_the_barrier_closed() {
    let n = 4;
    let barrier = Arc::new(SmpBarrier::new(n));
    let passed = Arc::new(AtomicUsize::new(0));
    let handles = spawn_participants(&barrier, &passed, n - 1);

    // Bounded observation window: nobody may pass while one core is missing.
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(200) {
        assert_eq!(passed.load(Ordering::SeqCst), 0);
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!barrier.is_open());
    assert_eq!(barrier.value(), 1);

    // The last participant arrives and releases everyone.
    barrier.reach();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(passed.load(Ordering::SeqCst), n - 1);
}

#[test]
fn can_be_reused_after_it_opened() {
    let barrier = Arc::new(SmpBarrier::new(2));
    for _round in 0..3 {
        let passed = Arc::new(AtomicUsize::new(0));
        let handles = spawn_participants(&barrier, &passed, 1);
        barrier.reach();
        for h in handles {
            h.join().unwrap();
        }
        assert!(barrier.is_open());
        barrier.reset(2);
    }
}

#[cfg(feature = "smp")]
#[test]
fn reset_to_active_uses_the_live_core_count() {
    let cores = CoreCounter::new();
    assert_eq!(cores.register(), CoreId::BOOTSTRAP);
    assert_eq!(cores.register(), CoreId(1));
    assert_eq!(cores.register(), CoreId(2));
    assert_eq!(cores.active(), 3);

    let barrier = SmpBarrier::default();
    assert!(barrier.is_open());
    barrier.reset_to_active(&cores);
    assert_eq!(barrier.value(), 3);
}

#[test]
fn core_counter_hands_out_unique_ids_under_contention() {
    let cores = Arc::new(CoreCounter::new());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cores = Arc::clone(&cores);
            thread::spawn(move || cores.register())
        })
        .collect();

    let mut ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().index()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..16).collect::<Vec<_>>());
    assert_eq!(cores.active(), 16);
}

#[cfg(all(feature = "smp", debug_assertions))]
#[test]
#[should_panic(expected = "still expected")]
fn reset_with_stragglers_is_reported() {
    let barrier = SmpBarrier::new(2);
    barrier.reset(3);
}

/// Run with `--no-default-features`.
#[cfg(not(feature = "smp"))]
#[test]
fn single_core_barrier_is_a_flag() {
    let barrier = SmpBarrier::default();
    for participants in [0, 1, 4, 64] {
        barrier.reset(participants);
        assert_eq!(barrier.value(), 1);
        assert!(!barrier.is_open());

        let start = Instant::now();
        barrier.reach();
        assert!(start.elapsed() < DEADLINE);
        assert!(barrier.is_open());
        assert_eq!(barrier.value(), 0);
    }

    let cores = CoreCounter::new();
    assert_eq!(cores.register(), CoreId::BOOTSTRAP);
    assert_eq!(cores.register(), CoreId(1));
    barrier.reset_to_active(&cores);
    assert_eq!(barrier.value(), 1);
}
