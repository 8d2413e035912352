use kernel_sync::SyncOnceCell;
use std::sync::Arc;
use std::thread;

#[test]
fn first_writer_wins() {
    let cell = SyncOnceCell::new();
    assert!(cell.get().is_none());
    assert!(!cell.is_initialized());

    assert_eq!(cell.set(1u32), Ok(()));
    assert_eq!(cell.set(2u32), Err(2));
    assert_eq!(cell.get(), Some(&1));
    assert_eq!(*cell.get_or_init(|| 3), 1);
}

#[test]
fn concurrent_initializers_agree_on_one_value() {
    let cell = Arc::new(SyncOnceCell::new());
    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || *cell.get_or_init(|| i))
        })
        .collect();

    let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(seen.iter().all(|v| *v == seen[0]));
}
