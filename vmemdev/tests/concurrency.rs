//! Several sessions on one store, driven from different threads

use std::sync::Arc;
use std::thread;

use vmemdev::{BufferStore, Registry, SeekMode};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_writers_do_not_corrupt_each_other() {
    init_tracing();
    const HALF: usize = 4096;
    let store = Arc::new(BufferStore::new(2 * HALF).unwrap());

    let mut tasks = Vec::new();
    for (index, fill) in [(0usize, b'A'), (1, b'B')] {
        let mut session = store.open();
        tasks.push(tokio::task::spawn_blocking(move || {
            let offset = i64::try_from(index * HALF).unwrap();
            // Many small writes so the two sessions interleave on the lock
            for round in 0..64 {
                session.seek(offset, SeekMode::Absolute).unwrap();
                let chunk = vec![fill.wrapping_add(round % 2); HALF];
                assert_eq!(session.write(&chunk).unwrap(), HALF);
            }
            session.seek(offset, SeekMode::Absolute).unwrap();
            session.read_to_vec(HALF).unwrap()
        }));
    }

    let mut halves = Vec::new();
    for task in tasks {
        halves.push(task.await.unwrap());
    }

    // The last round (63) wrote fill + 1 everywhere
    assert!(halves[0].iter().all(|b| *b == b'B'));
    assert!(halves[1].iter().all(|b| *b == b'C'));

    let snapshot = store.snapshot();
    assert_eq!(&snapshot[..HALF], halves[0].as_slice());
    assert_eq!(&snapshot[HALF..], halves[1].as_slice());
}

#[test]
fn test_reads_never_observe_torn_writes() {
    init_tracing();
    const SIZE: usize = 1024;
    let store = Arc::new(BufferStore::new(SIZE).unwrap());

    thread::scope(|scope| {
        let mut writer = store.open();
        scope.spawn(move || {
            for round in 0..200u32 {
                let fill = u8::try_from(round % 251).unwrap();
                writer.seek(0, SeekMode::Absolute).unwrap();
                assert_eq!(writer.write(&[fill; SIZE]).unwrap(), SIZE);
            }
        });

        for _ in 0..3 {
            let mut reader = store.open();
            scope.spawn(move || {
                for _ in 0..200 {
                    reader.seek(0, SeekMode::Absolute).unwrap();
                    let data = reader.read_to_vec(SIZE).unwrap();
                    assert_eq!(data.len(), SIZE);
                    // Each write replaces the whole buffer under the lock
                    assert!(data.iter().all(|b| *b == data[0]));
                }
            });
        }
    });
}

#[test]
fn test_sessions_opened_through_registry_share_store() {
    init_tracing();
    let registry = Arc::new(Registry::new());
    registry
        .attach("vmemdev", BufferStore::new(64).unwrap())
        .unwrap();

    thread::scope(|scope| {
        for index in 0..8u8 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                let mut session = registry.open("/dev/vmemdev").unwrap();
                session
                    .seek(i64::from(index) * 8, SeekMode::Absolute)
                    .unwrap();
                assert_eq!(session.write(&[index; 8]).unwrap(), 8);
            });
        }
    });

    let snapshot = registry.lookup("vmemdev").unwrap().snapshot();
    for (index, chunk) in snapshot.chunks(8).enumerate() {
        assert!(chunk.iter().all(|b| usize::from(*b) == index));
    }
}
