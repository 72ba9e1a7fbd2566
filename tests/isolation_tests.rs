use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use catalogix::{Document, ErrorKind, IndexMapping, IsolationLevel, TransactionalIndex};
use tracing_subscriber::EnvFilter;

type Notes = TransactionalIndex<u32, Document>;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn notes(level: IsolationLevel) -> Arc<Notes> {
    init_logging();
    let index = Notes::new();
    index.register_mapping("Note", IndexMapping::new(["text"]).with_rating("rating"));
    index.set_transactional_mode(level);
    Arc::new(index)
}

fn note(text: &str) -> Document {
    Document::new("Note").with_field("text", text)
}

fn summary(text: &str) -> Document {
    Document::new("NoteSummary").with_field("text", text).with_field("rating", 1.0)
}

fn put(index: &Notes, key: u32, text: &str) {
    index.add(key, &note(text), summary(text)).unwrap();
}

fn text_of(index: &Notes, key: u32) -> Option<String> {
    index
        .get(&key)
        .unwrap()
        .and_then(|entry| entry.get_field("text").map(|v| v.to_index_text()))
}

/// Runs a writer that updates key 1 to "fresh" and holds its transaction open
/// until told to finish. Returns (updated, finish) channels and the join handle.
fn open_writer(
    index: &Arc<Notes>,
    commit: bool,
) -> (mpsc::Receiver<()>, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let (updated_tx, updated_rx) = mpsc::channel();
    let (finish_tx, finish_rx) = mpsc::channel::<()>();
    let writer = index.clone();
    let handle = thread::spawn(move || {
        writer.begin().unwrap();
        writer.update(1, &note("fresh"), summary("fresh")).unwrap();
        updated_tx.send(()).unwrap();
        finish_rx.recv().unwrap();
        if commit {
            writer.commit().unwrap();
        } else {
            writer.rollback().unwrap();
        }
    });
    (updated_rx, finish_tx, handle)
}

#[test]
fn uncommitted_writes_are_invisible_from_read_committed_up() {
    for level in [IsolationLevel::ReadCommitted, IsolationLevel::RepeatableRead, IsolationLevel::Serializable] {
        let index = notes(level);
        put(&index, 1, "stale");

        let (updated, finish, writer) = open_writer(&index, true);
        updated.recv().unwrap();

        index.begin().unwrap();
        assert!(index.search("fresh").unwrap().is_empty(), "{:?} saw a dirty write", level);
        assert_eq!(text_of(&index, 1).as_deref(), Some("stale"));
        index.commit().unwrap();

        finish.send(()).unwrap();
        writer.join().unwrap();
        assert!(index.search("fresh").unwrap().contains_key(&1));
    }
}

#[test]
fn read_uncommitted_sees_pending_writes_but_never_rolled_back_ones() {
    let index = notes(IsolationLevel::ReadUncommitted);
    put(&index, 1, "stale");

    let (updated, finish, writer) = open_writer(&index, false);
    updated.recv().unwrap();

    index.begin().unwrap();
    assert!(index.search("fresh").unwrap().contains_key(&1));
    assert_eq!(text_of(&index, 1).as_deref(), Some("fresh"));
    index.commit().unwrap();

    finish.send(()).unwrap();
    writer.join().unwrap();

    assert!(index.search("fresh").unwrap().is_empty());
    assert_eq!(text_of(&index, 1).as_deref(), Some("stale"));
}

#[test]
fn repeatable_read_pins_what_was_read() {
    for level in [IsolationLevel::RepeatableRead, IsolationLevel::Serializable] {
        let index = notes(level);
        put(&index, 1, "stale");

        index.begin().unwrap();
        assert_eq!(text_of(&index, 1).as_deref(), Some("stale"));

        let writer = index.clone();
        thread::spawn(move || writer.update(1, &note("fresh"), summary("fresh")).unwrap())
            .join()
            .unwrap();

        assert_eq!(text_of(&index, 1).as_deref(), Some("stale"), "{:?} re-read a new value", level);
        assert!(index.search("stale").unwrap().contains_key(&1));
        assert!(index.search("fresh").unwrap().is_empty());
        index.commit().unwrap();

        assert_eq!(text_of(&index, 1).as_deref(), Some("fresh"));
    }
}

#[test]
fn repeatable_read_writes_fail_when_the_pinned_value_moved() {
    let index = notes(IsolationLevel::RepeatableRead);
    put(&index, 1, "doomed");
    put(&index, 2, "alpha");

    index.begin().unwrap();
    assert_eq!(text_of(&index, 1).as_deref(), Some("doomed"));
    assert_eq!(text_of(&index, 2).as_deref(), Some("alpha"));

    let writer = index.clone();
    thread::spawn(move || {
        writer.remove(&1).unwrap();
        writer.update(2, &note("beta"), summary("beta")).unwrap();
    })
    .join()
    .unwrap();

    // Reads stay pinned, but writes on top of a stale read are refused.
    assert_eq!(text_of(&index, 1).as_deref(), Some("doomed"));
    let err = index.update_entry(&1, summary("doomed")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SerializationFailure);
    let err = index.update_entry(&2, summary("alpha")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SerializationFailure);
    assert_eq!(index.remove(&2).unwrap_err().kind, ErrorKind::SerializationFailure);
    index.rollback().unwrap();

    assert!(index.get(&1).unwrap().is_none());
    assert!(index.search("alpha").unwrap().is_empty());
    assert_eq!(text_of(&index, 2).as_deref(), Some("beta"));
}

#[test]
fn repeatable_read_writes_build_on_an_unchanged_pinned_value() {
    let index = notes(IsolationLevel::RepeatableRead);
    put(&index, 1, "steady");

    index.begin().unwrap();
    assert_eq!(text_of(&index, 1).as_deref(), Some("steady"));
    let writer = index.clone();
    thread::spawn(move || put(&writer, 2, "unrelated")).join().unwrap();

    index.update_entry(&1, summary("retitled")).unwrap();
    index.commit().unwrap();

    assert!(index.search("steady").unwrap().contains_key(&1));
    assert_eq!(text_of(&index, 1).as_deref(), Some("retitled"));
}

#[test]
fn read_committed_allows_non_repeatable_reads() {
    let index = notes(IsolationLevel::ReadCommitted);
    put(&index, 1, "stale");

    index.begin().unwrap();
    assert_eq!(text_of(&index, 1).as_deref(), Some("stale"));
    let writer = index.clone();
    thread::spawn(move || writer.update(1, &note("fresh"), summary("fresh")).unwrap())
        .join()
        .unwrap();
    assert_eq!(text_of(&index, 1).as_deref(), Some("fresh"));
    index.commit().unwrap();
}

#[test]
fn phantoms_appear_under_repeatable_read_but_not_serializable() {
    for (level, expected) in [(IsolationLevel::RepeatableRead, 2), (IsolationLevel::Serializable, 1)] {
        let index = notes(level);
        put(&index, 1, "apple tart");

        index.begin().unwrap();
        assert_eq!(index.search("apple").unwrap().len(), 1);

        let writer = index.clone();
        thread::spawn(move || put(&writer, 2, "apple pie")).join().unwrap();

        assert_eq!(index.search("apple").unwrap().len(), expected, "{:?}", level);
        index.commit().unwrap();
        assert_eq!(index.search("apple").unwrap().len(), 2);
    }
}

#[test]
fn serializable_writers_to_one_key_are_serialized() {
    let index = notes(IsolationLevel::Serializable);
    put(&index, 1, "original");

    index.begin().unwrap();
    index.update(1, &note("first"), summary("first")).unwrap();

    let (begun_tx, begun_rx) = mpsc::channel();
    let second = index.clone();
    let contender = thread::spawn(move || {
        second.begin().unwrap();
        begun_tx.send(()).unwrap();
        // Blocks on the key lock until the first writer commits, then loses.
        let result = second.update(1, &note("second"), summary("second"));
        second.rollback().unwrap();
        result
    });

    begun_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(50));
    index.commit().unwrap();

    let err = contender.join().unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::SerializationFailure);
    assert_eq!(text_of(&index, 1).as_deref(), Some("first"));
}

#[test]
fn serializable_commit_fails_when_a_search_was_invalidated() {
    let index = notes(IsolationLevel::Serializable);
    let both_written = Arc::new(Barrier::new(2));
    let (first_committed_tx, first_committed_rx) = mpsc::channel();

    let other = index.clone();
    let barrier = both_written.clone();
    let late = thread::spawn(move || {
        other.begin().unwrap();
        assert!(other.search("apple").unwrap().is_empty());
        put(&other, 6, "apple crumble");
        barrier.wait();
        first_committed_rx.recv().unwrap();
        other.commit()
    });

    index.begin().unwrap();
    assert!(index.search("apple").unwrap().is_empty());
    put(&index, 5, "apple pie");
    both_written.wait();
    index.commit().unwrap();
    first_committed_tx.send(()).unwrap();

    let err = late.join().unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::SerializationFailure);
    assert_eq!(index.search("apple").unwrap().keys().copied().collect::<Vec<_>>(), vec![5]);
}

#[test]
fn rolled_back_writes_never_become_visible() {
    let index = notes(IsolationLevel::ReadCommitted);
    put(&index, 1, "kept");

    index.begin().unwrap();
    put(&index, 2, "ghost");
    index.remove(&1).unwrap();
    assert!(text_of(&index, 1).is_none());
    index.rollback().unwrap();

    assert!(index.search("ghost").unwrap().is_empty());
    assert_eq!(text_of(&index, 1).as_deref(), Some("kept"));
    assert_eq!(index.len(), 1);
}

#[test]
fn commit_publishes_all_writes_at_once() {
    let index = notes(IsolationLevel::ReadCommitted);
    index.begin().unwrap();
    for key in 1..=3 {
        put(&index, key, "batch");
    }

    let reader = index.clone();
    let before = thread::spawn(move || reader.search("batch").unwrap().len()).join().unwrap();
    assert_eq!(before, 0);

    index.commit().unwrap();
    let reader = index.clone();
    let after = thread::spawn(move || reader.search("batch").unwrap().len()).join().unwrap();
    assert_eq!(after, 3);
}

#[test]
fn blocked_writer_times_out_with_deadlock() {
    let index = notes(IsolationLevel::ReadCommitted);
    index.set_lock_timeout(Duration::from_millis(100));
    put(&index, 1, "contended");

    index.begin().unwrap();
    index.update(1, &note("mine"), summary("mine")).unwrap();

    let other = index.clone();
    let err = thread::spawn(move || {
        other.begin().unwrap();
        let result = other.update(1, &note("theirs"), summary("theirs"));
        other.rollback().unwrap();
        result
    })
    .join()
    .unwrap()
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Deadlock);

    index.commit().unwrap();
    assert_eq!(text_of(&index, 1).as_deref(), Some("mine"));
}

#[test]
fn mode_none_auto_commits_every_operation() {
    let index = notes(IsolationLevel::None);
    assert_eq!(index.begin().unwrap_err().kind, ErrorKind::InvalidState);
    assert!(!index.in_transaction());

    put(&index, 1, "instant");
    let reader = index.clone();
    let seen = thread::spawn(move || reader.search("instant").unwrap().contains_key(&1))
        .join()
        .unwrap();
    assert!(seen);
}

#[test]
fn concurrent_transactions_on_distinct_keys_all_land() {
    let index = notes(IsolationLevel::Serializable);
    let workers: Vec<_> = (0..4u32)
        .map(|worker| {
            let index = index.clone();
            thread::spawn(move || {
                for i in 0..25u32 {
                    index.begin().unwrap();
                    put(&index, worker * 100 + i, "load");
                    index.commit().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(index.len(), 100);
    assert_eq!(index.search("load").unwrap().len(), 100);
    assert!(index.cleanup() <= 100);
}
