//! Crash recovery: the status persisted with each commit drives replay.

use std::io;

use pretty_assertions::assert_eq;

use e2e_tests::{content_document, count_version, Activity, ScriptedQueue, TestHarness};
use sn_types::{names, IndexingActivityStatus, SnTerm};

fn queue() -> ScriptedQueue {
    ScriptedQueue::new(vec![
        Activity::add(1, content_document(10, "first")),
        Activity::add(2, content_document(20, "second")),
        Activity::delete(3, 10),
        Activity::add(4, content_document(40, "fourth")),
    ])
}

/// Replaying activities that already reached the index changes nothing.
#[test]
fn test_replay_is_idempotent() {
    let harness = TestHarness::new();
    let manager = harness.started_manager();
    for activity in [
        Activity::add(1, content_document(10, "first")),
        Activity::add(2, content_document(20, "second")),
    ] {
        assert!(activity.execute(&manager, false).unwrap());
    }
    // Activity 2 is applied but, as after a crash, never recorded as done.
    manager
        .write_activity_status_to_index(IndexingActivityStatus::new(1, []))
        .unwrap();
    manager.shut_down().unwrap();

    let queue = queue();
    let manager = harness.manager();
    manager.start(Some(&queue), &mut io::sink()).unwrap();

    assert_eq!(queue.replayed(), vec![2, 3, 4]);
    assert_eq!(count_version(&manager, 10), 0);
    assert_eq!(count_version(&manager, 20), 1);
    assert_eq!(count_version(&manager, 40), 1);
    assert_eq!(manager.activity_status(), IndexingActivityStatus::new(4, []));

    let frame = manager.get_index_reader_frame(false).unwrap();
    assert_eq!(frame.num_docs(), 2);
}

/// Gaps below the last activity id are replayed too.
#[test]
fn test_gaps_are_replayed() {
    let harness = TestHarness::new();
    let manager = harness.started_manager();
    manager
        .write_activity_status_to_index(IndexingActivityStatus::new(3, [2]))
        .unwrap();
    manager.shut_down().unwrap();

    let queue = queue();
    let manager = harness.manager();
    manager.start(Some(&queue), &mut io::sink()).unwrap();

    assert_eq!(queue.replayed(), vec![2, 4]);
    assert_eq!(count_version(&manager, 20), 1);
    assert_eq!(count_version(&manager, 40), 1);
}

/// The status survives a restart through the commit payload.
#[test]
fn test_status_survives_restart() {
    let harness = TestHarness::new();
    let status = IndexingActivityStatus::new(120, [101, 117, 103]);

    let manager = harness.started_manager();
    manager.write_activity_status_to_index(status.clone()).unwrap();
    manager.shut_down().unwrap();

    let reader = harness.manager();
    let persisted = reader.read_activity_status_from_index().unwrap();
    assert_eq!(persisted, status);
    assert_eq!(persisted.gaps, vec![101, 103, 117]);
}

/// Writes that were committed by shutdown are visible after the next start.
#[test]
fn test_shutdown_commits_pending_writes() {
    let harness = TestHarness::new();
    let manager = harness.started_manager();
    Activity::add(1, content_document(7, "pending"))
        .execute(&manager, false)
        .unwrap();
    manager.shut_down().unwrap();

    let manager = harness.started_manager();
    let frame = manager.get_index_reader_frame(false).unwrap();
    assert_eq!(frame.count(&SnTerm::int(names::VERSION_ID, 7)).unwrap(), 1);
}
