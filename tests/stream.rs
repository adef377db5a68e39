mod support;

use std::time::Duration;

use perplexity_api::cancel::new_cancellation_signal;
use perplexity_api::{Message, PerplexityApiError};
use plexctl::{
    drive_stream, prepare_thread, run_completion, CompletionError, PacedEmitter, SaveOutcome,
};
use support::{
    cancel_after, capture, delta_frame, fast_pacer, ReadOnlyStore, ScriptedFrames, Step,
};
use tempfile::TempDir;
use thread_store::{FsThreadStore, Thread, ThreadStore, ThreadStoreError};

fn temp_store() -> (TempDir, FsThreadStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = FsThreadStore::open(dir.path().join("threads")).expect("open store");
    (dir, store)
}

fn frame(text: &str) -> Step {
    Step::Frame(text.as_bytes().to_vec())
}

#[tokio::test]
async fn hello_reply_is_displayed_and_persisted() {
    let (_dir, store) = temp_store();
    let thread = Thread::start("hi");
    let id = thread.id.clone();
    let mut source = ScriptedFrames::frames(&[
        &delta_frame("He"),
        &delta_frame("llo"),
        "data: [DONE]",
    ]);
    let (sink, handle) = capture();

    let completion = run_completion(
        &mut source,
        &store,
        thread,
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect("completion");

    assert_eq!(completion.reply.text, "Hello");
    assert!(completion.reply.citations.is_empty());
    assert_eq!(handle.text(), "Hello");
    assert!(handle.finished());
    assert!(matches!(completion.saved, SaveOutcome::Saved(_)));

    let expected = vec![Message::user("hi"), Message::assistant("Hello")];
    assert_eq!(completion.thread.messages, expected);
    assert_eq!(store.load(&id).expect("reload").messages, expected);
}

#[tokio::test]
async fn later_citation_lists_replace_earlier_ones() {
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::frames(&[
        r#"data: {"choices":[{"delta":{"content":"A"}}],"citations":["a.com","b.com"]}"#,
        r#"data: {"choices":[{"delta":{"content":"B"}}],"citations":["c.com"]}"#,
        r#"data: {"choices":[{"delta":{"content":"C"}}],"citations":[]}"#,
        "data: [DONE]",
    ]);
    let (sink, handle) = capture();

    let completion = run_completion(
        &mut source,
        &store,
        Thread::start("sources?"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect("completion");

    assert_eq!(completion.reply.text, "ABC");
    assert_eq!(completion.reply.citations, vec!["c.com".to_owned()]);
    assert_eq!(handle.text(), "ABC");
}

#[tokio::test]
async fn records_split_across_frames_are_reassembled() {
    let record = delta_frame("fragmented reply");
    let (head, tail) = record.split_at(record.len() / 2);
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::new(vec![frame(head), frame(tail), frame("data: [DONE]")]);
    let (sink, handle) = capture();

    let completion = run_completion(
        &mut source,
        &store,
        Thread::start("split"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect("completion");

    assert_eq!(completion.reply.text, "fragmented reply");
    assert_eq!(handle.text(), "fragmented reply");
}

#[tokio::test]
async fn clean_eof_without_sentinel_completes_the_turn() {
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::frames(&[&delta_frame("no sentinel")]);
    let (sink, _handle) = capture();

    let completion = run_completion(
        &mut source,
        &store,
        Thread::start("eof"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect("completion");

    assert_eq!(completion.reply.text, "no sentinel");
    assert!(matches!(completion.saved, SaveOutcome::Saved(_)));
}

#[tokio::test]
async fn finish_reason_ends_the_stream() {
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::frames(&[
        &delta_frame("Done"),
        r#"data: {"choices":[{"delta":{"content":"."},"finish_reason":"stop"}]}"#,
        &delta_frame(" never read"),
        "data: [DONE]",
    ]);
    let (sink, _handle) = capture();

    let completion = run_completion(
        &mut source,
        &store,
        Thread::start("stop"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect("completion");

    assert_eq!(completion.reply.text, "Done.");
    assert_eq!(completion.reply.finish_reason.as_deref(), Some("stop"));
    assert_eq!(source.remaining(), 2);
}

#[tokio::test]
async fn empty_reply_is_not_persisted() {
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::frames(&[
        r#"data: {"choices":[{"delta":{}}],"citations":["only.com"]}"#,
        "data: [DONE]",
    ]);
    let (sink, handle) = capture();

    let completion = run_completion(
        &mut source,
        &store,
        Thread::start("silent"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect("completion");

    assert!(matches!(completion.saved, SaveOutcome::SkippedEmpty));
    assert_eq!(completion.reply.citations, vec!["only.com".to_owned()]);
    assert_eq!(completion.thread.messages, vec![Message::user("silent")]);
    assert_eq!(handle.text(), "");
    assert!(store.list().expect("list").is_empty());
}

#[tokio::test]
async fn transport_failure_joins_the_emitter_and_saves_nothing() {
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::new(vec![
        frame(&delta_frame("He")),
        Step::Fail("connection reset".to_owned()),
        frame(&delta_frame("llo")),
    ]);
    let (sink, handle) = capture();

    let error = run_completion(
        &mut source,
        &store,
        Thread::start("hi"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect_err("transport failure");

    match error {
        CompletionError::Stream(PerplexityApiError::Transport(message)) => {
            assert_eq!(message, "connection reset");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(handle.finished());
    assert_eq!(handle.text(), "He");
    assert!(store.list().expect("list").is_empty());
}

#[tokio::test]
async fn cancellation_mid_stream_returns_only_after_the_emitter_exits() {
    let (_dir, store) = temp_store();
    let cancel = new_cancellation_signal();
    let mut source = ScriptedFrames::new(vec![frame(&delta_frame("partial")), Step::Hang]);
    let (sink, handle) = capture();

    cancel_after(&cancel, Duration::from_millis(60));
    let error = run_completion(
        &mut source,
        &store,
        Thread::start("slow"),
        sink,
        fast_pacer(),
        &cancel,
    )
    .await
    .expect_err("cancelled");

    assert!(matches!(
        error,
        CompletionError::Stream(PerplexityApiError::Cancelled)
    ));
    assert!(handle.finished());
    let shown = handle.text();
    assert!("partial".starts_with(&shown));
    assert!(store.list().expect("list").is_empty());
}

#[tokio::test]
async fn cancellation_while_the_display_is_backed_up() {
    let cancel = new_cancellation_signal();
    let long = "z".repeat(64);
    let mut source = ScriptedFrames::frames(&[&delta_frame(&long), "data: [DONE]"]);
    let (sink, handle) = capture();
    let emitter = PacedEmitter::spawn(
        sink,
        plexctl::PacerConfig::default()
            .with_capacity(2)
            .with_interval(Duration::from_secs(5)),
        cancel.clone(),
    );

    cancel_after(&cancel, Duration::from_millis(40));
    let error = drive_stream(&mut source, emitter, &cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(error, PerplexityApiError::Cancelled));
    assert!(handle.finished());
    assert!(handle.text().len() < long.len());
}

#[tokio::test]
async fn cancellation_while_draining_queued_text_is_an_error() {
    let (_dir, store) = temp_store();
    let cancel = new_cancellation_signal();
    let long = "z".repeat(100);
    let mut source = ScriptedFrames::frames(&[&delta_frame(&long), "data: [DONE]"]);
    let (sink, handle) = capture();

    cancel_after(&cancel, Duration::from_millis(100));
    let error = run_completion(
        &mut source,
        &store,
        Thread::start("drain"),
        sink,
        plexctl::PacerConfig::default().with_interval(Duration::from_millis(20)),
        &cancel,
    )
    .await
    .expect_err("cancelled during drain");

    assert_eq!(source.remaining(), 0);
    assert!(matches!(
        error,
        CompletionError::Stream(PerplexityApiError::Cancelled)
    ));
    assert!(handle.finished());
    assert!(handle.text().len() < long.len());
    assert!(store.list().expect("list").is_empty());
}

#[tokio::test]
async fn persistence_failure_still_carries_the_reply() {
    let mut source = ScriptedFrames::frames(&[&delta_frame("kept"), "data: [DONE]"]);
    let (sink, handle) = capture();

    let error = run_completion(
        &mut source,
        &ReadOnlyStore,
        Thread::start("q"),
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect_err("save fails");

    assert_eq!(handle.text(), "kept");
    assert_eq!(
        error.streamed_reply().map(|reply| reply.text.as_str()),
        Some("kept")
    );
    match error {
        CompletionError::Persist { thread, source, .. } => {
            assert_eq!(thread.messages.last(), Some(&Message::assistant("kept")));
            assert!(matches!(source, ThreadStoreError::Io { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn traversal_identifier_is_reported_as_a_persistence_failure() {
    let (_dir, store) = temp_store();
    let mut source = ScriptedFrames::frames(&[&delta_frame("x"), "data: [DONE]"]);
    let (sink, _handle) = capture();
    let thread = Thread {
        id: "../escape".to_owned(),
        messages: vec![Message::user("q")],
    };

    let error = run_completion(
        &mut source,
        &store,
        thread,
        sink,
        fast_pacer(),
        &new_cancellation_signal(),
    )
    .await
    .expect_err("path check");

    assert!(matches!(
        error,
        CompletionError::Persist {
            source: ThreadStoreError::PathViolation { .. },
            ..
        }
    ));
}

#[test]
fn prepare_thread_continues_a_stored_thread() {
    let (_dir, store) = temp_store();
    let mut stored = Thread::start("first question");
    stored.push(Message::assistant("first answer"));
    store.save(&stored).expect("save");

    let prefix = &stored.id[..6];
    let thread = prepare_thread(&store, Some(prefix), "follow up").expect("continue");

    assert_eq!(thread.id, stored.id);
    assert_eq!(
        thread.messages,
        vec![
            Message::user("first question"),
            Message::assistant("first answer"),
            Message::user("follow up"),
        ]
    );
}

#[test]
fn prepare_thread_starts_fresh_without_a_prefix() {
    let (_dir, store) = temp_store();
    let thread = prepare_thread(&store, None, "new question").expect("start");
    assert_eq!(thread.messages, vec![Message::user("new question")]);
    assert_eq!(thread.id.len(), 43);
}

#[test]
fn prepare_thread_reports_unknown_prefixes() {
    let (_dir, store) = temp_store();
    let error = prepare_thread(&store, Some("nope"), "q").expect_err("missing");
    assert!(matches!(error, ThreadStoreError::NotFound { .. }));
}
