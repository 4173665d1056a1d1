//! Expectation engine tests over an in-memory transport

use spectcl::process::{self, Remote, Written};
use spectcl::{Arm, Done, ExpectError, Expectations, Flow, MatchResult, Outcome, Pattern, Session};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready};

type Outcomes = Arc<Mutex<Vec<Outcome>>>;

fn recorder() -> (Outcomes, impl FnOnce(Outcome) + Send + 'static) {
    let outcomes: Outcomes = Arc::default();
    let sink = outcomes.clone();
    (outcomes, move |outcome| sink.lock().unwrap().push(outcome))
}

fn session_with(timeout: Option<Duration>) -> (Session, Remote) {
    let (process, remote) = process::channel();
    let builder = match timeout {
        Some(timeout) => Session::builder().timeout(timeout),
        None => Session::builder().no_timeout(),
    };
    (builder.attach(process), remote)
}

fn session() -> (Session, Remote) {
    session_with(Some(Duration::from_secs(30)))
}

/// Let the session's driver task catch up with queued output.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn complete_with_buffer() -> impl Fn(&Session, &MatchResult, Done) -> Flow + Send + Sync + 'static {
    |_, m, done| {
        done.complete_with(m.buffer.clone());
        Flow::Complete
    }
}

#[tokio::test(start_paused = true)]
async fn test_buffered_match_resolves_synchronously() {
    let (session, remote) = session();
    remote.output("login: ");
    settle().await;

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(Expectations::new().on("login:", complete_with_buffer()), on_done));

    // resolved before `expect` returned
    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert_eq!(outcome.unwrap().as_deref(), Some("login:"));
    assert!(!session.is_expecting());
    assert_eq!(session.buffer(), " ");
}

#[tokio::test(start_paused = true)]
async fn test_empty_literal_matches_without_consuming() {
    let (session, remote) = session();
    remote.output("pending text");
    settle().await;

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(Expectations::new().on("", complete_with_buffer()), on_done));

    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert_eq!(outcome.unwrap().as_deref(), Some(""));
    assert_eq!(session.buffer(), "pending text");
    assert_eq!(session.expect_out().matched.unwrap().pattern, Pattern::literal(""));
}

#[tokio::test(start_paused = true)]
async fn test_expect_async_ready_on_first_poll() {
    let (session, remote) = session();
    remote.output("ready");
    settle().await;

    let mut fut = tokio_test::task::spawn(
        session.expect_async(Expectations::new().on("ready", complete_with_buffer())),
    );
    let outcome = assert_ready!(fut.poll());
    assert_eq!(assert_ok!(outcome).as_deref(), Some("ready"));
}

#[tokio::test(start_paused = true)]
async fn test_flushed_and_remaining_cover_the_buffer() {
    let (session, remote) = session();
    let original = "banner\nuser: trailing";
    remote.output(original);
    settle().await;

    let outcome = session
        .expect_async(Expectations::new().on("user:", complete_with_buffer()))
        .await;
    let flushed = assert_ok!(outcome).unwrap();

    assert_eq!(flushed, "banner\nuser:");
    assert_eq!(format!("{}{}", flushed, session.buffer()), original);
    assert_eq!(session.expect_out().buffer, flushed);
}

#[tokio::test(start_paused = true)]
async fn test_regex_consumes_through_match_end() {
    let (session, remote) = session();
    remote.output("id=42;rest");
    settle().await;

    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let list = Expectations::new().on(Pattern::regex(r"(\d)(\d)").unwrap(), move |_, m, _| {
        *sink.lock().unwrap() = Some(m.clone());
        Flow::Complete
    });
    assert_ok!(session.expect_async(list).await);

    let m = seen.lock().unwrap().take().unwrap();
    assert_eq!(m.matched, "42");
    assert_eq!((m.start, m.end), (3, 5));
    assert_eq!(m.before, "id=");
    assert_eq!(m.captures, vec!["42", "4", "2"]);
    assert_eq!(session.buffer(), ";rest");
}

#[tokio::test(start_paused = true)]
async fn test_first_registered_pattern_wins() {
    let (session, remote) = session();
    remote.output("error: something, then success");
    settle().await;

    let list = Expectations::new()
        .on("success", |_, _, done| {
            done.complete_with("success");
            Flow::Complete
        })
        .on("error", |_, _, done| {
            done.complete_with("error");
            Flow::Complete
        });

    let outcome = session.expect_async(list).await;
    assert_eq!(outcome.unwrap().as_deref(), Some("success"));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_pattern_keeps_first_handler() {
    let (session, remote) = session();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let (a, b) = (first.clone(), second.clone());
    let list = Expectations::new()
        .on("x", move |_, _, _| {
            a.fetch_add(1, Ordering::SeqCst);
            Flow::Complete
        })
        .on("x", move |_, _, _| {
            b.fetch_add(1, Ordering::SeqCst);
            Flow::Complete
        });

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(list, on_done));
    remote.output("x");
    settle().await;

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
    assert_eq!(outcomes.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_expect_rejected_while_pending() {
    let (session, remote) = session();

    let (first, on_first) = recorder();
    assert_ok!(session.expect(Expectations::new().on("ready", complete_with_buffer()), on_first));
    assert!(session.is_expecting());

    let (second, on_second) = recorder();
    let err = assert_err!(session.expect(Expectations::new().on("other", complete_with_buffer()), on_second));
    assert!(matches!(err, ExpectError::ExpectationInProgress));

    remote.output("ready");
    settle().await;

    assert_eq!(first.lock().unwrap().pop().unwrap().unwrap().as_deref(), Some("ready"));
    assert!(second.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_continue_rearms_with_same_callback() {
    let (session, mut remote) = session();
    let order = Arc::new(Mutex::new(Vec::new()));

    let (user, pass) = (order.clone(), order.clone());
    let list = Expectations::new()
        .on(Pattern::regex("user").unwrap(), move |session, _, done| {
            user.lock().unwrap().push("user");
            if let Err(e) = session.send("foo\n") {
                done.fail(e);
                return Flow::Complete;
            }
            Flow::Continue
        })
        .on(Pattern::regex("assword").unwrap(), move |_, _, done| {
            pass.lock().unwrap().push("password");
            done.complete_with("logged in");
            Flow::Complete
        });

    let (outcomes, on_done) = recorder();
    remote.output("user:");
    settle().await;
    assert_ok!(session.expect(list, on_done));

    assert_eq!(remote.next_input().await, Some(Written::Data(b"foo\n".to_vec())));
    assert!(session.is_expecting());
    assert!(outcomes.lock().unwrap().is_empty());

    remote.output("password:");
    settle().await;

    assert_eq!(*order.lock().unwrap(), vec!["user", "password"]);
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap().as_deref(), Some("logged in"));
}

#[tokio::test(start_paused = true)]
async fn test_continue_over_buffered_data_does_not_recurse() {
    let (session, remote) = session();
    remote.output("tick ".repeat(200));
    settle().await;

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let list = Expectations::new()
        .on("tick", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        })
        .on(Pattern::Timeout, |_, _, done| {
            done.complete_with("drained");
            Flow::Complete
        });

    let outcome = session.expect_async(list).await;
    assert_eq!(outcome.unwrap().as_deref(), Some("drained"));
    assert_eq!(ticks.load(Ordering::SeqCst), 200);
}

#[tokio::test(start_paused = true)]
async fn test_continue_after_completion_stops() {
    let (session, remote) = session();
    remote.output("a a");
    settle().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let list = Expectations::new().on("a", move |_, _, done| {
        counter.fetch_add(1, Ordering::SeqCst);
        done.complete();
        Flow::Continue
    });

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(list, on_done));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes.lock().unwrap().len(), 1);
    assert!(!session.is_expecting());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_after_inactivity() {
    let (session, remote) = session_with(Some(Duration::from_millis(50)));
    remote.output("noise");
    settle().await;

    let list = Expectations::new()
        .on("never", complete_with_buffer())
        .on(Pattern::Timeout, |_, m, done| {
            done.complete_with(format!("timeout:{}", m.before));
            Flow::Complete
        });

    let start = Instant::now();
    let outcome = session.expect_async(list).await;

    assert_eq!(outcome.unwrap().as_deref(), Some("timeout:noise"));
    assert!(start.elapsed() >= Duration::from_millis(50));

    // nothing consumed
    assert_eq!(session.buffer(), "noise");
    let out = session.expect_out();
    assert_eq!(out.buffer, "");
    assert_eq!(out.matched.unwrap().pattern, Pattern::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_handler_completes_silently() {
    let (session, _remote) = session_with(Some(Duration::from_millis(50)));

    let outcome = session
        .expect_async(Expectations::new().on("never", complete_with_buffer()))
        .await;
    assert!(matches!(outcome, Ok(None)));
}

#[tokio::test(start_paused = true)]
async fn test_data_resets_timeout() {
    let (session, remote) = session_with(Some(Duration::from_millis(50)));

    let (outcomes, on_done) = recorder();
    let list = Expectations::new()
        .on("never", complete_with_buffer())
        .on(Pattern::Timeout, |_, _, done| {
            done.complete_with("timeout");
            Flow::Complete
        });
    let start = Instant::now();
    assert_ok!(session.expect(list, on_done));

    tokio::time::sleep(Duration::from_millis(30)).await;
    remote.output("still working");
    tokio::time::sleep(Duration::from_millis(30)).await;
    remote.output("still working");
    tokio::time::sleep(Duration::from_millis(30)).await;

    // 90ms since the expect, 30ms since the last output
    assert!(outcomes.lock().unwrap().is_empty());
    assert!(session.is_expecting());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(
        outcomes.lock().unwrap().pop().unwrap().unwrap().as_deref(),
        Some("timeout")
    );
    assert!(start.elapsed() >= Duration::from_millis(110));
}

#[tokio::test(start_paused = true)]
async fn test_no_timeout_waits_indefinitely() {
    let (session, remote) = session_with(None);

    let mut fut = tokio_test::task::spawn(
        session.expect_async(Expectations::new().on("late", complete_with_buffer())),
    );
    assert_pending!(fut.poll());

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_pending!(fut.poll());
    assert!(session.is_expecting());

    remote.output("late");
    settle().await;
    assert!(fut.is_woken());
    let outcome = assert_ready!(fut.poll());
    assert_eq!(outcome.unwrap().as_deref(), Some("late"));
}

#[tokio::test(start_paused = true)]
async fn test_full_buffer_resolves_with_retained_text() {
    let (process, remote) = process::channel();
    let session = Session::builder().match_max(8).attach(process);

    let (outcomes, on_done) = recorder();
    let list = Expectations::new()
        .on("never", complete_with_buffer())
        .on(Pattern::FullBuffer, complete_with_buffer());
    assert_ok!(session.expect(list, on_done));

    remote.output("0123456789");
    settle().await;

    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert_eq!(outcome.unwrap().as_deref(), Some("23456789"));
    assert_eq!(session.buffer(), "");
}

#[tokio::test(start_paused = true)]
async fn test_full_buffer_checked_before_content() {
    let (process, remote) = process::channel();
    let session = Session::builder().match_max(4).attach(process);
    remote.output("abcdef");
    settle().await;

    let list = Expectations::new()
        .on("cdef", |_, _, done| {
            done.complete_with("content");
            Flow::Complete
        })
        .on(Pattern::FullBuffer, |_, _, done| {
            done.complete_with("full");
            Flow::Complete
        });
    let outcome = session.expect_async(list).await;
    assert_eq!(outcome.unwrap().as_deref(), Some("full"));
}

#[tokio::test(start_paused = true)]
async fn test_eof_with_handler_flushes_buffer() {
    let (session, remote) = session();

    let (outcomes, on_done) = recorder();
    let list = Expectations::new()
        .on("never", complete_with_buffer())
        .on(Pattern::Eof, |_, m, done| {
            done.complete_with(format!("eof:{}", m.buffer));
            Flow::Complete
        });
    assert_ok!(session.expect(list, on_done));

    remote.output("partial");
    remote.eof();
    settle().await;

    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert_eq!(outcome.unwrap().as_deref(), Some("eof:partial"));
    assert!(session.is_eof());
    assert_eq!(session.buffer(), "");
    assert_eq!(session.expect_out().buffer, "partial");
}

#[tokio::test(start_paused = true)]
async fn test_eof_without_handler_completes_silently() {
    let (session, remote) = session();

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(Expectations::new().on("never", complete_with_buffer()), on_done));
    remote.eof();
    settle().await;

    assert!(matches!(outcomes.lock().unwrap().pop(), Some(Ok(None))));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_remote_is_eof() {
    let (session, remote) = session();
    drop(remote);
    settle().await;
    assert!(session.is_eof());
}

#[tokio::test(start_paused = true)]
async fn test_expect_after_eof() {
    let (session, remote) = session();
    remote.output("tail");
    remote.eof();
    settle().await;

    let outcome = session
        .expect_async(Expectations::new().on("ta", complete_with_buffer()))
        .await;
    assert_eq!(outcome.unwrap().as_deref(), Some("ta"));

    let (outcomes, on_done) = recorder();
    let list = Expectations::new()
        .on("never", complete_with_buffer())
        .on(Pattern::Eof, complete_with_buffer());
    assert_ok!(session.expect(list, on_done));

    // resolved synchronously, no more events will come
    assert_eq!(outcomes.lock().unwrap().pop().unwrap().unwrap().as_deref(), Some("il"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_lists_rejected() {
    let (session, _remote) = session();

    let (outcomes, on_done) = recorder();
    let err = assert_err!(session.expect(Expectations::new(), on_done));
    assert!(matches!(err, ExpectError::InvalidExpectationList { .. }));

    let (_, on_done) = recorder();
    let odd = Expectations::from(vec![Arm::from("a")]);
    let err = assert_err!(session.expect(odd, on_done));
    assert!(matches!(err, ExpectError::InvalidExpectationList { .. }));

    let (_, on_done) = recorder();
    let swapped = Expectations::from(vec![Arm::handler(|_, _, _| Flow::Complete), Arm::from("a")]);
    let err = assert_err!(session.expect(swapped, on_done));
    assert!(matches!(err, ExpectError::InvalidPattern { index: 0, .. }));

    let (_, on_done) = recorder();
    let two_patterns = Expectations::from(vec![Arm::from("a"), Arm::from("b")]);
    let err = assert_err!(session.expect(two_patterns, on_done));
    assert!(matches!(err, ExpectError::InvalidHandler { index: 1 }));

    assert!(!session.is_expecting());
    assert!(outcomes.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_nested_expect_finishes_outer_chain() {
    let (session, remote) = session();

    let list = Expectations::new().on("first", |session, _, done| {
        let outer = done.clone();
        let nested = Expectations::new().on("second", complete_with_buffer());
        if let Err(e) = session.expect(nested, move |outcome| outer.finish(outcome)) {
            done.fail(e);
        }
        Flow::Complete
    });

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(list, on_done));

    remote.output("first");
    settle().await;
    assert!(session.is_expecting());
    assert!(outcomes.lock().unwrap().is_empty());

    remote.output(" then second");
    settle().await;
    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert_eq!(outcome.unwrap().as_deref(), Some(" then second"));
}

#[tokio::test(start_paused = true)]
async fn test_continue_colliding_with_nested_expect() {
    let (session, remote) = session();

    let (nested_outcomes, on_nested) = recorder();
    let on_nested = Mutex::new(Some(on_nested));
    let list = Expectations::new().on("first", move |session, _, _| {
        if let Some(on_nested) = on_nested.lock().unwrap().take() {
            let nested = Expectations::new().on("second", complete_with_buffer());
            session.expect(nested, on_nested).unwrap();
        }
        Flow::Continue
    });

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(list, on_done));
    remote.output("first");
    settle().await;

    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert!(matches!(outcome, Err(ExpectError::ExpectationInProgress)));
    assert!(session.is_expecting());

    remote.output("second");
    settle().await;
    let nested = nested_outcomes.lock().unwrap().pop().unwrap();
    assert_eq!(nested.unwrap().as_deref(), Some("second"));
}

#[tokio::test(start_paused = true)]
async fn test_untouched_done_completes_on_return() {
    let (session, remote) = session();
    remote.output("prompt");
    settle().await;

    let outcome = session
        .expect_async(Expectations::new().on("prompt", |_, _, _| Flow::Complete))
        .await;
    assert!(matches!(outcome, Ok(None)));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_closes_pending_expectation() {
    let (session, _remote) = session();

    let (outcomes, on_done) = recorder();
    assert_ok!(session.expect(Expectations::new().on("never", complete_with_buffer()), on_done));
    drop(session);
    settle().await;

    let outcome = outcomes.lock().unwrap().pop().unwrap();
    assert!(matches!(outcome, Err(ExpectError::SessionClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_sends_reach_process_in_order() {
    let (session, mut remote) = session();

    assert_ok!(session.send("abc"));
    assert_ok!(session.send_line("line"));
    assert_ok!(session.send([0x03]));
    assert_ok!(session.send_eof());

    assert_eq!(remote.next_input().await, Some(Written::Data(b"abc".to_vec())));
    assert_eq!(remote.next_input().await.unwrap().text(), "line\n");
    assert_eq!(remote.next_input().await, Some(Written::Data(vec![0x03])));
    assert_eq!(remote.next_input().await, Some(Written::Eof));
}

#[tokio::test(start_paused = true)]
async fn test_send_async_waits_for_write() {
    let (session, mut remote) = session();

    let writer = tokio::spawn({
        let session = session.clone();
        async move { session.send_async("hello").await }
    });
    assert_eq!(remote.next_input().await.unwrap().text(), "hello");
    assert_ok!(writer.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_send_after_process_gone() {
    let (session, remote) = session();
    drop(remote);

    let err = assert_err!(session.send("x"));
    assert!(matches!(err, ExpectError::ProcessExited));

    let failed = Arc::new(Mutex::new(None));
    let sink = failed.clone();
    let err = assert_err!(session.send_then("x", move |result| {
        *sink.lock().unwrap() = Some(result.is_err());
    }));
    assert!(matches!(err, ExpectError::ProcessExited));
    assert_eq!(*failed.lock().unwrap(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_output_sees_raw_chunks() {
    let (session, remote) = session();
    let mut output = session.subscribe_output();

    remote.output("one");
    remote.output("two");

    assert_eq!(output.recv().await.unwrap(), "one");
    assert_eq!(output.recv().await.unwrap(), "two");
    settle().await;
    assert_eq!(session.buffer(), "onetwo");
}

#[tokio::test(start_paused = true)]
async fn test_channel_session_has_no_child() {
    let (session, _remote) = session();
    assert_eq!(session.pid(), None);
    assert!(matches!(session.is_alive(), Err(ExpectError::ProcessExited)));
    assert!(matches!(session.kill(), Err(ExpectError::ProcessExited)));
}
