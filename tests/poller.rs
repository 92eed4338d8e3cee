// tests/poller.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use stepwatch::bus::EventBus;
use stepwatch::errors::MonitorError;
use stepwatch::monitor::{CancelCause, Deadline, PollOutcome, Poller};
use stepwatch::output::OutputSink;
use stepwatch::types::{EventType, TASK_LIFECYCLE_EVENT_TYPES, TERMINAL_EVENT_TYPES};
use stepwatch_test_utils::builders::{event, execution_started, history_page, task_entered, terminal};
use stepwatch_test_utils::fakes::{ScriptedHistory, ScriptedPage, SharedBuffer};
use stepwatch_test_utils::{init_tracing, with_timeout};

const ARN: &str = "arn:aws:states:eu-west-1:123456789012:execution:plan:run-1";

fn poller(source: &ScriptedHistory, refresh: Duration) -> (Poller, SharedBuffer) {
    let out = SharedBuffer::new();
    let poller = Poller::new(
        Arc::new(source.clone()),
        ARN,
        refresh,
        OutputSink::new(out.clone()),
    );
    (poller, out)
}

/// Every topic the tests publish on, through one receiver.
fn subscribe_everything(bus: &EventBus) -> stepwatch::bus::EventReceiver {
    let mut topics = vec![EventType::ExecutionStarted];
    topics.extend(TASK_LIFECYCLE_EVENT_TYPES);
    topics.extend(TERMINAL_EVENT_TYPES);
    bus.subscribe_all(&topics)
}

#[tokio::test]
async fn continuation_token_is_carried_between_polls() {
    init_tracing();
    let source = ScriptedHistory::pages(vec![
        history_page(vec![execution_started(1), task_entered(2, "Plan")], Some("t1")),
        history_page(vec![event(3, EventType::TaskScheduled)], Some("t2")),
        history_page(
            vec![event(3, EventType::TaskScheduled), terminal(4, EventType::ExecutionSucceeded)],
            None,
        ),
    ]);
    let (poller, out) = poller(&source, Duration::from_millis(5));
    let bus = Arc::new(EventBus::new());
    let mut rx = subscribe_everything(&bus);

    let (history, outcome) =
        with_timeout(poller.run(Arc::clone(&bus), Deadline::start(Duration::from_secs(5)))).await;

    assert!(outcome.is_completed());
    assert_eq!(
        source.tokens_seen(),
        vec![None, Some("t1".to_string()), Some("t2".to_string())]
    );
    assert_eq!(history.len(), 4);
    assert_eq!(history.last_id(), Some(4));

    bus.close();
    let mut published = Vec::new();
    while let Some(ev) = rx.recv().await {
        published.push(ev.id);
    }
    assert_eq!(published, vec![1, 2, 3, 4]);

    let lines = out.lines();
    assert_eq!(lines.first(), Some(&format!("monitoring execution of {ARN}")));
    assert_eq!(lines.last().map(String::as_str), Some("execution of state machine completed"));
}

#[tokio::test]
async fn restarting_from_first_page_publishes_each_event_once() {
    init_tracing();
    let source = ScriptedHistory::pages(vec![
        history_page(vec![execution_started(1), task_entered(2, "Plan")], None),
        history_page(
            vec![execution_started(1), task_entered(2, "Plan"), event(3, EventType::TaskStarted)],
            None,
        ),
        history_page(
            vec![
                execution_started(1),
                task_entered(2, "Plan"),
                event(3, EventType::TaskStarted),
                terminal(4, EventType::ExecutionFailed),
            ],
            None,
        ),
    ]);
    let (poller, _out) = poller(&source, Duration::from_millis(5));
    let bus = Arc::new(EventBus::new());
    let mut rx = subscribe_everything(&bus);

    let (history, outcome) =
        with_timeout(poller.run(Arc::clone(&bus), Deadline::start(Duration::from_secs(5)))).await;

    assert!(outcome.is_completed());
    assert!(source.tokens_seen().iter().all(Option::is_none));
    assert_eq!(history.len(), 4);

    bus.close();
    let mut published = Vec::new();
    while let Some(ev) = rx.recv().await {
        published.push((ev.id, ev.event_type));
    }
    assert_eq!(
        published,
        vec![
            (1, EventType::ExecutionStarted),
            (2, EventType::TaskStateEntered),
            (3, EventType::TaskStarted),
            (4, EventType::ExecutionFailed),
        ]
    );
}

#[tokio::test]
async fn events_after_terminal_on_same_page_are_still_published() {
    init_tracing();
    let source = ScriptedHistory::pages(vec![history_page(
        vec![
            execution_started(1),
            terminal(2, EventType::ExecutionSucceeded),
            event(3, EventType::TaskSucceeded),
        ],
        None,
    )]);
    let (poller, _out) = poller(&source, Duration::from_millis(5));
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe_all(&[EventType::TaskSucceeded]);

    let (history, outcome) =
        with_timeout(poller.run(Arc::clone(&bus), Deadline::start(Duration::from_secs(5)))).await;

    assert!(outcome.is_completed());
    assert_eq!(source.calls(), 1);
    assert_eq!(history.len(), 3);
    assert_eq!(rx.try_recv().map(|e| e.id).ok(), Some(3));
}

#[tokio::test]
async fn fetch_error_stops_polling_and_releases_waiters() {
    init_tracing();
    let source = ScriptedHistory::new(vec![
        ScriptedPage::Page(history_page(vec![execution_started(1)], Some("t1"))),
        ScriptedPage::Fail("ExecutionDoesNotExist".to_string()),
        ScriptedPage::Page(history_page(vec![terminal(2, EventType::ExecutionSucceeded)], None)),
    ]);
    let (poller, out) = poller(&source, Duration::from_millis(5));
    let bus = Arc::new(EventBus::new());
    let deadline = Deadline::start(Duration::from_secs(5));

    let (history, outcome) = with_timeout(poller.run(Arc::clone(&bus), deadline.clone())).await;

    match outcome {
        PollOutcome::Error(MonitorError::Api { operation, message, .. }) => {
            assert_eq!(operation, "GetExecutionHistory");
            assert_eq!(message, "ExecutionDoesNotExist");
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
    assert_eq!(source.calls(), 2);
    assert_eq!(history.len(), 1);
    assert!(deadline.is_cancelled());
    assert_eq!(deadline.cause(), Some(CancelCause::PollerStopped));
    assert!(!out.contents().contains("completed"));
}

#[tokio::test]
async fn deadline_ends_polling_within_one_interval() {
    init_tracing();
    let source = ScriptedHistory::pages(vec![history_page(vec![execution_started(1)], None)]);
    let refresh = Duration::from_millis(20);
    let timeout = Duration::from_millis(100);
    let (poller, out) = poller(&source, refresh);
    let bus = Arc::new(EventBus::new());

    let started = Instant::now();
    let deadline = Deadline::start(timeout);
    let (history, outcome) = with_timeout(poller.run(Arc::clone(&bus), deadline.clone())).await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, PollOutcome::TimedOut));
    assert!(deadline.expired());
    assert_eq!(history.len(), 1);
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + refresh + Duration::from_millis(400), "took {elapsed:?}");
    assert_eq!(out.lines().last().map(String::as_str), Some("cli execution timed out"));
}

#[tokio::test]
async fn slow_fetch_is_abandoned_at_the_deadline() {
    init_tracing();
    let source = ScriptedHistory::default().with_delay(Duration::from_secs(30));
    let (poller, _out) = poller(&source, Duration::from_millis(5));
    let bus = Arc::new(EventBus::new());

    let started = Instant::now();
    let (history, outcome) = with_timeout(
        poller.run(Arc::clone(&bus), Deadline::start(Duration::from_millis(50))),
    )
    .await;

    assert!(matches!(outcome, PollOutcome::TimedOut));
    assert!(history.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
}
