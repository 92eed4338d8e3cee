// tests/log_streaming.rs

use std::sync::Arc;

use stepwatch::errors::MonitorError;
use stepwatch::monitor::{LogStreamer, NoiseFilter};
use stepwatch::output::OutputSink;
use stepwatch::types::LogReference;
use stepwatch_test_utils::builders::log_page;
use stepwatch_test_utils::fakes::{ScriptedLogs, SharedBuffer};
use stepwatch_test_utils::{init_tracing, with_timeout};

fn streamer(logs: &ScriptedLogs, verbose: bool) -> (LogStreamer, SharedBuffer) {
    let out = SharedBuffer::new();
    let filter = NoiseFilter::new(r"^\[Container\]").unwrap();
    let streamer = LogStreamer::new(
        Arc::new(logs.clone()),
        filter,
        verbose,
        OutputSink::new(out.clone()),
    );
    (streamer, out)
}

#[tokio::test]
async fn follows_forward_token_until_it_stops_changing() {
    init_tracing();
    let reference = LogReference::new("/aws/codebuild/plan", "run-1");
    let logs = ScriptedLogs::new().with_stream(
        reference.clone(),
        vec![
            log_page(&["line 1", "line 2"], "f/1"),
            log_page(&["line 3"], "f/2"),
        ],
    );
    let (streamer, out) = streamer(&logs, false);

    let stats = with_timeout(streamer.stream(&reference)).await.unwrap();

    let tokens: Vec<_> = logs.calls().into_iter().map(|(_, token)| token).collect();
    assert_eq!(
        tokens,
        vec![None, Some("f/1".to_string()), Some("f/2".to_string())]
    );
    assert_eq!(stats.pages, 3);
    assert_eq!(stats.lines_written, 3);
    assert_eq!(out.lines(), vec!["line 1", "line 2", "line 3"]);
}

#[tokio::test]
async fn empty_stream_writes_nothing() {
    init_tracing();
    let reference = LogReference::new("g", "empty");
    let logs = ScriptedLogs::new();
    let (streamer, out) = streamer(&logs, false);

    let stats = with_timeout(streamer.stream(&reference)).await.unwrap();

    assert_eq!(stats.pages, 2);
    assert_eq!(stats.lines_written, 0);
    assert!(out.contents().is_empty());
}

#[tokio::test]
async fn noise_lines_are_dropped_unless_verbose() {
    init_tracing();
    let reference = LogReference::new("g", "s");
    let pages = vec![log_page(
        &[
            "[Container] 2024/05/01 12:00:00 Running command terraform init",
            "Terraform has been successfully initialized!",
            "[Container] 2024/05/01 12:00:09 Phase complete: BUILD State: SUCCEEDED",
        ],
        "f/1",
    )];

    let logs = ScriptedLogs::new().with_stream(reference.clone(), pages.clone());
    let (quiet, quiet_out) = streamer(&logs, false);
    let stats = with_timeout(quiet.stream(&reference)).await.unwrap();
    assert_eq!(stats.lines_filtered, 2);
    assert_eq!(quiet_out.lines(), vec!["Terraform has been successfully initialized!"]);

    let logs = ScriptedLogs::new().with_stream(reference.clone(), pages);
    let (loud, loud_out) = streamer(&logs, true);
    let stats = with_timeout(loud.stream(&reference)).await.unwrap();
    assert_eq!(stats.lines_filtered, 0);
    assert_eq!(loud_out.lines().len(), 3);
}

#[tokio::test]
async fn lines_with_trailing_newline_are_written_verbatim() {
    init_tracing();
    let reference = LogReference::new("g", "s");
    let logs = ScriptedLogs::new()
        .with_stream(reference.clone(), vec![log_page(&["already terminated\n", "bare"], "f/1")]);
    let (streamer, out) = streamer(&logs, false);

    with_timeout(streamer.stream(&reference)).await.unwrap();

    assert_eq!(out.contents(), "already terminated\nbare\n");
}

#[tokio::test]
async fn fetch_error_is_returned() {
    init_tracing();
    let reference = LogReference::new("g", "missing");
    let logs = ScriptedLogs::new().with_failing_stream(reference.clone());
    let (streamer, out) = streamer(&logs, false);

    let err = with_timeout(streamer.stream(&reference)).await.unwrap_err();

    assert!(matches!(err, MonitorError::Api { operation: "GetLogEvents", .. }));
    assert!(out.contents().is_empty());
    assert_eq!(logs.calls().len(), 1);
}
