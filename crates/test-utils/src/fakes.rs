use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stepwatch::errors::MonitorError;
use stepwatch::output::{Console, OutputSink};
use stepwatch::source::{HistoryPage, HistorySource, LogPage, LogSource, SourceFuture};
use stepwatch::types::LogReference;

/// One scripted response of [`ScriptedHistory`].
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    Page(HistoryPage),
    Fail(String),
}

/// History source that replays scripted pages in order.
///
/// Once the script runs out, every further fetch returns `after_script`
/// (an empty page by default), which is how a still-running execution
/// looks to the poller.
#[derive(Clone, Default)]
pub struct ScriptedHistory {
    script: Arc<Mutex<VecDeque<ScriptedPage>>>,
    after_script: Arc<Mutex<HistoryPage>>,
    tokens_seen: Arc<Mutex<Vec<Option<String>>>>,
    delay: Option<Duration>,
}

impl ScriptedHistory {
    pub fn new(script: Vec<ScriptedPage>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    pub fn pages(pages: Vec<HistoryPage>) -> Self {
        Self::new(pages.into_iter().map(ScriptedPage::Page).collect())
    }

    /// Page returned after the script is exhausted.
    pub fn then_repeat(self, page: HistoryPage) -> Self {
        *self.after_script.lock().unwrap() = page;
        self
    }

    /// Delay every fetch by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Continuation tokens passed to each fetch, in call order.
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens_seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.tokens_seen.lock().unwrap().len()
    }
}

impl HistorySource for ScriptedHistory {
    fn fetch_history<'a>(
        &'a self,
        _execution_arn: &'a str,
        next_token: Option<&'a str>,
    ) -> SourceFuture<'a, HistoryPage> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.tokens_seen
                .lock()
                .unwrap()
                .push(next_token.map(str::to_string));

            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(ScriptedPage::Page(page)) => Ok(page),
                Some(ScriptedPage::Fail(message)) => Err(MonitorError::Api {
                    operation: "GetExecutionHistory",
                    status: 500,
                    message,
                }),
                None => Ok(self.after_script.lock().unwrap().clone()),
            }
        })
    }
}

/// Log source serving fixed pages per stream, CloudWatch style: once the
/// last page is reached the forward token stops changing.
#[derive(Clone, Default)]
pub struct ScriptedLogs {
    streams: Arc<Mutex<HashMap<LogReference, Vec<LogPage>>>>,
    failing: Arc<Mutex<HashSet<LogReference>>>,
    calls: Arc<Mutex<Vec<(LogReference, Option<String>)>>>,
}

impl ScriptedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, reference: LogReference, pages: Vec<LogPage>) -> Self {
        self.streams.lock().unwrap().insert(reference, pages);
        self
    }

    pub fn with_failing_stream(self, reference: LogReference) -> Self {
        self.failing.lock().unwrap().insert(reference);
        self
    }

    /// Every fetch made, in call order.
    pub fn calls(&self) -> Vec<(LogReference, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Distinct streams fetched, in first-fetch order.
    pub fn streams_fetched(&self) -> Vec<LogReference> {
        let mut seen = Vec::new();
        for (reference, _) in self.calls() {
            if !seen.contains(&reference) {
                seen.push(reference);
            }
        }
        seen
    }

    fn page_after(&self, reference: &LogReference, token: Option<&str>) -> LogPage {
        let streams = self.streams.lock().unwrap();
        let pages = streams.get(reference).cloned().unwrap_or_default();
        match token {
            None => pages.first().cloned().unwrap_or(LogPage {
                lines: Vec::new(),
                next_token: Some("f/empty".to_string()),
            }),
            Some(token) => {
                let idx = pages
                    .iter()
                    .position(|p| p.next_token.as_deref() == Some(token));
                match idx {
                    Some(i) if i + 1 < pages.len() => pages[i + 1].clone(),
                    _ => LogPage {
                        lines: Vec::new(),
                        next_token: Some(token.to_string()),
                    },
                }
            }
        }
    }
}

impl LogSource for ScriptedLogs {
    fn fetch_logs<'a>(
        &'a self,
        reference: &'a LogReference,
        next_token: Option<&'a str>,
    ) -> SourceFuture<'a, LogPage> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((reference.clone(), next_token.map(str::to_string)));

            if self.failing.lock().unwrap().contains(reference) {
                return Err(MonitorError::Api {
                    operation: "GetLogEvents",
                    status: 400,
                    message: format!("ResourceNotFoundException: {reference}"),
                });
            }
            Ok(self.page_after(reference, next_token))
        })
    }
}

/// Log source whose forward token advances on every call, so a stream
/// never drains. Each fetch takes `page_delay`.
#[derive(Clone)]
pub struct EndlessLogs {
    page_delay: Duration,
    calls: Arc<Mutex<usize>>,
}

impl EndlessLogs {
    pub fn new(page_delay: Duration) -> Self {
        Self {
            page_delay,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl LogSource for EndlessLogs {
    fn fetch_logs<'a>(
        &'a self,
        _reference: &'a LogReference,
        _next_token: Option<&'a str>,
    ) -> SourceFuture<'a, LogPage> {
        Box::pin(async move {
            tokio::time::sleep(self.page_delay).await;
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            Ok(LogPage {
                lines: vec![format!("still running ({n})")],
                next_token: Some(format!("f/{n}")),
            })
        })
    }
}

/// In-memory writer whose contents tests can inspect.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A console writing into two inspectable buffers: `(console, out, err)`.
pub fn capture_console() -> (Console, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let console = Console::new(OutputSink::new(out.clone()), OutputSink::new(err.clone()));
    (console, out, err)
}
