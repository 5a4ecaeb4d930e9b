//! In-memory fakes shared by the unit tests.
//!
//! Everything here records what happened to it so tests can assert on order
//! (through a shared [`EventLog`]) as well as on content.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::ssh::auth::AuthChain;
use crate::ssh::client::Connector;
use crate::ssh::error::SessionError;
use crate::ssh::profile::ConnectionProfile;
use crate::ssh::prompt::Prompter;
use crate::ssh::terminal::{LocalTerminal, TermSize};
use crate::ssh::transport::{ShellChannel, ShellEvent, ShellReader, ShellWriter, Transport};

/// Ordered record of side effects across several fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Prompter that returns canned answers in order and records every prompt.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far, as `line:<prompt>` or `secret:<prompt>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, kind: &str, prompt: &str) -> io::Result<String> {
        self.calls.lock().unwrap().push(format!("{}:{}", kind, prompt));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left"))
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn read_line(&self, prompt: &str) -> io::Result<String> {
        self.answer("line", prompt)
    }

    async fn read_secret(&self, prompt: &str) -> io::Result<String> {
        self.answer("secret", prompt)
    }
}

/// Prompter whose user never answers.
#[derive(Default)]
pub struct StalledPrompter {
    asked: AtomicUsize,
}

impl StalledPrompter {
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompter for StalledPrompter {
    async fn read_line(&self, _prompt: &str) -> io::Result<String> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn read_secret(&self, _prompt: &str) -> io::Result<String> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Local terminal stand-in.
///
/// Size queries first drain the queued sizes (`None` entries fail), then
/// keep returning the last size seen, or fail once `fail_size` is set.
pub struct FakeTerminal {
    current: Mutex<TermSize>,
    queued: Mutex<VecDeque<Option<TermSize>>>,
    fail_size: AtomicBool,
    fail_raw_mode: bool,
    raw: AtomicBool,
    size_queries: AtomicUsize,
    log: EventLog,
}

impl FakeTerminal {
    pub fn new(size: TermSize) -> Self {
        Self {
            current: Mutex::new(size),
            queued: Mutex::new(VecDeque::new()),
            fail_size: AtomicBool::new(false),
            fail_raw_mode: false,
            raw: AtomicBool::new(false),
            size_queries: AtomicUsize::new(0),
            log: EventLog::new(),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn failing_raw_mode(mut self) -> Self {
        self.fail_raw_mode = true;
        self
    }

    pub fn failing_size(self) -> Self {
        self.fail_size.store(true, Ordering::SeqCst);
        self
    }

    /// Queue results for the next size queries; `None` makes that query fail.
    pub fn queue_sizes(&self, sizes: impl IntoIterator<Item = Option<TermSize>>) {
        self.queued.lock().unwrap().extend(sizes);
    }

    pub fn is_raw(&self) -> bool {
        self.raw.load(Ordering::SeqCst)
    }

    pub fn size_queries(&self) -> usize {
        self.size_queries.load(Ordering::SeqCst)
    }
}

impl LocalTerminal for FakeTerminal {
    fn size(&self) -> io::Result<TermSize> {
        self.size_queries.fetch_add(1, Ordering::SeqCst);
        let queued = self.queued.lock().unwrap().pop_front();
        match queued {
            Some(Some(size)) => {
                *self.current.lock().unwrap() = size;
                Ok(size)
            }
            Some(None) => Err(io::Error::other("terminal went away")),
            None if self.fail_size.load(Ordering::SeqCst) => {
                Err(io::Error::other("not a terminal"))
            }
            None => Ok(*self.current.lock().unwrap()),
        }
    }

    fn enable_raw_mode(&self) -> io::Result<()> {
        if self.fail_raw_mode {
            return Err(io::Error::other("raw mode unsupported"));
        }
        self.raw.store(true, Ordering::SeqCst);
        self.log.push("terminal:raw");
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        if self.raw.swap(false, Ordering::SeqCst) {
            self.log.push("terminal:restore");
        }
        Ok(())
    }
}

/// What happened on a [`FakeChannel`], readable after the channel was moved.
#[derive(Debug, Default)]
pub struct ChannelProbe {
    pub pty: Mutex<Option<(String, TermSize, u32)>>,
    pub writes: Mutex<Vec<(Instant, Vec<u8>)>>,
    pub window_changes: Mutex<Vec<TermSize>>,
    pub closed: AtomicBool,
}

impl ChannelProbe {
    /// Everything written to the remote shell, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, data)| data.clone())
            .collect()
    }

    pub fn window_changes(&self) -> Vec<TermSize> {
        self.window_changes.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Session channel fake. Remote events are fed through [`FakeChannel::remote`].
pub struct FakeChannel {
    log: EventLog,
    probe: Arc<ChannelProbe>,
    events_tx: mpsc::UnboundedSender<ShellEvent>,
    events_rx: mpsc::UnboundedReceiver<ShellEvent>,
    fail_pty: bool,
    fail_shell: bool,
}

impl FakeChannel {
    pub fn new(log: EventLog) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            log,
            probe: Arc::new(ChannelProbe::default()),
            events_tx,
            events_rx,
            fail_pty: false,
            fail_shell: false,
        }
    }

    pub fn failing_pty(mut self) -> Self {
        self.fail_pty = true;
        self
    }

    pub fn failing_shell(mut self) -> Self {
        self.fail_shell = true;
        self
    }

    pub fn probe(&self) -> Arc<ChannelProbe> {
        self.probe.clone()
    }

    /// Sender for events the remote side produces.
    pub fn remote(&self) -> mpsc::UnboundedSender<ShellEvent> {
        self.events_tx.clone()
    }
}

#[async_trait]
impl ShellChannel for FakeChannel {
    type Reader = FakeReader;
    type Writer = FakeWriter;

    async fn request_pty(
        &mut self,
        term: &str,
        size: TermSize,
        baud_rate: u32,
    ) -> Result<(), SessionError> {
        if self.fail_pty {
            return Err(SessionError::Setup("PTY request refused by server".to_string()));
        }
        *self.probe.pty.lock().unwrap() = Some((term.to_string(), size, baud_rate));
        self.log.push("channel:pty");
        Ok(())
    }

    async fn request_shell(&mut self) -> Result<(), SessionError> {
        if self.fail_shell {
            return Err(SessionError::Setup("shell request refused by server".to_string()));
        }
        self.log.push("channel:shell");
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
        self.log.push("channel:close");
    }

    fn split(self) -> (FakeReader, FakeWriter) {
        (
            FakeReader {
                events: self.events_rx,
            },
            FakeWriter {
                log: self.log,
                probe: self.probe,
                events_tx: self.events_tx,
            },
        )
    }
}

pub struct FakeReader {
    events: mpsc::UnboundedReceiver<ShellEvent>,
}

#[async_trait]
impl ShellReader for FakeReader {
    async fn next_event(&mut self) -> Option<ShellEvent> {
        self.events.recv().await
    }
}

#[derive(Clone)]
pub struct FakeWriter {
    log: EventLog,
    probe: Arc<ChannelProbe>,
    events_tx: mpsc::UnboundedSender<ShellEvent>,
}

#[async_trait]
impl ShellWriter for FakeWriter {
    async fn write(&self, data: &[u8]) -> Result<(), String> {
        if self.probe.is_closed() {
            return Err("channel closed".to_string());
        }
        self.probe
            .writes
            .lock()
            .unwrap()
            .push((Instant::now(), data.to_vec()));
        self.log
            .push(format!("write:{}", String::from_utf8_lossy(data)));
        Ok(())
    }

    async fn window_change(&self, size: TermSize) -> Result<(), String> {
        self.probe.window_changes.lock().unwrap().push(size);
        Ok(())
    }

    async fn close(&self) -> Result<(), String> {
        if !self.probe.closed.swap(true, Ordering::SeqCst) {
            self.log.push("channel:close");
            // Closing our side makes the remote close its side too.
            let _ = self.events_tx.send(ShellEvent::Closed);
        }
        Ok(())
    }
}

/// Transport fake handing out a single [`FakeChannel`].
pub struct FakeTransport {
    log: EventLog,
    channel: Mutex<Option<FakeChannel>>,
    fail_open: bool,
    keepalive_fails_after: Option<usize>,
    keepalives: AtomicUsize,
    closed: AtomicBool,
}

impl FakeTransport {
    pub fn new(log: EventLog, channel: FakeChannel) -> Self {
        Self {
            log,
            channel: Mutex::new(Some(channel)),
            fail_open: false,
            keepalive_fails_after: None,
            keepalives: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Let `n` keepalives succeed, then fail every later one.
    pub fn keepalive_fails_after(mut self, n: usize) -> Self {
        self.keepalive_fails_after = Some(n);
        self
    }

    pub fn keepalives(&self) -> usize {
        self.keepalives.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Channel = FakeChannel;

    async fn open_channel(&self) -> Result<FakeChannel, SessionError> {
        if self.fail_open {
            return Err(SessionError::Setup("Failed to open channel: refused".to_string()));
        }
        self.log.push("transport:open");
        self.channel
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SessionError::Setup("channel already opened".to_string()))
    }

    async fn keepalive(&self) -> Result<(), String> {
        let sent = self.keepalives.fetch_add(1, Ordering::SeqCst);
        match self.keepalive_fails_after {
            Some(limit) if sent >= limit => Err("connection reset".to_string()),
            _ => Ok(()),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.log.push("transport:close");
        }
    }
}

/// Connector that replays scripted outcomes and records each attempt's methods.
pub struct FakeConnector {
    outcomes: Mutex<VecDeque<Result<(), SessionError>>>,
    attempts: Mutex<Vec<Vec<&'static str>>>,
}

impl FakeConnector {
    pub fn new(outcomes: impl IntoIterator<Item = Result<(), SessionError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<Vec<&'static str>> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(
        &self,
        _profile: &ConnectionProfile,
        methods: &AuthChain,
    ) -> Result<FakeTransport, SessionError> {
        self.attempts.lock().unwrap().push(methods.names());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::Connect("no scripted outcome".to_string())));
        outcome.map(|_| {
            let log = EventLog::new();
            FakeTransport::new(log.clone(), FakeChannel::new(log))
        })
    }
}

/// Authentication failure of the "no supported methods remain" class.
pub fn auth_exhausted(attempted: Vec<&'static str>) -> SessionError {
    SessionError::AuthExhausted { attempted }
}
