//! Sans-I/O IMAP framer.
//!
//! This module is a pure state machine that owns the command queue,
//! matches responses to commands and tracks the idle and socket timers,
//! without performing any I/O itself:
//!
//! - Receives bytes via `handle_input()`
//! - Produces bytes to send via `poll_transmit()`
//! - Reports what happened via `poll_event()`
//! - Reports timeouts via `poll_timeout()` and handles them in `handle_timeout()`
//!
//! Only one command is in flight at a time. Untagged responses either go to
//! the payload of the running command (if it asked for them) or are
//! reported as [`FramerEvent::Untagged`].
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use browserbox_imap::protocol::{Framer, FramerEvent, QueueOptions};
//! use browserbox_imap::types::Request;
//!
//! let mut framer = Framer::default();
//! let now = Instant::now();
//!
//! let id = framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
//! framer.handle_input(b"* OK ready\r\n", now);
//!
//! let sent = framer.poll_transmit().unwrap();
//! assert_eq!(sent.as_str(), Some("W1 NOOP\r\n"));
//!
//! framer.handle_input(b"W1 OK done\r\n", now);
//! while let Some(event) = framer.poll_event() {
//!     if let FramerEvent::Completed { id: done, result } = event {
//!         assert_eq!(done, id);
//!         assert_eq!(result.unwrap().command, "OK");
//!     }
//! }
//! ```

mod assembler;
mod queue;
mod tag;
mod transmit;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub use assembler::{DEFAULT_MAX_LITERAL_SIZE, LineAssembler};
pub use queue::{CommandId, Priority, QueueOptions};
pub use tag::TagGenerator;
pub use transmit::Transmit;

use queue::{ClientQueue, Entry, PrecheckState};

use crate::types::{Request, Response};
use crate::{Error, Result, compiler, parser};

/// Timer settings of the framer.
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Quiet time with an empty queue before [`FramerEvent::Idle`] fires.
    pub enter_idle: Duration,
    /// Minimum time to wait for data after a write.
    pub socket_timeout_lower_bound: Duration,
    /// Extra wait per written byte.
    pub socket_timeout_per_byte: Duration,
    /// Largest literal accepted from the server.
    pub max_literal_size: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            enter_idle: Duration::from_millis(1000),
            socket_timeout_lower_bound: Duration::from_millis(10_000),
            socket_timeout_per_byte: Duration::from_micros(100),
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
        }
    }
}

impl FramerConfig {
    /// Returns how long to wait for data after writing `len` bytes.
    ///
    /// The per-byte part is truncated to whole milliseconds.
    #[must_use]
    pub fn socket_timeout(&self, len: usize) -> Duration {
        let extra = self
            .socket_timeout_per_byte
            .saturating_mul(u32::try_from(len).unwrap_or(u32::MAX));
        let extra_ms = u64::try_from(extra.as_millis()).unwrap_or(u64::MAX);
        self.socket_timeout_lower_bound
            .saturating_add(Duration::from_millis(extra_ms))
    }
}

/// Events produced by the framer.
#[derive(Debug)]
pub enum FramerEvent {
    /// The server greeting was processed; commands may flow now.
    Ready,
    /// An untagged response nobody asked for.
    Untagged(Response),
    /// A command finished.
    ///
    /// NO and BAD completions are `Ok` here; `Err` means the command never
    /// completed on the wire (connection lost, precheck failed, ...).
    Completed {
        /// The command.
        id: CommandId,
        /// The tagged response with its collected payload.
        result: Result<Response>,
    },
    /// The server sent `+` and the running command has no more chunks.
    Continuation {
        /// The running command.
        id: CommandId,
        /// Text after the `+`.
        text: String,
    },
    /// A command with a precheck reached the head of the queue. It stays
    /// there until [`Framer::precheck_done`] is called.
    Precheck {
        /// The held command.
        id: CommandId,
    },
    /// The queue has been empty for [`FramerConfig::enter_idle`].
    Idle,
    /// A fatal error; [`FramerEvent::Closed`] follows.
    Error(Error),
    /// The framer was destroyed. Emitted once.
    Closed,
}

/// Sans-I/O IMAP command framer.
#[derive(Debug)]
pub struct Framer {
    config: FramerConfig,
    assembler: LineAssembler,
    tags: TagGenerator,
    next_id: u64,
    queue: ClientQueue,
    current: Option<Entry>,
    can_send: bool,
    ready: bool,
    destroyed: bool,
    outbound: VecDeque<Transmit>,
    events: VecDeque<FramerEvent>,
    idle_deadline: Option<Instant>,
    socket_deadline: Option<(Instant, Duration)>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(FramerConfig::default())
    }
}

impl Framer {
    /// Creates a framer waiting for the server greeting.
    #[must_use]
    pub fn new(config: FramerConfig) -> Self {
        Self {
            assembler: LineAssembler::new(config.max_literal_size),
            config,
            tags: TagGenerator::default(),
            next_id: 0,
            queue: ClientQueue::default(),
            current: None,
            can_send: false,
            ready: false,
            destroyed: false,
            outbound: VecDeque::new(),
            events: VecDeque::new(),
            idle_deadline: None,
            socket_deadline: None,
        }
    }

    /// Returns true once the greeting has been processed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns true after [`Framer::destroy`].
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Returns the command currently on the wire.
    #[must_use]
    pub fn current_command(&self) -> Option<CommandId> {
        self.current.as_ref().map(|e| e.id)
    }

    /// Returns the number of commands waiting to be sent.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Queues a command and sends it if the connection is free.
    pub fn enqueue(&mut self, request: Request, options: QueueOptions, now: Instant) -> CommandId {
        self.next_id += 1;
        let id = CommandId(self.next_id);

        if self.destroyed {
            self.events.push_back(FramerEvent::Completed {
                id,
                result: Err(Error::ConnectionClosed),
            });
            return id;
        }

        let entry = Entry::new(id, self.tags.next_tag(), request, &options);
        self.queue.push(entry, options.priority);

        if self.can_send {
            self.send_next(now);
        }
        id
    }

    /// Resolves the precheck of a held command.
    ///
    /// On success the command becomes sendable. On failure it is removed
    /// and completed with the error.
    pub fn precheck_done(&mut self, id: CommandId, result: Result<()>, now: Instant) {
        match result {
            Ok(()) => {
                if let Some(entry) = self.queue.get_mut(id) {
                    entry.precheck = PrecheckState::None;
                }
            }
            Err(err) => {
                if let Some(entry) = self.queue.remove(id) {
                    tracing::debug!(command = %entry.id, error = %err, "Precheck failed");
                    self.events.push_back(FramerEvent::Completed {
                        id,
                        result: Err(err),
                    });
                }
                if self.ready && self.current.is_none() {
                    self.can_send = true;
                }
            }
        }
        if self.can_send {
            self.send_next(now);
        }
    }

    /// Writes raw bytes outside of the command queue (e.g. `DONE\r\n`).
    pub fn send_raw(&mut self, data: Vec<u8>, now: Instant) {
        if self.destroyed {
            return;
        }
        self.transmit(Transmit::raw(data), now);
    }

    /// Feeds received bytes.
    pub fn handle_input(&mut self, data: &[u8], now: Instant) {
        if self.destroyed {
            return;
        }
        self.socket_deadline = None;

        let responses = match self.assembler.feed(data) {
            Ok(responses) => responses,
            Err(err) => {
                self.handle_error(err);
                return;
            }
        };

        for raw in responses {
            if self.destroyed {
                return;
            }
            let response = match parser::parse(&raw) {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        raw = %String::from_utf8_lossy(&raw),
                        "Error parsing IMAP response"
                    );
                    self.handle_error(err);
                    return;
                }
            };
            self.process_response(response, now);
        }
    }

    /// Fires expired timers.
    pub fn handle_timeout(&mut self, now: Instant) {
        if let Some((deadline, timeout)) = self.socket_deadline
            && now >= deadline
        {
            self.socket_deadline = None;
            self.handle_error(Error::SocketTimeout(timeout));
            return;
        }
        if let Some(deadline) = self.idle_deadline
            && now >= deadline
        {
            self.idle_deadline = None;
            self.events.push_back(FramerEvent::Idle);
        }
    }

    /// Reports a fatal error and tears the framer down.
    pub fn handle_error(&mut self, error: Error) {
        if self.destroyed {
            return;
        }
        tracing::error!(error = %error, "IMAP connection error");
        self.events.push_back(FramerEvent::Error(error));
        self.destroy();
    }

    /// Tears the framer down. Pending commands complete with
    /// [`Error::ConnectionClosed`]. Only the first call has any effect.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.can_send = false;
        self.idle_deadline = None;
        self.socket_deadline = None;
        self.assembler.clear();
        self.outbound.clear();

        let pending: Vec<Entry> = self
            .current
            .take()
            .into_iter()
            .chain(self.queue.drain())
            .collect();
        for entry in pending {
            self.events.push_back(FramerEvent::Completed {
                id: entry.id,
                result: Err(Error::ConnectionClosed),
            });
        }
        self.events.push_back(FramerEvent::Closed);
    }

    /// Returns the next data to transmit, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.outbound.pop_front()
    }

    /// Returns the next event, if any.
    pub fn poll_event(&mut self) -> Option<FramerEvent> {
        self.events.pop_front()
    }

    /// Returns the earliest pending deadline.
    ///
    /// The caller should call `handle_timeout()` when this instant is reached.
    #[must_use]
    pub fn poll_timeout(&self) -> Option<Instant> {
        let socket = self.socket_deadline.map(|(deadline, _)| deadline);
        match (socket, self.idle_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn process_response(&mut self, mut response: Response, now: Instant) {
        self.idle_deadline = None;

        if response.is_continuation() {
            self.handle_continuation(response, now);
            return;
        }

        response.normalize_numbered();
        tracing::debug!(
            tag = %response.tag,
            command = %response.command,
            "S: {}",
            response.human_readable.as_deref().unwrap_or_default()
        );

        let completes_current = self
            .current
            .as_ref()
            .is_some_and(|current| !response.is_untagged() && response.tag == current.tag);
        let untagged = response.is_untagged();

        self.dispatch(response);

        if !self.ready {
            self.ready = true;
            self.events.push_back(FramerEvent::Ready);
            self.can_send = self.current.is_none();
            self.send_next(now);
        } else if completes_current {
            self.can_send = true;
            self.send_next(now);
        } else if !untagged && self.current.is_none() {
            self.can_send = true;
            self.send_next(now);
        }
    }

    fn dispatch(&mut self, mut response: Response) {
        let Some(current) = self.current.as_mut() else {
            if !response.is_untagged() {
                tracing::debug!(tag = %response.tag, "Unexpected tagged response, no command running");
            }
            self.events.push_back(FramerEvent::Untagged(response));
            return;
        };

        if response.is_untagged() {
            if let Some(payload) = current.payload.as_mut()
                && let Some(collected) = payload.get_mut(&response.command)
            {
                collected.push(response);
                return;
            }
            self.events.push_back(FramerEvent::Untagged(response));
            return;
        }

        if response.tag != current.tag {
            tracing::debug!(tag = %response.tag, "Dropping response with unknown tag");
            return;
        }

        let Some(entry) = self.current.take() else {
            return;
        };
        if let Some(payload) = entry.payload {
            response.payload = payload;
        }
        self.events.push_back(FramerEvent::Completed {
            id: entry.id,
            result: Ok(response),
        });
    }

    fn handle_continuation(&mut self, response: Response, now: Instant) {
        let Some(current) = self.current.as_mut() else {
            tracing::debug!("Continuation without a running command");
            return;
        };
        let id = current.id;

        if let Some(mut chunk) = current.chunks.pop_front() {
            if current.chunks.is_empty() {
                chunk.extend_from_slice(b"\r\n");
            }
            self.transmit(Transmit::command(id, chunk), now);
        } else {
            self.events.push_back(FramerEvent::Continuation {
                id,
                text: response.human_readable.unwrap_or_default(),
            });
        }
    }

    fn send_next(&mut self, now: Instant) {
        loop {
            if !self.can_send || self.destroyed || self.current.is_some() {
                return;
            }

            let Some(head) = self.queue.front_mut() else {
                self.idle_deadline = Some(now + self.config.enter_idle);
                return;
            };
            self.idle_deadline = None;

            match head.precheck {
                PrecheckState::Pending => {
                    head.precheck = PrecheckState::Running;
                    let id = head.id;
                    self.events.push_back(FramerEvent::Precheck { id });
                    return;
                }
                PrecheckState::Running => return,
                PrecheckState::None => {}
            }

            let Some(mut entry) = self.queue.pop_front() else {
                return;
            };

            let chunks = match compiler::compile(&entry.tag, &entry.request) {
                Ok(chunks) => chunks,
                Err(err) => {
                    let message = err.to_string();
                    self.events.push_back(FramerEvent::Completed {
                        id: entry.id,
                        result: Err(err),
                    });
                    self.handle_error(Error::Compile(message));
                    return;
                }
            };

            tracing::debug!("C: {}", compiler::compile_for_log(&entry.tag, &entry.request));

            entry.chunks = chunks.into();
            let Some(mut first) = entry.chunks.pop_front() else {
                continue;
            };
            if entry.chunks.is_empty() {
                first.extend_from_slice(b"\r\n");
            }

            let id = entry.id;
            self.can_send = false;
            self.current = Some(entry);
            self.transmit(Transmit::command(id, first), now);
            return;
        }
    }

    fn transmit(&mut self, transmit: Transmit, now: Instant) {
        let timeout = self.config.socket_timeout(transmit.len());
        self.socket_deadline = Some((now + timeout, timeout));
        self.outbound.push_back(transmit);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::Attribute;

    fn sent(framer: &mut Framer) -> Vec<String> {
        std::iter::from_fn(|| framer.poll_transmit())
            .map(|t| String::from_utf8_lossy(&t.data).into_owned())
            .collect()
    }

    fn events(framer: &mut Framer) -> Vec<FramerEvent> {
        std::iter::from_fn(|| framer.poll_event()).collect()
    }

    fn ready_framer(now: Instant) -> Framer {
        let mut framer = Framer::default();
        framer.handle_input(b"* OK IMAP4rev1 ready\r\n", now);
        let _ = events(&mut framer);
        framer
    }

    #[test]
    fn test_greeting_then_ready() {
        let now = Instant::now();
        let mut framer = Framer::default();
        let id = framer.enqueue(Request::new("CAPABILITY"), QueueOptions::default(), now);
        assert!(sent(&mut framer).is_empty());

        framer.handle_input(b"* OK hello\r\n", now);
        let evs = events(&mut framer);
        assert!(matches!(&evs[0], FramerEvent::Untagged(r) if r.command == "OK"));
        assert!(matches!(evs[1], FramerEvent::Ready));
        assert_eq!(sent(&mut framer), vec!["W1 CAPABILITY\r\n"]);
        assert_eq!(framer.current_command(), Some(id));
    }

    #[test]
    fn test_one_command_in_flight() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let first = framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
        let second = framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
        assert_eq!(sent(&mut framer), vec!["W1 NOOP\r\n"]);

        framer.handle_input(b"W1 OK done\r\n", now);
        assert_eq!(sent(&mut framer), vec!["W2 NOOP\r\n"]);
        let evs = events(&mut framer);
        assert!(matches!(&evs[0], FramerEvent::Completed { id, result: Ok(_) } if *id == first));

        framer.handle_input(b"W2 NO nope\r\n", now);
        let evs = events(&mut framer);
        assert!(
            matches!(&evs[0], FramerEvent::Completed { id, result: Ok(r) } if *id == second && r.command == "NO")
        );
    }

    #[test]
    fn test_accepted_untagged_goes_to_payload() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let options = QueueOptions {
            accept_untagged: vec!["SEARCH".into()],
            ..QueueOptions::default()
        };
        framer.enqueue(Request::new("SEARCH").attribute(Attribute::atom("ALL")), options, now);
        let _ = sent(&mut framer);

        framer.handle_input(b"* SEARCH 2 4\r\n* 3 EXISTS\r\nW1 OK done\r\n", now);
        let evs = events(&mut framer);
        assert_eq!(evs.len(), 2);
        match &evs[0] {
            FramerEvent::Untagged(r) => {
                assert_eq!(r.command, "EXISTS");
                assert_eq!(r.nr, Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &evs[1] {
            FramerEvent::Completed { result: Ok(r), .. } => {
                assert_eq!(r.payload("SEARCH").len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_literal_waits_for_continuation() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let request = Request::new("APPEND")
            .attribute(Attribute::string("INBOX"))
            .attribute(Attribute::literal(b"hello".to_vec()));
        framer.enqueue(request, QueueOptions::default(), now);
        assert_eq!(sent(&mut framer), vec!["W1 APPEND \"INBOX\" {5}\r\n"]);

        framer.handle_input(b"+ go ahead\r\n", now);
        assert_eq!(sent(&mut framer), vec!["hello\r\n"]);
        assert!(events(&mut framer).is_empty());
    }

    #[test]
    fn test_continuation_without_chunks_is_reported() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let id = framer.enqueue(Request::new("IDLE"), QueueOptions::default(), now);
        let _ = sent(&mut framer);

        framer.handle_input(b"+ idling\r\n", now);
        let evs = events(&mut framer);
        assert!(
            matches!(&evs[0], FramerEvent::Continuation { id: c, text } if *c == id && text == "idling")
        );
    }

    #[test]
    fn test_precheck_holds_command_and_allows_jumps() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let options = QueueOptions {
            precheck: true,
            ..QueueOptions::default()
        };
        let held = framer.enqueue(Request::new("FETCH"), options, now);
        assert!(sent(&mut framer).is_empty());
        assert!(matches!(events(&mut framer)[0], FramerEvent::Precheck { id } if id == held));

        let jump = QueueOptions {
            priority: Priority::Before(held),
            ..QueueOptions::default()
        };
        framer.enqueue(Request::new("SELECT"), jump, now);
        assert_eq!(sent(&mut framer), vec!["W2.p SELECT\r\n"]);

        framer.handle_input(b"W2.p OK selected\r\n", now);
        assert!(sent(&mut framer).is_empty());

        framer.precheck_done(held, Ok(()), now);
        assert_eq!(sent(&mut framer), vec!["W1 FETCH\r\n"]);
    }

    #[test]
    fn test_failed_precheck_skips_command() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let options = QueueOptions {
            precheck: true,
            ..QueueOptions::default()
        };
        let held = framer.enqueue(Request::new("FETCH"), options, now);
        framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
        let _ = events(&mut framer);

        framer.precheck_done(held, Err(Error::InvalidState("no mailbox".into())), now);
        let evs = events(&mut framer);
        assert!(matches!(&evs[0], FramerEvent::Completed { id, result: Err(_) } if *id == held));
        assert_eq!(sent(&mut framer), vec!["W2 NOOP\r\n"]);
    }

    #[test]
    fn test_compile_error_is_fatal() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let bad = framer.enqueue(
            Request::new("SELECT").attribute(Attribute::string("a\nb")),
            QueueOptions::default(),
            now,
        );
        let next = framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
        let evs = events(&mut framer);
        assert!(
            matches!(&evs[0], FramerEvent::Completed { id, result: Err(Error::Compile(_)) } if *id == bad)
        );
        assert!(matches!(&evs[1], FramerEvent::Error(Error::Compile(_))));
        assert!(matches!(&evs[2], FramerEvent::Closed));
        assert!(
            matches!(&evs[3], FramerEvent::Completed { id, result: Err(Error::ConnectionClosed) } if *id == next)
        );
        assert!(sent(&mut framer).is_empty());
        assert!(framer.is_destroyed());
    }

    #[test]
    fn test_socket_timeout_destroys() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        let id = framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
        let _ = sent(&mut framer);

        let deadline = framer.poll_timeout().unwrap();
        assert_eq!(deadline, now + Duration::from_millis(10_000));

        framer.handle_timeout(deadline);
        let evs = events(&mut framer);
        assert!(matches!(evs[0], FramerEvent::Error(Error::SocketTimeout(_))));
        assert!(matches!(&evs[1], FramerEvent::Completed { id: c, result: Err(Error::ConnectionClosed) } if *c == id));
        assert!(matches!(evs[2], FramerEvent::Closed));
        assert!(framer.is_destroyed());
    }

    #[test]
    fn test_data_clears_socket_timer_and_idle_fires() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        assert_eq!(framer.poll_timeout(), Some(now + Duration::from_secs(1)));

        framer.handle_timeout(now + Duration::from_secs(1));
        assert!(matches!(events(&mut framer)[0], FramerEvent::Idle));
        assert_eq!(framer.poll_timeout(), None);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        framer.destroy();
        framer.destroy();
        let evs = events(&mut framer);
        assert_eq!(evs.iter().filter(|e| matches!(e, FramerEvent::Closed)).count(), 1);

        let id = framer.enqueue(Request::new("NOOP"), QueueOptions::default(), now);
        assert!(matches!(
            &events(&mut framer)[0],
            FramerEvent::Completed { id: c, result: Err(Error::ConnectionClosed) } if *c == id
        ));
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let now = Instant::now();
        let mut framer = ready_framer(now);
        framer.handle_input(b"* 1 FETCH (UID\r\n", now);
        let evs = events(&mut framer);
        assert!(matches!(evs[0], FramerEvent::Error(Error::Parse { .. })));
        assert!(matches!(evs[1], FramerEvent::Closed));
    }

    #[test]
    fn test_socket_timeout_scales_with_size() {
        let config = FramerConfig::default();
        assert_eq!(config.socket_timeout(0), Duration::from_millis(10_000));
        assert_eq!(config.socket_timeout(15), Duration::from_millis(10_001));
        assert_eq!(config.socket_timeout(100_000), Duration::from_millis(20_000));
    }
}
