//! Integration tests for the IMAP client driver.
//!
//! These tests run the client over an in-memory duplex stream and play the
//! server side by hand.

#![allow(clippy::unwrap_used)]

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf};
use tokio::sync::mpsc;

use browserbox_imap::types::Attribute;
use browserbox_imap::{
    ClientHandler, ClientOptions, Error, ExecOptions, ImapClient, Priority, Request, Response,
    Status, Transport,
};

/// In-memory stream; `upgrade` only flips the secure flag.
struct MockStream {
    inner: DuplexStream,
    secure: bool,
}

impl Transport for MockStream {
    fn is_secure(&self) -> bool {
        self.secure
    }

    async fn upgrade(mut self, _host: String, _ca: Vec<Vec<u8>>) -> browserbox_imap::Result<Self> {
        self.secure = true;
        Ok(self)
    }

    fn peer_certificate(&self) -> Option<Vec<u8>> {
        self.secure.then(|| b"certificate".to_vec())
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Handler forwarding every event to a channel.
#[derive(Debug)]
enum Event {
    Ready,
    Untagged(Response),
    Idle,
    Error(Error),
    Close,
    Cert(Vec<u8>),
}

struct ChannelHandler(mpsc::UnboundedSender<Event>);

impl ClientHandler for ChannelHandler {
    fn on_ready(&mut self, _client: &ImapClient) {
        let _ = self.0.send(Event::Ready);
    }

    fn on_untagged(&mut self, response: &Response) {
        let _ = self.0.send(Event::Untagged(response.clone()));
    }

    fn on_idle(&mut self, _client: &ImapClient) {
        let _ = self.0.send(Event::Idle);
    }

    fn on_error(&mut self, error: Error) {
        let _ = self.0.send(Event::Error(error));
    }

    fn on_close(&mut self) {
        let _ = self.0.send(Event::Close);
    }

    fn on_cert(&mut self, certificate: &[u8]) {
        let _ = self.0.send(Event::Cert(certificate.to_vec()));
    }
}

struct Server {
    reader: BufReader<tokio::io::ReadHalf<DuplexStream>>,
    writer: tokio::io::WriteHalf<DuplexStream>,
}

impl Server {
    async fn send(&mut self, data: &str) {
        self.writer.write_all(data.as_bytes()).await.unwrap();
    }

    async fn expect(&mut self, line: &str) {
        let mut received = String::new();
        self.reader.read_line(&mut received).await.unwrap();
        assert_eq!(received, format!("{line}\r\n"));
    }
}

fn start() -> (ImapClient, Server, mpsc::UnboundedReceiver<Event>) {
    start_with(false)
}

fn start_with(secure: bool) -> (ImapClient, Server, mpsc::UnboundedReceiver<Event>) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let stream = MockStream {
        inner: client_side,
        secure,
    };
    let options = ClientOptions::new("localhost", 143).session_id("[1]");
    let client = ImapClient::spawn(stream, options, ChannelHandler(events_tx));

    let (read, write) = tokio::io::split(server_side);
    let server = Server {
        reader: BufReader::new(read),
        writer: write,
    };
    (client, server, events_rx)
}

#[tokio::test]
async fn test_commands_wait_for_greeting() {
    let (client, mut server, mut events) = start();

    let capability = client.exec(
        Request::new("CAPABILITY"),
        ExecOptions::accept(["CAPABILITY"]),
    );
    server.send("* OK IMAP4rev1 Service Ready\r\n").await;

    let greeting = events.recv().await.unwrap();
    assert!(matches!(greeting, Event::Untagged(ref r) if r.command == "OK"));
    assert!(matches!(events.recv().await.unwrap(), Event::Ready));

    server.expect("W1 CAPABILITY").await;
    server
        .send("* CAPABILITY IMAP4rev1 IDLE\r\nW1 OK CAPABILITY completed\r\n")
        .await;

    let response = capability.await.unwrap();
    assert_eq!(response.status(), Some(Status::Ok));
    let collected = response.payload("CAPABILITY");
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].attributes[1].text(), "IDLE");
}

#[tokio::test]
async fn test_commands_are_sent_one_at_a_time() {
    let (client, mut server, _events) = start();
    server.send("* OK ready\r\n").await;

    let first = client.exec("NOOP", ExecOptions::default());
    let second = client.exec(
        Request::new("SELECT").attribute(Attribute::string("INBOX")),
        ExecOptions::default(),
    );

    server.expect("W1 NOOP").await;
    server.send("W1 OK NOOP completed\r\n").await;
    assert!(first.await.unwrap().status().unwrap().is_ok());

    server.expect("W2 SELECT \"INBOX\"").await;
    server
        .send("W2 NO [NONEXISTENT] Unknown Mailbox\r\n")
        .await;
    let error = second.await.unwrap().into_result().unwrap_err();
    assert_eq!(error.code(), Some("NONEXISTENT"));

    // The connection stays usable after NO.
    let third = client.exec("NOOP", ExecOptions::default());
    server.expect("W3 NOOP").await;
    server.send("W3 OK\r\n").await;
    assert!(third.await.is_ok());
}

#[tokio::test]
async fn test_untagged_responses_reach_handler() {
    let (client, mut server, mut events) = start();
    server.send("* OK ready\r\n").await;
    let _ = events.recv().await;
    let _ = events.recv().await;

    let noop = client.exec("NOOP", ExecOptions::default());
    server.expect("W1 NOOP").await;
    server.send("* 23 EXISTS\r\nW1 OK\r\n").await;
    noop.await.unwrap();

    match events.recv().await.unwrap() {
        Event::Untagged(response) => {
            assert_eq!(response.command, "EXISTS");
            assert_eq!(response.nr, Some(23));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_literals_wait_for_continuation() {
    let (client, mut server, _events) = start();
    server.send("* OK ready\r\n").await;

    let request = Request::new("APPEND")
        .attribute(Attribute::string("INBOX"))
        .attribute(Attribute::literal(b"hello".to_vec()));
    let append = client.exec(request, ExecOptions::default());

    server.expect("W1 APPEND \"INBOX\" {5}").await;
    server.send("+ Ready for literal data\r\n").await;
    server.expect("hello").await;
    server.send("W1 OK APPEND completed\r\n").await;

    assert!(append.await.unwrap().status().unwrap().is_ok());
}

#[tokio::test]
async fn test_continuation_handler_and_raw_writes() {
    let (client, mut server, _events) = start();
    server.send("* OK ready\r\n").await;

    let (plus_tx, mut plus_rx) = mpsc::unbounded_channel();
    let idle = client.exec(
        "IDLE",
        ExecOptions::default().on_continuation(Box::new(move |text| {
            let _ = plus_tx.send(text.to_string());
            None
        })),
    );

    server.expect("W1 IDLE").await;
    server.send("+ idling\r\n").await;
    assert_eq!(plus_rx.recv().await.unwrap(), "idling");

    client.send_raw("DONE\r\n");
    server.expect("DONE").await;
    server.send("W1 OK IDLE terminated\r\n").await;
    assert!(idle.await.is_ok());
}

#[tokio::test]
async fn test_precheck_commands_jump_the_queue() {
    let (client, mut server, _events) = start();
    server.send("* OK ready\r\n").await;

    let select = client.exec(
        Request::new("SELECT").attribute(Attribute::string("Sent")),
        ExecOptions::default().precheck(Box::new(|cx| {
            Box::pin(async move {
                cx.client
                    .exec(
                        "CLOSE",
                        ExecOptions::default().priority(Priority::Before(cx.ctx)),
                    )
                    .await?
                    .into_result()?;
                Ok(())
            })
        })),
    );

    server.expect("W2.p CLOSE").await;
    server.send("W2.p OK CLOSE completed\r\n").await;
    server.expect("W1 SELECT \"Sent\"").await;
    server.send("W1 OK [READ-WRITE] SELECT completed\r\n").await;

    let response = select.await.unwrap();
    assert_eq!(response.code_name(), Some("READ-WRITE"));
}

#[tokio::test]
async fn test_failed_precheck_rejects_command() {
    let (client, mut server, _events) = start();
    server.send("* OK ready\r\n").await;

    let guarded = client.exec(
        "EXPUNGE",
        ExecOptions::default().precheck(Box::new(|_| {
            Box::pin(async { Err(Error::InvalidState("no mailbox".to_string())) })
        })),
    );
    let next = client.exec("NOOP", ExecOptions::default());

    assert!(matches!(guarded.await, Err(Error::InvalidState(_))));
    server.expect("W2 NOOP").await;
    server.send("W2 OK\r\n").await;
    assert!(next.await.is_ok());
}

#[tokio::test]
async fn test_close_rejects_pending_commands() {
    let (client, _server, mut events) = start();

    let pending = client.exec("NOOP", ExecOptions::default());
    client.close().await;

    assert!(matches!(pending.await, Err(Error::ConnectionClosed)));
    assert!(client.is_closed());
    assert!(matches!(events.recv().await.unwrap(), Event::Close));

    // Closing twice is harmless.
    client.close().await;
    let after = client.exec("NOOP", ExecOptions::default());
    assert!(matches!(after.await, Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn test_server_hangup_closes_client() {
    let (client, server, mut events) = start();
    let pending = client.exec("NOOP", ExecOptions::default());
    drop(server);

    assert!(matches!(pending.await, Err(Error::ConnectionClosed)));
    assert!(matches!(events.recv().await.unwrap(), Event::Close));
}

#[tokio::test]
async fn test_parse_error_is_fatal() {
    let (client, mut server, mut events) = start();
    let pending = client.exec("NOOP", ExecOptions::default());

    server.send("* OK ready\r\n").await;
    server.expect("W1 NOOP").await;
    server.send("* 1 FETCH (BODY[] \"unterminated\r\n").await;

    assert!(matches!(pending.await, Err(Error::ConnectionClosed)));
    let mut saw_parse_error = false;
    while let Some(event) = events.recv().await {
        match event {
            Event::Error(Error::Parse { .. }) => saw_parse_error = true,
            Event::Close => break,
            _ => {}
        }
    }
    assert!(saw_parse_error);
}

#[tokio::test(start_paused = true)]
async fn test_socket_timeout() {
    let (client, mut server, mut events) = start();
    server.send("* OK ready\r\n").await;

    let pending = client.exec("NOOP", ExecOptions::default());
    server.expect("W1 NOOP").await;

    assert!(matches!(pending.await, Err(Error::ConnectionClosed)));
    let mut timeout = None;
    while let Some(event) = events.recv().await {
        match event {
            Event::Error(Error::SocketTimeout(after)) => timeout = Some(after),
            Event::Close => break,
            _ => {}
        }
    }
    assert_eq!(timeout, Some(Duration::from_millis(10_000)));
}

#[tokio::test(start_paused = true)]
async fn test_idle_fires_after_quiet_period() {
    let (_client, mut server, mut events) = start();
    server.send("* OK ready\r\n").await;

    let started = tokio::time::Instant::now();
    loop {
        if matches!(events.recv().await.unwrap(), Event::Idle) {
            break;
        }
    }
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn test_upgrade_marks_client_secure() {
    let (client, mut server, mut events) = start();
    server.send("* OK ready\r\n").await;
    assert!(!client.is_secure());

    assert!(client.upgrade().await.unwrap());
    assert!(client.is_secure());
    assert!(!client.upgrade().await.unwrap());

    let mut cert = None;
    while let Ok(event) = events.try_recv() {
        if let Event::Cert(der) = event {
            cert = Some(der);
        }
    }
    assert_eq!(cert.as_deref(), Some(&b"certificate"[..]));
}

#[tokio::test]
async fn test_cert_reported_for_implicit_tls() {
    let (client, mut server, mut events) = start_with(true);
    server.send("* OK ready\r\n").await;

    assert!(matches!(
        events.recv().await.unwrap(),
        Event::Cert(ref der) if der == b"certificate"
    ));
    assert!(matches!(events.recv().await.unwrap(), Event::Untagged(_)));
    assert!(matches!(events.recv().await.unwrap(), Event::Ready));
    assert!(client.is_secure());
    assert!(!client.upgrade().await.unwrap());
}

#[tokio::test]
async fn test_weak_client_does_not_keep_connection_open() {
    let (client, _server, mut events) = start();
    let weak = client.downgrade();
    assert_eq!(weak.upgrade().unwrap().session_id(), "[1]");

    drop(client);
    assert!(matches!(events.recv().await.unwrap(), Event::Close));
    assert!(weak.upgrade().is_none());
}

/// Scripted stream; the mock panics on any byte the script does not expect.
struct Scripted(tokio_test::io::Mock);

impl Transport for Scripted {
    fn is_secure(&self) -> bool {
        false
    }

    async fn upgrade(self, _host: String, _ca: Vec<Vec<u8>>) -> browserbox_imap::Result<Self> {
        Ok(self)
    }
}

impl AsyncRead for Scripted {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for Scripted {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

#[tokio::test]
async fn test_scripted_literal_exchange() {
    let mock = tokio_test::io::Builder::new()
        .read(b"* OK ready\r\n")
        .write(b"W1 APPEND \"INBOX\" {5}\r\n")
        .read(b"+ go ahead\r\n")
        .write(b"hello\r\n")
        .read(b"W1 OK [APPENDUID 1 7] done\r\n")
        .build();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let options = ClientOptions::new("localhost", 143).session_id("[1]");
    let client = ImapClient::spawn(Scripted(mock), options, ChannelHandler(events_tx));

    let request = Request::new("APPEND")
        .attribute(Attribute::string("INBOX"))
        .attribute(Attribute::literal(b"hello".to_vec()));
    let response = client.exec(request, ExecOptions::default()).await.unwrap();
    assert_eq!(response.status(), Some(Status::Ok));
    assert!(response.code.as_ref().unwrap().is("APPENDUID"));

    // The script ends with EOF, which closes the client.
    while let Some(event) = events.recv().await {
        if matches!(event, Event::Close) {
            break;
        }
    }
}
