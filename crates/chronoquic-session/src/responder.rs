use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chronoquic_frame::{ErrorCode, Frame, FrameCodec, FrameConfig, FrameError, Payload};
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::handler::{HandlerError, RequestHandler};
use crate::setup::{validate_setup, SetupInfo, SetupRejection};
use crate::writer::{spawn_writer, FrameSender};

/// Responder-side session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest frame accepted or sent, excluding the length prefix.
    pub max_frame_size: usize,
    /// How long a new session may take to send SETUP.
    pub setup_timeout: Duration,
    /// How long in-flight exchanges may keep running once the session ends.
    pub drain_timeout: Duration,
    /// After shutdown, how long to wait for the peer to close the connection.
    pub close_linger: Duration,
    /// Frames queued for the writer before senders wait.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: chronoquic_frame::DEFAULT_MAX_FRAME_SIZE,
            setup_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(5),
            close_linger: Duration::from_secs(1),
            outbound_capacity: 256,
        }
    }
}

impl SessionConfig {
    fn codec(&self) -> FrameCodec {
        FrameCodec::with_config(FrameConfig {
            max_frame_size: self.max_frame_size,
        })
    }
}

struct ExchangeHandle {
    cancel: CancellationToken,
    // Set when the peer ended the exchange with ERROR; no reply is sent.
    silent: Arc<AtomicBool>,
}

#[derive(Default)]
struct Exchanges {
    inner: Mutex<HashMap<u32, ExchangeHandle>>,
}

impl Exchanges {
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, ExchangeHandle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self, stream_id: u32, silent: bool) -> bool {
        match self.lock().get(&stream_id) {
            Some(handle) => {
                handle.silent.store(silent, Ordering::Release);
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn remove(&self, stream_id: u32) {
        self.lock().remove(&stream_id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Why the read loop stopped.
enum Exit {
    /// Peer finished its write half.
    PeerClosed,
    /// Local shutdown requested.
    Shutdown,
    /// No frame within the negotiated max lifetime.
    KeepaliveTimeout,
    /// We close the session with a connection-level ERROR.
    Close { code: ErrorCode, message: String },
    /// Peer sent a connection-level ERROR.
    PeerError { code: ErrorCode, message: String },
    /// The read half failed.
    ReadFailed(FrameError),
}

struct Session {
    id: u64,
    handler: Arc<dyn RequestHandler>,
    out: FrameSender,
    exchanges: Arc<Exchanges>,
    tracker: TaskTracker,
    // Parent of every exchange token; cancelled when draining gives up.
    abort: CancellationToken,
    // Highest request stream id accepted so far. Ids are never reused.
    last_stream_id: AtomicU32,
}

/// Serve one responder session on a reader/writer pair until the peer
/// closes it, a protocol violation ends it, or `shutdown` fires.
///
/// Returns `Ok(())` for a clean end (peer closed or local shutdown).
pub async fn serve_session<R, W>(
    reader: R,
    writer: W,
    handler: Arc<dyn RequestHandler>,
    config: SessionConfig,
    shutdown: CancellationToken,
    session_id: u64,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut frames = FramedRead::new(reader, config.codec());
    let (out, writer_task) = spawn_writer(writer, config.codec(), config.outbound_capacity);

    let setup = match await_setup(&mut frames, &config, &shutdown).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            drop(out);
            finish_writer(writer_task, session_id).await;
            return Ok(());
        }
        Err(rejection) => {
            warn!(
                session = session_id,
                code = %rejection.code,
                reason = %rejection.message,
                "setup rejected"
            );
            let _ = out.send(rejection.to_frame()).await;
            drop(out);
            finish_writer(writer_task, session_id).await;
            return Err(rejection.into());
        }
    };
    debug!(
        session = session_id,
        version = %setup.version,
        keepalive = ?setup.keepalive_interval,
        lifetime = ?setup.max_lifetime,
        data_mime = %setup.data_mime_type,
        "session established"
    );

    let session = Session {
        id: session_id,
        handler,
        out,
        exchanges: Arc::new(Exchanges::default()),
        tracker: TaskTracker::new(),
        abort: CancellationToken::new(),
        last_stream_id: AtomicU32::new(0),
    };

    let exit = read_loop(&session, &mut frames, &setup, &shutdown).await;
    let result = match exit {
        Exit::PeerClosed => {
            debug!(session = session_id, "peer closed session");
            session.drain(config.drain_timeout).await;
            Ok(())
        }
        Exit::Shutdown => {
            debug!(session = session_id, in_flight = session.exchanges.len(), "draining session");
            session.drain(config.drain_timeout).await;
            let _ = session
                .out
                .send(Frame::error(0, ErrorCode::CONNECTION_CLOSE, "server shutting down"))
                .await;
            Ok(())
        }
        Exit::KeepaliveTimeout => {
            warn!(session = session_id, lifetime = ?setup.max_lifetime, "keepalive timeout");
            session.abort().await;
            let message = format!("no frame received within {:?}", setup.max_lifetime);
            let _ = session
                .out
                .send(Frame::error(0, ErrorCode::CONNECTION_ERROR, message))
                .await;
            Err(SessionError::KeepaliveTimeout(setup.max_lifetime))
        }
        Exit::Close { code, message } => {
            warn!(session = session_id, %code, reason = %message, "closing session");
            session.abort().await;
            let _ = session.out.send(Frame::error(0, code, message.clone())).await;
            Err(SessionError::Protocol { code, message })
        }
        Exit::PeerError { code, message } => {
            debug!(session = session_id, %code, reason = %message, "peer closed session with error");
            session.abort().await;
            Err(SessionError::Remote { code, message })
        }
        Exit::ReadFailed(err) => {
            debug!(session = session_id, error = %err, "session read failed");
            session.abort().await;
            Err(err.into())
        }
    };

    let Session { out, .. } = session;
    drop(out);
    finish_writer(writer_task, session_id).await;
    result
}

async fn await_setup<R>(
    frames: &mut FramedRead<R, FrameCodec>,
    config: &SessionConfig,
    shutdown: &CancellationToken,
) -> std::result::Result<Option<SetupInfo>, SetupRejection>
where
    R: AsyncRead + Unpin,
{
    let first = tokio::select! {
        _ = shutdown.cancelled() => return Ok(None),
        first = tokio::time::timeout(config.setup_timeout, frames.next()) => first,
    };

    let invalid = |message: String| SetupRejection {
        code: ErrorCode::INVALID_SETUP,
        message,
    };

    match first {
        Err(_) => Err(invalid(format!(
            "no SETUP received within {:?}",
            config.setup_timeout
        ))),
        Ok(None) => Ok(None),
        Ok(Some(Err(err))) => Err(invalid(format!("unreadable SETUP: {err}"))),
        Ok(Some(Ok(Frame::Setup(setup)))) => validate_setup(&setup).map(Some),
        Ok(Some(Ok(other))) => Err(invalid(format!(
            "first frame must be SETUP, got {}",
            other.frame_type()
        ))),
    }
}

async fn read_loop<R>(
    session: &Session,
    frames: &mut FramedRead<R, FrameCodec>,
    setup: &SetupInfo,
    shutdown: &CancellationToken,
) -> Exit
where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Exit::Shutdown,
            next = tokio::time::timeout(setup.max_lifetime, frames.next()) => next,
        };

        let frame = match next {
            Err(_) => return Exit::KeepaliveTimeout,
            Ok(None) => return Exit::PeerClosed,
            Ok(Some(Err(err @ FrameError::Io(_)))) => return Exit::ReadFailed(err),
            Ok(Some(Err(err))) => {
                return Exit::Close {
                    code: ErrorCode::CONNECTION_ERROR,
                    message: err.to_string(),
                }
            }
            Ok(Some(Ok(frame))) => frame,
        };

        trace!(
            session = session.id,
            stream_id = frame.stream_id(),
            frame_type = %frame.frame_type(),
            "received frame"
        );
        if let Some(exit) = session.dispatch(frame).await {
            return exit;
        }
    }
}

fn connection_error(message: impl Into<String>) -> Option<Exit> {
    Some(Exit::Close {
        code: ErrorCode::CONNECTION_ERROR,
        message: message.into(),
    })
}

impl Session {
    async fn dispatch(&self, frame: Frame) -> Option<Exit> {
        match frame {
            Frame::Setup(_) => connection_error("duplicate SETUP"),
            Frame::Lease { .. } => connection_error("LEASE is not supported"),
            Frame::Keepalive { respond, data, .. } => {
                if respond {
                    self.reply(Frame::Keepalive {
                        respond: false,
                        last_received_position: 0,
                        data,
                    })
                    .await;
                }
                None
            }
            Frame::RequestResponse { stream_id, payload } => {
                if stream_id == 0 {
                    return connection_error("REQUEST_RESPONSE on stream 0");
                }
                if let Some(message) = self.claim_stream_id(stream_id) {
                    self.reply(Frame::error(stream_id, ErrorCode::INVALID, message))
                        .await;
                    return None;
                }
                self.spawn_exchange(stream_id, payload);
                None
            }
            Frame::RequestFnf { stream_id, payload } => {
                if stream_id == 0 {
                    return connection_error("REQUEST_FNF on stream 0");
                }
                if let Some(message) = self.claim_stream_id(stream_id) {
                    self.reply(Frame::error(stream_id, ErrorCode::INVALID, message))
                        .await;
                    return None;
                }
                self.spawn_fire_and_forget(stream_id, payload);
                None
            }
            frame @ (Frame::RequestStream { .. } | Frame::RequestChannel { .. }) => {
                let stream_id = frame.stream_id();
                if stream_id == 0 {
                    return connection_error(format!("{} on stream 0", frame.frame_type()));
                }
                self.reply(Frame::error(
                    stream_id,
                    ErrorCode::REJECTED,
                    format!("{} is not supported", frame.frame_type()),
                ))
                .await;
                None
            }
            Frame::Cancel { stream_id } => {
                if !self.exchanges.cancel(stream_id, false) {
                    debug!(session = self.id, stream_id, "CANCEL for unknown stream");
                }
                None
            }
            Frame::Error {
                stream_id: 0,
                code,
                message,
            } => Some(Exit::PeerError { code, message }),
            Frame::Error {
                stream_id,
                code,
                message,
            } => {
                debug!(session = self.id, stream_id, %code, reason = %message, "peer ended exchange");
                self.exchanges.cancel(stream_id, true);
                None
            }
            Frame::Unsupported {
                frame_type,
                ignorable: false,
                ..
            } => connection_error(format!("{frame_type} is not supported")),
            other => {
                debug!(
                    session = self.id,
                    stream_id = other.stream_id(),
                    frame_type = %other.frame_type(),
                    "ignoring frame"
                );
                None
            }
        }
    }

    /// Accept `stream_id` for a new exchange, or say why it is invalid.
    fn claim_stream_id(&self, stream_id: u32) -> Option<String> {
        if stream_id % 2 == 0 {
            return Some(format!("stream id {stream_id} is not client-initiated"));
        }
        let last = self.last_stream_id.load(Ordering::Acquire);
        if stream_id <= last {
            return Some(format!(
                "stream id {stream_id} was already used (last accepted {last})"
            ));
        }
        self.last_stream_id.store(stream_id, Ordering::Release);
        None
    }

    fn register(&self, stream_id: u32) -> (CancellationToken, Arc<AtomicBool>) {
        let cancel = self.abort.child_token();
        let silent = Arc::new(AtomicBool::new(false));
        self.exchanges.lock().insert(
            stream_id,
            ExchangeHandle {
                cancel: cancel.clone(),
                silent: Arc::clone(&silent),
            },
        );
        (cancel, silent)
    }

    fn spawn_exchange(&self, stream_id: u32, payload: Payload) {
        let (cancel, silent) = self.register(stream_id);
        let handler = Arc::clone(&self.handler);
        let out = self.out.clone();
        let exchanges = Arc::clone(&self.exchanges);
        let session = self.id;

        self.tracker.spawn(async move {
            let mut task =
                tokio::spawn(async move { handler.request_response(payload).await });

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    task.abort();
                    debug!(session, stream_id, "exchange canceled");
                    (!silent.load(Ordering::Acquire))
                        .then(|| Frame::error(stream_id, ErrorCode::CANCELED, "request canceled"))
                }
                joined = &mut task => Some(match joined {
                    Ok(Ok(payload)) => Frame::complete_with(stream_id, payload),
                    Ok(Err(err)) => {
                        debug!(session, stream_id, code = %err.error_code(), error = %err, "exchange failed");
                        Frame::error(stream_id, err.error_code(), err.to_string())
                    }
                    Err(join) if join.is_panic() => {
                        warn!(session, stream_id, "handler panicked");
                        Frame::error(stream_id, ErrorCode::APPLICATION_ERROR, "handler panicked")
                    }
                    Err(_) => Frame::error(stream_id, ErrorCode::CANCELED, "request canceled"),
                }),
            };

            exchanges.remove(stream_id);
            if let Some(frame) = response {
                if let Err(err) = out.send(frame).await {
                    debug!(session, stream_id, error = %err, "response dropped");
                }
            }
        });
    }

    fn spawn_fire_and_forget(&self, stream_id: u32, payload: Payload) {
        let cancel = self.abort.child_token();
        let handler = Arc::clone(&self.handler);
        let session = self.id;

        self.tracker.spawn(async move {
            let mut task =
                tokio::spawn(async move { handler.fire_and_forget(payload).await });
            tokio::select! {
                _ = cancel.cancelled() => task.abort(),
                joined = &mut task => match joined {
                    Ok(Ok(())) => trace!(session, stream_id, "fire-and-forget complete"),
                    Ok(Err(err)) => log_handler_error(session, stream_id, &err),
                    Err(join) if join.is_panic() => warn!(session, stream_id, "handler panicked"),
                    Err(_) => {}
                },
            }
        });
    }

    async fn reply(&self, frame: Frame) {
        if let Err(err) = self.out.send(frame).await {
            debug!(session = self.id, error = %err, "reply dropped");
        }
    }

    /// Let in-flight exchanges finish, cancelling whatever is left after `timeout`.
    async fn drain(&self, timeout: Duration) {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                session = self.id,
                remaining = self.exchanges.len(),
                "drain timeout elapsed, canceling remaining exchanges"
            );
            self.abort.cancel();
            self.tracker.wait().await;
        }
    }

    async fn abort(&self) {
        self.abort.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn log_handler_error(session: u64, stream_id: u32, err: &HandlerError) {
    info!(session, stream_id, code = %err.error_code(), error = %err, "fire-and-forget failed");
}

async fn finish_writer(task: tokio::task::JoinHandle<Result<()>>, session: u64) {
    match task.await {
        Ok(Ok(())) => trace!(session, "writer finished"),
        Ok(Err(err)) => debug!(session, error = %err, "writer failed"),
        Err(err) => warn!(session, error = %err, "writer task failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use bytes::Bytes;
    use chronoquic_frame::{Setup, Version};
    use futures_util::SinkExt;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
    use tokio::sync::Notify;
    use tokio::task::JoinHandle;
    use tokio_util::codec::FramedWrite;

    use super::*;
    use crate::setup::SetupConfig;

    /// Uppercases the request; `"slow"` waits forever, `"bad"` fails,
    /// `"panic"` panics.
    #[derive(Default)]
    struct TestHandler {
        started: Notify,
        fnf_count: AtomicUsize,
    }

    #[async_trait]
    impl RequestHandler for TestHandler {
        async fn request_response(
            &self,
            payload: Payload,
        ) -> std::result::Result<Payload, HandlerError> {
            self.started.notify_one();
            match payload.data().as_ref() {
                b"slow" => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                b"sleep" => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(Payload::from("slept"))
                }
                b"bad" => Err(HandlerError::Invalid("bad request".to_string())),
                b"panic" => panic!("handler blew up"),
                data => Ok(Payload::new(data.to_ascii_uppercase())),
            }
        }

        async fn fire_and_forget(
            &self,
            _payload: Payload,
        ) -> std::result::Result<(), HandlerError> {
            self.fnf_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        tx: FramedWrite<WriteHalf<DuplexStream>, FrameCodec>,
        rx: FramedRead<ReadHalf<DuplexStream>, FrameCodec>,
        shutdown: CancellationToken,
        session: JoinHandle<Result<()>>,
        handler: Arc<TestHandler>,
    }

    impl Harness {
        fn start(config: SessionConfig) -> Self {
            let (client, server) = tokio::io::duplex(64 * 1024);
            let (server_read, server_write) = tokio::io::split(server);
            let (client_read, client_write) = tokio::io::split(client);
            let handler = Arc::new(TestHandler::default());
            let shutdown = CancellationToken::new();
            let session = tokio::spawn(serve_session(
                server_read,
                server_write,
                handler.clone(),
                config,
                shutdown.clone(),
                1,
            ));
            Self {
                tx: FramedWrite::new(client_write, FrameCodec::new()),
                rx: FramedRead::new(client_read, FrameCodec::new()),
                shutdown,
                session,
                handler,
            }
        }

        async fn established(config: SessionConfig) -> Self {
            let mut harness = Self::start(config);
            harness.send(SetupConfig::default().to_frame()).await;
            harness
        }

        async fn send(&mut self, frame: Frame) {
            self.tx.send(frame).await.expect("frame should be sent");
        }

        async fn recv(&mut self) -> Frame {
            self.rx
                .next()
                .await
                .expect("session should send a frame")
                .expect("frame should decode")
        }

        async fn request(&mut self, stream_id: u32, data: &'static str) {
            self.send(Frame::RequestResponse {
                stream_id,
                payload: Payload::from(data),
            })
            .await;
        }
    }

    fn setup_frame(edit: impl FnOnce(&mut Setup)) -> Frame {
        match SetupConfig::default().to_frame() {
            Frame::Setup(mut setup) => {
                edit(&mut setup);
                Frame::Setup(setup)
            }
            other => panic!("expected SETUP, got {other:?}"),
        }
    }

    fn assert_error(frame: Frame, expected_stream: u32, expected_code: ErrorCode) {
        match frame {
            Frame::Error {
                stream_id, code, ..
            } => {
                assert_eq!(stream_id, expected_stream);
                assert_eq!(code, expected_code);
            }
            other => panic!("expected ERROR {expected_code:?}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_response_round_trip() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(1, "abc").await;
        assert_eq!(h.recv().await, Frame::complete_with(1, Payload::from("ABC")));
    }

    #[tokio::test]
    async fn first_frame_must_be_setup() {
        let mut h = Harness::start(SessionConfig::default());
        h.request(1, "abc").await;
        assert_error(h.recv().await, 0, ErrorCode::INVALID_SETUP);
        let result = h.session.await.expect("session task should not panic");
        assert!(matches!(result, Err(SessionError::SetupRejected { .. })));
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let mut h = Harness::start(SessionConfig::default());
        h.send(setup_frame(|setup| setup.version = Version { major: 2, minor: 0 }))
            .await;
        assert_error(h.recv().await, 0, ErrorCode::UNSUPPORTED_SETUP);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_setup_times_out() {
        let mut h = Harness::start(SessionConfig::default());
        assert_error(h.recv().await, 0, ErrorCode::INVALID_SETUP);
        assert!(h.rx.next().await.is_none(), "session should close its write half");
    }

    #[tokio::test]
    async fn keepalive_with_respond_is_echoed() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.send(Frame::Keepalive {
            respond: true,
            last_received_position: 0,
            data: Bytes::from_static(b"ping"),
        })
        .await;
        assert_eq!(
            h.recv().await,
            Frame::Keepalive {
                respond: false,
                last_received_position: 0,
                data: Bytes::from_static(b"ping"),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_hits_keepalive_timeout() {
        let mut h = Harness::start(SessionConfig::default());
        h.send(setup_frame(|setup| setup.max_lifetime = Duration::from_secs(1)))
            .await;
        assert_error(h.recv().await, 0, ErrorCode::CONNECTION_ERROR);
        let result = h.session.await.expect("session task should not panic");
        assert!(matches!(result, Err(SessionError::KeepaliveTimeout(_))));
    }

    #[tokio::test]
    async fn cancel_emits_canceled() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(1, "slow").await;
        h.handler.started.notified().await;
        h.send(Frame::Cancel { stream_id: 1 }).await;
        assert_error(h.recv().await, 1, ErrorCode::CANCELED);

        h.request(3, "after").await;
        assert_eq!(h.recv().await, Frame::complete_with(3, Payload::from("AFTER")));
    }

    #[tokio::test]
    async fn handler_error_fails_only_its_exchange() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(1, "bad").await;
        assert_error(h.recv().await, 1, ErrorCode::INVALID);
        h.request(3, "good").await;
        assert_eq!(h.recv().await, Frame::complete_with(3, Payload::from("GOOD")));
    }

    #[tokio::test]
    async fn handler_panic_is_application_error() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(1, "panic").await;
        assert_error(h.recv().await, 1, ErrorCode::APPLICATION_ERROR);
        h.request(3, "still up").await;
        assert_eq!(
            h.recv().await,
            Frame::complete_with(3, Payload::from("STILL UP"))
        );
    }

    #[tokio::test]
    async fn stream_requests_are_rejected() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.send(Frame::RequestStream {
            stream_id: 1,
            initial_request_n: 8,
            payload: Payload::from("%Y"),
        })
        .await;
        assert_error(h.recv().await, 1, ErrorCode::REJECTED);
    }

    #[tokio::test]
    async fn even_and_duplicate_stream_ids_are_invalid() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(2, "even").await;
        assert_error(h.recv().await, 2, ErrorCode::INVALID);

        h.request(5, "slow").await;
        h.handler.started.notified().await;
        h.request(5, "again").await;
        assert_error(h.recv().await, 5, ErrorCode::INVALID);
    }

    #[tokio::test]
    async fn completed_or_lower_stream_ids_are_not_reused() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(7, "abc").await;
        assert_eq!(h.recv().await, Frame::complete_with(7, Payload::from("ABC")));

        h.request(7, "again").await;
        assert_error(h.recv().await, 7, ErrorCode::INVALID);
        h.request(3, "lower").await;
        assert_error(h.recv().await, 3, ErrorCode::INVALID);
        h.send(Frame::RequestFnf {
            stream_id: 5,
            payload: Payload::from("lower"),
        })
        .await;
        assert_error(h.recv().await, 5, ErrorCode::INVALID);

        h.request(9, "next").await;
        assert_eq!(h.recv().await, Frame::complete_with(9, Payload::from("NEXT")));
        assert_eq!(h.handler.fnf_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn request_on_stream_zero_closes_session() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(0, "abc").await;
        assert_error(h.recv().await, 0, ErrorCode::CONNECTION_ERROR);
        let result = h.session.await.expect("session task should not panic");
        assert!(matches!(
            result,
            Err(SessionError::Protocol { code: ErrorCode::CONNECTION_ERROR, .. })
        ));
    }

    #[tokio::test]
    async fn fire_and_forget_sends_nothing() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.send(Frame::RequestFnf {
            stream_id: 1,
            payload: Payload::from("%Y"),
        })
        .await;
        h.request(3, "x").await;
        assert_eq!(h.recv().await, Frame::complete_with(3, Payload::from("X")));

        h.tx.close().await.expect("client write half should shut down");
        let result = h.session.await.expect("session task should not panic");
        assert!(result.is_ok());
        assert_eq!(h.handler.fnf_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_exchanges() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(1, "sleep").await;
        h.handler.started.notified().await;
        h.shutdown.cancel();

        assert_eq!(h.recv().await, Frame::complete_with(1, Payload::from("slept")));
        assert_error(h.recv().await, 0, ErrorCode::CONNECTION_CLOSE);
        assert!(h.rx.next().await.is_none());
        assert!(h.session.await.expect("session task should not panic").is_ok());
    }

    #[tokio::test]
    async fn drain_timeout_cancels_stragglers() {
        let config = SessionConfig {
            drain_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let mut h = Harness::established(config).await;
        h.request(1, "slow").await;
        h.handler.started.notified().await;
        h.shutdown.cancel();

        assert_error(h.recv().await, 1, ErrorCode::CANCELED);
        assert_error(h.recv().await, 0, ErrorCode::CONNECTION_CLOSE);
    }

    #[tokio::test]
    async fn peer_error_on_request_stream_cancels_silently() {
        let mut h = Harness::established(SessionConfig::default()).await;
        h.request(1, "slow").await;
        h.handler.started.notified().await;
        h.send(Frame::error(1, ErrorCode::APPLICATION_ERROR, "client gave up"))
            .await;
        h.send(Frame::Keepalive {
            respond: true,
            last_received_position: 0,
            data: Bytes::new(),
        })
        .await;
        assert!(matches!(h.recv().await, Frame::Keepalive { respond: false, .. }));
    }
}
