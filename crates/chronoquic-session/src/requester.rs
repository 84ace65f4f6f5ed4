use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use chronoquic_frame::{ErrorCode, Frame, FrameCodec, FrameConfig, Payload, MAX_STREAM_ID};
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};
use crate::setup::SetupConfig;
use crate::writer::{spawn_writer, FrameSender};

/// Requester-side session behavior.
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// How long `request_response` waits before canceling.
    pub request_timeout: Duration,
    /// Largest frame accepted or sent, excluding the length prefix.
    pub max_frame_size: usize,
    /// Frames queued for the writer before senders wait.
    pub outbound_capacity: usize,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            max_frame_size: chronoquic_frame::DEFAULT_MAX_FRAME_SIZE,
            outbound_capacity: 256,
        }
    }
}

type Reply = oneshot::Sender<Result<Payload>>;

#[derive(Default)]
struct Pending {
    inner: Mutex<HashMap<u32, Reply>>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Reply>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, stream_id: u32, reply: Reply) {
        self.lock().insert(stream_id, reply);
    }

    fn remove(&self, stream_id: u32) {
        self.lock().remove(&stream_id);
    }

    fn complete(&self, stream_id: u32, result: Result<Payload>) {
        match self.lock().remove(&stream_id) {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => trace!(stream_id, "response for unknown or abandoned stream"),
        }
    }

    fn fail_all(&self, error: impl Fn() -> SessionError) {
        for (_, reply) in self.lock().drain() {
            let _ = reply.send(Err(error()));
        }
    }
}

/// Client side of a session: sends SETUP, then issues requests and matches
/// responses back to callers by stream id.
///
/// All request methods take `&self`; wrap in an `Arc` to share between tasks.
pub struct Requester {
    out: FrameSender,
    pending: Arc<Pending>,
    next_stream_id: AtomicU32,
    config: RequesterConfig,
    reader_task: JoinHandle<()>,
    keepalive_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
    // Cancelled once the session is over, from either side.
    closed: CancellationToken,
    // Stops the reader and keepalive tasks when the requester goes away.
    stop: DropGuard,
}

impl Requester {
    /// Send SETUP on the given stream halves and start the background tasks.
    pub async fn start<R, W>(
        reader: R,
        writer: W,
        setup: SetupConfig,
        config: RequesterConfig,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let codec = FrameCodec::with_config(FrameConfig {
            max_frame_size: config.max_frame_size,
        });
        let frames = FramedRead::new(reader, codec.clone());
        let (out, writer_task) = spawn_writer(writer, codec, config.outbound_capacity);

        out.send(setup.to_frame()).await?;
        debug!(
            keepalive = ?setup.keepalive_interval,
            lifetime = ?setup.max_lifetime,
            "setup sent"
        );

        let stop = CancellationToken::new();
        let pending = Arc::new(Pending::default());
        let reader_task = tokio::spawn(read_loop(
            frames,
            Arc::clone(&pending),
            out.clone(),
            stop.clone(),
        ));
        let keepalive_task = tokio::spawn(keepalive_loop(
            out.clone(),
            setup.keepalive_interval,
            stop.clone(),
        ));

        Ok(Self {
            out,
            pending,
            next_stream_id: AtomicU32::new(1),
            config,
            reader_task,
            keepalive_task,
            writer_task,
            closed: stop.clone(),
            stop: stop.drop_guard(),
        })
    }

    /// Send a request and wait for its response, canceling it after
    /// `request_timeout`.
    pub async fn request_response(&self, payload: Payload) -> Result<Payload> {
        self.request_response_with_cancel(payload, CancellationToken::new())
            .await
    }

    /// Like [`request_response`](Self::request_response), but cancelling
    /// `cancel` sends CANCEL and resolves with [`SessionError::Canceled`] once
    /// the responder confirms.
    pub async fn request_response_with_cancel(
        &self,
        payload: Payload,
        cancel: CancellationToken,
    ) -> Result<Payload> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let stream_id = self.allocate_stream_id()?;
        let (reply, mut response) = oneshot::channel();
        self.pending.insert(stream_id, reply);

        if let Err(err) = self
            .out
            .send(Frame::RequestResponse { stream_id, payload })
            .await
        {
            self.pending.remove(stream_id);
            return Err(err);
        }
        trace!(stream_id, "request sent");

        let timeout = self.config.request_timeout;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            result = &mut response => flatten(result),
            _ = self.closed.cancelled() => {
                self.pending.remove(stream_id);
                Err(closed_error())
            }
            _ = &mut deadline => {
                debug!(stream_id, ?timeout, "request timed out");
                self.abandon(stream_id).await;
                Err(SessionError::Timeout(timeout))
            }
            _ = cancel.cancelled() => {
                debug!(stream_id, "canceling request");
                let _ = self.out.send(Frame::Cancel { stream_id }).await;
                tokio::select! {
                    result = &mut response => flatten(result),
                    _ = &mut deadline => {
                        self.pending.remove(stream_id);
                        Err(SessionError::Canceled)
                    }
                }
            }
        }
    }

    /// Send a REQUEST_FNF. Completes once the frame is queued.
    pub async fn fire_and_forget(&self, payload: Payload) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let stream_id = self.allocate_stream_id()?;
        self.out.send(Frame::RequestFnf { stream_id, payload }).await
    }

    /// True once the responder ended the session or [`close`](Self::close)
    /// was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of requests awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    /// Stop background tasks, fail outstanding requests and finish the
    /// write half.
    pub async fn close(self) -> Result<()> {
        let Requester {
            out,
            pending,
            reader_task,
            keepalive_task,
            writer_task,
            stop,
            ..
        } = self;

        stop.disarm().cancel();
        let _ = reader_task.await;
        let _ = keepalive_task.await;
        pending.fail_all(|| SessionError::Shutdown);

        drop(out);
        match writer_task.await {
            Ok(result) => result,
            Err(err) => Err(SessionError::Disconnected(format!("writer task failed: {err}"))),
        }
    }

    fn allocate_stream_id(&self) -> Result<u32> {
        self.next_stream_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                (id <= MAX_STREAM_ID).then_some(id + 2)
            })
            .map_err(|_| SessionError::StreamIdsExhausted)
    }

    async fn abandon(&self, stream_id: u32) {
        self.pending.remove(stream_id);
        if let Err(err) = self.out.send(Frame::Cancel { stream_id }).await {
            debug!(stream_id, error = %err, "CANCEL not sent");
        }
    }
}

fn closed_error() -> SessionError {
    SessionError::Disconnected("session closed".to_string())
}

fn flatten(
    result: std::result::Result<Result<Payload>, oneshot::error::RecvError>,
) -> Result<Payload> {
    result.unwrap_or_else(|_| Err(closed_error()))
}

async fn read_loop<R>(
    mut frames: FramedRead<R, FrameCodec>,
    pending: Arc<Pending>,
    out: FrameSender,
    stop: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => return,
            next = frames.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(error = %err, "session read failed");
                let message = err.to_string();
                pending.fail_all(|| SessionError::Disconnected(message.clone()));
                break;
            }
            None => {
                debug!("responder closed session");
                pending.fail_all(|| SessionError::Disconnected("stream closed".to_string()));
                break;
            }
        };

        match frame {
            Frame::Payload {
                stream_id, payload, ..
            } => pending.complete(stream_id, Ok(payload)),
            Frame::Error {
                stream_id: 0,
                code,
                message,
            } => {
                debug!(%code, reason = %message, "responder closed session with error");
                pending.fail_all(|| connection_error(code, &message));
                break;
            }
            Frame::Error {
                stream_id,
                code,
                message,
            } => {
                let error = if code == ErrorCode::CANCELED {
                    SessionError::Canceled
                } else {
                    SessionError::Remote { code, message }
                };
                pending.complete(stream_id, Err(error));
            }
            Frame::Keepalive {
                respond: true,
                data,
                ..
            } => {
                let echo = Frame::Keepalive {
                    respond: false,
                    last_received_position: 0,
                    data,
                };
                if out.send(echo).await.is_err() {
                    break;
                }
            }
            other => trace!(
                stream_id = other.stream_id(),
                frame_type = %other.frame_type(),
                "ignoring frame"
            ),
        }
    }
    stop.cancel();
}

fn connection_error(code: ErrorCode, message: &str) -> SessionError {
    match code {
        ErrorCode::INVALID_SETUP | ErrorCode::UNSUPPORTED_SETUP | ErrorCode::REJECTED_SETUP => {
            SessionError::SetupRejected {
                code,
                message: message.to_string(),
            }
        }
        _ => SessionError::Remote {
            code,
            message: message.to_string(),
        },
    }
}

async fn keepalive_loop(out: FrameSender, interval: Duration, stop: CancellationToken) {
    if interval.is_zero() {
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {
                let keepalive = Frame::Keepalive {
                    respond: true,
                    last_received_position: 0,
                    data: Bytes::new(),
                };
                if out.send(keepalive).await.is_err() {
                    return;
                }
            }
        }
    }
}
