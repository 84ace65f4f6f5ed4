use chronoquic_frame::{ErrorCode, Frame, FrameCodec, FrameError, FrameType};
use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};

/// Cloneable handle that queues frames for the single writer task.
#[derive(Debug, Clone)]
pub(crate) struct FrameSender {
    tx: mpsc::Sender<Frame>,
}

impl FrameSender {
    pub(crate) async fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| SessionError::Disconnected("outbound stream closed".to_string()))
    }
}

/// Spawn the task that owns the write half.
///
/// The task exits once every [`FrameSender`] is dropped, after shutting the
/// write half down (which finishes a QUIC send stream).
pub(crate) fn spawn_writer<W>(
    writer: W,
    codec: FrameCodec,
    capacity: usize,
) -> (FrameSender, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(write_loop(FramedWrite::new(writer, codec), rx));
    (FrameSender { tx }, task)
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, FrameCodec>,
    mut rx: mpsc::Receiver<Frame>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        feed(&mut sink, frame).await?;
        while let Ok(frame) = rx.try_recv() {
            feed(&mut sink, frame).await?;
        }
        sink.flush().await?;
    }
    sink.close().await?;
    Ok(())
}

async fn feed<W>(sink: &mut FramedWrite<W, FrameCodec>, mut frame: Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let stream_id = frame.stream_id();
    let frame_type = frame.frame_type();
    let max_frame_size = sink.encoder().config().max_frame_size;
    trace!(stream_id, %frame_type, "sending frame");

    // An ERROR must always reach the peer, even if its message does not fit.
    if frame.truncate_error_message(max_frame_size) {
        debug!(stream_id, max_frame_size, "error message truncated");
    }

    match sink.feed(frame).await {
        Ok(()) => Ok(()),
        Err(err @ FrameError::Io(_)) => Err(err.into()),
        // Encoding failed before anything was written; the stream is intact.
        Err(err) if stream_id != 0 && frame_type != FrameType::Error => {
            warn!(stream_id, %frame_type, error = %err, "frame could not be encoded");
            let mut replacement =
                Frame::error(stream_id, ErrorCode::APPLICATION_ERROR, err.to_string());
            replacement.truncate_error_message(max_frame_size);
            sink.feed(replacement).await?;
            Ok(())
        }
        Err(err) => {
            warn!(stream_id, %frame_type, error = %err, "frame could not be encoded, dropped");
            Ok(())
        }
    }
}
