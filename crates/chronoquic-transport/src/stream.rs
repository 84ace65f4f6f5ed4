/// Read half of a bidirectional QUIC stream. Implements `tokio::io::AsyncRead`.
pub type StreamReader = quinn::RecvStream;

/// Write half of a bidirectional QUIC stream. Implements `tokio::io::AsyncWrite`;
/// `shutdown` finishes the stream.
pub type StreamWriter = quinn::SendStream;

/// An ordered, reliable, bidirectional byte stream on a QUIC connection.
///
/// This is the unit the RPC session layer runs on: one stream, one session.
pub struct QuicStream {
    send: StreamWriter,
    recv: StreamReader,
}

impl QuicStream {
    pub(crate) fn new(send: StreamWriter, recv: StreamReader) -> Self {
        Self { send, recv }
    }

    /// QUIC stream id, for diagnostics.
    pub fn id(&self) -> u64 {
        self.send.id().index()
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (StreamReader, StreamWriter) {
        (self.recv, self.send)
    }
}

impl std::fmt::Debug for QuicStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuicStream").field("id", &self.id()).finish()
    }
}
