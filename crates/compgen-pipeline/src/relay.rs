//! Wire framing between the driver and a remote consumer.
//!
//! Each frame is `data: <json>\n\n` holding one `DeltaEvent`; the terminal
//! frame is always followed by `data: [DONE]\n\n`.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use compgen_harness::SseDecoder;
use futures::StreamExt as _;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tracing::{debug, warn};

use crate::driver::{AbortHandle, GenerationStream};
use crate::event::DeltaEvent;

/// Payload of the frame that ends a relay.
pub const END_MARKER: &str = "[DONE]";

const UNEXPECTED_END: &str = "generation ended without a result";

/// Serializes one event into a complete frame.
pub fn encode_frame(event: &DeltaEvent) -> Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|err| {
        warn!(error = %err, "failed to encode event");
        String::from(r#"{"stage":"error","content":"failed to encode event"}"#)
    });
    Bytes::from(format!("data: {json}\n\n"))
}

/// The end-marker frame.
pub fn end_marker_frame() -> Bytes {
    Bytes::from(format!("data: {END_MARKER}\n\n"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    Streaming,
    Ending,
    Done,
}

/// Frames for one generation, one complete frame per item.
///
/// Dropping the relay before the end marker was produced cancels the
/// generation. After cancellation, pending non-terminal events are skipped
/// and only the terminal frame and end marker are produced.
pub struct RelayStream {
    source: GenerationStream,
    abort: AbortHandle,
    state: RelayState,
}

/// Wraps a generation in its wire framing.
pub fn relay(source: GenerationStream) -> RelayStream {
    let abort = source.abort_handle();
    RelayStream {
        source,
        abort,
        state: RelayState::Streaming,
    }
}

impl RelayStream {
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

impl futures::Stream for RelayStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        loop {
            match self.state {
                RelayState::Done => return Poll::Ready(None),
                RelayState::Ending => {
                    self.state = RelayState::Done;
                    return Poll::Ready(Some(end_marker_frame()));
                }
                RelayState::Streaming => match self.source.poll_next_unpin(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(event)) => {
                        if event.is_terminal() {
                            self.state = RelayState::Ending;
                        } else if self.abort.is_aborted() {
                            continue;
                        }
                        return Poll::Ready(Some(encode_frame(&event)));
                    }
                    Poll::Ready(None) => {
                        warn!(request_id = %self.source.request_id(), "generation closed without terminal event");
                        self.state = RelayState::Ending;
                        return Poll::Ready(Some(encode_frame(&DeltaEvent::error(UNEXPECTED_END))));
                    }
                },
            }
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.state != RelayState::Done {
            debug!(request_id = %self.source.request_id(), "relay dropped early, cancelling generation");
            self.abort.abort();
        }
    }
}

/// Writes every frame to `writer`, flushing after each one.
///
/// A failed write cancels the generation and returns the error. Returns the
/// number of frames written, end marker included.
pub async fn pump<W>(mut relay: RelayStream, writer: &mut W) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(frame) = relay.next().await {
        let result = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = result {
            warn!(error = %err, frames = written, "consumer write failed, cancelling generation");
            relay.abort_handle().abort();
            return Err(err);
        }
        written += 1;
    }
    Ok(written)
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Event(DeltaEvent),
    End,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Consumer-side decoder turning arbitrary byte chunks back into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    sse: SseDecoder,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.sse
            .push_chunk(chunk)
            .iter()
            .filter_map(|frame| decode_payload(&frame.data))
            .collect()
    }

    /// Decodes a final frame that arrived without its trailing blank line.
    pub fn finish(&mut self) -> Result<Option<Frame>, FrameError> {
        self.sse
            .finish()
            .and_then(|frame| decode_payload(&frame.data))
            .transpose()
    }
}

fn decode_payload(data: &str) -> Option<Result<Frame, FrameError>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == END_MARKER {
        return Some(Ok(Frame::End));
    }
    Some(
        serde_json::from_str::<DeltaEvent>(data)
            .map(Frame::Event)
            .map_err(FrameError::from),
    )
}
