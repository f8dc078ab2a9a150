//! `text/event-stream` bodies as a stream of frames.
//!
//! Framing (chunk boundaries, split UTF-8 sequences, CRLF, comments) is
//! handled by `eventsource-stream`; this module only maps its events and
//! errors into the service's types.

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};

use super::error::{ServiceError, ServiceResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl From<Event> for SseFrame {
    fn from(event: Event) -> Self {
        Self {
            event: Some(event.event).filter(|name| !name.is_empty()),
            data: event.data,
        }
    }
}

/// Decode a byte stream into SSE frames. Transport errors pass through
/// unchanged; malformed input becomes [`ServiceError::Stream`].
pub fn sse_frames<S, B, E>(bytes: S) -> impl Stream<Item = ServiceResult<SseFrame>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ServiceError>,
{
    bytes.eventsource().map(|item| match item {
        Ok(event) => Ok(SseFrame::from(event)),
        Err(EventStreamError::Transport(e)) => Err(e.into()),
        Err(EventStreamError::Utf8(e)) => Err(ServiceError::Stream(format!("invalid UTF-8 in event stream: {e}"))),
        Err(EventStreamError::Parser(e)) => Err(ServiceError::Stream(format!("malformed event stream: {e}"))),
    })
}
