//! A provider that replays a fixed script instead of calling a model service.
//!
//! Used by tests and by offline replays of previously captured model output.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt as _;
use futures::stream;

use crate::errors::ProviderError;
use crate::model::ProviderId;
use crate::provider::{ProviderAdapter, ProviderEvent, ProviderRequest, ProviderStreamHandle};

/// What a `ScriptedProvider` does when a stream is started.
#[derive(Clone, Debug)]
pub enum ScriptedBehavior {
    /// Fail before producing a stream.
    FailOnStart(ProviderError),
    /// Yield these items in order, then close.
    Events(Vec<Result<ProviderEvent, ProviderError>>),
    /// Yield these items, then never produce anything else.
    ///
    /// Useful for exercising cancellation.
    EventsThenPending(Vec<Result<ProviderEvent, ProviderError>>),
}

/// Deterministic `ProviderAdapter`.
pub struct ScriptedProvider {
    id: ProviderId,
    behavior: ScriptedBehavior,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<ProviderRequest>>>,
}

impl ScriptedProvider {
    pub fn new(behavior: ScriptedBehavior) -> Self {
        Self {
            id: ProviderId::new("scripted"),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Streams `deltas` as text deltas followed by a `stop` finish event.
    pub fn from_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<_> = deltas
            .into_iter()
            .map(|text| Ok(ProviderEvent::TextDelta { text: text.into() }))
            .collect();
        events.push(Ok(ProviderEvent::Finished {
            finish_reason: Some("stop".into()),
        }));
        Self::new(ScriptedBehavior::Events(events))
    }

    /// Splits `text` into chunks of at most `chunk_chars` characters and
    /// streams them as deltas.
    pub fn replaying(text: &str, chunk_chars: usize) -> Self {
        let chunk_chars = chunk_chars.max(1);
        let chars: Vec<char> = text.chars().collect();
        let deltas = chars
            .chunks(chunk_chars)
            .map(|chunk| chunk.iter().collect::<String>());
        Self::from_deltas(deltas)
    }

    /// Number of times `start_stream` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared counter, for assertions after the provider was moved into an `Arc`.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// The most recent request seen by `start_stream`.
    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_request.lock() {
            *slot = Some(req);
        }
        match &self.behavior {
            ScriptedBehavior::FailOnStart(err) => Err(err.clone()),
            ScriptedBehavior::Events(events) => Ok(ProviderStreamHandle {
                stream: Box::pin(stream::iter(events.clone())),
            }),
            ScriptedBehavior::EventsThenPending(events) => Ok(ProviderStreamHandle {
                stream: Box::pin(stream::iter(events.clone()).chain(stream::pending())),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatMessage, ModelRef};
    use futures::StreamExt as _;

    fn request() -> ProviderRequest {
        ProviderRequest::new(
            ModelRef::new("scripted", "replay"),
            vec![ChatMessage::user("hi")],
        )
    }

    #[tokio::test]
    async fn replays_deltas_then_finish() {
        let provider = ScriptedProvider::from_deltas(["a", "b"]);
        let handle = provider.start_stream(request()).await.expect("start");
        let events: Vec<_> = handle.stream.collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            Ok(ProviderEvent::TextDelta { text: "a".into() })
        );
        assert!(matches!(events[2], Ok(ProviderEvent::Finished { .. })));
        assert_eq!(provider.calls(), 1);
        assert!(provider.last_request().is_some());
    }

    #[tokio::test]
    async fn replaying_chunks_by_character() {
        let provider = ScriptedProvider::replaying("h\u{e9}llo", 2);
        let handle = provider.start_stream(request()).await.expect("start");
        let texts: Vec<String> = handle
            .stream
            .filter_map(|event| async move {
                match event {
                    Ok(ProviderEvent::TextDelta { text }) => Some(text),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(texts, vec!["h\u{e9}", "ll", "o"]);
    }

    #[tokio::test]
    async fn fail_on_start_returns_error_and_counts_call() {
        let provider = ScriptedProvider::new(ScriptedBehavior::FailOnStart(
            ProviderError::transport("scripted", "offline"),
        ));
        assert!(provider.start_stream(request()).await.is_err());
        assert_eq!(provider.calls(), 1);
    }
}
