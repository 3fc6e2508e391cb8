use std::pin::Pin;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::model::{ChatMessage, ModelRef, ProviderId, SamplingConfig};

/// Boxed stream of provider events.
pub type ProviderEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static>>;

/// A single completion request as seen by a provider adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
    /// Correlation id used in logs.
    pub request_id: uuid::Uuid,
    pub model: ModelRef,
    /// Messages in conversation order; the system prompt, if any, comes first.
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingConfig,
    /// Optional per-request timeout overriding the adapter default.
    pub timeout: Option<Duration>,
}

impl ProviderRequest {
    /// Creates a request with a fresh id and default sampling.
    pub fn new(model: ModelRef, messages: Vec<ChatMessage>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4(),
            model,
            messages,
            sampling: SamplingConfig::default(),
            timeout: None,
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }
}

/// Events produced by a provider stream, in arrival order.
///
/// A stream ends after `Finished`. A stream that closes without `Finished`
/// is also a clean end; errors arrive as `Err` items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Incremental text chunk.
    TextDelta { text: String },
    /// Provider reported the end of generation.
    Finished { finish_reason: Option<String> },
}

/// Handle returned once the provider has accepted a request.
pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
}

/// Contract implemented by each model-service integration.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier used in logs and errors.
    fn id(&self) -> ProviderId;

    /// Submits the request and returns the lazy delta stream.
    ///
    /// Errors returned here happen before any delta was produced.
    async fn start_stream(&self, req: ProviderRequest)
    -> Result<ProviderStreamHandle, ProviderError>;
}
