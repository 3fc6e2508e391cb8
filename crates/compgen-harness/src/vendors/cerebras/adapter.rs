use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::errors::ProviderError;
use crate::model::ProviderId;
use crate::provider::{ProviderAdapter, ProviderEvent, ProviderRequest, ProviderStreamHandle};
use crate::sse::SseDecoder;

use super::config::CerebrasConfig;
use super::transport::map_chunk_frame;

const CEREBRAS_PROVIDER: &str = "cerebras";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Provider adapter for Cerebras' streaming chat completions.
pub struct CerebrasProvider {
    client: reqwest::Client,
    config: CerebrasConfig,
}

impl CerebrasProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: CerebrasConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config(
                CEREBRAS_PROVIDER,
                "Cerebras client config api_key must not be empty",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::config(
                    CEREBRAS_PROVIDER,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `CEREBRAS_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(CerebrasConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for CerebrasProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(CEREBRAS_PROVIDER)
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let provider_id = ProviderId::new(CEREBRAS_PROVIDER);
        let body = build_request_body(&req);
        debug!(request_id = %req.request_id, model = %req.model.model, "starting chat completions stream");

        let mut http_req = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(timeout) = req.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            ProviderError::transport(provider_id.clone(), format!("request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("chat completions request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(ProviderStreamHandle {
            stream: Box::pin(completion_event_stream(provider_id, bytes_stream)),
        })
    }
}

pub(crate) fn build_request_body(req: &ProviderRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model.model,
        "messages": req.messages,
        "stream": true,
        "max_tokens": req.sampling.max_tokens,
        "temperature": req.sampling.temperature,
        "top_p": req.sampling.top_p,
    })
}

fn completion_event_stream(
    provider_id: ProviderId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send {
    struct State {
        provider_id: ProviderId,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<ProviderEvent>,
        failure: Option<ProviderError>,
        done: bool,
    }

    impl State {
        fn absorb(&mut self, mapped: Result<Vec<ProviderEvent>, ProviderError>) {
            match mapped {
                Ok(events) => self.queue(events),
                Err(err) if !self.done => {
                    self.failure = Some(err);
                    self.done = true;
                }
                Err(_) => {}
            }
        }

        fn queue(&mut self, events: Vec<ProviderEvent>) {
            for event in events {
                if self.done {
                    break;
                }
                if matches!(event, ProviderEvent::Finished { .. }) {
                    self.done = true;
                }
                self.pending.push_back(event);
            }
        }
    }

    stream::try_unfold(
        State {
            provider_id,
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            failure: None,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if let Some(err) = state.failure.take() {
                    return Err(err);
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let mapped = map_chunk_frame(&state.provider_id, &frame);
                            state.absorb(mapped);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        if let Some(frame) = state.decoder.finish() {
                            let mapped = map_chunk_frame(&state.provider_id, &frame);
                            state.absorb(mapped);
                        }
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatMessage, ModelRef};
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ProviderRequest {
        ProviderRequest::new(
            ModelRef::new("cerebras", "llama3.1-8b"),
            vec![ChatMessage::system("sys"), ChatMessage::user("a button")],
        )
    }

    fn provider_for(server: &MockServer) -> CerebrasProvider {
        CerebrasProvider::new(CerebrasConfig::new("test-key").base_url(server.uri()))
            .expect("provider")
    }

    fn sse_body(frames: &[&str]) -> String {
        frames.iter().map(|f| format!("data: {f}\n\n")).collect()
    }

    #[test]
    fn request_body_carries_fixed_sampling_and_stream_flag() {
        let body = build_request_body(&request());
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "llama3.1-8b");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "a button");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = CerebrasProvider::new(CerebrasConfig::new("  "))
            .err()
            .expect("empty key should fail");
        assert!(matches!(err, ProviderError::Config { .. }));
    }

    #[tokio::test]
    async fn streams_deltas_until_finish_reason() {
        let server = MockServer::start().await;
        let body = sse_body(&[
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":"import "}}]}"#,
            r#"{"choices":[{"delta":{"content":"React"},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let handle = provider_for(&server)
            .start_stream(request())
            .await
            .expect("start");
        let events: Vec<_> = handle.stream.collect().await;
        assert_eq!(
            events,
            vec![
                Ok(ProviderEvent::TextDelta {
                    text: "import ".into()
                }),
                Ok(ProviderEvent::TextDelta {
                    text: "React".into()
                }),
                Ok(ProviderEvent::Finished {
                    finish_reason: Some("stop".into())
                }),
            ]
        );
    }

    #[tokio::test]
    async fn stream_without_trailing_delimiter_still_finishes() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: [DONE]",
            sse_body(&[r#"{"choices":[{"delta":{"content":"x"}}]}"#])
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let handle = provider_for(&server)
            .start_stream(request())
            .await
            .expect("start");
        let events: Vec<_> = handle.stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            Ok(ProviderEvent::Finished {
                finish_reason: None
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_is_provider_error_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .start_stream(request())
            .await
            .err()
            .expect("401 should fail");
        assert_eq!(err.status_code(), Some(401));
        assert!(err.message().contains("bad key"));
    }

    #[tokio::test]
    async fn mid_stream_error_payload_surfaces_as_err_item() {
        let server = MockServer::start().await;
        let body = sse_body(&[
            r#"{"choices":[{"delta":{"content":"const"}}]}"#,
            r#"{"error":{"message":"model overloaded"}}"#,
        ]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let handle = provider_for(&server)
            .start_stream(request())
            .await
            .expect("start");
        let events: Vec<_> = handle.stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(&events[1], Err(err) if err.message() == "model overloaded"));
    }
}
