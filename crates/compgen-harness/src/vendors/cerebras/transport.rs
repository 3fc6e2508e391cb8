use crate::errors::ProviderError;
use crate::model::ProviderId;
use crate::provider::ProviderEvent;
use crate::sse::SseFrame;

const DONE_SENTINEL: &str = "[DONE]";

/// Maps one SSE frame of a chat-completions stream to provider events.
pub(crate) fn map_chunk_frame(
    provider: &ProviderId,
    frame: &SseFrame,
) -> Result<Vec<ProviderEvent>, ProviderError> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data == DONE_SENTINEL {
        return Ok(vec![ProviderEvent::Finished {
            finish_reason: None,
        }]);
    }
    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::protocol(provider.clone(), format!("invalid SSE JSON frame: {e}"))
    })?;
    map_chunk_json(provider, &value)
}

pub(crate) fn map_chunk_json(
    provider: &ProviderId,
    value: &serde_json::Value,
) -> Result<Vec<ProviderEvent>, ProviderError> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .or_else(|| error.as_str())
            .unwrap_or("model service stream error");
        return Err(ProviderError::provider(provider.clone(), message, None));
    }

    let Some(choice) = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|choices| choices.first())
    else {
        return Ok(Vec::new());
    };

    let mut events = Vec::new();
    if let Some(text) = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
        .filter(|text| !text.is_empty())
    {
        events.push(ProviderEvent::TextDelta {
            text: text.to_string(),
        });
    }
    if let Some(reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
        events.push(ProviderEvent::Finished {
            finish_reason: Some(reason.to_string()),
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str) -> SseFrame {
        SseFrame {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn maps_content_delta() {
        let provider = ProviderId::new("cerebras");
        let events = map_chunk_frame(
            &provider,
            &frame(r#"{"choices":[{"index":0,"delta":{"content":"import"},"finish_reason":null}]}"#),
        )
        .expect("map");
        assert_eq!(
            events,
            vec![ProviderEvent::TextDelta {
                text: "import".into()
            }]
        );
    }

    #[test]
    fn final_chunk_with_text_yields_delta_then_finish() {
        let provider = ProviderId::new("cerebras");
        let events = map_chunk_frame(
            &provider,
            &frame(r#"{"choices":[{"delta":{"content":"}"},"finish_reason":"stop"}]}"#),
        )
        .expect("map");
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ProviderEvent::Finished {
                finish_reason: Some("stop".into())
            }
        );
    }

    #[test]
    fn role_only_and_usage_chunks_are_ignored() {
        let provider = ProviderId::new("cerebras");
        let role = map_chunk_frame(
            &provider,
            &frame(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
        )
        .expect("map");
        assert!(role.is_empty());
        let usage = map_chunk_frame(&provider, &frame(r#"{"usage":{"total_tokens":10}}"#))
            .expect("map");
        assert!(usage.is_empty());
    }

    #[test]
    fn done_sentinel_finishes_without_reason() {
        let provider = ProviderId::new("cerebras");
        let events = map_chunk_frame(&provider, &frame("[DONE]")).expect("map");
        assert_eq!(
            events,
            vec![ProviderEvent::Finished {
                finish_reason: None
            }]
        );
    }

    #[test]
    fn error_payload_becomes_provider_error() {
        let provider = ProviderId::new("cerebras");
        let err = map_chunk_frame(
            &provider,
            &frame(r#"{"error":{"message":"rate limited","type":"too_many_requests"}}"#),
        )
        .expect_err("should fail");
        assert_eq!(err.message(), "rate limited");
        assert!(matches!(err, ProviderError::Provider { .. }));
    }

    #[test]
    fn malformed_json_is_protocol_error() {
        let provider = ProviderId::new("cerebras");
        let err = map_chunk_frame(&provider, &frame("{not json")).expect_err("should fail");
        assert!(matches!(err, ProviderError::Protocol { .. }));
    }
}
