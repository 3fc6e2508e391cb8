//! The generation driver: one upstream request in, one ordered sequence of
//! `DeltaEvent`s out.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use compgen_harness::vendors::cerebras::{API_KEY_ENV, CerebrasConfig, CerebrasProvider};
use compgen_harness::{ModelRef, ProviderAdapter, ProviderEvent, ProviderRequest, SamplingConfig};
use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument as _, debug, error, info, info_span, warn};

use crate::config::AppConfig;
use crate::errors::GenerationError;
use crate::event::DeltaEvent;
use crate::normalize::{ExportStatus, normalize};
use crate::phase::{AccumulatedText, PhaseFilter};
use crate::prompt::compose_messages;
use crate::request::GenerationRequest;

const PROVIDER_NAME: &str = "cerebras";

/// Shown when the API key is missing. Never reaches the network.
pub fn missing_credentials_message() -> String {
    format!("{API_KEY_ENV} is not configured. Please add it to your environment or .env file.")
}

/// What to do when normalization cannot produce a default export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportPolicy {
    /// Emit a `status` warning and complete anyway.
    #[default]
    Lenient,
    /// End the generation with an `error` event.
    Strict,
}

/// Fixed per-process generation parameters; callers cannot change them.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub model: ModelRef,
    pub sampling: SamplingConfig,
    pub timeout: Option<Duration>,
    pub export_policy: ExportPolicy,
    /// Bounded event buffer between the driver task and its consumer.
    pub stream_buffer_capacity: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: ModelRef::new(PROVIDER_NAME, crate::config::DEFAULT_MODEL),
            sampling: SamplingConfig::default(),
            timeout: None,
            export_policy: ExportPolicy::Lenient,
            stream_buffer_capacity: 128,
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: ModelRef::new(PROVIDER_NAME, config.model.clone()),
            timeout: Some(config.timeout),
            export_policy: if config.strict_export {
                ExportPolicy::Strict
            } else {
                ExportPolicy::Lenient
            },
            ..Self::default()
        }
    }
}

#[derive(Clone)]
enum Upstream {
    Ready(Arc<dyn ProviderAdapter>),
    Unconfigured(String),
}

/// Starts generations against one upstream provider.
#[derive(Clone)]
pub struct Generator {
    upstream: Upstream,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(provider: Arc<dyn ProviderAdapter>, settings: GenerationSettings) -> Self {
        Self {
            upstream: Upstream::Ready(provider),
            settings,
        }
    }

    /// A generator whose every generation ends with a configuration error.
    pub fn unconfigured(message: impl Into<String>, settings: GenerationSettings) -> Self {
        Self {
            upstream: Upstream::Unconfigured(message.into()),
            settings,
        }
    }

    /// Builds the Cerebras-backed generator described by `config`.
    ///
    /// Missing credentials do not fail here; they surface as an `error`
    /// event when a generation is attempted.
    pub fn from_config(config: &AppConfig) -> Self {
        let settings = GenerationSettings::from_config(config);
        let Some(api_key) = config.api_key.clone() else {
            return Self::unconfigured(missing_credentials_message(), settings);
        };
        let mut client_config = CerebrasConfig::new(api_key).timeout(config.timeout);
        if let Some(base_url) = &config.base_url {
            client_config = client_config.base_url(base_url.clone());
        }
        match CerebrasProvider::new(client_config) {
            Ok(provider) => Self::new(Arc::new(provider), settings),
            Err(err) => Self::unconfigured(err.message().to_string(), settings),
        }
    }

    /// Starts one generation.
    ///
    /// Validation and configuration failures produce a single `error` event
    /// without contacting the model service. Otherwise the upstream request
    /// runs on a spawned task, so this must be called within a Tokio runtime.
    /// Each call issues a new upstream request; nothing is retried.
    pub fn generate(&self, request: GenerationRequest) -> GenerationStream {
        let request_id = uuid::Uuid::new_v4();
        let capacity = self.settings.stream_buffer_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (abort_tx, abort_rx) = watch::channel(false);
        let stream = GenerationStream {
            request_id,
            rx,
            abort: AbortHandle { tx: abort_tx },
            saw_terminal: false,
        };

        let rejection = match (&self.upstream, request.validate()) {
            (_, Err(err)) => Some(err),
            (Upstream::Unconfigured(message), Ok(())) => {
                Some(GenerationError::Configuration(message.clone()))
            }
            (Upstream::Ready(_), Ok(())) => None,
        };
        if let Some(err) = rejection {
            warn!(%request_id, kind = err.kind(), "generation rejected before upstream call");
            // Fresh channel with capacity >= 1, so this cannot be full.
            let _ = tx.try_send(DeltaEvent::error(err.to_string()));
            return stream;
        }
        let Upstream::Ready(provider) = &self.upstream else {
            return stream;
        };

        let follow_up = request.is_follow_up();
        let mut provider_request = ProviderRequest::new(
            self.settings.model.clone(),
            compose_messages(&request),
        )
        .with_sampling(self.settings.sampling.clone());
        provider_request.request_id = request_id;
        provider_request.timeout = self.settings.timeout;

        let span = info_span!("generation", %request_id, follow_up, model = %self.settings.model.model);
        tokio::spawn(
            drive(
                provider.clone(),
                provider_request,
                follow_up,
                self.settings.export_policy,
                tx,
                abort_rx,
            )
            .instrument(span),
        );
        stream
    }
}

/// Cancels a running generation.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The driver checks before each upstream delta; already-emitted events
    /// are not retracted. The sequence then ends with an `error` event.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Consumer side of one generation.
///
/// Finite and not restartable. Dropping it stops the driver.
pub struct GenerationStream {
    request_id: uuid::Uuid,
    rx: mpsc::Receiver<DeltaEvent>,
    abort: AbortHandle,
    saw_terminal: bool,
}

impl GenerationStream {
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Whether the terminal event has been received.
    pub fn saw_terminal(&self) -> bool {
        self.saw_terminal
    }

    /// Waits for the next event; `None` once the sequence has ended.
    pub async fn next_event(&mut self) -> Option<DeltaEvent> {
        if self.saw_terminal {
            return None;
        }
        let event = self.rx.recv().await;
        self.observe(event.as_ref());
        event
    }

    /// Drains the remaining events.
    pub async fn collect_events(mut self) -> Vec<DeltaEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// A stream fed directly by `rx`, with no driver task behind it.
    #[cfg(test)]
    pub(crate) fn detached(rx: mpsc::Receiver<DeltaEvent>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            request_id: uuid::Uuid::new_v4(),
            rx,
            abort: AbortHandle { tx },
            saw_terminal: false,
        }
    }

    fn observe(&mut self, event: Option<&DeltaEvent>) {
        if event.is_some_and(DeltaEvent::is_terminal) {
            self.saw_terminal = true;
        }
    }
}

impl futures::Stream for GenerationStream {
    type Item = DeltaEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.saw_terminal {
            return Poll::Ready(None);
        }
        let polled = self.rx.poll_recv(cx);
        if let Poll::Ready(event) = &polled {
            self.observe(event.as_ref());
        }
        polled
    }
}

async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped without aborting; only the consumer going away
            // can end the run now, and that is watched separately.
            std::future::pending::<()>().await;
        }
    }
}

async fn drive(
    provider: Arc<dyn ProviderAdapter>,
    request: ProviderRequest,
    follow_up: bool,
    export_policy: ExportPolicy,
    tx: mpsc::Sender<DeltaEvent>,
    mut abort_rx: watch::Receiver<bool>,
) {
    info!(provider = %provider.id(), "generation started");
    let status = if follow_up {
        "Updating your component..."
    } else {
        "Generating your component..."
    };
    if tx.send(DeltaEvent::status(status)).await.is_err() {
        return;
    }

    let started = tokio::select! {
        biased;
        _ = aborted(&mut abort_rx) => {
            cancel(&tx).await;
            return;
        }
        _ = tx.closed() => return,
        started = provider.start_stream(request) => started,
    };
    let mut handle = match started {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "model service rejected the request");
            let _ = tx
                .send(DeltaEvent::error(GenerationError::from(err).to_string()))
                .await;
            return;
        }
    };

    let mut text = AccumulatedText::new();
    let mut filter = PhaseFilter::new();
    let mut seq = 0_u64;
    let finish_reason = loop {
        tokio::select! {
            biased;
            _ = aborted(&mut abort_rx) => {
                cancel(&tx).await;
                return;
            }
            _ = tx.closed() => {
                warn!("consumer went away, dropping upstream stream");
                return;
            }
            next = handle.stream.next() => match next {
                Some(Ok(ProviderEvent::TextDelta { text: delta })) => {
                    if delta.is_empty() {
                        continue;
                    }
                    let start = text.push(&delta);
                    debug!(seq, bytes = delta.len(), "model delta");
                    seq = seq.saturating_add(1);
                    if let Some(forward) = filter.admit(&text, start)
                        && tx.send(DeltaEvent::code(forward)).await.is_err()
                    {
                        return;
                    }
                }
                Some(Ok(ProviderEvent::Finished { finish_reason })) => break finish_reason,
                Some(Err(err)) => {
                    error!(error = %err, deltas = seq, "model stream failed");
                    let _ = tx
                        .send(DeltaEvent::error(GenerationError::from(err).to_string()))
                        .await;
                    return;
                }
                None => break None,
            }
        }
    };
    drop(handle);

    let terminal = match normalize(text.as_str()) {
        Ok(component) => match (component.export(), export_policy) {
            (ExportStatus::Missing, ExportPolicy::Strict) => {
                warn!("no default export could be synthesized");
                DeltaEvent::error(GenerationError::ExportMissing.to_string())
            }
            (ExportStatus::Missing, ExportPolicy::Lenient) => {
                warn!("no default export could be synthesized; completing anyway");
                if tx
                    .send(DeltaEvent::status(format!(
                        "warning: {}",
                        GenerationError::ExportMissing
                    )))
                    .await
                    .is_err()
                {
                    return;
                }
                DeltaEvent::complete(component.into_code())
            }
            (export, _) => {
                info!(
                    deltas = seq,
                    raw_bytes = text.len(),
                    finish_reason = finish_reason.as_deref().unwrap_or("closed"),
                    synthesized_export = matches!(export, ExportStatus::Synthesized(_)),
                    "generation complete"
                );
                DeltaEvent::complete(component.into_code())
            }
        },
        Err(err) => {
            warn!(kind = err.kind(), raw_bytes = text.len(), "normalization failed");
            DeltaEvent::error(err.to_string())
        }
    };
    let _ = tx.send(terminal).await;
}

async fn cancel(tx: &mpsc::Sender<DeltaEvent>) {
    warn!("generation cancelled");
    let _ = tx
        .send(DeltaEvent::error(GenerationError::Cancelled.to_string()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Stage;
    use compgen_harness::{ProviderError, ScriptedBehavior, ScriptedProvider};
    use futures::StreamExt as _;

    const BUTTON_DELTAS: [&str; 5] = [
        "Sure! ",
        "```tsx\n",
        "import React from 'react';\n\n",
        "export default function Btn() {\n  return <button style={{ color: '#fff' }}>Go</button>;\n}\n",
        "```",
    ];

    fn generator(provider: Arc<ScriptedProvider>) -> Generator {
        Generator::new(provider, GenerationSettings::default())
    }

    fn stages(events: &[DeltaEvent]) -> Vec<Stage> {
        events.iter().map(|e| e.stage).collect()
    }

    fn code_concat(events: &[DeltaEvent]) -> String {
        events
            .iter()
            .filter(|e| e.stage == Stage::Code)
            .map(|e| e.content.as_str())
            .collect()
    }

    #[tokio::test]
    async fn empty_prompt_yields_single_error_without_upstream_call() {
        let provider = Arc::new(ScriptedProvider::from_deltas(BUTTON_DELTAS));
        let events = generator(provider.clone())
            .generate(GenerationRequest::new("   "))
            .collect_events()
            .await;
        assert_eq!(events, vec![DeltaEvent::error("Prompt is required")]);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_yield_actionable_error_without_network() {
        let config = AppConfig::default();
        let events = Generator::from_config(&config)
            .generate(GenerationRequest::new("button"))
            .collect_events()
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage, Stage::Error);
        assert!(events[0].content.contains("CEREBRAS_API_KEY"));
    }

    #[tokio::test]
    async fn preamble_is_suppressed_and_complete_carries_normalized_code() {
        let provider = Arc::new(ScriptedProvider::from_deltas(BUTTON_DELTAS));
        let events = generator(provider.clone())
            .generate(GenerationRequest::new("button"))
            .collect_events()
            .await;

        assert_eq!(
            stages(&events),
            vec![Stage::Status, Stage::Code, Stage::Code, Stage::Code, Stage::Complete]
        );
        assert_eq!(events[0].content, "Generating your component...");
        assert_eq!(events[1].content, "import React from 'react';\n\n");
        assert!(!code_concat(&events).contains("Sure!"));

        let full = events[4].full_code.as_deref().expect("full code");
        assert!(full.starts_with("import React"));
        assert!(!full.contains('`'));
        assert!(full.ends_with('}'));
        assert_ne!(full, code_concat(&events));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn follow_up_sends_prior_code_and_reports_update_status() {
        let prior = "import React from 'react';\nexport default function Old() { return null; }";
        let provider = Arc::new(ScriptedProvider::from_deltas(BUTTON_DELTAS));
        let events = generator(provider.clone())
            .generate(GenerationRequest::follow_up("make it blue", prior))
            .collect_events()
            .await;
        assert_eq!(events[0].content, "Updating your component...");

        let request = provider.last_request().expect("request recorded");
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[1].content.contains(prior));
        assert_eq!(request.sampling, SamplingConfig::default());
    }

    #[tokio::test]
    async fn upstream_failure_mid_stream_ends_with_error_after_partial_code() {
        let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::Events(vec![
            Ok(ProviderEvent::TextDelta {
                text: "import React from 'react';\n".into(),
            }),
            Err(ProviderError::transport("scripted", "connection reset")),
        ])));
        let events = generator(provider)
            .generate(GenerationRequest::new("button"))
            .collect_events()
            .await;
        assert_eq!(stages(&events), vec![Stage::Status, Stage::Code, Stage::Error]);
        assert_eq!(events[2].content, "model service error: connection reset");
    }

    #[tokio::test]
    async fn start_failure_is_reported_once() {
        let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::FailOnStart(
            ProviderError::provider("scripted", "invalid api key", Some(401)),
        )));
        let events = generator(provider.clone())
            .generate(GenerationRequest::new("button"))
            .collect_events()
            .await;
        assert_eq!(stages(&events), vec![Stage::Status, Stage::Error]);
        assert!(events[1].content.contains("invalid api key"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_forwarding_and_ends_with_error() {
        let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::EventsThenPending(
            vec![Ok(ProviderEvent::TextDelta {
                text: "import React from 'react';\n".into(),
            })],
        )));
        let mut stream = generator(provider).generate(GenerationRequest::follow_up(
            "add a counter",
            "export default function App() { return null; }",
        ));
        let abort = stream.abort_handle();

        let mut seen = Vec::new();
        while let Some(event) = stream.next_event().await {
            let is_code = event.stage == Stage::Code;
            seen.push(event);
            if is_code {
                abort.abort();
            }
        }
        assert!(abort.is_aborted());
        assert_eq!(stages(&seen), vec![Stage::Status, Stage::Code, Stage::Error]);
        assert_eq!(seen[2].content, "generation cancelled");
        assert!(stream.saw_terminal());
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn too_short_output_is_an_error_not_a_blank_success() {
        let provider = Arc::new(ScriptedProvider::from_deltas(["const x = 1;"]));
        let events = generator(provider)
            .generate(GenerationRequest::new("button"))
            .collect_events()
            .await;
        let last = events.last().expect("terminal");
        assert_eq!(last.stage, Stage::Error);
        assert_eq!(last.content, GenerationError::EmptyOutput.to_string());
    }

    #[tokio::test]
    async fn clean_close_without_finish_reason_completes() {
        let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::Events(vec![Ok(
            ProviderEvent::TextDelta {
                text: "import React from 'react';\n\nfunction Card() {\n  return <div>card</div>;\n}"
                    .into(),
            },
        )])));
        let events = generator(provider)
            .generate(GenerationRequest::new("card"))
            .collect_events()
            .await;
        let last = events.last().expect("terminal");
        assert_eq!(last.stage, Stage::Complete);
        assert!(
            last.full_code
                .as_deref()
                .is_some_and(|code| code.ends_with("export default Card;"))
        );
    }

    #[tokio::test]
    async fn export_policy_decides_missing_export_outcome() {
        let raw = "import React from 'react';\n\nconst render = () => <div>lowercase only</div>;";

        let lenient = Generator::new(
            Arc::new(ScriptedProvider::from_deltas([raw])),
            GenerationSettings::default(),
        )
        .generate(GenerationRequest::new("card"))
        .collect_events()
        .await;
        assert_eq!(
            stages(&lenient),
            vec![Stage::Status, Stage::Code, Stage::Status, Stage::Complete]
        );
        assert!(lenient[2].content.starts_with("warning:"));

        let strict = Generator::new(
            Arc::new(ScriptedProvider::from_deltas([raw])),
            GenerationSettings {
                export_policy: ExportPolicy::Strict,
                ..GenerationSettings::default()
            },
        )
        .generate(GenerationRequest::new("card"))
        .collect_events()
        .await;
        assert_eq!(stages(&strict), vec![Stage::Status, Stage::Code, Stage::Error]);
        assert_eq!(strict[2].content, GenerationError::ExportMissing.to_string());
    }

    #[tokio::test]
    async fn stream_impl_yields_same_sequence() {
        let provider = Arc::new(ScriptedProvider::from_deltas(BUTTON_DELTAS));
        let events: Vec<DeltaEvent> = generator(provider)
            .generate(GenerationRequest::new("button"))
            .collect()
            .await;
        assert_eq!(events.first().map(|e| e.stage), Some(Stage::Status));
        assert_eq!(events.last().map(|e| e.stage), Some(Stage::Complete));
    }
}
