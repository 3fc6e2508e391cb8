//! Consumer-side view of a generation: a live buffer fed by relay frames.
//!
//! The buffer follows `code` deltas while a generation runs and is replaced
//! wholesale by `fullCode` when `complete` arrives. An `error` keeps whatever
//! partial text was received.

use compgen_harness::{ChatMessage, ChatRole};
use tracing::{debug, warn};

use crate::event::{DeltaEvent, Stage};
use crate::relay::{Frame, FrameDecoder, FrameError};
use crate::request::GenerationRequest;

const MISSING_TERMINAL: &str = "generation ended without a result";

/// Identifies one generation within a session. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenerationId(u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// The one live generation buffer of a client session.
#[derive(Debug, Default)]
pub struct GenerationSession {
    next_id: u64,
    current: Option<GenerationId>,
    state: SessionState,
    buffer: String,
    status: Option<String>,
    error: Option<String>,
    saw_end_marker: bool,
    history: Vec<ChatMessage>,
    decoder: FrameDecoder,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh generation; the previous buffer is discarded.
    pub fn begin(&mut self, prompt: impl Into<String>) -> (GenerationId, GenerationRequest) {
        let request = GenerationRequest::new(prompt);
        (self.start(&request), request)
    }

    /// Starts an edit of the current buffer.
    ///
    /// Falls back to [`GenerationSession::begin`] when there is no finished
    /// component to edit.
    pub fn begin_follow_up(
        &mut self,
        prompt: impl Into<String>,
    ) -> (GenerationId, GenerationRequest) {
        let request = if self.can_follow_up() {
            GenerationRequest::follow_up(prompt, self.buffer.clone())
        } else {
            GenerationRequest::new(prompt)
        };
        (self.start(&request), request)
    }

    fn start(&mut self, request: &GenerationRequest) -> GenerationId {
        let id = GenerationId(self.next_id);
        self.next_id += 1;
        self.current = Some(id);
        self.state = SessionState::Streaming;
        self.buffer.clear();
        self.status = None;
        self.error = None;
        self.saw_end_marker = false;
        self.decoder = FrameDecoder::new();
        self.history.push(ChatMessage::user(request.prompt.clone()));
        debug!(generation = id.0, follow_up = request.is_follow_up(), "session generation started");
        id
    }

    /// Applies one event. Returns `false` when it was ignored because `id`
    /// is stale or the generation already ended.
    pub fn apply(&mut self, id: GenerationId, event: DeltaEvent) -> bool {
        if self.current != Some(id) || self.state != SessionState::Streaming {
            return false;
        }
        match event.stage {
            Stage::Status => self.status = Some(event.content),
            Stage::Code => self.buffer.push_str(&event.content),
            Stage::Complete => {
                if let Some(full_code) = event.full_code {
                    self.buffer = full_code;
                }
                self.state = SessionState::Completed;
                self.history.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: self.buffer.clone(),
                });
            }
            Stage::Error => {
                warn!(generation = id.0, error = %event.content, "generation failed");
                self.error = Some(event.content);
                self.state = SessionState::Failed;
            }
        }
        true
    }

    pub fn apply_frame(&mut self, id: GenerationId, frame: Frame) -> bool {
        match frame {
            Frame::Event(event) => self.apply(id, event),
            Frame::End => {
                if self.current != Some(id) {
                    return false;
                }
                self.saw_end_marker = true;
                if self.state == SessionState::Streaming {
                    self.error = Some(MISSING_TERMINAL.to_string());
                    self.state = SessionState::Failed;
                }
                true
            }
        }
    }

    /// Decodes raw relay bytes and applies every completed frame.
    ///
    /// Returns how many frames were applied; bytes for a stale `id` are
    /// dropped without decoding.
    pub fn feed(&mut self, id: GenerationId, chunk: &[u8]) -> Result<usize, FrameError> {
        if self.current != Some(id) {
            return Ok(0);
        }
        let frames = self.decoder.push(chunk)?;
        Ok(frames
            .into_iter()
            .map(|frame| self.apply_frame(id, frame))
            .filter(|applied| *applied)
            .count())
    }

    /// Drops the buffer, history and current generation.
    pub fn reset(&mut self) {
        *self = Self {
            next_id: self.next_id,
            ..Self::default()
        };
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn saw_end_marker(&self) -> bool {
        self.saw_end_marker
    }

    pub fn current_id(&self) -> Option<GenerationId> {
        self.current
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// True once a generation has completed and its code is still shown.
    pub fn can_follow_up(&self) -> bool {
        self.state == SessionState::Completed
            && !self.buffer.trim().is_empty()
            && self
                .history
                .last()
                .is_some_and(|turn| turn.role == ChatRole::Assistant)
    }
}
