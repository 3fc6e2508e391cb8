//! Preamble suppression for the live delta stream.
//!
//! A two-state filter: deltas are held back until a code-opening keyword
//! shows up, after which every delta is forwarded. The switch is one-way, so
//! a false trigger on prose (for example the word "const" in an explanation)
//! forwards some prose but never suppresses real code.
//!
//! Buffering the first N characters and classifying them in one pass would be
//! more accurate at the cost of latency before the first code event.

use crate::scan::first_code_token;

/// Append-only text received from the model during one generation.
#[derive(Debug, Default, Clone)]
pub struct AccumulatedText {
    buf: String,
}

impl AccumulatedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `delta` and returns the byte offset where it starts.
    pub fn push(&mut self, delta: &str) -> usize {
        let start = self.buf.len();
        self.buf.push_str(delta);
        start
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Preamble,
    Code,
}

#[derive(Debug, Default)]
pub struct PhaseFilter {
    phase: Phase,
}

impl PhaseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Decides what to forward for the delta that starts at `delta_start`
    /// in `text` and runs to its end.
    ///
    /// Returns `None` while still in the preamble. On the triggering delta
    /// the returned slice also includes the part of a keyword that arrived
    /// in earlier, suppressed deltas.
    pub fn admit<'a>(&mut self, text: &'a AccumulatedText, delta_start: usize) -> Option<&'a str> {
        let all = text.as_str();
        match self.phase {
            Phase::Code => Some(&all[delta_start..]),
            Phase::Preamble => {
                let token_at = first_code_token(all)?;
                self.phase = Phase::Code;
                Some(&all[token_at.min(delta_start)..])
            }
        }
    }
}
