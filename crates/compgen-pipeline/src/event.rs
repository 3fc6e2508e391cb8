//! Progress events produced by the generation driver.

use serde::{Deserialize, Serialize};

/// Phase a `DeltaEvent` belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Status,
    Code,
    Error,
    Complete,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Complete)
    }
}

/// One progress event.
///
/// Zero or more `status`/`code` events precede exactly one terminal
/// `complete` or `error` event. `full_code` is set only on `complete`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub stage: Stage,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "fullCode", default, skip_serializing_if = "Option::is_none")]
    pub full_code: Option<String>,
}

impl DeltaEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Status,
            content: message.into(),
            full_code: None,
        }
    }

    pub fn code(fragment: impl Into<String>) -> Self {
        Self {
            stage: Stage::Code,
            content: fragment.into(),
            full_code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Error,
            content: message.into(),
            full_code: None,
        }
    }

    pub fn complete(full_code: impl Into<String>) -> Self {
        Self {
            stage: Stage::Complete,
            content: String::new(),
            full_code: Some(full_code.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}
