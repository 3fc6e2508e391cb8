use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// Longest prompt accepted, in characters. Prior code is not counted.
pub const MAX_PROMPT_CHARS: usize = 16_000;

/// Inbound request for one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Missing on the wire is treated like blank and rejected by `validate`.
    #[serde(default)]
    pub prompt: String,
    /// Current component source, when the prompt asks for an edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_code: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            prior_code: None,
        }
    }

    /// Builds a follow-up request that edits `prior_code`.
    pub fn follow_up(prompt: impl Into<String>, prior_code: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            prior_code: Some(prior_code.into()),
        }
    }

    /// Prior code that is actually usable as context (blank counts as absent).
    pub fn prior_code(&self) -> Option<&str> {
        self.prior_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
    }

    pub fn is_follow_up(&self) -> bool {
        self.prior_code().is_some()
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::Validation("Prompt is required".into()));
        }
        let len = prompt.chars().count();
        if len > MAX_PROMPT_CHARS {
            return Err(GenerationError::Validation(format!(
                "Prompt is too long ({len} characters, limit {MAX_PROMPT_CHARS})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prompt_is_rejected() {
        for prompt in ["", "   ", "\n\t"] {
            assert!(matches!(
                GenerationRequest::new(prompt).validate(),
                Err(GenerationError::Validation(_))
            ));
        }
    }

    #[test]
    fn oversized_prompt_is_rejected_but_limit_is_inclusive() {
        let at_limit = "a".repeat(MAX_PROMPT_CHARS);
        assert!(GenerationRequest::new(at_limit).validate().is_ok());
        let over = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert!(GenerationRequest::new(over).validate().is_err());
    }

    #[test]
    fn blank_prior_code_is_not_a_follow_up() {
        assert!(!GenerationRequest::follow_up("make it blue", "  ").is_follow_up());
        assert!(GenerationRequest::follow_up("make it blue", "export default X;").is_follow_up());
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt":"p","priorCode":"c"}"#).expect("deserialize");
        assert_eq!(request.prior_code.as_deref(), Some("c"));
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt":"p"}"#).expect("deserialize");
        assert!(request.prior_code.is_none());
    }
}
