use compgen_harness::ProviderError;

/// Every way a generation can end without a usable component.
///
/// `Validation` and `Configuration` are raised before any upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The request itself is unusable (empty or oversized prompt).
    #[error("{0}")]
    Validation(String),
    /// Upstream credentials or settings are missing.
    #[error("{0}")]
    Configuration(String),
    /// The model service failed mid-request.
    #[error("model service error: {0}")]
    Upstream(String),
    /// Normalization left nothing that looks like a component.
    #[error("generated code is too short or invalid")]
    EmptyOutput,
    /// No default export exists and no component name could be found.
    #[error("generated code has no default export and no component name to export")]
    ExportMissing,
    /// The caller cancelled the generation.
    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Short machine-friendly label, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::Upstream(_) => "upstream",
            Self::EmptyOutput => "empty_output",
            Self::ExportMissing => "export_missing",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Config { message, .. } => Self::Configuration(message),
            other => Self::Upstream(other.message().to_string()),
        }
    }
}
