//! Common imports for typical harness usage.
pub use crate::{
    ChatMessage, ChatRole, ModelRef, ProviderAdapter, ProviderError, ProviderEvent, ProviderId,
    ProviderRequest, ProviderStreamHandle, SamplingConfig,
};
