//! Streaming chat-completion client used by the component generator.
//!
//! The crate only knows how to turn a list of chat messages plus a fixed
//! sampling configuration into an ordered stream of text deltas that ends
//! with a finish signal. Everything that interprets those deltas lives in
//! `compgen-pipeline`.
//!
//! ```no_run
//! use compgen_harness::prelude::*;
//! use compgen_harness::vendors::cerebras::CerebrasProvider;
//! use futures::StreamExt as _;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = CerebrasProvider::from_env()?;
//! let request = ProviderRequest::new(
//!     ModelRef::new("cerebras", "llama3.1-8b"),
//!     vec![ChatMessage::user("A red button")],
//! );
//! let mut handle = provider.start_stream(request).await?;
//! while let Some(event) = handle.stream.next().await {
//!     if let ProviderEvent::TextDelta { text } = event? {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Provider error type.
pub mod errors;
/// Provider identifiers, chat messages and sampling settings.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Provider adapter contract.
pub mod provider;
/// Deterministic provider that replays scripted events.
pub mod scripted;
/// Incremental server-sent-events decoding.
pub mod sse;
/// Vendor-specific integrations.
pub mod vendors;

pub use errors::ProviderError;
pub use model::{ChatMessage, ChatRole, ModelRef, ProviderId, SamplingConfig};
pub use provider::{ProviderAdapter, ProviderEvent, ProviderRequest, ProviderStreamHandle};
pub use scripted::{ScriptedBehavior, ScriptedProvider};
pub use sse::{SseDecoder, SseFrame};
