//! Cerebras inference integration.
//!
//! Cerebras exposes an OpenAI-compatible `chat/completions` endpoint, so the
//! adapter also works against any server speaking that protocol (set
//! `base_url` accordingly).
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::CerebrasProvider;
pub use config::{API_KEY_ENV, CerebrasConfig};
