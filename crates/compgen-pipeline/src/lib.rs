//! Turns a prompt into a streamed, normalized React component.
//!
//! [`Generator`] drives one upstream completion and yields [`DeltaEvent`]s,
//! [`relay`] frames them for transport, and [`GenerationSession`] rebuilds
//! the live buffer on the receiving side. [`normalize`] is the pure cleanup
//! step applied to the model output before `complete` is emitted.

pub mod accumulator;
pub mod config;
pub mod driver;
pub mod errors;
pub mod event;
pub mod normalize;
pub mod observability;
pub mod phase;
pub mod prompt;
pub mod relay;
pub mod request;
mod scan;

pub use accumulator::{GenerationId, GenerationSession, SessionState};
pub use config::{AppConfig, ConfigError};
pub use driver::{AbortHandle, ExportPolicy, GenerationSettings, GenerationStream, Generator};
pub use errors::GenerationError;
pub use event::{DeltaEvent, Stage};
pub use normalize::{ExportStatus, NormalizedComponent, normalize};
pub use relay::{Frame, FrameDecoder, FrameError, RelayStream, pump, relay};
pub use request::GenerationRequest;
