//! Streaming response pipeline
//!
//! Graph steps flow through [`StreamBroker`], which holds each step one
//! behind so the true last one can be tagged final. Each step is handed to
//! [`EventNormalizer`], which extracts text, persists any artifacts in it and
//! wraps what survives as [`NormalizedEvent`]s. The broker yields
//! [`StreamFrame`]s and always ends with [`StreamFrame::Done`].

mod broker;
mod error;
mod event;
mod normalizer;

#[cfg(test)]
mod proptests;

#[allow(unused_imports)] // Public API re-exports
pub use broker::{collect_final, BrokerCore, BrokerPhase, BrokerRequest, FrameStream, StreamBroker};
pub use error::StreamError;
#[allow(unused_imports)]
pub use event::{EventKind, NormalizedEvent, StreamFrame};
#[allow(unused_imports)]
pub use normalizer::{DefaultHooks, EventNormalizer, ResponseHooks};
