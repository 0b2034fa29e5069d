//! Ways a response stream can end without a final answer

use super::event::{EventKind, NormalizedEvent};
use crate::graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The graph failed to start or failed mid-stream
    #[error("An error occurred: {0}")]
    Upstream(#[from] GraphError),
    /// The graph finished without producing a single step
    #[error("No response generated (no events emitted)")]
    Empty,
    /// The last step carried nothing to show
    #[error("No final response generated")]
    NoFinal,
    /// The blocking worker went away before terminating the stream
    #[error("Response worker stopped: {0}")]
    Worker(String),
    /// An error event read back off a frame stream
    #[error("{0}")]
    Reported(String),
}

impl StreamError {
    pub fn to_event(&self) -> NormalizedEvent {
        NormalizedEvent::new(EventKind::Error, self.to_string())
    }
}
