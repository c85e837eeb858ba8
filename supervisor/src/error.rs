use thiserror::Error;

use crawler::error::QueueError;

/// Errors that tear the whole crawl down rather than being confined to a
/// single page.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("supervisor invariant violated: {0}")]
    Fatal(String),
}

impl SupervisorError {
    pub(crate) fn from_queue(err: QueueError) -> Self {
        SupervisorError::Fatal(format!("enqueueing discovered outlinks failed: {err}"))
    }
}
