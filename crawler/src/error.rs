use thiserror::Error;
use url::Url;

/// Errors raised by [`crate::queue::PageQueue`] operations.
#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    /// `enqueue` was given a URL whose scheme is neither `http` nor `https`.
    /// The whole batch is rejected; nothing is enqueued.
    #[error("unsupported scheme in {0}")]
    InvalidScheme(Url),

    /// `enqueue` was given one or more URLs already present in the queued
    /// set, and `ignore_queued` was false.
    #[error("already queued: {0:?}")]
    AlreadyQueued(Vec<Url>),

    /// `dequeue` was called on an empty queue.
    #[error("queue is empty")]
    QueueEmpty,
}

/// Errors raised while fetching and parsing a single page.
#[derive(Debug, Error)]
#[error("crawl of {url} failed: {cause}")]
pub struct CrawlError {
    pub url: Url,
    pub cause: CrawlErrorCause,
}

#[derive(Debug, Error)]
pub enum CrawlErrorCause {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("retry-after header was not a valid delay: {0:?}")]
    InvalidRetryAfter(Option<String>),

    #[error("retry-after delay of {0:?} exceeds the maximum backoff")]
    RetryBudgetExhausted(std::time::Duration),

    #[error("response body could not be decoded as text")]
    Decoding,
}
