use std::collections::{HashSet, VecDeque};

use url::Url;

use crate::error::QueueError;

/// Ordered FIFO queue of pending URLs, paired with a set of URLs that have
/// ever been enqueued. A URL is enqueued at most once unless explicitly
/// [`PageQueue::reset`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageQueue {
    queue: VecDeque<Url>,
    queued: HashSet<Url>,
}

impl PageQueue {
    pub fn new() -> Self {
        PageQueue::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.queued.contains(url)
    }

    /// Enqueue `urls`. Validates every scheme before mutating anything: on
    /// any unsupported scheme, or (unless `ignore_queued`) any URL already in
    /// the queued set, no URL is enqueued.
    ///
    /// `before = true` prepends the batch (preserving input order), used to
    /// restore work that was cancelled mid-flight. `before = false` appends,
    /// the ordinary case for newly-discovered outlinks.
    pub fn enqueue(
        &mut self,
        urls: Vec<Url>,
        before: bool,
        ignore_queued: bool,
    ) -> Result<(), QueueError> {
        for url in &urls {
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(QueueError::InvalidScheme(url.clone()));
            }
        }

        if !ignore_queued {
            let duplicates: Vec<Url> =
                urls.iter().filter(|url| self.queued.contains(*url)).cloned().collect();
            if !duplicates.is_empty() {
                return Err(QueueError::AlreadyQueued(duplicates));
            }
        }

        let fresh: Vec<Url> = urls.into_iter().filter(|url| !self.queued.contains(url)).collect();

        for url in &fresh {
            self.queued.insert(url.clone());
        }

        if before {
            for url in fresh.into_iter().rev() {
                self.queue.push_front(url);
            }
        } else {
            self.queue.extend(fresh);
        }

        Ok(())
    }

    /// Remove `urls` from the queued set so they may be enqueued again.
    pub fn reset(&mut self, urls: &[Url]) {
        for url in urls {
            self.queued.remove(url);
        }
    }

    /// Pop the front of the queue. Does **not** remove the URL from the
    /// queued set — the "already enqueued" guard survives dequeue.
    pub fn dequeue(&mut self) -> Result<Url, QueueError> {
        self.queue.pop_front().ok_or(QueueError::QueueEmpty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn enqueue_then_dequeue_preserves_order() {
        let mut queue = PageQueue::new();
        queue
            .enqueue(vec![url("https://a.com"), url("https://b.com")], false, false)
            .unwrap();

        assert_eq!(queue.dequeue().unwrap(), url("https://a.com"));
        assert_eq!(queue.dequeue().unwrap(), url("https://b.com"));
        assert_eq!(queue.dequeue(), Err(QueueError::QueueEmpty));
    }

    #[test]
    fn enqueue_rejects_unsupported_scheme_atomically() {
        let mut queue = PageQueue::new();
        let err = queue
            .enqueue(vec![url("https://a.com"), url("ftp://b.com")], false, false)
            .unwrap_err();

        assert_eq!(err, QueueError::InvalidScheme(url("ftp://b.com")));
        assert!(queue.is_empty());
        assert!(!queue.contains(&url("https://a.com")));
    }

    #[test]
    fn enqueue_rejects_duplicates_unless_ignored() {
        let mut queue = PageQueue::new();
        queue.enqueue(vec![url("https://a.com")], false, false).unwrap();

        let err = queue.enqueue(vec![url("https://a.com")], false, false).unwrap_err();
        assert_eq!(err, QueueError::AlreadyQueued(vec![url("https://a.com")]));

        queue.enqueue(vec![url("https://a.com")], false, true).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dequeue_keeps_queued_membership() {
        let mut queue = PageQueue::new();
        queue.enqueue(vec![url("https://a.com")], false, false).unwrap();
        queue.dequeue().unwrap();

        assert!(queue.contains(&url("https://a.com")));
        assert!(queue.enqueue(vec![url("https://a.com")], false, false).is_err());
    }

    #[test]
    fn before_prepends_preserving_input_order() {
        let mut queue = PageQueue::new();
        queue.enqueue(vec![url("https://c.com")], false, false).unwrap();
        queue
            .enqueue(vec![url("https://a.com"), url("https://b.com")], true, true)
            .unwrap();

        assert_eq!(queue.dequeue().unwrap(), url("https://a.com"));
        assert_eq!(queue.dequeue().unwrap(), url("https://b.com"));
        assert_eq!(queue.dequeue().unwrap(), url("https://c.com"));
    }

    #[test]
    fn reset_allows_requeueing() {
        let mut queue = PageQueue::new();
        queue.enqueue(vec![url("https://a.com")], false, false).unwrap();
        queue.dequeue().unwrap();
        queue.reset(&[url("https://a.com")]);

        assert!(queue.enqueue(vec![url("https://a.com")], false, false).is_ok());
    }
}
