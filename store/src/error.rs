use thiserror::Error;

/// Error taxonomy for the index store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A contract violation into the store: bad positions, out-of-range
    /// `tf_normalized`, or oversize content. The containing transaction is
    /// rolled back.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A write lost a race with another write under an invariant the store
    /// enforces outside of plain mod-time guarding (reserved for future use;
    /// `index_page` itself never returns this, it returns `Ok(false)`
    /// instead).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying persistence backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),
}
