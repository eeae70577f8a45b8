/// Caller-contract violations raised by [`crate::session::FilterSession`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("filter index {index} out of range (registry has {count} filters)")]
    InvalidIndex { index: isize, count: usize },
    #[error("no filter named {0:?}")]
    UnknownFilter(String),
    #[error("filter registry is empty")]
    EmptyRegistry,
}

/// Per-frame transform failures. These never leave the session: the frame
/// is passed through unmodified and the filter's history is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("algorithm unavailable: {0}")]
    Unavailable(String),
    #[error("tracking lost: {0}")]
    TrackingLost(String),
}
