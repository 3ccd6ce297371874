use alloc::string::String;

/// Errors surfaced to callers of the virtualizer.
///
/// Measurement problems are not errors: a missing estimate is logged and the configured default
/// size is used instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("position must be one of: start, center, end, nearest (got `{0}`)")]
    InvalidScrollPosition(String),

    /// The host factory could not build a slot. The index stays unassigned and is retried on
    /// the next tick.
    #[error("host failed to create a slot for index {index}: {message}")]
    SlotFactory { index: usize, message: String },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
