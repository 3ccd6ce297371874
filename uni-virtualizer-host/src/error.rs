use alloc::string::String;

/// Errors produced by the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The engine asked for an index past the end of the item list.
    #[error("no item at index {index} (items: {len})")]
    MissingItem { index: usize, len: usize },

    /// The caller's `render_item` function refused the item.
    #[error("render_item failed for index {index}: {message}")]
    Render { index: usize, message: String },

    #[error(transparent)]
    Engine(#[from] uni_virtualizer::Error),
}

pub type Result<T, E = HostError> = core::result::Result<T, E>;
