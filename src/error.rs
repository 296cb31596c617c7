use thiserror::Error;

/// Failure of a checked lookup such as [`RobinHashMap::at`](crate::RobinHashMap::at).
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapError {
    #[error("key not found")]
    KeyNotFound,
}
