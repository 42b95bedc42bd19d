//! Error types for cache stores

/// Failure reported by a [`KeyValueStore`](crate::KeyValueStore)
///
/// The read-through cache never surfaces these to callers: a failing store
/// degrades to a cache miss.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::Unavailable("redis down".to_string());
        assert_eq!(err.to_string(), "store unavailable: redis down");
    }
}
