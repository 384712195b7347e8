use thiserror::Error;

/// Core error types for the strongbox toolkit
#[derive(Debug, Error)]
pub enum StrongboxError {
    /// Malformed or out-of-range caller input (key sizes, nonce lengths,
    /// parameter combinations, characters outside a codec alphabet)
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Data integrity failure detected while decoding or verifying
    /// (authentication tag mismatch, malformed envelope)
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Internal invariant violated; indicates a defect, not bad input
    #[error("Bug: {0}")]
    Bug(String),

    /// Operation requested before a precondition is satisfied
    /// (the random generator has not been seeded)
    #[error("Not ready: {0}")]
    NotReady(String),
}

pub type Result<T> = std::result::Result<T, StrongboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = StrongboxError::Invalid("aes key must be 4, 6 or 8 words".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid input: aes key must be 4, 6 or 8 words"
        );

        let err = StrongboxError::Corrupt("ccm: tag doesn't match".to_string());
        assert_eq!(format!("{}", err), "Corrupt data: ccm: tag doesn't match");
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_err<E: std::error::Error>() {}
        assert_err::<StrongboxError>();
    }
}
