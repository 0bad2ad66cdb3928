//! Error types for BGS core types

use thiserror::Error;

/// Errors raised when building an identity from untrusted input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} is {len} bytes long, at most {max} allowed")]
    TooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{kind} contains a control character")]
    ControlCharacter { kind: &'static str },
}
