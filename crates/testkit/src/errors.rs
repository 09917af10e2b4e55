//! Test fixtures for shared error codes and envelopes.

use tagstream_shared::{ErrorCode, ErrorEnvelope, lock_poisoned_code};

/// Return a list of common error codes used in tests.
pub fn common_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::invalid_input(),
        ErrorCode::not_found(),
        ErrorCode::timeout(),
        ErrorCode::io(),
        ErrorCode::internal(),
        lock_poisoned_code(),
    ]
}

/// An invalid input error fixture.
pub fn invalid_input_error() -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::invalid_input(), "invalid input")
}

/// A poisoned-lock error fixture.
pub fn lock_poisoned_error() -> ErrorEnvelope {
    ErrorEnvelope::invariant(lock_poisoned_code(), "lock poisoned")
}
