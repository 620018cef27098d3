//! Error taxonomy for map construction and mutation.

use thiserror::Error;

/// Errors surfaced by map construction and `insert`.
///
/// Placement exhaustion is recovered internally (stash, then re-seeded
/// rehash, then growth) and never appears here; once a map is constructed,
/// allocation failure is its only runtime failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("key size must be non-zero")]
    ZeroKeySize,

    #[error("value size must be non-zero")]
    ZeroValueSize,

    #[error("alignment {0} is not a power of two")]
    BadAlignment(usize),

    #[error("empty key rejected")]
    EmptyKey,

    #[error("empty value rejected")]
    EmptyValue,

    #[error("key of {got} bytes does not fit the configured {limit}-byte key")]
    KeySizeMismatch { got: usize, limit: usize },

    #[error("value of {got} bytes does not fit the configured {limit}-byte value")]
    ValueSizeMismatch { got: usize, limit: usize },

    #[error("allocation failed ({size} bytes, align {align})")]
    AllocationFailed { size: usize, align: usize },
}
