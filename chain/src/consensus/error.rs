use std::fmt;

use crate::storage::StorageError;

/// Error type returned when a block fails validation.
#[derive(Debug)]
pub enum ValidationError {
    /// Block is invalid according to a validity predicate.
    Invalid(&'static str),
    /// Block is invalid with a dynamic error message.
    Custom(String),
}

/// High-level errors surfaced by chain operations.
///
/// `Storage` and `Init` are fatal to the current operation (or instance)
/// and propagate upward; everything else is a local rejection that leaves
/// chain state unchanged.
#[derive(Debug)]
pub enum ChainError {
    /// Underlying store failure.
    Storage(StorageError),
    /// An encoded block could not be decoded.
    BlockDecode(String),
    /// Block-local validation failure.
    BlockInvalid(ValidationError),
    /// The block does not occupy the slot succeeding the head.
    SlotMismatch { expected: u64, got: u64 },
    /// The block does not link to the current head.
    PrevHashMismatch { expected: String, got: String },
    /// A judgment id in the block is already recorded on the chain.
    DuplicateJudgment(String),
    /// An attestation failed admission (bad linkage or signature).
    AttestationInvalid,
    /// The chain could not be initialized from its backing store.
    Init(String),
    /// Writing a chain export to disk failed.
    Export(String),
}

impl From<ValidationError> for ChainError {
    fn from(e: ValidationError) -> Self {
        ChainError::BlockInvalid(e)
    }
}

impl From<StorageError> for ChainError {
    fn from(e: StorageError) -> Self {
        ChainError::Storage(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Invalid(msg) => write!(f, "invalid block: {msg}"),
            ValidationError::Custom(msg) => write!(f, "invalid block: {msg}"),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Storage(e) => write!(f, "storage error: {e}"),
            ChainError::BlockDecode(msg) => write!(f, "block decode failed: {msg}"),
            ChainError::BlockInvalid(e) => write!(f, "{e}"),
            ChainError::SlotMismatch { expected, got } => {
                write!(f, "slot mismatch: expected {expected}, got {got}")
            }
            ChainError::PrevHashMismatch { expected, got } => {
                write!(f, "prev hash mismatch: expected {expected}, got {got}")
            }
            ChainError::DuplicateJudgment(id) => {
                write!(f, "judgment {id:?} already recorded on chain")
            }
            ChainError::AttestationInvalid => write!(f, "attestation rejected"),
            ChainError::Init(msg) => write!(f, "chain init failed: {msg}"),
            ChainError::Export(msg) => write!(f, "chain export failed: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_mismatch_message_names_the_slot() {
        let e = ChainError::SlotMismatch {
            expected: 2,
            got: 100,
        };
        assert!(e.to_string().contains("slot"));
        assert!(e.to_string().contains("100"));
    }

    #[test]
    fn storage_errors_convert() {
        let e: ChainError = StorageError::CorruptedMeta("chain record").into();
        assert!(matches!(e, ChainError::Storage(_)));
    }
}
