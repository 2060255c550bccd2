//! Cycle-level errors

use thiserror::Error;

use tally_core::{CodecError, Digest};
use tally_store::StoreError;

use crate::producer::CyclePhase;

/// Failures that abort a production cycle.
///
/// Per-transaction validation failures never appear here; those mark the
/// transaction failed and the cycle continues. A cycle aborts only when
/// the chain itself is unusable (`MissingGenesis`), the store breaks, or
/// another producer won the tip race (`Conflict`, retryable).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store holds no blocks; seed genesis before producing.
    #[error("no genesis block; seed the chain before producing")]
    MissingGenesis,

    /// Another producer extended the chain while this cycle ran. The
    /// cycle wrote nothing and may simply be retried.
    #[error("chain tip moved during the cycle: block links {expected}, store tip is {found:?}")]
    Conflict {
        /// Tip hash the cycle built against.
        expected: Digest,
        /// Tip hash the store reported at commit time, if any.
        found: Option<Digest>,
    },

    /// The store failed during the named phase.
    #[error("store failure during {phase}: {source}")]
    Store {
        /// Phase the cycle was in when the store failed.
        phase: CyclePhase,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// Canonical encoding failed during the named phase, while hashing
    /// the block or the state root.
    #[error("encoding failure during {phase}: {source}")]
    Codec {
        /// Phase the cycle was in when encoding failed.
        phase: CyclePhase,
        /// Underlying encoding error.
        #[source]
        source: CodecError,
    },
}

impl EngineError {
    /// Wrap a store error with the phase it interrupted, promoting tip
    /// mismatches to [`EngineError::Conflict`].
    pub fn store(phase: CyclePhase, source: StoreError) -> Self {
        match source {
            StoreError::TipMismatch { expected, found } => Self::Conflict { expected, found },
            source => Self::Store { phase, source },
        }
    }

    /// Wrap an encoding error with the phase it interrupted.
    pub fn codec(phase: CyclePhase, source: CodecError) -> Self {
        Self::Codec { phase, source }
    }

    /// Whether retrying the cycle could succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn tip_mismatch_promotes_to_conflict() {
        let err = EngineError::store(
            CyclePhase::Commit,
            StoreError::TipMismatch {
                expected: Digest::ZERO,
                found: None,
            },
        );
        assert_matches!(err, EngineError::Conflict { .. });
        assert!(err.is_retryable());

        let err = EngineError::store(
            CyclePhase::Commit,
            StoreError::DuplicateBlock { height: 3 },
        );
        assert_matches!(
            err,
            EngineError::Store {
                phase: CyclePhase::Commit,
                ..
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn codec_failures_carry_the_phase() {
        let err = EngineError::codec(CyclePhase::Link, CodecError::encoding("no json form"));
        assert_matches!(
            err,
            EngineError::Codec {
                phase: CyclePhase::Link,
                ..
            }
        );
        assert_eq!(
            err.to_string(),
            "encoding failure during link: canonical encoding failed: no json form"
        );
        assert!(!err.is_retryable());
    }
}
