//! Configuration-time error type.

use aes_core::CipherMode;
use thiserror::Error;

/// Rejected parameter combinations.
///
/// Every variant is raised while building a [`crate::CorePlan`]; the clocked
/// model itself has no recoverable error path.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The unit chain cannot be empty.
    #[error("at least one physical round unit is required")]
    NoRoundUnits,
    /// More units than logical rounds can never all be reached.
    #[error("{units} round units exceed the {rounds} logical rounds the mode policy allows")]
    TooManyRoundUnits {
        /// Requested physical-unit count.
        units: usize,
        /// Largest round count the policy covers.
        rounds: usize,
    },
    /// The pipe-stage mask selects registers that do not exist.
    #[error("pipe stage mask {mask:#05b} is out of range (0..=0b111)")]
    PipeMaskOutOfRange {
        /// Offending mask.
        mask: u8,
    },
    /// The pipe depth exceeds the three optional registers.
    #[error("pipe depth {depth} is out of range (0..=3)")]
    PipeDepthOutOfRange {
        /// Offending depth.
        depth: usize,
    },
    /// A preloaded key table only fits a statically fixed mode.
    #[error("a precomputed key table requires a statically fixed cipher mode")]
    PrecomputedNeedsFixedMode,
    /// The half-size preset depends on a concrete round count.
    #[error("size preset M requires a statically fixed cipher mode")]
    SizePresetNeedsFixedMode,
    /// A mode was selected that the configured policy does not cover.
    #[error("mode {requested:?} is outside the configured mode policy")]
    ModeNotCovered {
        /// The rejected mode.
        requested: CipherMode,
    },
}
