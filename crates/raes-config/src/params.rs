//! User-facing core parameters and their validation entry point.

use aes_core::CipherMode;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plan::CorePlan;

/// Which cipher modes a configured core can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModePolicy {
    /// One mode, fixed at configuration time.
    Fixed(CipherMode),
    /// Mode selectable at run time between blocks; the chain is sized for
    /// the largest mode.
    Any,
}

impl ModePolicy {
    /// Modes the policy covers, smallest key first.
    pub fn modes(&self) -> &[CipherMode] {
        match self {
            ModePolicy::Fixed(CipherMode::Aes128) => &[CipherMode::Aes128],
            ModePolicy::Fixed(CipherMode::Aes192) => &[CipherMode::Aes192],
            ModePolicy::Fixed(CipherMode::Aes256) => &[CipherMode::Aes256],
            ModePolicy::Any => &CipherMode::ALL,
        }
    }

    /// Largest round count among the covered modes.
    pub fn max_rounds(&self) -> usize {
        match self {
            ModePolicy::Fixed(mode) => mode.rounds(),
            ModePolicy::Any => CipherMode::Aes256.rounds(),
        }
    }

    /// Whether `mode` can be selected under this policy.
    pub fn covers(&self, mode: CipherMode) -> bool {
        match self {
            ModePolicy::Fixed(fixed) => *fixed == mode,
            ModePolicy::Any => true,
        }
    }

    /// The mode a core starts in.
    pub fn initial_mode(&self) -> CipherMode {
        match self {
            ModePolicy::Fixed(mode) => *mode,
            ModePolicy::Any => CipherMode::Aes128,
        }
    }
}

/// Round-key supply strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyScheduleKind {
    /// Expand each round key on demand from the origin key.
    Online,
    /// Select from a table of externally preloaded round keys.
    Precomputed,
}

/// Selection of the optional intermediate registers inside a round unit.
///
/// Bit 0 registers the whitening result, bit 1 the byte substitution, bit 2
/// the row shift. The terminal register after column mixing always exists,
/// so the per-pass latency is `1 + depth()` steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeStages(u8);

impl PipeStages {
    /// No optional registers; a pass costs one step.
    pub const NONE: PipeStages = PipeStages(0);

    /// Builds from a raw register mask, `0..=0b111`.
    pub fn from_mask(mask: u8) -> Result<Self, ConfigError> {
        if mask > 0b111 {
            return Err(ConfigError::PipeMaskOutOfRange { mask });
        }
        Ok(PipeStages(mask))
    }

    /// Builds from a register count, `0..=3`, filling slots front to back.
    pub fn from_depth(depth: usize) -> Result<Self, ConfigError> {
        if depth > 3 {
            return Err(ConfigError::PipeDepthOutOfRange { depth });
        }
        Ok(PipeStages(((1u16 << depth) - 1) as u8))
    }

    /// Raw register mask.
    #[inline]
    pub fn mask(&self) -> u8 {
        self.0
    }

    /// Number of optional registers present.
    #[inline]
    pub fn depth(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the register after transform slot `slot` (0..=2) exists.
    #[inline]
    pub fn has(&self, slot: usize) -> bool {
        self.0 & (1 << slot) != 0
    }
}

/// Unit-count presets of the original configuration tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizePreset {
    /// One round unit, maximal recirculation.
    Xs,
    /// Two round units.
    S,
    /// Half the rounds of the fixed mode.
    M,
    /// One unit per round, fully pipelined.
    L,
}

impl SizePreset {
    /// Physical-unit count the preset resolves to under `policy`.
    pub fn units(self, policy: &ModePolicy) -> Result<usize, ConfigError> {
        match self {
            SizePreset::Xs => Ok(1),
            SizePreset::S => Ok(2),
            SizePreset::M => match policy {
                ModePolicy::Fixed(mode) => Ok(mode.rounds() / 2),
                ModePolicy::Any => Err(ConfigError::SizePresetNeedsFixedMode),
            },
            SizePreset::L => Ok(policy.max_rounds()),
        }
    }
}

/// Complete parameter set for one configured core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreParams {
    /// Mode policy.
    pub mode: ModePolicy,
    /// Physical round-unit count.
    pub units: usize,
    /// Optional intermediate registers per unit.
    pub pipe: PipeStages,
    /// Round-key supply strategy.
    pub key_schedule: KeyScheduleKind,
}

impl CoreParams {
    /// Validates the combination and precomputes every run-time table.
    pub fn validate(&self) -> Result<CorePlan, ConfigError> {
        if self.units == 0 {
            return Err(ConfigError::NoRoundUnits);
        }
        let rounds = self.mode.max_rounds();
        if self.units > rounds {
            return Err(ConfigError::TooManyRoundUnits {
                units: self.units,
                rounds,
            });
        }
        if self.key_schedule == KeyScheduleKind::Precomputed
            && matches!(self.mode, ModePolicy::Any)
        {
            return Err(ConfigError::PrecomputedNeedsFixedMode);
        }
        Ok(CorePlan::build(*self))
    }

    /// Serializes the parameters with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserializes parameters with `bincode`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(units: usize) -> CoreParams {
        CoreParams {
            mode: ModePolicy::Fixed(CipherMode::Aes128),
            units,
            pipe: PipeStages::NONE,
            key_schedule: KeyScheduleKind::Online,
        }
    }

    #[test]
    fn zero_units_rejected() {
        assert_eq!(params(0).validate().unwrap_err(), ConfigError::NoRoundUnits);
    }

    #[test]
    fn unit_count_bounded_by_rounds() {
        assert!(params(10).validate().is_ok());
        assert_eq!(
            params(11).validate().unwrap_err(),
            ConfigError::TooManyRoundUnits {
                units: 11,
                rounds: 10
            }
        );
        let any = CoreParams {
            mode: ModePolicy::Any,
            ..params(14)
        };
        assert!(any.validate().is_ok());
    }

    #[test]
    fn precomputed_requires_fixed_mode() {
        let bad = CoreParams {
            mode: ModePolicy::Any,
            key_schedule: KeyScheduleKind::Precomputed,
            ..params(2)
        };
        assert_eq!(
            bad.validate().unwrap_err(),
            ConfigError::PrecomputedNeedsFixedMode
        );
    }

    #[test]
    fn pipe_stage_bounds() {
        assert_eq!(PipeStages::from_depth(2).unwrap().mask(), 0b011);
        assert_eq!(PipeStages::from_depth(3).unwrap().depth(), 3);
        assert!(PipeStages::from_depth(4).is_err());
        assert_eq!(PipeStages::from_mask(0b101).unwrap().depth(), 2);
        assert!(PipeStages::from_mask(0b1000).is_err());
    }

    #[test]
    fn size_presets_resolve() {
        let fixed = ModePolicy::Fixed(CipherMode::Aes192);
        assert_eq!(SizePreset::Xs.units(&fixed).unwrap(), 1);
        assert_eq!(SizePreset::S.units(&fixed).unwrap(), 2);
        assert_eq!(SizePreset::M.units(&fixed).unwrap(), 6);
        assert_eq!(SizePreset::L.units(&fixed).unwrap(), 12);
        assert_eq!(SizePreset::L.units(&ModePolicy::Any).unwrap(), 14);
        assert_eq!(
            SizePreset::M.units(&ModePolicy::Any).unwrap_err(),
            ConfigError::SizePresetNeedsFixedMode
        );
    }

    #[test]
    fn bincode_roundtrip() {
        let original = CoreParams {
            mode: ModePolicy::Any,
            units: 7,
            pipe: PipeStages::from_mask(0b110).unwrap(),
            key_schedule: KeyScheduleKind::Online,
        };
        let bytes = original.to_bytes().expect("serialize");
        let decoded = CoreParams::from_bytes(&bytes).expect("deserialize");
        assert_eq!(decoded, original);
    }
}
