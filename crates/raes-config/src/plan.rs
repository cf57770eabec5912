//! Validated plan: every table the clocked model consults at run time.

use aes_core::CipherMode;

use crate::params::CoreParams;

/// Distribution of logical rounds over physical units.
///
/// Round `r` is processed by unit `r % units` on recirculation pass
/// `r / units`; the fixed round-robin of the original generator.
#[inline]
pub fn assignment(round: usize, units: usize) -> (usize, usize) {
    (round % units, round / units)
}

/// Recurrence step one key-expansion activation applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KexpVariation {
    /// Rotate + substitute + round constant on the window tail.
    Full,
    /// Substitution-only pivot, round constant held (256-bit, even counters).
    SubOnly,
    /// Pivot word sits at the window start (192-bit, counter ≡ 1 mod 3).
    SplitStart,
    /// Pivot word reconstructed mid-window (192-bit, counter ≡ 2 mod 3).
    SplitMid,
    /// Plain xor chaining, round constant held (192-bit, remaining phase).
    Chain,
}

/// Mode-global variation rule; used only to build the per-unit tables.
pub fn variation(mode: CipherMode, counter: usize) -> KexpVariation {
    match mode {
        CipherMode::Aes128 => KexpVariation::Full,
        CipherMode::Aes192 => match counter % 3 {
            1 => KexpVariation::SplitStart,
            2 => KexpVariation::SplitMid,
            _ => KexpVariation::Chain,
        },
        CipherMode::Aes256 => {
            if counter % 2 == 0 {
                KexpVariation::SubOnly
            } else {
                KexpVariation::Full
            }
        }
    }
}

/// Per-unit membership tables for the key-expansion variations.
///
/// Holds exactly the activation counters this unit will ever present, split
/// the way the original generator split them into per-instance case
/// statements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitVariations {
    mode: CipherMode,
    split_start: Vec<usize>,
    split_mid: Vec<usize>,
    sub_only: Vec<usize>,
}

impl UnitVariations {
    fn build(mode: CipherMode, counters: &[usize]) -> Self {
        let select = |wanted: KexpVariation| {
            counters
                .iter()
                .copied()
                .filter(|&k| variation(mode, k) == wanted)
                .collect()
        };
        Self {
            mode,
            split_start: select(KexpVariation::SplitStart),
            split_mid: select(KexpVariation::SplitMid),
            sub_only: select(KexpVariation::SubOnly),
        }
    }

    /// Variation for activation counter `k`, by membership test.
    pub fn variation_at(&self, k: usize) -> KexpVariation {
        if self.split_start.binary_search(&k).is_ok() {
            KexpVariation::SplitStart
        } else if self.split_mid.binary_search(&k).is_ok() {
            KexpVariation::SplitMid
        } else if self.sub_only.binary_search(&k).is_ok() {
            KexpVariation::SubOnly
        } else {
            match self.mode {
                CipherMode::Aes192 => KexpVariation::Chain,
                _ => KexpVariation::Full,
            }
        }
    }
}

/// Tables for one cipher mode under a fixed unit count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModePlan {
    mode: CipherMode,
    rounds: usize,
    exit_unit: usize,
    unit_rounds: Vec<Vec<usize>>,
    unit_variations: Vec<UnitVariations>,
}

impl ModePlan {
    fn build(mode: CipherMode, units: usize) -> Self {
        let rounds = mode.rounds();
        let mut unit_rounds = vec![Vec::new(); units];
        for round in 0..rounds {
            let (unit, _) = assignment(round, units);
            unit_rounds[unit].push(round);
        }
        let unit_variations = unit_rounds
            .iter()
            .map(|assigned| {
                let counters: Vec<usize> = assigned.iter().map(|r| r + 1).collect();
                UnitVariations::build(mode, &counters)
            })
            .collect();
        Self {
            mode,
            rounds,
            exit_unit: (rounds - 1) % units,
            unit_rounds,
            unit_variations,
        }
    }

    /// The mode these tables serve.
    #[inline]
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Logical rounds a block passes through the unit chain.
    #[inline]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Unit whose completing tokens feed the final-round stage.
    #[inline]
    pub fn exit_unit(&self) -> usize {
        self.exit_unit
    }

    /// Logical round indices assigned to `unit`, ascending.
    #[inline]
    pub fn rounds_for(&self, unit: usize) -> &[usize] {
        &self.unit_rounds[unit]
    }

    /// Key-expansion variation table of `unit`.
    #[inline]
    pub fn variations(&self, unit: usize) -> &UnitVariations {
        &self.unit_variations[unit]
    }
}

/// Validated configuration with all per-mode tables materialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorePlan {
    params: CoreParams,
    modes: Vec<ModePlan>,
}

impl CorePlan {
    pub(crate) fn build(params: CoreParams) -> Self {
        let modes = params
            .mode
            .modes()
            .iter()
            .map(|&mode| ModePlan::build(mode, params.units))
            .collect();
        Self { params, modes }
    }

    /// The parameters this plan was built from.
    #[inline]
    pub fn params(&self) -> &CoreParams {
        &self.params
    }

    /// Physical-unit count.
    #[inline]
    pub fn units(&self) -> usize {
        self.params.units
    }

    /// Tables for `mode`, if the policy covers it.
    pub fn mode_plan(&self, mode: CipherMode) -> Option<&ModePlan> {
        self.modes.iter().find(|plan| plan.mode() == mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{KeyScheduleKind, ModePolicy, PipeStages};

    fn plan_for(mode: CipherMode, units: usize) -> CorePlan {
        CoreParams {
            mode: ModePolicy::Fixed(mode),
            units,
            pipe: PipeStages::NONE,
            key_schedule: KeyScheduleKind::Online,
        }
        .validate()
        .expect("valid parameters")
    }

    #[test]
    fn assignment_is_round_robin() {
        assert_eq!(assignment(0, 3), (0, 0));
        assert_eq!(assignment(2, 3), (2, 0));
        assert_eq!(assignment(3, 3), (0, 1));
        assert_eq!(assignment(9, 3), (0, 3));
    }

    #[test]
    fn exit_unit_for_divisor_is_last_instance() {
        for units in [1, 2, 5, 10] {
            let plan = plan_for(CipherMode::Aes128, units);
            let mode_plan = plan.mode_plan(CipherMode::Aes128).unwrap();
            assert_eq!(mode_plan.exit_unit(), units - 1);
        }
    }

    #[test]
    fn exit_unit_for_short_final_segment() {
        let plan = plan_for(CipherMode::Aes128, 3);
        let mode_plan = plan.mode_plan(CipherMode::Aes128).unwrap();
        // Rounds 9 is the fourth pass through unit 0.
        assert_eq!(mode_plan.exit_unit(), 0);
        assert_eq!(mode_plan.rounds_for(0), &[0, 3, 6, 9]);
        assert_eq!(mode_plan.rounds_for(1), &[1, 4, 7]);
        assert_eq!(mode_plan.rounds_for(2), &[2, 5, 8]);
    }

    #[test]
    fn variations_match_the_generated_case_statements() {
        // Single instance, 192-bit: the three-round phase pattern.
        let plan = plan_for(CipherMode::Aes192, 1);
        let vars = plan.mode_plan(CipherMode::Aes192).unwrap().variations(0);
        for k in 1..=12 {
            let expected = match k % 3 {
                1 => KexpVariation::SplitStart,
                2 => KexpVariation::SplitMid,
                _ => KexpVariation::Chain,
            };
            assert_eq!(vars.variation_at(k), expected, "counter {k}");
        }

        // Two instances, 256-bit: odd counters land on unit 0, even on unit 1.
        let plan = plan_for(CipherMode::Aes256, 2);
        let mode_plan = plan.mode_plan(CipherMode::Aes256).unwrap();
        for &round in mode_plan.rounds_for(0) {
            assert_eq!(
                mode_plan.variations(0).variation_at(round + 1),
                KexpVariation::Full
            );
        }
        for &round in mode_plan.rounds_for(1) {
            assert_eq!(
                mode_plan.variations(1).variation_at(round + 1),
                KexpVariation::SubOnly
            );
        }
    }

    #[test]
    fn any_policy_builds_all_three_mode_plans() {
        let plan = CoreParams {
            mode: ModePolicy::Any,
            units: 2,
            pipe: PipeStages::NONE,
            key_schedule: KeyScheduleKind::Online,
        }
        .validate()
        .unwrap();
        for mode in CipherMode::ALL {
            let mode_plan = plan.mode_plan(mode).expect("mode covered");
            assert_eq!(mode_plan.rounds(), mode.rounds());
        }
        assert!(plan_for(CipherMode::Aes128, 2)
            .mode_plan(CipherMode::Aes256)
            .is_none());
    }
}
