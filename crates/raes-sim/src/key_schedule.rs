//! Round-key supply: on-the-fly expansion chain or preloaded table.
//!
//! Both strategies sit behind [`KeySchedule`]. All reads within a step
//! observe the registers as they were at the step boundary; `activate`
//! stages writes that only land on `commit`, so several engines may fire in
//! the same step without seeing each other's updates.

use aes_core::{block_from_words, next_rcon, sub_word, Block, CipherKey, CipherMode};
use raes_config::{KexpVariation, ModePlan};

use crate::token::RoundKeyToken;

/// Seed round constant presented to the chain on a fresh ingress.
const RCON_SEED: u8 = 0x01;

/// One key-load transaction, applied between blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyLoad {
    /// Origin key words for the online chain. Mask bit 2 loads words 0–3,
    /// bit 1 words 4–5, bit 0 words 6–7; words beyond the active mode's
    /// width are forced to zero.
    Words {
        /// Word-group valid mask, low three bits.
        mask: u8,
        /// Up to 32 key bytes, big-endian words.
        bytes: [u8; 32],
    },
    /// One preloaded round key for the table strategy; segment `index` in
    /// `1..=rounds+1` stores round key `index - 1`.
    Segment {
        /// Segment selector.
        index: usize,
        /// The round key.
        key: Block,
    },
}

impl KeyLoad {
    /// Word-mask transaction covering the whole of `key`.
    pub fn words_for(key: &CipherKey) -> KeyLoad {
        let mut bytes = [0u8; 32];
        bytes[..key.bytes().len()].copy_from_slice(key.bytes());
        let mask = match key.mode() {
            CipherMode::Aes128 => 0b100,
            CipherMode::Aes192 => 0b110,
            CipherMode::Aes256 => 0b111,
        };
        KeyLoad::Words { mask, bytes }
    }
}

/// Common contract of the two round-key strategies.
///
/// `round_key` is the combinational peek a unit's whitening slot consumes;
/// `activate` is the paced advance pulsed by a unit's key-request trigger
/// and returns the consumed subkey as a [`RoundKeyToken`].
pub trait KeySchedule {
    /// Applies one load transaction.
    fn load(&mut self, load: &KeyLoad, mode: CipherMode);
    /// Subkey presented to `unit` for a token with `round` rounds applied.
    fn round_key(&self, plan: &ModePlan, unit: usize, round: usize, fresh: bool) -> Block;
    /// Consumes the trigger for `unit`, advancing any pacing state.
    fn activate(&mut self, plan: &ModePlan, unit: usize, round: usize, fresh: bool)
        -> RoundKeyToken;
    /// Terminal whitening key for the final-round stage.
    fn terminal_key(&self, plan: &ModePlan) -> Block;
    /// Commits writes staged by `activate` at the step boundary.
    fn commit(&mut self);
}

/// Registered state of one online expansion engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct EngineRegs {
    /// Sliding key window, oldest word first; the top four words are the
    /// subkey currently offered downstream.
    window: [u32; 8],
    /// Round-constant byte carried alongside the window.
    rcon: u8,
}

/// Chained on-the-fly expansion: one engine per physical unit.
///
/// Engine `i` feeds unit `i + 1`; unit 0 reads either the origin key with
/// the seed constant (fresh ingress) or the last engine's registers
/// (recirculation), mirroring the data loop-back.
pub struct OnlineKeyChain {
    origin: [u32; 8],
    engines: Vec<EngineRegs>,
    staged: Vec<Option<EngineRegs>>,
}

impl OnlineKeyChain {
    /// Chain for `units` physical round units.
    pub fn new(units: usize) -> Self {
        Self {
            origin: [0u32; 8],
            engines: vec![EngineRegs::default(); units],
            staged: vec![None; units],
        }
    }

    /// The window and constant presented to `unit` this step.
    fn part(&self, unit: usize, fresh: bool) -> ([u32; 8], u8) {
        if unit == 0 {
            if fresh {
                (self.origin, RCON_SEED)
            } else {
                let last = &self.engines[self.engines.len() - 1];
                (last.window, last.rcon)
            }
        } else {
            let prev = &self.engines[unit - 1];
            (prev.window, prev.rcon)
        }
    }
}

/// One expansion activation: four new schedule words from the window.
fn expand(mode: CipherMode, window: &[u32; 8], rcon: u8, var: KexpVariation) -> ([u32; 8], u8) {
    let w = window;
    let full = |word: u32| sub_word(word.rotate_left(8)) ^ (u32::from(rcon) << 24);
    match var {
        KexpVariation::Full => {
            let elab = match mode {
                CipherMode::Aes128 => full(w[3]),
                _ => full(w[7]),
            };
            let t0 = elab ^ w[0];
            let t1 = t0 ^ w[1];
            let t2 = t1 ^ w[2];
            let t3 = t2 ^ w[3];
            let next = match mode {
                CipherMode::Aes128 => [t0, t1, t2, t3, w[4], w[5], w[6], w[7]],
                _ => [w[4], w[5], w[6], w[7], t0, t1, t2, t3],
            };
            (next, next_rcon(rcon))
        }
        KexpVariation::SubOnly => {
            let elab = sub_word(w[7]);
            let t0 = elab ^ w[0];
            let t1 = t0 ^ w[1];
            let t2 = t1 ^ w[2];
            let t3 = t2 ^ w[3];
            ([w[4], w[5], w[6], w[7], t0, t1, t2, t3], rcon)
        }
        KexpVariation::SplitStart => {
            let elab = full(w[5]);
            let t0 = elab ^ w[0];
            let t1 = t0 ^ w[1];
            let t2 = t1 ^ w[2];
            let t3 = t2 ^ w[3];
            ([w[4], w[5], t0, t1, t2, t3, 0, 0], next_rcon(rcon))
        }
        KexpVariation::SplitMid => {
            let elab = full(w[1] ^ w[0] ^ w[5]);
            let t0 = w[5] ^ w[0];
            let t1 = t0 ^ w[1];
            let t2 = elab ^ w[2];
            let t3 = t2 ^ w[3];
            ([w[4], w[5], t0, t1, t2, t3, 0, 0], next_rcon(rcon))
        }
        KexpVariation::Chain => {
            let t0 = w[5] ^ w[0];
            let t1 = t0 ^ w[1];
            let t2 = t1 ^ w[2];
            let t3 = t2 ^ w[3];
            ([w[4], w[5], t0, t1, t2, t3, 0, 0], rcon)
        }
    }
}

impl KeySchedule for OnlineKeyChain {
    fn load(&mut self, load: &KeyLoad, mode: CipherMode) {
        let KeyLoad::Words { mask, bytes } = load else {
            // Segment loads address the table strategy only.
            return;
        };
        let word = |i: usize| {
            u32::from_be_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        if mask & 0b100 != 0 {
            for i in 0..4 {
                self.origin[i] = word(i);
            }
        }
        if mask & 0b010 != 0 {
            self.origin[4] = word(4);
            self.origin[5] = word(5);
        }
        if mask & 0b001 != 0 {
            self.origin[6] = word(6);
            self.origin[7] = word(7);
        }
        for i in mode.key_words()..8 {
            self.origin[i] = 0;
        }
    }

    fn round_key(&self, _plan: &ModePlan, unit: usize, _round: usize, fresh: bool) -> Block {
        let (window, _) = self.part(unit, fresh);
        block_from_words(&[window[0], window[1], window[2], window[3]])
    }

    fn activate(
        &mut self,
        plan: &ModePlan,
        unit: usize,
        round: usize,
        fresh: bool,
    ) -> RoundKeyToken {
        let counter = round + 1;
        let (window, rcon) = self.part(unit, fresh);
        let var = plan.variations(unit).variation_at(counter);
        let (next_window, next_rcon) = expand(plan.mode(), &window, rcon, var);
        self.staged[unit] = Some(EngineRegs {
            window: next_window,
            rcon: next_rcon,
        });
        RoundKeyToken {
            round,
            key: block_from_words(&[window[0], window[1], window[2], window[3]]),
        }
    }

    fn terminal_key(&self, plan: &ModePlan) -> Block {
        let last = &self.engines[plan.exit_unit()];
        block_from_words(&[
            last.window[0],
            last.window[1],
            last.window[2],
            last.window[3],
        ])
    }

    fn commit(&mut self) {
        for (engine, staged) in self.engines.iter_mut().zip(self.staged.iter_mut()) {
            if let Some(regs) = staged.take() {
                *engine = regs;
            }
        }
    }
}

/// Externally expanded round keys selected by logical round index.
///
/// Each unit consults only its pre-assigned index set; a foreign index falls
/// back to the unit's last assigned round, as the selector mux does.
pub struct PrecomputedKeys {
    table: [Block; 15],
}

impl PrecomputedKeys {
    /// Empty table; segments are loaded one per step.
    pub fn new() -> Self {
        Self {
            table: [[0u8; 16]; 15],
        }
    }
}

impl Default for PrecomputedKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySchedule for PrecomputedKeys {
    fn load(&mut self, load: &KeyLoad, _mode: CipherMode) {
        let KeyLoad::Segment { index, key } = load else {
            return;
        };
        if (1..=self.table.len()).contains(index) {
            self.table[index - 1] = *key;
        }
    }

    fn round_key(&self, plan: &ModePlan, unit: usize, round: usize, _fresh: bool) -> Block {
        let assigned = plan.rounds_for(unit);
        let selected = if assigned.contains(&round) {
            round
        } else {
            // Selector fallback for an index this unit never serves.
            assigned[assigned.len() - 1]
        };
        self.table[selected]
    }

    fn activate(
        &mut self,
        plan: &ModePlan,
        unit: usize,
        round: usize,
        fresh: bool,
    ) -> RoundKeyToken {
        RoundKeyToken {
            round,
            key: self.round_key(plan, unit, round, fresh),
        }
    }

    fn terminal_key(&self, plan: &ModePlan) -> Block {
        self.table[plan.rounds()]
    }

    fn commit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_core::{expand_key, CipherKey};
    use raes_config::{CoreParams, KeyScheduleKind, ModePolicy, PipeStages};

    fn mode_plan(mode: CipherMode, units: usize) -> raes_config::CorePlan {
        CoreParams {
            mode: ModePolicy::Fixed(mode),
            units,
            pipe: PipeStages::NONE,
            key_schedule: KeyScheduleKind::Online,
        }
        .validate()
        .expect("valid parameters")
    }

    fn sequential_key(mode: CipherMode) -> CipherKey {
        let bytes: Vec<u8> = (0..mode.key_bytes() as u8).collect();
        CipherKey::from_slice(&bytes).expect("valid length")
    }

    /// Drives a single-engine chain through a whole schedule and compares
    /// every subkey with the reference expansion.
    #[test]
    fn single_engine_chain_matches_reference_expansion() {
        for mode in CipherMode::ALL {
            let plan = mode_plan(mode, 1);
            let mode_plan = plan.mode_plan(mode).unwrap();
            let key = sequential_key(mode);
            let reference = expand_key(&key);

            let mut chain = OnlineKeyChain::new(1);
            chain.load(&KeyLoad::words_for(&key), mode);

            for round in 0..mode.rounds() {
                let fresh = round == 0;
                let offered = chain.round_key(mode_plan, 0, round, fresh);
                assert_eq!(&offered, reference.get(round), "{mode:?} round {round}");
                chain.activate(mode_plan, 0, round, fresh);
                chain.commit();
            }
            assert_eq!(
                &chain.terminal_key(mode_plan),
                reference.get(mode.rounds()),
                "{mode:?} terminal key"
            );
        }
    }

    /// Hand-off across several engines: each subkey appears at the unit the
    /// round is assigned to.
    #[test]
    fn chained_engines_hand_off_in_round_order() {
        for mode in CipherMode::ALL {
            for units in [2, 3, 5] {
                let plan = mode_plan(mode, units);
                let mode_plan = plan.mode_plan(mode).unwrap();
                let key = sequential_key(mode);
                let reference = expand_key(&key);

                let mut chain = OnlineKeyChain::new(units);
                chain.load(&KeyLoad::words_for(&key), mode);

                for round in 0..mode.rounds() {
                    let unit = round % units;
                    let fresh = round == 0;
                    let offered = chain.round_key(mode_plan, unit, round, fresh);
                    assert_eq!(
                        &offered,
                        reference.get(round),
                        "{mode:?} {units} units round {round}"
                    );
                    chain.activate(mode_plan, unit, round, fresh);
                    chain.commit();
                }
                assert_eq!(
                    &chain.terminal_key(mode_plan),
                    reference.get(mode.rounds()),
                    "{mode:?} {units} units terminal key"
                );
            }
        }
    }

    #[test]
    fn unused_origin_words_are_zeroed_for_short_modes() {
        let mut chain = OnlineKeyChain::new(1);
        chain.load(
            &KeyLoad::Words {
                mask: 0b111,
                bytes: [0xff; 32],
            },
            CipherMode::Aes128,
        );
        assert_eq!(&chain.origin[..4], &[0xffff_ffff; 4]);
        assert_eq!(&chain.origin[4..], &[0; 4]);
    }

    #[test]
    fn staged_activations_are_invisible_until_commit() {
        let mode = CipherMode::Aes128;
        let plan = mode_plan(mode, 2);
        let mode_plan = plan.mode_plan(mode).unwrap();
        let key = sequential_key(mode);
        let reference = expand_key(&key);

        let mut chain = OnlineKeyChain::new(2);
        chain.load(&KeyLoad::words_for(&key), mode);
        chain.activate(mode_plan, 0, 0, true);
        // Before commit, engine 0 still presents nothing new to unit 1.
        assert_ne!(&chain.round_key(mode_plan, 1, 1, false), reference.get(1));
        chain.commit();
        assert_eq!(&chain.round_key(mode_plan, 1, 1, false), reference.get(1));
    }

    #[test]
    fn precomputed_table_selects_by_assigned_round() {
        let mode = CipherMode::Aes128;
        let plan = CoreParams {
            mode: ModePolicy::Fixed(mode),
            units: 3,
            pipe: PipeStages::NONE,
            key_schedule: KeyScheduleKind::Precomputed,
        }
        .validate()
        .unwrap();
        let mode_plan = plan.mode_plan(mode).unwrap();
        let key = sequential_key(mode);
        let reference = expand_key(&key);

        let mut table = PrecomputedKeys::new();
        for (i, rk) in reference.iter().enumerate() {
            table.load(
                &KeyLoad::Segment {
                    index: i + 1,
                    key: *rk,
                },
                mode,
            );
        }

        for round in 0..mode.rounds() {
            let unit = round % 3;
            assert_eq!(
                &table.round_key(mode_plan, unit, round, false),
                reference.get(round)
            );
        }
        assert_eq!(&table.terminal_key(mode_plan), reference.get(10));
        // Foreign index: unit 1 never serves round 0 and falls back to its
        // last assigned round.
        assert_eq!(&table.round_key(mode_plan, 1, 0, false), reference.get(7));
    }
}
