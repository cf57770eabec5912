//! Recirculation scheduler: chains the round units and routes tokens.
//!
//! Unit i's continue path feeds unit i+1; the last unit's continue path is
//! the loop-back into unit 0, which outranks fresh ingress and never stalls.
//! Completing tokens leave the chain at the exit unit towards the final
//! stage. All routing decisions read the registers sampled at the step
//! boundary, so the order units are stepped in does not matter.

use aes_core::Block;
use raes_config::{ModePlan, PipeStages};

use crate::key_schedule::KeySchedule;
use crate::round_unit::{RoundUnit, UnitInput};
use crate::token::RoundToken;

pub(crate) struct RoundScheduler {
    units: Vec<RoundUnit>,
}

impl RoundScheduler {
    pub(crate) fn new(units: usize, pipe: PipeStages) -> Self {
        Self {
            units: (0..units).map(|_| RoundUnit::new(pipe)).collect(),
        }
    }

    pub(crate) fn flush(&mut self) {
        for unit in &mut self.units {
            unit.flush();
        }
    }

    /// Token leaving `unit` on the continue path (next unit or loop-back).
    fn continue_token(&self, plan: &ModePlan, unit: usize) -> Option<RoundToken> {
        self.units[unit]
            .output()
            .filter(|t| !(unit == plan.exit_unit() && t.round == plan.rounds()))
    }

    /// Loop-back token pending at the head of the chain this step.
    pub(crate) fn loop_back(&self, plan: &ModePlan) -> Option<RoundToken> {
        self.continue_token(plan, self.units.len() - 1)
    }

    /// Completing token offered to the final stage this step.
    pub(crate) fn exit_token(&self, plan: &ModePlan) -> Option<RoundToken> {
        self.units[plan.exit_unit()]
            .output()
            .filter(|t| t.round == plan.rounds())
    }

    /// Busy of every unit, computed back to front from the sampled registers.
    fn busy_chain(&self, plan: &ModePlan, final_busy: bool, in_valid: &[bool]) -> Vec<bool> {
        let m = self.units.len();
        let mut busy = vec![false; m];
        for i in (0..m).rev() {
            let probe = UnitInput {
                token: None,
                key: [0u8; 16],
                continue_busy: if i + 1 < m { busy[i + 1] } else { false },
                final_busy,
            };
            busy[i] = self.units[i].busy(in_valid[i], &probe, plan.rounds());
        }
        busy
    }

    fn input_validity(&self, plan: &ModePlan, head_valid: bool) -> Vec<bool> {
        let m = self.units.len();
        let mut valid = vec![false; m];
        valid[0] = head_valid;
        for i in 1..m {
            valid[i] = self.continue_token(plan, i - 1).is_some();
        }
        valid
    }

    /// Whether a fresh ingress would be refused this step: a loop-back is
    /// pending, or unit 0 cannot take a valid input.
    pub(crate) fn ingress_blocked(&self, plan: &ModePlan, final_busy: bool) -> bool {
        if self.loop_back(plan).is_some() {
            return true;
        }
        let in_valid = self.input_validity(plan, true);
        self.busy_chain(plan, final_busy, &in_valid)[0]
    }

    /// Advances the whole chain one clock edge. Returns whether a fresh
    /// ingress token was admitted.
    pub(crate) fn step(
        &mut self,
        plan: &ModePlan,
        ingress: Option<Block>,
        keys: &mut dyn KeySchedule,
        final_busy: bool,
    ) -> bool {
        let m = self.units.len();
        let loop_tok = self.loop_back(plan);
        let fresh = loop_tok.is_none() && ingress.is_some();

        let mut inputs: Vec<Option<RoundToken>> = Vec::with_capacity(m);
        inputs.push(loop_tok.or(ingress.map(|state| RoundToken { round: 0, state })));
        for i in 1..m {
            inputs.push(self.continue_token(plan, i - 1));
        }

        let in_valid: Vec<bool> = inputs.iter().map(Option::is_some).collect();
        let busy = self.busy_chain(plan, final_busy, &in_valid);

        // Subkeys are read before any engine advances this step.
        let subkeys: Vec<Block> = inputs
            .iter()
            .enumerate()
            .map(|(i, token)| match token {
                Some(t) => keys.round_key(plan, i, t.round, fresh && i == 0),
                None => [0u8; 16],
            })
            .collect();

        let mut admitted = false;
        for i in 0..m {
            let input = UnitInput {
                token: inputs[i],
                key: subkeys[i],
                continue_busy: if i + 1 < m { busy[i + 1] } else { false },
                final_busy,
            };
            let result = self.units[i].step(&input, plan.rounds());
            if result.triggered {
                let token = inputs[i].expect("a trigger always carries a token");
                keys.activate(plan, i, token.round, fresh && i == 0);
            }
            if i == 0 && fresh && result.accepted {
                admitted = true;
            }
        }
        admitted
    }
}
