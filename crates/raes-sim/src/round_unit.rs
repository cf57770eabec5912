//! One physical round stage with configurable internal registers.
//!
//! The four transform slots (whitening, byte substitution, row shift, column
//! mixing) are separated by up to three optional registers; the terminal slot
//! is always registered. Each register stalls independently: it holds exactly
//! when the value about to enter the next register is valid and that register
//! stalls too, so bubbles keep draining while the head of the chain is
//! blocked.

use aes_core::{add_round_key, mix_columns, shift_rows, sub_bytes, Block};
use raes_config::PipeStages;

use crate::token::RoundToken;

/// Per-step inputs sampled by the unit.
pub(crate) struct UnitInput {
    /// Incoming token, if any.
    pub token: Option<RoundToken>,
    /// Round key consumed by the whitening slot.
    pub key: Block,
    /// Busy of the continue path (next unit, or never for the loop path).
    pub continue_busy: bool,
    /// Busy of the final-round stage, gating completing tokens only.
    pub final_busy: bool,
}

/// Per-step results the scheduler reacts to.
pub(crate) struct UnitStep {
    /// The input token entered the pipe this step.
    pub accepted: bool,
    /// Key-request pulse: a new round counter was accepted.
    pub triggered: bool,
}

pub(crate) struct RoundUnit {
    pipe: PipeStages,
    /// Register after slot `s`; slots 0..=2 exist per `pipe`, slot 3 always.
    regs: [Option<RoundToken>; 4],
    /// Counter edge detector pacing the key engine.
    last_counter: usize,
}

impl RoundUnit {
    pub(crate) fn new(pipe: PipeStages) -> Self {
        Self {
            pipe,
            regs: [None; 4],
            last_counter: 0,
        }
    }

    /// Terminal-register token as sampled by downstream logic this step.
    #[inline]
    pub(crate) fn output(&self) -> Option<RoundToken> {
        self.regs[3]
    }

    /// Clears validity and counters; register data may stay behind, as in
    /// the modeled hardware.
    pub(crate) fn flush(&mut self) {
        self.regs = [None; 4];
        self.last_counter = 0;
    }

    fn downstream_busy(&self, token: &RoundToken, input: &UnitInput, rounds_total: usize) -> bool {
        if token.round == rounds_total {
            input.final_busy
        } else {
            input.continue_busy
        }
    }

    /// Stall of each register, computed from the current registers and this
    /// step's inputs. `stalls[0]` is the head-of-chain stall exported as busy.
    fn stalls(&self, input: &UnitInput, rounds_total: usize) -> [bool; 4] {
        // Valid entering each slot, after the optional register muxes.
        let mut entering = [false; 4];
        entering[0] = input.token.is_some();
        for s in 1..4 {
            entering[s] = if self.pipe.has(s - 1) {
                self.regs[s - 1].is_some()
            } else {
                entering[s - 1]
            };
        }

        let mut stalls = [false; 4];
        stalls[3] = match &self.regs[3] {
            Some(token) => self.downstream_busy(token, input, rounds_total),
            None => false,
        };
        for s in (0..3).rev() {
            stalls[s] = entering[s + 1] && stalls[s + 1];
        }
        stalls
    }

    /// Whether the unit refuses a (hypothetical or real) valid input this
    /// step; fed upstream as its continue-path busy.
    pub(crate) fn busy(&self, input_valid: bool, input: &UnitInput, rounds_total: usize) -> bool {
        let probe = UnitInput {
            token: if input_valid {
                // Only validity matters for the stall chain.
                Some(RoundToken {
                    round: 0,
                    state: [0u8; 16],
                })
            } else {
                None
            },
            key: [0u8; 16],
            continue_busy: input.continue_busy,
            final_busy: input.final_busy,
        };
        self.stalls(&probe, rounds_total)[0]
    }

    /// Advances one clock edge.
    pub(crate) fn step(&mut self, input: &UnitInput, rounds_total: usize) -> UnitStep {
        let stalls = self.stalls(input, rounds_total);

        // Combinational value leaving each transform slot.
        let mut comb: [Option<RoundToken>; 4] = [None; 4];
        comb[0] = input.token.map(|token| {
            let mut state = token.state;
            add_round_key(&mut state, &input.key);
            RoundToken {
                round: token.round + 1,
                state,
            }
        });
        for s in 1..4 {
            let feed = if self.pipe.has(s - 1) {
                self.regs[s - 1]
            } else {
                comb[s - 1]
            };
            comb[s] = feed.map(|mut token| {
                match s {
                    1 => sub_bytes(&mut token.state),
                    2 => shift_rows(&mut token.state),
                    _ => {
                        // The terminal logical round never mixes columns.
                        if token.round != rounds_total {
                            mix_columns(&mut token.state);
                        }
                    }
                }
                token
            });
        }

        let accepted = input.token.is_some() && !stalls[0];
        let mut triggered = false;
        if accepted {
            let counter = comb[0].map(|t| t.round).unwrap_or(0);
            triggered = counter != self.last_counter;
            self.last_counter = counter;
        }

        for s in 0..4 {
            if (s == 3 || self.pipe.has(s)) && !stalls[s] {
                self.regs[s] = comb[s];
            }
        }

        UnitStep {
            accepted,
            triggered,
        }
    }
}
