//! Terminal whitening stage with output handshake.
//!
//! IDLE → accept a completing token → whiten with the terminal round key →
//! hold the result with output-valid until externally acknowledged → IDLE.
//! Busy spans acceptance through acknowledge and is the backpressure seen by
//! the exit unit.

use aes_core::{add_round_key, Block};

use crate::token::RoundToken;

pub(crate) struct FinalRound {
    held: Option<Block>,
}

impl FinalRound {
    pub(crate) fn new() -> Self {
        Self { held: None }
    }

    /// Busy while a result is held; an acknowledge arriving this step
    /// releases the stage within the step, so the exit unit sees
    /// `busy(ack)` rather than the raw holding flag.
    #[inline]
    pub(crate) fn busy(&self, ack: bool) -> bool {
        self.held.is_some() && !ack
    }

    /// Held result; stays valid until acknowledged.
    #[inline]
    pub(crate) fn output(&self) -> Option<Block> {
        self.held
    }

    pub(crate) fn flush(&mut self) {
        self.held = None;
    }

    /// Advances one clock edge. An acknowledge releases the held result
    /// first, so a waiting completing token can enter in the same step and
    /// back-to-back completions drain at full rate.
    pub(crate) fn step(&mut self, token: Option<RoundToken>, terminal_key: &Block, ack: bool) {
        if ack {
            self.held = None;
        }
        if self.held.is_none() {
            if let Some(token) = token {
                let mut state = token.state;
                add_round_key(&mut state, terminal_key);
                self.held = Some(state);
            }
        }
    }
}
