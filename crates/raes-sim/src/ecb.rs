//! Block-level cipher core: scheduler, key engine and final stage wired up.

use aes_core::{expand_key, Block, CipherKey, CipherMode};
use raes_config::{ConfigError, CoreParams, CorePlan, KeyScheduleKind};

use crate::final_round::FinalRound;
use crate::key_schedule::{KeyLoad, KeySchedule, OnlineKeyChain, PrecomputedKeys};
use crate::scheduler::RoundScheduler;

/// Generous bound for the step-driving helpers; a core that produces nothing
/// within it is wedged.
const STEP_LIMIT: usize = 10_000;

/// Inputs sampled by the core at one clock edge.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreInput {
    /// Key-load transaction, applied between blocks.
    pub key_load: Option<KeyLoad>,
    /// Fresh ingress block with its valid flag; refused while busy.
    pub block_in: Option<Block>,
    /// Acknowledge for the held egress block.
    pub ack: bool,
    /// Global pipe flush; clears counters and validity within this step.
    pub flush: bool,
}

/// Outputs visible after one clock edge.
#[derive(Clone, Copy, Debug)]
pub struct CoreOutput {
    /// Egress block, held until acknowledged.
    pub block_out: Option<Block>,
    /// Core refuses fresh ingress while asserted.
    pub busy: bool,
}

/// The configured cipher core model.
pub struct AesCore {
    plan: CorePlan,
    mode: CipherMode,
    scheduler: RoundScheduler,
    keys: Box<dyn KeySchedule>,
    last: FinalRound,
}

impl AesCore {
    /// Validates `params` and builds the core.
    pub fn new(params: CoreParams) -> Result<Self, ConfigError> {
        Ok(Self::from_plan(params.validate()?))
    }

    /// Builds the core from an already validated plan.
    pub fn from_plan(plan: CorePlan) -> Self {
        let params = *plan.params();
        let keys: Box<dyn KeySchedule> = match params.key_schedule {
            KeyScheduleKind::Online => Box::new(OnlineKeyChain::new(params.units)),
            KeyScheduleKind::Precomputed => Box::new(PrecomputedKeys::new()),
        };
        Self {
            scheduler: RoundScheduler::new(params.units, params.pipe),
            mode: params.mode.initial_mode(),
            keys,
            last: FinalRound::new(),
            plan,
        }
    }

    /// The plan this core was built from.
    pub fn plan(&self) -> &CorePlan {
        &self.plan
    }

    /// Active cipher mode.
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Selects the active mode. Changing mode with a block in flight is a
    /// caller-contract violation and leaves that block's data unspecified.
    pub fn set_mode(&mut self, mode: CipherMode) -> Result<(), ConfigError> {
        if !self.plan.params().mode.covers(mode) {
            return Err(ConfigError::ModeNotCovered { requested: mode });
        }
        self.mode = mode;
        Ok(())
    }

    fn active_plan(&self) -> &raes_config::ModePlan {
        self.plan
            .mode_plan(self.mode)
            .expect("the policy covers the active mode")
    }

    /// Whether fresh ingress would be refused this step.
    pub fn busy(&self) -> bool {
        self.scheduler
            .ingress_blocked(self.active_plan(), self.last.busy(false))
    }

    /// Whether a partially processed block is waiting to re-enter unit 0.
    pub fn loop_back_pending(&self) -> bool {
        self.scheduler.loop_back(self.active_plan()).is_some()
    }

    /// Held egress block, if any.
    pub fn output(&self) -> Option<Block> {
        self.last.output()
    }

    /// Advances the core one clock edge; all register updates commit
    /// atomically at its end.
    pub fn step(&mut self, input: &CoreInput) -> CoreOutput {
        let AesCore {
            plan,
            mode,
            scheduler,
            keys,
            last,
        } = self;
        if let Some(load) = &input.key_load {
            keys.load(load, *mode);
        }
        if input.flush {
            scheduler.flush();
            last.flush();
            let mode_plan = plan.mode_plan(*mode).expect("the policy covers the active mode");
            return CoreOutput {
                block_out: None,
                busy: scheduler.ingress_blocked(mode_plan, false),
            };
        }

        let mode_plan = plan.mode_plan(*mode).expect("the policy covers the active mode");
        let final_busy = last.busy(input.ack);
        let exit_token = scheduler.exit_token(mode_plan);
        let terminal_key = keys.terminal_key(mode_plan);
        let blocked = scheduler.ingress_blocked(mode_plan, final_busy);
        let offered = if blocked { None } else { input.block_in };

        last.step(exit_token, &terminal_key, input.ack);
        let admitted = scheduler.step(mode_plan, offered, keys.as_mut(), final_busy);
        keys.commit();
        debug_assert!(offered.is_none() || admitted);

        CoreOutput {
            block_out: last.output(),
            busy: scheduler.ingress_blocked(mode_plan, last.busy(false)),
        }
    }

    /// Loads `key`, selecting its mode and re-arming the round counters.
    ///
    /// For the online chain this is one word-mask load; for the precomputed
    /// table it expands the key and performs the `rounds + 1` sequential
    /// segment loads.
    pub fn load_key(&mut self, key: &CipherKey) -> Result<(), ConfigError> {
        self.set_mode(key.mode())?;
        // Rekeying follows a pipe flush so the counter edge detectors re-arm.
        self.step(&CoreInput {
            flush: true,
            ..CoreInput::default()
        });
        match self.plan.params().key_schedule {
            KeyScheduleKind::Online => {
                self.step(&CoreInput {
                    key_load: Some(KeyLoad::words_for(key)),
                    ..CoreInput::default()
                });
            }
            KeyScheduleKind::Precomputed => {
                let round_keys = expand_key(key);
                for (i, round_key) in round_keys.iter().enumerate() {
                    self.step(&CoreInput {
                        key_load: Some(KeyLoad::Segment {
                            index: i + 1,
                            key: *round_key,
                        }),
                        ..CoreInput::default()
                    });
                }
            }
        }
        Ok(())
    }

    fn run_until_output(&mut self) -> Block {
        let mut result = None;
        for _ in 0..STEP_LIMIT {
            if let Some(block) = self.step(&CoreInput::default()).block_out {
                result = Some(block);
                break;
            }
        }
        result.expect("cipher core produced no output within the step limit")
    }

    /// Serialized driver: one block at a time, acknowledged on arrival.
    /// The key must have been loaded beforehand.
    pub fn encrypt_blocks(&mut self, blocks: &[Block]) -> Vec<Block> {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            let mut waited = 0;
            while self.busy() {
                self.step(&CoreInput::default());
                waited += 1;
                assert!(waited <= STEP_LIMIT, "cipher core stayed busy");
            }
            self.step(&CoreInput {
                block_in: Some(*block),
                ..CoreInput::default()
            });
            let cipher_text = self.run_until_output();
            self.step(&CoreInput {
                ack: true,
                ..CoreInput::default()
            });
            out.push(cipher_text);
        }
        out
    }
}
