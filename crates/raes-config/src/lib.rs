//! Configuration layer for the recirculating AES core model.
//!
//! Everything the clocked model must never compute on the fly is fixed here
//! at configuration time: parameter validation, the round-to-unit
//! distribution, the exit unit per mode, and the per-unit key-schedule
//! variation tables that replace the generated hardware's compiled-in case
//! statements.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod params;
mod plan;

pub use crate::error::ConfigError;
pub use crate::params::{CoreParams, KeyScheduleKind, ModePolicy, PipeStages, SizePreset};
pub use crate::plan::{assignment, variation, CorePlan, KexpVariation, ModePlan, UnitVariations};
