//! Tokens flowing through the modeled pipeline.

use aes_core::Block;

/// A block in flight, tagged with the number of logical rounds applied.
///
/// Ingress tokens carry 0; every physical pass increments the counter exactly
/// once, regardless of how many micro-stage registers realize the pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundToken {
    /// Logical rounds already applied to `state`.
    pub round: usize,
    /// Cipher state.
    pub state: Block,
}

/// One round's subkey, paired with the round counter it serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundKeyToken {
    /// Logical round index this subkey whitens.
    pub round: usize,
    /// The subkey.
    pub key: Block,
}
