//! TRv1 Presale Integration Tests
//!
//! Cross-module scenarios for the presale program, driven through
//! [`trv1_presale_program::PresaleController`] and the instruction processor.
//!
//! # Areas Tested
//!
//! 1. **Lifecycle** — initialise, contribute, close, claim, refund, airdrop,
//!    price updates, cliff and monthly vesting
//! 2. **Instructions** — opcode encoding, account checks, processor dispatch,
//!    configuration loading, account export and import
//! 3. **Concurrency** — racing contributions against the caps, parallel
//!    claims, claim/refund races on one allocation
//! 4. **Invariants** — property tests of caps and bookkeeping over arbitrary
//!    operation sequences

#![cfg_attr(test, allow(clippy::arithmetic_side_effects))]

pub mod harness;


#[cfg(test)]
mod instruction_tests;
