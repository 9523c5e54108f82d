//! TRv1 Presale Program
//!
//! A fixed-price token sale with capped supply and raise, per-contributor
//! allocations, and vested delivery of the purchased tokens.
//!
//! ## Lifecycle
//!
//! An admin initialises one presale per mint. Contributors pay currency into
//! the presale's currency vault and are credited `amount / price` tokens,
//! truncated, until either cap is reached. A presale may also bound single
//! contributions from below, bound each contributor's cumulative payment, and
//! accept contributions only inside a sale window. Tokens are released from
//! the token vault from the cliff onward, either all at once or on a monthly
//! schedule, by contributor claims or admin airdrops. A contributor who has
//! not claimed anything may take a refund. Closing stops contributions only.
//!
//! ## Instructions
//!
//! | Instruction        | Description                                         |
//! |--------------------|-----------------------------------------------------|
//! | InitializePresale  | Create the presale for a mint, set caps and vesting |
//! | Contribute         | Pay currency, receive a token allocation            |
//! | ClaimTokens        | Withdraw vested tokens from one's allocation        |
//! | RefundTokens       | Return paid currency and cancel an allocation        |
//! | AirdropTokens      | Admin delivery of claimable tokens to allocations   |
//! | UpdatePresalePrice | Change the price for future contributions           |
//! | ClosePresale       | Stop accepting contributions                        |
//!
//! ## Concurrency
//!
//! [`controller::PresaleController`] is `Sync`. Each presale's totals sit
//! behind one mutex and each allocation behind its own; locks are always
//! taken presale first, then allocation.

#![cfg_attr(test, allow(clippy::arithmetic_side_effects))]

pub mod allocation;
pub mod authorization;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod pda;
pub mod processor;
pub mod state;
pub mod transfer;
pub mod vesting;

/// Re-export the program ID.
pub use processor::id;
pub use {
    authorization::Caller,
    config::LedgerConfig,
    controller::PresaleController,
    error::{CapKind, PresaleError},
    processor::{process_instruction, InstructionOutcome},
};
