//! Program-derived addresses of presale and allocation records.
//!
//! Every record lives at an address that is a pure function of the keys that
//! identify it, so two callers that agree on the mint (and contributor) always
//! agree on where the state is.

use {
    crate::constants::{ALLOCATION_SEED, CURRENCY_VAULT_SEED, PRESALE_SEED, TOKEN_VAULT_SEED},
    solana_pubkey::Pubkey,
};

/// Presale record address for `mint`: seeds `["presale", mint]`.
pub fn find_presale_address(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PRESALE_SEED, mint.as_ref()], program_id)
}

/// Allocation record address: seeds `["allocation", presale, contributor]`.
pub fn find_allocation_address(
    program_id: &Pubkey,
    presale: &Pubkey,
    contributor: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[ALLOCATION_SEED, presale.as_ref(), contributor.as_ref()],
        program_id,
    )
}

/// Account that holds the currency raised by `presale`.
pub fn find_currency_vault_address(program_id: &Pubkey, presale: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CURRENCY_VAULT_SEED, presale.as_ref()], program_id)
}

/// Account that holds the tokens delivered by claims and airdrops.
pub fn find_token_vault_address(program_id: &Pubkey, presale: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[TOKEN_VAULT_SEED, presale.as_ref()], program_id)
}
