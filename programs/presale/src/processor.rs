//! Instruction processing for the Presale program.

use {
    crate::{
        allocation::{ClaimReceipt, RefundReceipt},
        authorization::Caller,
        controller::{AirdropReport, ContributionReceipt, PresaleController},
        error::PresaleError,
        instruction::{InitializePresaleArgs, PresaleInstruction},
        pda::{
            find_allocation_address, find_currency_vault_address, find_presale_address,
            find_token_vault_address,
        },
        state::PresaleRecord,
    },
    log::*,
    solana_clock::Clock,
    solana_instruction::{AccountMeta, Instruction},
    solana_pubkey::Pubkey,
};

// ---------------------------------------------------------------------------
// Program ID
// ---------------------------------------------------------------------------

solana_pubkey::declare_id!("PresaLedger11111111111111111111111111111111");

/// What a successfully processed instruction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionOutcome {
    Initialized { presale: Pubkey },
    Contributed(ContributionReceipt),
    Claimed(ClaimReceipt),
    Refunded(RefundReceipt),
    Airdropped(AirdropReport),
    PriceUpdated { old_price: u64, new_price: u64 },
    Closed(PresaleRecord),
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

/// Decodes `instruction`, checks its account list and applies it to
/// `controller` at `clock.unix_timestamp`.
pub fn process_instruction(
    controller: &PresaleController,
    instruction: &Instruction,
    clock: &Clock,
) -> Result<InstructionOutcome, PresaleError> {
    if instruction.program_id != *controller.program_id() {
        return Err(PresaleError::IncorrectProgramId);
    }
    let decoded = PresaleInstruction::unpack(&instruction.data).map_err(|err| {
        debug!("presale: undecodable instruction data: {err}");
        PresaleError::InvalidInstructionData
    })?;

    trace!("presale process_instruction: {decoded:?}");

    let accounts = instruction.accounts.as_slice();
    match decoded {
        PresaleInstruction::InitializePresale(args) => {
            process_initialize_presale(controller, accounts, &args)
        }
        PresaleInstruction::Contribute { amount } => {
            process_contribute(controller, accounts, amount, clock)
        }
        PresaleInstruction::ClaimTokens { amount } => {
            process_claim_tokens(controller, accounts, amount, clock)
        }
        PresaleInstruction::RefundTokens => process_refund_tokens(controller, accounts),
        PresaleInstruction::AirdropTokens => process_airdrop_tokens(controller, accounts, clock),
        PresaleInstruction::UpdatePresalePrice { new_price } => {
            process_update_presale_price(controller, accounts, new_price)
        }
        PresaleInstruction::ClosePresale => process_close_presale(controller, accounts),
    }
}

// ---------------------------------------------------------------------------
// Account checks
// ---------------------------------------------------------------------------

fn check_number_of_accounts(accounts: &[AccountMeta], expected: usize) -> Result<(), PresaleError> {
    if accounts.len() < expected {
        debug!("presale: expected {expected} accounts, got {}", accounts.len());
        return Err(PresaleError::NotEnoughAccountKeys);
    }
    Ok(())
}

fn check_writable(accounts: &[AccountMeta], indices: &[usize]) -> Result<(), PresaleError> {
    for &index in indices {
        let meta = accounts
            .get(index)
            .ok_or(PresaleError::NotEnoughAccountKeys)?;
        if !meta.is_writable {
            debug!("presale: account {index} ({}) must be writable", meta.pubkey);
            return Err(PresaleError::AccountNotWritable);
        }
    }
    Ok(())
}

fn check_address(meta: &AccountMeta, expected: &Pubkey) -> Result<(), PresaleError> {
    if meta.pubkey != *expected {
        debug!("presale: expected account {expected}, got {}", meta.pubkey);
        return Err(PresaleError::InvalidAccountAddress);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction handlers
// ---------------------------------------------------------------------------

/// Accounts:
///   0. `[signer, writable]` — Admin.
///   1. `[writable]`         — Presale account.
fn process_initialize_presale(
    controller: &PresaleController,
    accounts: &[AccountMeta],
    args: &InitializePresaleArgs,
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 2)?;
    check_writable(accounts, &[0, 1])?;
    let (presale, _) = find_presale_address(controller.program_id(), &args.mint);
    check_address(&accounts[1], &presale)?;

    let presale = controller.initialize(&Caller::from(&accounts[0]), args)?;
    Ok(InstructionOutcome::Initialized { presale })
}

/// Accounts:
///   0. `[signer, writable]` — Contributor.
///   1. `[writable]`         — Presale account.
///   2. `[writable]`         — Allocation account.
///   3. `[writable]`         — Currency vault.
fn process_contribute(
    controller: &PresaleController,
    accounts: &[AccountMeta],
    amount: u64,
    clock: &Clock,
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 4)?;
    check_writable(accounts, &[0, 1, 2, 3])?;
    let contributor = &accounts[0].pubkey;
    let presale = &accounts[1].pubkey;
    let program_id = controller.program_id();
    check_address(
        &accounts[2],
        &find_allocation_address(program_id, presale, contributor).0,
    )?;
    check_address(&accounts[3], &find_currency_vault_address(program_id, presale).0)?;

    controller
        .contribute(
            &Caller::from(&accounts[0]),
            presale,
            amount,
            clock.unix_timestamp,
        )
        .map(InstructionOutcome::Contributed)
}

/// Accounts:
///   0. `[signer]`   — Contributor.
///   1. `[]`         — Presale account.
///   2. `[writable]` — Allocation account.
///   3. `[writable]` — Token vault.
fn process_claim_tokens(
    controller: &PresaleController,
    accounts: &[AccountMeta],
    amount: u64,
    clock: &Clock,
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 4)?;
    check_writable(accounts, &[2, 3])?;
    let contributor = &accounts[0].pubkey;
    let presale = &accounts[1].pubkey;
    let program_id = controller.program_id();
    check_address(
        &accounts[2],
        &find_allocation_address(program_id, presale, contributor).0,
    )?;
    check_address(&accounts[3], &find_token_vault_address(program_id, presale).0)?;

    controller
        .claim(
            &Caller::from(&accounts[0]),
            presale,
            amount,
            clock.unix_timestamp,
        )
        .map(InstructionOutcome::Claimed)
}

/// Accounts:
///   0. `[signer, writable]` — Contributor.
///   1. `[writable]`         — Presale account.
///   2. `[writable]`         — Allocation account.
///   3. `[writable]`         — Currency vault.
fn process_refund_tokens(
    controller: &PresaleController,
    accounts: &[AccountMeta],
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 4)?;
    check_writable(accounts, &[0, 1, 2, 3])?;
    let contributor = &accounts[0].pubkey;
    let presale = &accounts[1].pubkey;
    let program_id = controller.program_id();
    check_address(
        &accounts[2],
        &find_allocation_address(program_id, presale, contributor).0,
    )?;
    check_address(&accounts[3], &find_currency_vault_address(program_id, presale).0)?;

    controller
        .refund(&Caller::from(&accounts[0]), presale)
        .map(InstructionOutcome::Refunded)
}

/// Accounts:
///   0. `[signer]`    — Admin.
///   1. `[]`          — Presale account.
///   2. `[writable]`  — Token vault.
///   3.. `[writable]` — Allocation accounts.
fn process_airdrop_tokens(
    controller: &PresaleController,
    accounts: &[AccountMeta],
    clock: &Clock,
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 3)?;
    let presale = &accounts[1].pubkey;
    let allocations = &accounts[3..];
    let writable: Vec<usize> = (2..accounts.len()).collect();
    check_writable(accounts, &writable)?;
    check_address(
        &accounts[2],
        &find_token_vault_address(controller.program_id(), presale).0,
    )?;

    let allocations: Vec<Pubkey> = allocations.iter().map(|meta| meta.pubkey).collect();
    controller
        .airdrop(
            &Caller::from(&accounts[0]),
            presale,
            &allocations,
            clock.unix_timestamp,
        )
        .map(InstructionOutcome::Airdropped)
}

/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[writable]` — Presale account.
fn process_update_presale_price(
    controller: &PresaleController,
    accounts: &[AccountMeta],
    new_price: u64,
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 2)?;
    check_writable(accounts, &[1])?;
    let old_price =
        controller.update_price(&Caller::from(&accounts[0]), &accounts[1].pubkey, new_price)?;
    Ok(InstructionOutcome::PriceUpdated {
        old_price,
        new_price,
    })
}

/// Accounts:
///   0. `[signer]`   — Admin.
///   1. `[writable]` — Presale account.
fn process_close_presale(
    controller: &PresaleController,
    accounts: &[AccountMeta],
) -> Result<InstructionOutcome, PresaleError> {
    check_number_of_accounts(accounts, 2)?;
    check_writable(accounts, &[1])?;
    controller
        .close(&Caller::from(&accounts[0]), &accounts[1].pubkey)
        .map(InstructionOutcome::Closed)
}
