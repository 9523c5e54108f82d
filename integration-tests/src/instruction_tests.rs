//! Integration tests for instruction processing.
//!
//! Drives the presale through encoded instructions, checks the account-list
//! validation, configuration loading, and account export/import.

use {
    crate::harness::*,
    assert_matches::assert_matches,
    solana_instruction::{error::InstructionError, Instruction},
    solana_pubkey::Pubkey,
    std::sync::Arc,
    trv1_presale_program::{
        constants::CONTRIBUTE_OPCODE,
        controller::ContributionReceipt,
        instruction::{self, InitializePresaleArgs, PresaleInstruction},
        state::{AllocationRecord, ContributionLimits, PresaleRecord, VestingSchedule},
        transfer::Asset,
        process_instruction, InstructionOutcome, LedgerConfig, PresaleController, PresaleError,
    },
};

fn run(h: &PresaleHarness, ix: &Instruction, now: i64) -> Result<InstructionOutcome, PresaleError> {
    process_instruction(&h.controller, ix, &clock_at(now))
}

// ═══════════════════════════════════════════════════════════════════════════
//  1. End-to-end through the processor
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_presale_via_instructions() {
    init_logging();
    let agent = Arc::new(ScriptedTransferAgent::new());
    let program_id = trv1_presale_program::id();
    let controller =
        PresaleController::new(program_id, LedgerConfig::default(), agent.clone()).unwrap();
    let admin = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    let clock = clock_at(CLIFF_TIMESTAMP - 10);

    let init = instruction::initialize_presale(
        &program_id,
        &admin,
        InitializePresaleArgs {
            mint,
            price: DEFAULT_PRICE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_raise: DEFAULT_MAX_RAISE,
            cliff_timestamp: CLIFF_TIMESTAMP,
            vesting: VestingSchedule::Cliff,
            limits: ContributionLimits::default(),
        },
    );
    let presale = match process_instruction(&controller, &init, &clock).unwrap() {
        InstructionOutcome::Initialized { presale } => presale,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(
        process_instruction(&controller, &init, &clock),
        Err(PresaleError::AlreadyInitialized)
    );

    agent
        .bank()
        .mint_to(Asset::Currency, &alice, 5_000_000)
        .unwrap();
    let token_vault = controller.token_vault(&presale).unwrap();
    agent
        .bank()
        .mint_to(Asset::Token { mint }, &token_vault, 10)
        .unwrap();

    assert_matches!(
        process_instruction(
            &controller,
            &instruction::contribute(&program_id, &alice, &presale, 4_200_000),
            &clock
        ),
        Ok(InstructionOutcome::Contributed(ContributionReceipt {
            tokens: 4,
            total_raised: 4_200_000,
            ..
        }))
    );
    assert_eq!(
        process_instruction(
            &controller,
            &instruction::update_presale_price(&program_id, &admin, &presale, 2_000_000),
            &clock
        ),
        Ok(InstructionOutcome::PriceUpdated {
            old_price: DEFAULT_PRICE,
            new_price: 2_000_000
        })
    );
    assert_eq!(
        process_instruction(
            &controller,
            &instruction::claim_tokens(&program_id, &alice, &presale, 1),
            &clock
        ),
        Err(PresaleError::VestingNotStarted)
    );

    let later = clock_at(CLIFF_TIMESTAMP);
    assert_matches!(
        process_instruction(
            &controller,
            &instruction::claim_tokens(&program_id, &alice, &presale, 1),
            &later
        ),
        Ok(InstructionOutcome::Claimed(receipt)) if receipt.remaining == 3
    );
    assert_matches!(
        process_instruction(
            &controller,
            &instruction::airdrop_tokens(&program_id, &admin, &presale, &[alice]),
            &later
        ),
        Ok(InstructionOutcome::Airdropped(report)) if report.total_delivered() == 3
    );
    assert_matches!(
        process_instruction(
            &controller,
            &instruction::close_presale(&program_id, &admin, &presale),
            &later
        ),
        Ok(InstructionOutcome::Closed(PresaleRecord {
            is_open: false,
            total_tokens_sold: 4,
            ..
        }))
    );
    assert_eq!(
        process_instruction(
            &controller,
            &instruction::refund_tokens(&program_id, &alice, &presale),
            &later
        ),
        Err(PresaleError::AlreadyClaimed)
    );
    assert_eq!(agent.bank().balance(Asset::Token { mint }, &alice), 4);
}

#[test]
fn test_refund_via_instruction() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    run(
        &h,
        &instruction::contribute(&h.program_id, &alice.key, &h.presale, 3_000_000),
        0,
    )
    .unwrap();

    assert_matches!(
        run(
            &h,
            &instruction::refund_tokens(&h.program_id, &alice.key, &h.presale),
            0
        ),
        Ok(InstructionOutcome::Refunded(receipt)) if receipt.currency_returned == 3_000_000
    );
    assert_eq!(h.currency_balance(&alice.key), DEFAULT_CONTRIBUTOR_FUNDS);
}

// ═══════════════════════════════════════════════════════════════════════════
//  2. Account and data validation
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_someone_elses_allocation_is_rejected() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    let mallory = h.contributor();
    run(
        &h,
        &instruction::contribute(&h.program_id, &alice.key, &h.presale, 1_000_000),
        0,
    )
    .unwrap();

    // Mallory signs but points the claim at Alice's allocation.
    let mut ix = instruction::claim_tokens(&h.program_id, &mallory.key, &h.presale, 1);
    ix.accounts[2].pubkey = h.allocation_address(&alice);
    assert_eq!(
        run(&h, &ix, CLIFF_TIMESTAMP),
        Err(PresaleError::InvalidAccountAddress)
    );
}

#[test]
fn test_wrong_vault_is_rejected() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    let mut ix = instruction::contribute(&h.program_id, &alice.key, &h.presale, 1_000_000);
    ix.accounts[3].pubkey = alice.key;
    assert_eq!(run(&h, &ix, 0), Err(PresaleError::InvalidAccountAddress));
    assert_eq!(h.currency_balance(&alice.key), DEFAULT_CONTRIBUTOR_FUNDS);
}

#[test]
fn test_unsigned_contribution_is_rejected() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    let mut ix = instruction::contribute(&h.program_id, &alice.key, &h.presale, 1_000_000);
    ix.accounts[0].is_signer = false;
    assert_eq!(run(&h, &ix, 0), Err(PresaleError::Unauthorized));
}

#[test]
fn test_readonly_allocation_in_airdrop_is_rejected() {
    let h = PresaleHarness::new();
    let mut ix = instruction::airdrop_tokens(
        &h.program_id,
        &h.admin.key,
        &h.presale,
        &[Pubkey::new_unique(), Pubkey::new_unique()],
    );
    ix.accounts[4].is_writable = false;
    assert_eq!(run(&h, &ix, 0), Err(PresaleError::AccountNotWritable));
}

#[test]
fn test_oversized_airdrop_is_rejected() {
    let h = PresaleHarness::new();
    let contributors: Vec<Pubkey> = (0..=h.controller.config().max_airdrop_batch)
        .map(|_| Pubkey::new_unique())
        .collect();
    let ix = instruction::airdrop_tokens(&h.program_id, &h.admin.key, &h.presale, &contributors);
    assert_eq!(
        run(&h, &ix, CLIFF_TIMESTAMP),
        Err(PresaleError::AirdropBatchTooLarge)
    );
}

#[test]
fn test_truncated_arguments_are_rejected() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    let mut ix = instruction::contribute(&h.program_id, &alice.key, &h.presale, 1_000_000);
    ix.data = CONTRIBUTE_OPCODE[..].to_vec();
    ix.data.extend_from_slice(&[1, 2, 3]);
    assert_eq!(run(&h, &ix, 0), Err(PresaleError::InvalidInstructionData));
}

#[test]
fn test_unknown_presale_is_reported() {
    let h = PresaleHarness::new();
    let ix = instruction::close_presale(&h.program_id, &h.admin.key, &Pubkey::new_unique());
    assert_eq!(run(&h, &ix, 0), Err(PresaleError::NotInitialized));
}

#[test]
fn test_errors_surface_as_custom_codes() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    let err = run(
        &h,
        &instruction::contribute(&h.program_id, &alice.key, &h.presale, 10),
        0,
    )
    .unwrap_err();
    assert_eq!(err, PresaleError::BelowMinimumContribution);
    assert_eq!(
        InstructionError::from(err),
        InstructionError::Custom(err.code())
    );
    assert_eq!(PresaleError::from_code(err.code()), Some(err));
}

#[test]
fn test_instruction_data_matches_client_encoding() {
    let data = PresaleInstruction::Contribute { amount: 1_500_000 }
        .pack()
        .unwrap();
    let mut expected = CONTRIBUTE_OPCODE.to_vec();
    expected.extend_from_slice(&1_500_000u64.to_le_bytes());
    assert_eq!(data, expected);
}

// ═══════════════════════════════════════════════════════════════════════════
//  3. Configuration
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_config_from_json() {
    let config: LedgerConfig =
        serde_json::from_str(r#"{ "max_airdrop_batch": 8, "claims_after_close": false }"#)
            .unwrap();
    assert_eq!(config.max_airdrop_batch, 8);
    assert!(!config.claims_after_close);
    assert_eq!(config.seconds_per_month, ONE_MONTH);

    let round_trip: LedgerConfig =
        serde_json::from_value(serde_json::to_value(&config).unwrap()).unwrap();
    assert_eq!(round_trip, config);
}

#[test]
fn test_invalid_config_is_refused() {
    let config: LedgerConfig = serde_json::from_str(r#"{ "max_airdrop_batch": 0 }"#).unwrap();
    let agent = Arc::new(ScriptedTransferAgent::new());
    assert!(PresaleController::new(Pubkey::new_unique(), config, agent).is_err());
}

// ═══════════════════════════════════════════════════════════════════════════
//  4. Account export and import
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_exported_accounts_decode() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    h.controller.contribute(&alice, &h.presale, 2_000_000, SALE_TIME).unwrap();

    let presale_data = h.controller.account_data(&h.presale).unwrap().unwrap();
    assert_eq!(presale_data.len(), PresaleRecord::SERIALIZED_SIZE);
    assert_eq!(PresaleRecord::deserialize(&presale_data).unwrap(), h.record());

    let allocation_data = h
        .controller
        .account_data(&h.allocation_address(&alice))
        .unwrap()
        .unwrap();
    assert_eq!(allocation_data.len(), AllocationRecord::SERIALIZED_SIZE);
    assert_eq!(
        AllocationRecord::deserialize(&allocation_data).ok(),
        h.allocation(&alice)
    );
    assert_eq!(h.controller.account_data(&Pubkey::new_unique()), Ok(None));
}

#[test]
fn test_imported_ledger_keeps_working() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    let bob = h.contributor();
    h.controller.contribute(&alice, &h.presale, 6_000_000, SALE_TIME).unwrap();
    h.controller.contribute(&bob, &h.presale, 3_000_000, SALE_TIME).unwrap();
    h.controller.refund(&bob, &h.presale).unwrap();

    let restored = PresaleController::import_accounts(
        h.program_id,
        LedgerConfig::default(),
        h.agent.clone(),
        h.controller.export_accounts().unwrap(),
    )
    .unwrap();

    assert_eq!(restored.presale(&h.presale), Some(h.record()));
    assert_eq!(
        restored.contribute(&bob, &h.presale, 1_000_000, SALE_TIME),
        Err(PresaleError::AllocationRefunded)
    );
    assert_matches!(
        restored.contribute(&alice, &h.presale, 5_000_000, SALE_TIME),
        Err(PresaleError::CapExceeded { .. })
    );
    restored.contribute(&alice, &h.presale, 4_000_000, SALE_TIME).unwrap();
    assert_eq!(
        restored.claim(&alice, &h.presale, 10, CLIFF_TIMESTAMP).map(|r| r.remaining),
        Ok(0)
    );
}

#[test]
fn test_import_rejects_garbage() {
    let agent = Arc::new(ScriptedTransferAgent::new());
    assert_matches!(
        PresaleController::import_accounts(
            Pubkey::new_unique(),
            LedgerConfig::default(),
            agent.clone(),
            vec![(Pubkey::new_unique(), vec![42u8; 16])],
        ),
        Err(PresaleError::InvalidAccountData)
    );

    // An allocation whose presale was never exported.
    let h = PresaleHarness::new();
    let alice = h.contributor();
    h.controller.contribute(&alice, &h.presale, 1_000_000, SALE_TIME).unwrap();
    let accounts = h.controller.export_accounts().unwrap();
    assert_matches!(
        PresaleController::import_accounts(
            h.program_id,
            LedgerConfig::default(),
            agent,
            accounts.into_iter().skip(1),
        ),
        Err(PresaleError::NotInitialized)
    );
}

#[test]
fn test_import_rejects_inconsistent_ledger() {
    let h = PresaleHarness::new();
    let alice = h.contributor();
    h.controller.contribute(&alice, &h.presale, 2_000_000, SALE_TIME).unwrap();
    h.controller.claim(&alice, &h.presale, 1, CLIFF_TIMESTAMP).unwrap();
    let exported = h.controller.export_accounts().unwrap();
    let import = |accounts: Vec<(Pubkey, Vec<u8>)>| {
        PresaleController::import_accounts(
            h.program_id,
            LedgerConfig::default(),
            h.agent.clone(),
            accounts,
        )
    };
    let with_presale = |edit: &dyn Fn(&mut PresaleRecord)| {
        let mut accounts = exported.clone();
        let mut record = PresaleRecord::deserialize(&accounts[0].1).unwrap();
        edit(&mut record);
        record.serialize_into(&mut accounts[0].1).unwrap();
        accounts
    };
    let with_allocation = |edit: &dyn Fn(&mut AllocationRecord)| {
        let mut accounts = exported.clone();
        let mut record = AllocationRecord::deserialize(&accounts[1].1).unwrap();
        edit(&mut record);
        record.serialize_into(&mut accounts[1].1).unwrap();
        accounts
    };

    // Totals beyond the caps.
    assert_matches!(
        import(with_presale(&|record: &mut PresaleRecord| {
            record.total_tokens_sold = record.max_tokens + 5;
            record.total_raised = record.max_raise + 5;
        })),
        Err(PresaleError::InvalidAccountData)
    );
    // Totals within the caps but out of step with the allocations.
    assert_matches!(
        import(with_presale(&|record: &mut PresaleRecord| record.total_tokens_sold += 1)),
        Err(PresaleError::InvalidAccountData)
    );
    assert_matches!(
        import(with_presale(&|record: &mut PresaleRecord| record.price = 0)),
        Err(PresaleError::InvalidAccountData)
    );
    // Claimed more than allocated.
    assert_matches!(
        import(with_allocation(&|record: &mut AllocationRecord| {
            record.tokens_claimed = record.tokens_allocated + 100;
        })),
        Err(PresaleError::InvalidAccountData)
    );
    // Refunded after a claim.
    assert_matches!(
        import(with_allocation(&|record: &mut AllocationRecord| record.refunded = true)),
        Err(PresaleError::InvalidAccountData)
    );

    let restored = import(exported.clone()).unwrap();
    assert_eq!(restored.presale(&h.presale), Some(h.record()));
}
