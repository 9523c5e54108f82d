//! TRv1 Presale Test Harness
//!
//! Provides an in-memory presale environment:
//!
//! - A [`PresaleController`] wired to an [`InMemoryBank`]
//! - A [`ScriptedTransferAgent`] that can be told to reject transfers for
//!   chosen accounts, for exercising failed settlements
//! - Funded contributors and a pre-filled token vault
//!
//! Nothing here touches a real bank or runtime; every test drives the crate
//! APIs directly.

use {
    log::*,
    parking_lot::Mutex,
    solana_clock::{Clock, UnixTimestamp},
    solana_pubkey::Pubkey,
    std::{collections::HashSet, sync::Arc},
    trv1_presale_program::{
        instruction::InitializePresaleArgs,
        state::{AllocationRecord, ContributionLimits, PresaleRecord, VestingSchedule},
        transfer::{Asset, InMemoryBank, TransferAgent, TransferError},
        Caller, LedgerConfig, PresaleController,
    },
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Price in smallest currency units per token.
pub const DEFAULT_PRICE: u64 = 1_000_000;

/// Token cap of the default presale.
pub const DEFAULT_MAX_TOKENS: u64 = 1_000_000;

/// Raise cap of the default presale.
pub const DEFAULT_MAX_RAISE: u64 = 10_000_000;

/// Vesting cliff of every harness presale.
pub const CLIFF_TIMESTAMP: UnixTimestamp = 1_750_000_000;

/// Currency given to each contributor from [`PresaleHarness::contributor`].
pub const DEFAULT_CONTRIBUTOR_FUNDS: u64 = 1_000_000_000_000;

pub const ONE_MONTH: i64 = 30 * 24 * 60 * 60;

/// Time at which harness contributions are made, a month before the cliff.
pub const SALE_TIME: UnixTimestamp = CLIFF_TIMESTAMP - ONE_MONTH;

/// Initialize env_logger once for test output.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .try_init();
}

/// A clock reading `unix_timestamp`.
pub fn clock_at(unix_timestamp: UnixTimestamp) -> Clock {
    Clock {
        unix_timestamp,
        ..Clock::default()
    }
}

// ─── Transfer agent ──────────────────────────────────────────────────────────

/// [`InMemoryBank`] front that rejects every transfer touching a blocked
/// account.
#[derive(Debug, Default)]
pub struct ScriptedTransferAgent {
    bank: InMemoryBank,
    blocked: Mutex<HashSet<Pubkey>>,
}

impl ScriptedTransferAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bank(&self) -> &InMemoryBank {
        &self.bank
    }

    pub fn block(&self, account: Pubkey) {
        self.blocked.lock().insert(account);
    }

    pub fn unblock(&self, account: &Pubkey) {
        self.blocked.lock().remove(account);
    }
}

impl TransferAgent for ScriptedTransferAgent {
    fn transfer(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), TransferError> {
        {
            let blocked = self.blocked.lock();
            if let Some(account) = [from, to].into_iter().find(|key| blocked.contains(*key)) {
                return Err(TransferError::Rejected(format!("{account} is blocked")));
            }
        }
        self.bank.transfer(asset, from, to, amount)
    }
}

// ─── Presale terms ───────────────────────────────────────────────────────────

/// Parameters of the presale a harness creates.
#[derive(Debug, Clone, Copy)]
pub struct PresaleTerms {
    pub price: u64,
    pub max_tokens: u64,
    pub max_raise: u64,
    pub cliff_timestamp: UnixTimestamp,
    pub vesting: VestingSchedule,
    pub limits: ContributionLimits,
}

impl Default for PresaleTerms {
    fn default() -> Self {
        Self {
            price: DEFAULT_PRICE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_raise: DEFAULT_MAX_RAISE,
            cliff_timestamp: CLIFF_TIMESTAMP,
            vesting: VestingSchedule::Cliff,
            limits: ContributionLimits::default(),
        }
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// One initialised presale with a funded token vault.
#[derive(Debug)]
pub struct PresaleHarness {
    pub controller: PresaleController,
    pub agent: Arc<ScriptedTransferAgent>,
    pub program_id: Pubkey,
    pub admin: Caller,
    pub mint: Pubkey,
    pub presale: Pubkey,
    pub terms: PresaleTerms,
}

impl PresaleHarness {
    /// Default presale: price 1,000,000, 1,000,000 tokens, 10,000,000 raise.
    pub fn new() -> Self {
        Self::with_terms(PresaleTerms::default())
    }

    pub fn with_terms(terms: PresaleTerms) -> Self {
        Self::with_config(terms, LedgerConfig::default())
    }

    pub fn with_config(terms: PresaleTerms, config: LedgerConfig) -> Self {
        init_logging();
        let agent = Arc::new(ScriptedTransferAgent::new());
        let program_id = trv1_presale_program::id();
        let controller = PresaleController::new(program_id, config, agent.clone())
            .expect("valid ledger config");

        let admin = Caller::signed(Pubkey::new_unique());
        let mint = Pubkey::new_unique();
        let presale = controller
            .initialize(
                &admin,
                &InitializePresaleArgs {
                    mint,
                    price: terms.price,
                    max_tokens: terms.max_tokens,
                    max_raise: terms.max_raise,
                    cliff_timestamp: terms.cliff_timestamp,
                    vesting: terms.vesting,
                    limits: terms.limits,
                },
            )
            .expect("initialize harness presale");

        let token_vault = controller
            .token_vault(&presale)
            .expect("presale exists");
        agent
            .bank()
            .mint_to(Asset::Token { mint }, &token_vault, terms.max_tokens)
            .expect("fund token vault");

        debug!("harness presale {presale} for mint {mint}");
        Self {
            controller,
            agent,
            program_id,
            admin,
            mint,
            presale,
            terms,
        }
    }

    /// A new signer holding [`DEFAULT_CONTRIBUTOR_FUNDS`].
    pub fn contributor(&self) -> Caller {
        self.contributor_with(DEFAULT_CONTRIBUTOR_FUNDS)
    }

    pub fn contributor_with(&self, currency: u64) -> Caller {
        let contributor = Caller::signed(Pubkey::new_unique());
        self.agent
            .bank()
            .mint_to(Asset::Currency, &contributor.key, currency)
            .expect("fund contributor");
        contributor
    }

    pub fn record(&self) -> PresaleRecord {
        self.controller
            .presale(&self.presale)
            .expect("harness presale exists")
    }

    pub fn allocation(&self, contributor: &Caller) -> Option<AllocationRecord> {
        self.controller.allocation(&self.presale, &contributor.key)
    }

    pub fn allocation_address(&self, contributor: &Caller) -> Pubkey {
        self.controller
            .allocation_address(&self.presale, &contributor.key)
    }

    pub fn currency_balance(&self, owner: &Pubkey) -> u64 {
        self.agent.bank().balance(Asset::Currency, owner)
    }

    pub fn token_balance(&self, owner: &Pubkey) -> u64 {
        self.agent.bank().balance(Asset::Token { mint: self.mint }, owner)
    }

    pub fn currency_vault(&self) -> Pubkey {
        self.controller
            .currency_vault(&self.presale)
            .expect("harness presale exists")
    }

    pub fn token_vault(&self) -> Pubkey {
        self.controller
            .token_vault(&self.presale)
            .expect("harness presale exists")
    }
}

impl Default for PresaleHarness {
    fn default() -> Self {
        Self::new()
    }
}
