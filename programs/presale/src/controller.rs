//! Top-level presale state machine.
//!
//! [`PresaleController`] keeps every presale in an arena keyed by its derived
//! address. Each entry owns the sale's [`ContributionLedger`] and
//! [`AllocationStore`]; the controller composes them with the
//! [`TransferAgent`] so that value moves before state is committed.

use {
    crate::{
        allocation::{AllocationStore, ClaimReceipt, ClaimRequest, RefundReceipt, VestingTerms},
        authorization::{AuthorizationGuard, Caller, Role},
        config::{ConfigError, LedgerConfig},
        error::PresaleError,
        instruction::InitializePresaleArgs,
        ledger::ContributionLedger,
        pda::{
            find_allocation_address, find_currency_vault_address, find_presale_address,
            find_token_vault_address,
        },
        state::{
            AllocationRecord, PresaleRecord, ALLOCATION_RECORD_DISCRIMINATOR,
            PRESALE_RECORD_DISCRIMINATOR,
        },
        transfer::{Asset, TransferAgent},
        vesting::VestingCalculator,
    },
    dashmap::{mapref::entry::Entry, DashMap},
    log::*,
    solana_clock::UnixTimestamp,
    solana_pubkey::Pubkey,
    std::sync::Arc,
};

/// Result of a successful contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionReceipt {
    pub presale: Pubkey,
    pub allocation: Pubkey,
    pub contributor: Pubkey,
    pub amount_paid: u64,
    pub tokens: u64,
    /// Price applied to this contribution.
    pub price: u64,
    /// Contributor's `tokens_allocated` after the contribution.
    pub tokens_allocated: u64,
    pub total_tokens_sold: u64,
    pub total_raised: u64,
}

/// Per-allocation result of an airdrop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirdropOutcome {
    Delivered(ClaimReceipt),
    /// Nothing was claimable (before the cliff, fully claimed or refunded).
    Skipped { allocation: Pubkey, reason: PresaleError },
    Failed { allocation: Pubkey, error: PresaleError },
}

impl AirdropOutcome {
    pub fn allocation(&self) -> Pubkey {
        match self {
            Self::Delivered(receipt) => receipt.allocation,
            Self::Skipped { allocation, .. } | Self::Failed { allocation, .. } => *allocation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AirdropReport {
    pub outcomes: Vec<AirdropOutcome>,
}

impl AirdropReport {
    /// Tokens delivered across all allocations.
    pub fn total_delivered(&self) -> u64 {
        self.delivered().map(|receipt| receipt.amount).sum()
    }

    pub fn delivered(&self) -> impl Iterator<Item = &ClaimReceipt> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            AirdropOutcome::Delivered(receipt) => Some(receipt),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (Pubkey, PresaleError)> + '_ {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            AirdropOutcome::Failed { allocation, error } => Some((*allocation, *error)),
            _ => None,
        })
    }
}

struct PresaleEntry {
    ledger: ContributionLedger,
    allocations: AllocationStore,
    mint: Pubkey,
    terms: VestingTerms,
    currency_vault: Pubkey,
    token_vault: Pubkey,
}

impl PresaleEntry {
    fn new(program_id: &Pubkey, address: &Pubkey, record: PresaleRecord) -> Self {
        let (currency_vault, _) = find_currency_vault_address(program_id, address);
        let (token_vault, _) = find_token_vault_address(program_id, address);
        Self {
            mint: record.mint,
            terms: VestingTerms::from(&record),
            ledger: ContributionLedger::new(record),
            allocations: AllocationStore::new(),
            currency_vault,
            token_vault,
        }
    }
}

pub struct PresaleController {
    program_id: Pubkey,
    config: LedgerConfig,
    calculator: VestingCalculator,
    transfers: Arc<dyn TransferAgent>,
    presales: DashMap<Pubkey, Arc<PresaleEntry>>,
}

impl std::fmt::Debug for PresaleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresaleController")
            .field("program_id", &self.program_id)
            .field("config", &self.config)
            .field("presales", &self.presales.len())
            .finish_non_exhaustive()
    }
}

impl PresaleController {
    pub fn new(
        program_id: Pubkey,
        config: LedgerConfig,
        transfers: Arc<dyn TransferAgent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            program_id,
            calculator: VestingCalculator::new(config.seconds_per_month),
            config,
            transfers,
            presales: DashMap::new(),
        })
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Derived presale and vault addresses for `mint`.
    pub fn presale_address(&self, mint: &Pubkey) -> Pubkey {
        find_presale_address(&self.program_id, mint).0
    }

    pub fn allocation_address(&self, presale: &Pubkey, contributor: &Pubkey) -> Pubkey {
        find_allocation_address(&self.program_id, presale, contributor).0
    }

    pub fn currency_vault(&self, presale: &Pubkey) -> Result<Pubkey, PresaleError> {
        Ok(self.entry(presale)?.currency_vault)
    }

    pub fn token_vault(&self, presale: &Pubkey) -> Result<Pubkey, PresaleError> {
        Ok(self.entry(presale)?.token_vault)
    }

    fn entry(&self, presale: &Pubkey) -> Result<Arc<PresaleEntry>, PresaleError> {
        self.presales
            .get(presale)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PresaleError::NotInitialized)
    }

    fn move_funds(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), PresaleError> {
        self.transfers
            .transfer(asset, from, to, amount)
            .map_err(|err| {
                warn!("transfer of {amount} {asset:?} from {from} to {to} failed: {err}");
                PresaleError::TransferFailed
            })
    }

    fn check_settlement_allowed(&self, entry: &PresaleEntry) -> Result<(), PresaleError> {
        if !self.config.claims_after_close && !entry.ledger.is_open() {
            return Err(PresaleError::PresaleClosed);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Admin operations
    // -----------------------------------------------------------------------

    /// Creates the presale for `args.mint` with `admin` as its admin.
    /// Returns the presale address.
    pub fn initialize(
        &self,
        admin: &Caller,
        args: &InitializePresaleArgs,
    ) -> Result<Pubkey, PresaleError> {
        AuthorizationGuard::require(admin, Role::Signer)?;
        let (address, bump) = find_presale_address(&self.program_id, &args.mint);

        match self.presales.entry(address) {
            Entry::Occupied(_) => Err(PresaleError::AlreadyInitialized),
            Entry::Vacant(vacant) => {
                if args.price == 0 || args.max_tokens == 0 || args.max_raise == 0 {
                    return Err(PresaleError::InvalidParameters);
                }
                args.vesting.validate()?;
                args.limits.validate()?;

                let record = PresaleRecord {
                    mint: args.mint,
                    admin: admin.key,
                    price: args.price,
                    max_tokens: args.max_tokens,
                    max_raise: args.max_raise,
                    total_tokens_sold: 0,
                    total_raised: 0,
                    cliff_timestamp: args.cliff_timestamp,
                    is_open: true,
                    vesting: args.vesting,
                    limits: args.limits,
                    bump,
                };
                vacant.insert(Arc::new(PresaleEntry::new(&self.program_id, &address, record)));
                info!(
                    "presale {address} initialized: mint {} price {} max_tokens {} max_raise {} cliff {}",
                    args.mint, args.price, args.max_tokens, args.max_raise, args.cliff_timestamp
                );
                Ok(address)
            }
        }
    }

    /// Sets the price for future contributions. Returns the previous price.
    pub fn update_price(
        &self,
        admin: &Caller,
        presale: &Pubkey,
        new_price: u64,
    ) -> Result<u64, PresaleError> {
        let entry = self.entry(presale)?;
        let old_price = entry.ledger.update_price(admin, new_price)?;
        info!("presale {presale} price {old_price} -> {new_price}");
        Ok(old_price)
    }

    pub fn close(&self, admin: &Caller, presale: &Pubkey) -> Result<PresaleRecord, PresaleError> {
        let entry = self.entry(presale)?;
        let record = entry.ledger.close(admin)?;
        info!(
            "presale {presale} closed: {} tokens sold, {} raised",
            record.total_tokens_sold, record.total_raised
        );
        Ok(record)
    }

    /// Delivers everything currently claimable to each allocation in
    /// `allocations`. Each allocation succeeds or fails on its own.
    pub fn airdrop(
        &self,
        admin: &Caller,
        presale: &Pubkey,
        allocations: &[Pubkey],
        now: UnixTimestamp,
    ) -> Result<AirdropReport, PresaleError> {
        if allocations.len() > self.config.max_airdrop_batch {
            return Err(PresaleError::AirdropBatchTooLarge);
        }
        let entry = self.entry(presale)?;
        entry.ledger.authorize_admin(admin)?;
        self.check_settlement_allowed(&entry)?;
        Ok(self.deliver_airdrop(presale, &entry, allocations, now))
    }

    /// [`Self::airdrop`] over every allocation of the presale, ignoring the
    /// per-instruction batch limit.
    pub fn airdrop_all(
        &self,
        admin: &Caller,
        presale: &Pubkey,
        now: UnixTimestamp,
    ) -> Result<AirdropReport, PresaleError> {
        let entry = self.entry(presale)?;
        entry.ledger.authorize_admin(admin)?;
        self.check_settlement_allowed(&entry)?;
        let mut allocations = entry.allocations.addresses();
        allocations.sort_unstable();
        Ok(self.deliver_airdrop(presale, &entry, &allocations, now))
    }

    fn deliver_airdrop(
        &self,
        presale: &Pubkey,
        entry: &PresaleEntry,
        allocations: &[Pubkey],
        now: UnixTimestamp,
    ) -> AirdropReport {
        let outcomes = allocations
            .iter()
            .map(|allocation| {
                let result = entry.allocations.claim(
                    allocation,
                    ClaimRequest::Airdrop,
                    entry.terms,
                    now,
                    &self.calculator,
                    |record, amount| {
                        self.move_funds(
                            Asset::Token { mint: entry.mint },
                            &entry.token_vault,
                            &record.contributor,
                            amount,
                        )
                    },
                );
                match result {
                    Ok(receipt) => AirdropOutcome::Delivered(receipt),
                    Err(
                        reason @ (PresaleError::VestingNotStarted
                        | PresaleError::InsufficientClaimable
                        | PresaleError::AllocationRefunded),
                    ) => AirdropOutcome::Skipped {
                        allocation: *allocation,
                        reason,
                    },
                    Err(error) => {
                        warn!("airdrop to {allocation} failed: {error}");
                        AirdropOutcome::Failed {
                            allocation: *allocation,
                            error,
                        }
                    }
                }
            })
            .collect();
        let report = AirdropReport { outcomes };
        info!(
            "presale {presale} airdrop: {} tokens to {} of {} allocations",
            report.total_delivered(),
            report.delivered().count(),
            allocations.len()
        );
        report
    }

    // -----------------------------------------------------------------------
    // Contributor operations
    // -----------------------------------------------------------------------

    /// Pays `amount` currency into the sale at `now` and credits the tokens
    /// it buys.
    pub fn contribute(
        &self,
        contributor: &Caller,
        presale: &Pubkey,
        amount: u64,
        now: UnixTimestamp,
    ) -> Result<ContributionReceipt, PresaleError> {
        let entry = self.entry(presale)?;
        AuthorizationGuard::require(contributor, Role::Signer)?;
        let (allocation, bump) =
            find_allocation_address(&self.program_id, presale, &contributor.key);
        let template = AllocationRecord::new(*presale, contributor.key, bump);

        let (plan, record) = entry.ledger.contribute(amount, now, |sale, plan| {
            let limit = sale.limits.max_per_contributor;
            entry.allocations.credit(allocation, template, plan, limit, || {
                self.move_funds(
                    Asset::Currency,
                    &contributor.key,
                    &entry.currency_vault,
                    plan.amount_paid,
                )
            })
        })?;

        info!(
            "presale {presale}: {} paid {} for {} tokens at {}",
            contributor.key, plan.amount_paid, plan.tokens, plan.price
        );
        Ok(ContributionReceipt {
            presale: *presale,
            allocation,
            contributor: contributor.key,
            amount_paid: plan.amount_paid,
            tokens: plan.tokens,
            price: plan.price,
            tokens_allocated: record.tokens_allocated,
            total_tokens_sold: plan.total_tokens_sold,
            total_raised: plan.total_raised,
        })
    }

    /// Withdraws `amount` vested tokens from the caller's allocation.
    pub fn claim(
        &self,
        contributor: &Caller,
        presale: &Pubkey,
        amount: u64,
        now: UnixTimestamp,
    ) -> Result<ClaimReceipt, PresaleError> {
        let entry = self.entry(presale)?;
        AuthorizationGuard::require(contributor, Role::Signer)?;
        self.check_settlement_allowed(&entry)?;
        let allocation = self.allocation_address(presale, &contributor.key);

        let receipt = entry.allocations.claim(
            &allocation,
            ClaimRequest::Contributor {
                caller: contributor,
                amount,
            },
            entry.terms,
            now,
            &self.calculator,
            |record, amount| {
                self.move_funds(
                    Asset::Token { mint: entry.mint },
                    &entry.token_vault,
                    &record.contributor,
                    amount,
                )
            },
        )?;
        info!(
            "presale {presale}: {} claimed {}, {} remaining",
            receipt.contributor, receipt.amount, receipt.remaining
        );
        Ok(receipt)
    }

    /// Returns the caller's currency and removes their allocation from the
    /// sale totals. Only valid before anything has been claimed.
    pub fn refund(
        &self,
        contributor: &Caller,
        presale: &Pubkey,
    ) -> Result<RefundReceipt, PresaleError> {
        let entry = self.entry(presale)?;
        AuthorizationGuard::require(contributor, Role::Signer)?;
        self.check_settlement_allowed(&entry)?;
        let allocation = self.allocation_address(presale, &contributor.key);

        let mut record = entry.ledger.lock();
        let receipt = entry
            .allocations
            .refund(&allocation, contributor, &mut record, |refunded| {
                self.move_funds(
                    Asset::Currency,
                    &entry.currency_vault,
                    &refunded.contributor,
                    refunded.currency_paid,
                )
            })?;
        drop(record);

        info!(
            "presale {presale}: {} refunded {}, {} tokens released",
            receipt.contributor, receipt.currency_returned, receipt.tokens_released
        );
        Ok(receipt)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn presale(&self, presale: &Pubkey) -> Option<PresaleRecord> {
        self.entry(presale).ok().map(|entry| entry.ledger.snapshot())
    }

    pub fn allocation(&self, presale: &Pubkey, contributor: &Pubkey) -> Option<AllocationRecord> {
        let entry = self.entry(presale).ok()?;
        entry
            .allocations
            .get(&self.allocation_address(presale, contributor))
    }

    /// Tokens `contributor` could claim from `presale` at `now`.
    pub fn claimable(
        &self,
        presale: &Pubkey,
        contributor: &Pubkey,
        now: UnixTimestamp,
    ) -> Result<u64, PresaleError> {
        let entry = self.entry(presale)?;
        let allocation = entry
            .allocations
            .get(&self.allocation_address(presale, contributor))
            .ok_or(PresaleError::AllocationNotFound)?;
        Ok(self.calculator.claimable_at(
            &allocation,
            now,
            entry.terms.cliff_timestamp,
            entry.terms.schedule,
        ))
    }

    pub fn presale_count(&self) -> usize {
        self.presales.len()
    }

    // -----------------------------------------------------------------------
    // Account data
    // -----------------------------------------------------------------------

    /// Serialized account data at `address`, if it is a presale or allocation
    /// owned by this controller.
    pub fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, PresaleError> {
        if let Some(record) = self.presale(address) {
            return encode_presale(&record).map(Some);
        }
        for entry in self.presales.iter() {
            if let Some(record) = entry.allocations.get(address) {
                return encode_allocation(&record).map(Some);
            }
        }
        Ok(None)
    }

    /// Every account this controller owns. Each presale is followed by its
    /// allocations, read while the presale lock is held.
    pub fn export_accounts(&self) -> Result<Vec<(Pubkey, Vec<u8>)>, PresaleError> {
        let entries: Vec<(Pubkey, Arc<PresaleEntry>)> = self
            .presales
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut accounts = Vec::new();
        for (address, entry) in entries {
            let record = entry.ledger.lock();
            accounts.push((address, encode_presale(&record)?));
            let mut allocations = entry.allocations.addresses();
            allocations.sort_unstable();
            for allocation in allocations {
                if let Some(data) = entry.allocations.get(&allocation) {
                    accounts.push((allocation, encode_allocation(&data)?));
                }
            }
        }
        Ok(accounts)
    }

    /// Rebuilds a controller from exported accounts. Every address must match
    /// the one derived from the record it holds, every record must be
    /// internally consistent, and each presale's totals must equal the sums
    /// over its unrefunded allocations.
    pub fn import_accounts<I>(
        program_id: Pubkey,
        config: LedgerConfig,
        transfers: Arc<dyn TransferAgent>,
        accounts: I,
    ) -> Result<Self, PresaleError>
    where
        I: IntoIterator<Item = (Pubkey, Vec<u8>)>,
    {
        let controller = Self::new(program_id, config, transfers).map_err(|err| {
            debug!("import: {err}");
            PresaleError::InvalidParameters
        })?;

        let mut allocations = Vec::new();
        for (address, data) in accounts {
            match data.first() {
                Some(&PRESALE_RECORD_DISCRIMINATOR) => {
                    let record = PresaleRecord::deserialize(&data).map_err(invalid_data)?;
                    if find_presale_address(&program_id, &record.mint) != (address, record.bump) {
                        return Err(PresaleError::InvalidAccountAddress);
                    }
                    if !record.is_consistent() {
                        debug!("import: presale {address} breaks its caps or parameters");
                        return Err(PresaleError::InvalidAccountData);
                    }
                    let entry = PresaleEntry::new(&program_id, &address, record);
                    if controller
                        .presales
                        .insert(address, Arc::new(entry))
                        .is_some()
                    {
                        return Err(PresaleError::AlreadyInitialized);
                    }
                }
                Some(&ALLOCATION_RECORD_DISCRIMINATOR) => {
                    let record = AllocationRecord::deserialize(&data).map_err(invalid_data)?;
                    if !record.is_consistent() {
                        debug!("import: allocation {address} claimed more than it holds");
                        return Err(PresaleError::InvalidAccountData);
                    }
                    allocations.push((address, record));
                }
                _ => return Err(PresaleError::InvalidAccountData),
            }
        }

        for (address, record) in allocations {
            let derived =
                find_allocation_address(&program_id, &record.presale, &record.contributor);
            if derived != (address, record.bump) {
                return Err(PresaleError::InvalidAccountAddress);
            }
            let entry = controller.entry(&record.presale)?;
            if !entry.allocations.restore(address, record) {
                return Err(PresaleError::InvalidAccountData);
            }
        }

        for entry in controller.presales.iter() {
            let (tokens, currency) = entry.allocations.live_totals()?;
            let record = entry.ledger.snapshot();
            if (tokens, currency) != (record.total_tokens_sold, record.total_raised) {
                debug!(
                    "import: presale {} totals ({}, {}) do not match allocations ({tokens}, {currency})",
                    entry.key(),
                    record.total_tokens_sold,
                    record.total_raised
                );
                return Err(PresaleError::InvalidAccountData);
            }
        }

        info!("imported {} presales", controller.presales.len());
        Ok(controller)
    }
}

fn invalid_data(err: std::io::Error) -> PresaleError {
    debug!("account data: {err}");
    PresaleError::InvalidAccountData
}

fn encode_presale(record: &PresaleRecord) -> Result<Vec<u8>, PresaleError> {
    let mut data = vec![0u8; PresaleRecord::SERIALIZED_SIZE];
    record.serialize_into(&mut data).map_err(invalid_data)?;
    Ok(data)
}

fn encode_allocation(record: &AllocationRecord) -> Result<Vec<u8>, PresaleError> {
    let mut data = vec![0u8; AllocationRecord::SERIALIZED_SIZE];
    record.serialize_into(&mut data).map_err(invalid_data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            state::{ContributionLimits, VestingSchedule},
            transfer::InMemoryBank,
        },
        assert_matches::assert_matches,
    };

    const CLIFF: UnixTimestamp = 1_700_000_000;
    const SALE: UnixTimestamp = CLIFF - 1_000;

    struct Setup {
        controller: PresaleController,
        bank: Arc<InMemoryBank>,
        admin: Caller,
        presale: Pubkey,
        mint: Pubkey,
    }

    fn setup_with(config: LedgerConfig) -> Setup {
        let bank = Arc::new(InMemoryBank::new());
        let controller =
            PresaleController::new(Pubkey::new_unique(), config, bank.clone()).unwrap();
        let admin = Caller::signed(Pubkey::new_unique());
        let mint = Pubkey::new_unique();
        let presale = controller
            .initialize(
                &admin,
                &InitializePresaleArgs {
                    mint,
                    price: 10,
                    max_tokens: 1_000,
                    max_raise: 10_000,
                    cliff_timestamp: CLIFF,
                    vesting: VestingSchedule::Cliff,
                    limits: ContributionLimits::default(),
                },
            )
            .unwrap();
        let token_vault = controller.token_vault(&presale).unwrap();
        bank.mint_to(Asset::Token { mint }, &token_vault, 1_000).unwrap();
        Setup {
            controller,
            bank,
            admin,
            presale,
            mint,
        }
    }

    fn setup() -> Setup {
        setup_with(LedgerConfig::default())
    }

    fn funded_contributor(setup: &Setup, currency: u64) -> Caller {
        let contributor = Caller::signed(Pubkey::new_unique());
        setup
            .bank
            .mint_to(Asset::Currency, &contributor.key, currency)
            .unwrap();
        contributor
    }

    #[test]
    fn test_initialize_twice() {
        let s = setup();
        let args = InitializePresaleArgs {
            mint: s.mint,
            price: 1,
            max_tokens: 1,
            max_raise: 1,
            cliff_timestamp: 0,
            vesting: VestingSchedule::Cliff,
            limits: ContributionLimits::default(),
        };
        assert_eq!(
            s.controller.initialize(&s.admin, &args),
            Err(PresaleError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_initialize_rejects_zero_caps_and_bad_schedule() {
        let s = setup();
        let base = InitializePresaleArgs {
            mint: Pubkey::new_unique(),
            price: 1,
            max_tokens: 1,
            max_raise: 1,
            cliff_timestamp: 0,
            vesting: VestingSchedule::Cliff,
            limits: ContributionLimits::default(),
        };
        for args in [
            InitializePresaleArgs { price: 0, ..base },
            InitializePresaleArgs { max_tokens: 0, ..base },
            InitializePresaleArgs { max_raise: 0, ..base },
            InitializePresaleArgs {
                vesting: VestingSchedule::Monthly {
                    upfront_bps: 1_000,
                    monthly_bps: 900,
                    months: 9,
                },
                ..base
            },
        ] {
            assert_eq!(
                s.controller.initialize(&s.admin, &args),
                Err(PresaleError::InvalidParameters)
            );
        }
        assert_eq!(s.controller.presale_count(), 1);
    }

    #[test]
    fn test_contribute_moves_currency_and_credits_tokens() {
        let s = setup();
        let contributor = funded_contributor(&s, 100);
        let receipt = s.controller.contribute(&contributor, &s.presale, 55, SALE).unwrap();

        assert_eq!(receipt.tokens, 5);
        assert_eq!(receipt.amount_paid, 55);
        assert_eq!(s.bank.balance(Asset::Currency, &contributor.key), 45);
        let vault = s.controller.currency_vault(&s.presale).unwrap();
        assert_eq!(s.bank.balance(Asset::Currency, &vault), 55);

        let record = s.controller.presale(&s.presale).unwrap();
        assert_eq!((record.total_tokens_sold, record.total_raised), (5, 55));
    }

    #[test]
    fn test_unfunded_contribution_leaves_ledger_untouched() {
        let s = setup();
        let contributor = funded_contributor(&s, 5);
        assert_eq!(
            s.controller.contribute(&contributor, &s.presale, 50, SALE),
            Err(PresaleError::TransferFailed)
        );
        let record = s.controller.presale(&s.presale).unwrap();
        assert_eq!((record.total_tokens_sold, record.total_raised), (0, 0));
        assert_eq!(s.controller.allocation(&s.presale, &contributor.key), None);
    }

    #[test]
    fn test_unknown_presale() {
        let s = setup();
        let contributor = funded_contributor(&s, 100);
        assert_eq!(
            s.controller.contribute(&contributor, &Pubkey::new_unique(), 10, SALE),
            Err(PresaleError::NotInitialized)
        );
    }

    #[test]
    fn test_claim_after_cliff_delivers_tokens() {
        let s = setup();
        let contributor = funded_contributor(&s, 100);
        s.controller.contribute(&contributor, &s.presale, 100, SALE).unwrap();

        assert_eq!(
            s.controller.claim(&contributor, &s.presale, 10, CLIFF - 1),
            Err(PresaleError::VestingNotStarted)
        );
        assert_eq!(s.controller.claimable(&s.presale, &contributor.key, CLIFF), Ok(10));

        let receipt = s.controller.claim(&contributor, &s.presale, 10, CLIFF).unwrap();
        assert_eq!(receipt.remaining, 0);
        assert_eq!(
            s.bank.balance(Asset::Token { mint: s.mint }, &contributor.key),
            10
        );
    }

    #[test]
    fn test_claims_after_close_policy() {
        let s = setup_with(LedgerConfig {
            claims_after_close: false,
            ..LedgerConfig::default()
        });
        let contributor = funded_contributor(&s, 100);
        s.controller.contribute(&contributor, &s.presale, 100, SALE).unwrap();
        s.controller.close(&s.admin, &s.presale).unwrap();

        assert_eq!(
            s.controller.claim(&contributor, &s.presale, 1, CLIFF),
            Err(PresaleError::PresaleClosed)
        );
        assert_eq!(
            s.controller.refund(&contributor, &s.presale),
            Err(PresaleError::PresaleClosed)
        );

        // The signature is checked before the lifecycle.
        let unsigned = Caller::unsigned(contributor.key);
        assert_eq!(
            s.controller.claim(&unsigned, &s.presale, 1, CLIFF),
            Err(PresaleError::Unauthorized)
        );
        assert_eq!(
            s.controller.refund(&unsigned, &s.presale),
            Err(PresaleError::Unauthorized)
        );
    }

    #[test]
    fn test_contribution_limits_and_window() {
        let s = setup();
        let limited = InitializePresaleArgs {
            mint: Pubkey::new_unique(),
            price: 10,
            max_tokens: 1_000,
            max_raise: 10_000,
            cliff_timestamp: CLIFF,
            vesting: VestingSchedule::Cliff,
            limits: ContributionLimits {
                min_contribution: 20,
                max_per_contributor: 100,
                sale_start: SALE,
                sale_end: SALE + 100,
            },
        };
        let presale = s.controller.initialize(&s.admin, &limited).unwrap();
        let contributor = funded_contributor(&s, 1_000);

        assert_eq!(
            s.controller.contribute(&contributor, &presale, 50, SALE - 1),
            Err(PresaleError::SaleNotActive)
        );
        assert_eq!(
            s.controller.contribute(&contributor, &presale, 19, SALE),
            Err(PresaleError::ContributionBelowLimit)
        );
        s.controller.contribute(&contributor, &presale, 60, SALE).unwrap();
        assert_eq!(
            s.controller.contribute(&contributor, &presale, 50, SALE + 1),
            Err(PresaleError::ContributorLimitExceeded)
        );
        s.controller.contribute(&contributor, &presale, 40, SALE + 100).unwrap();
        assert_eq!(
            s.controller.contribute(&contributor, &presale, 20, SALE + 101),
            Err(PresaleError::SaleNotActive)
        );

        let record = s.controller.presale(&presale).unwrap();
        assert_eq!((record.total_tokens_sold, record.total_raised), (10, 100));
        assert_eq!(s.bank.balance(Asset::Currency, &contributor.key), 900);

        // Another contributor has their own limit.
        let other = funded_contributor(&s, 1_000);
        s.controller.contribute(&other, &presale, 100, SALE).unwrap();

        assert_eq!(
            s.controller.initialize(
                &s.admin,
                &InitializePresaleArgs {
                    mint: Pubkey::new_unique(),
                    limits: ContributionLimits {
                        min_contribution: 200,
                        ..limited.limits
                    },
                    ..limited
                },
            ),
            Err(PresaleError::InvalidParameters)
        );
    }

    #[test]
    fn test_refund_returns_currency() {
        let s = setup();
        let contributor = funded_contributor(&s, 100);
        s.controller.contribute(&contributor, &s.presale, 100, SALE).unwrap();

        let receipt = s.controller.refund(&contributor, &s.presale).unwrap();
        assert_eq!(receipt.currency_returned, 100);
        assert_eq!(s.bank.balance(Asset::Currency, &contributor.key), 100);

        let record = s.controller.presale(&s.presale).unwrap();
        assert_eq!((record.total_tokens_sold, record.total_raised), (0, 0));
        assert_eq!(
            s.controller.claimable(&s.presale, &contributor.key, CLIFF),
            Ok(0)
        );
    }

    #[test]
    fn test_airdrop_batch_limit_and_admin_only() {
        let s = setup_with(LedgerConfig {
            max_airdrop_batch: 1,
            ..LedgerConfig::default()
        });
        let batch = [Pubkey::new_unique(), Pubkey::new_unique()];
        assert_eq!(
            s.controller.airdrop(&s.admin, &s.presale, &batch, CLIFF),
            Err(PresaleError::AirdropBatchTooLarge)
        );
        let stranger = Caller::signed(Pubkey::new_unique());
        assert_eq!(
            s.controller.airdrop(&stranger, &s.presale, &batch[..1], CLIFF),
            Err(PresaleError::Unauthorized)
        );
    }

    #[test]
    fn test_airdrop_reports_each_allocation() {
        let s = setup();
        let paid = funded_contributor(&s, 100);
        let refunded = funded_contributor(&s, 100);
        s.controller.contribute(&paid, &s.presale, 100, SALE).unwrap();
        s.controller.contribute(&refunded, &s.presale, 50, SALE).unwrap();
        s.controller.refund(&refunded, &s.presale).unwrap();

        let missing = Pubkey::new_unique();
        let batch = [
            s.controller.allocation_address(&s.presale, &paid.key),
            s.controller.allocation_address(&s.presale, &refunded.key),
            missing,
        ];
        let report = s.controller.airdrop(&s.admin, &s.presale, &batch, CLIFF).unwrap();

        assert_eq!(report.total_delivered(), 10);
        assert_matches!(
            report.outcomes[1],
            AirdropOutcome::Skipped {
                reason: PresaleError::AllocationRefunded,
                ..
            }
        );
        assert_eq!(
            report.failures().collect::<Vec<_>>(),
            vec![(missing, PresaleError::AllocationNotFound)]
        );
    }

    #[test]
    fn test_export_import_round_trip() {
        let s = setup();
        let contributor = funded_contributor(&s, 100);
        s.controller.contribute(&contributor, &s.presale, 70, SALE).unwrap();

        let accounts = s.controller.export_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        let allocation = s.controller.allocation_address(&s.presale, &contributor.key);
        assert_eq!(
            s.controller.account_data(&allocation).unwrap(),
            Some(accounts[1].1.clone())
        );

        let restored = PresaleController::import_accounts(
            *s.controller.program_id(),
            LedgerConfig::default(),
            s.bank.clone(),
            accounts.into_iter().rev(),
        )
        .unwrap();
        assert_eq!(restored.presale(&s.presale), s.controller.presale(&s.presale));
        assert_eq!(
            restored.allocation(&s.presale, &contributor.key),
            s.controller.allocation(&s.presale, &contributor.key)
        );
    }

    #[test]
    fn test_import_checks_totals_against_allocations() {
        let s = setup();
        let contributor = funded_contributor(&s, 100);
        s.controller.contribute(&contributor, &s.presale, 70, SALE).unwrap();
        let import = |accounts: Vec<(Pubkey, Vec<u8>)>| {
            PresaleController::import_accounts(
                *s.controller.program_id(),
                LedgerConfig::default(),
                s.bank.clone(),
                accounts,
            )
        };

        // The presale alone claims tokens that no allocation holds.
        let mut accounts = s.controller.export_accounts().unwrap();
        accounts.truncate(1);
        assert_matches!(import(accounts), Err(PresaleError::InvalidAccountData));

        let mut accounts = s.controller.export_accounts().unwrap();
        let mut record = PresaleRecord::deserialize(&accounts[0].1).unwrap();
        record.total_raised += 1;
        accounts[0].1 = encode_presale(&record).unwrap();
        assert_matches!(import(accounts), Err(PresaleError::InvalidAccountData));

        let mut accounts = s.controller.export_accounts().unwrap();
        let mut allocation = AllocationRecord::deserialize(&accounts[1].1).unwrap();
        allocation.tokens_claimed = allocation.tokens_allocated + 1;
        accounts[1].1 = encode_allocation(&allocation).unwrap();
        assert_matches!(import(accounts), Err(PresaleError::InvalidAccountData));

        assert_matches!(import(s.controller.export_accounts().unwrap()), Ok(_));
    }

    #[test]
    fn test_import_rejects_misplaced_account() {
        let s = setup();
        let mut accounts = s.controller.export_accounts().unwrap();
        accounts[0].0 = Pubkey::new_unique();
        assert_matches!(
            PresaleController::import_accounts(
                *s.controller.program_id(),
                LedgerConfig::default(),
                s.bank.clone(),
                accounts,
            ),
            Err(PresaleError::InvalidAccountAddress)
        );
    }
}
