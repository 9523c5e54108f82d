//! Per-contributor allocation records.
//!
//! Each [`AllocationRecord`] sits behind its own mutex, keyed by its derived
//! address. Claims lock only the allocation they touch, so claims by
//! different contributors run in parallel. Contributions and refunds also
//! change the presale totals and are called with the presale lock already
//! held (presale before allocation, always).

use {
    crate::{
        authorization::{AuthorizationGuard, Caller, Role},
        error::PresaleError,
        ledger::{ContributionLedger, ContributionPlan},
        state::{AllocationRecord, PresaleRecord, VestingSchedule},
        vesting::VestingCalculator,
    },
    dashmap::DashMap,
    log::*,
    parking_lot::Mutex,
    solana_clock::UnixTimestamp,
    solana_pubkey::Pubkey,
    std::sync::Arc,
};

/// Vesting parameters of a presale. Fixed at initialisation, so claims can
/// read them without taking the presale lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VestingTerms {
    pub cliff_timestamp: UnixTimestamp,
    pub schedule: VestingSchedule,
}

impl From<&PresaleRecord> for VestingTerms {
    fn from(record: &PresaleRecord) -> Self {
        Self {
            cliff_timestamp: record.cliff_timestamp,
            schedule: record.vesting,
        }
    }
}

/// How much a claim asks for and on whose authority.
#[derive(Debug, Clone, Copy)]
pub enum ClaimRequest<'a> {
    /// A contributor claiming `amount` of their own allocation.
    Contributor { caller: &'a Caller, amount: u64 },
    /// An admin-approved airdrop of everything currently claimable.
    Airdrop,
}

/// Result of a successful claim or airdrop delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub allocation: Pubkey,
    pub contributor: Pubkey,
    /// Tokens delivered by this claim.
    pub amount: u64,
    /// `tokens_claimed` after the claim.
    pub tokens_claimed: u64,
    /// `tokens_allocated - tokens_claimed` after the claim.
    pub remaining: u64,
}

/// Result of a successful refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundReceipt {
    pub allocation: Pubkey,
    pub contributor: Pubkey,
    /// Currency returned to the contributor.
    pub currency_returned: u64,
    /// Tokens released back to the sale.
    pub tokens_released: u64,
}

#[derive(Debug, Default)]
pub struct AllocationStore {
    records: DashMap<Pubkey, Arc<Mutex<AllocationRecord>>>,
}

impl AllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of the allocation at `address`.
    pub fn get(&self, address: &Pubkey) -> Option<AllocationRecord> {
        self.slot(address).map(|slot| slot.lock().clone())
    }

    /// Addresses of every allocation, in no particular order.
    pub fn addresses(&self) -> Vec<Pubkey> {
        self.records.iter().map(|entry| *entry.key()).collect()
    }

    /// Sums of `tokens_allocated` and `currency_paid` over every allocation
    /// that has not been refunded.
    pub fn live_totals(&self) -> Result<(u64, u64), PresaleError> {
        self.records
            .iter()
            .try_fold((0u64, 0u64), |(tokens, currency), entry| -> Result<_, PresaleError> {
                let record = entry.value().lock();
                if record.refunded {
                    return Ok((tokens, currency));
                }
                Ok((
                    tokens
                        .checked_add(record.tokens_allocated)
                        .ok_or(PresaleError::ArithmeticOverflow)?,
                    currency
                        .checked_add(record.currency_paid)
                        .ok_or(PresaleError::ArithmeticOverflow)?,
                ))
            })
    }

    fn slot(&self, address: &Pubkey) -> Option<Arc<Mutex<AllocationRecord>>> {
        // Clone the Arc out so the shard guard is released before locking.
        self.records.get(address).map(|entry| Arc::clone(entry.value()))
    }

    /// Inserts a record loaded from account data. Existing records win.
    pub(crate) fn restore(&self, address: Pubkey, record: AllocationRecord) -> bool {
        let mut inserted = false;
        self.records.entry(address).or_insert_with(|| {
            inserted = true;
            Arc::new(Mutex::new(record))
        });
        inserted
    }

    /// Adds a planned contribution to the allocation at `address`, creating it
    /// on first contribution.
    ///
    /// Must be called with the presale lock held (see
    /// [`ContributionLedger::contribute`]). `max_per_contributor` bounds the
    /// allocation's cumulative `currency_paid` (zero for no bound). `pay`
    /// moves the currency; the allocation is only written once it succeeds.
    pub(crate) fn credit<F>(
        &self,
        address: Pubkey,
        template: AllocationRecord,
        plan: &ContributionPlan,
        max_per_contributor: u64,
        pay: F,
    ) -> Result<AllocationRecord, PresaleError>
    where
        F: FnOnce() -> Result<(), PresaleError>,
    {
        match self.slot(&address) {
            Some(slot) => {
                let mut record = slot.lock();
                let updated = Self::with_contribution(&record, plan, max_per_contributor)?;
                pay()?;
                *record = updated.clone();
                Ok(updated)
            }
            None => {
                let created = Self::with_contribution(&template, plan, max_per_contributor)?;
                pay()?;
                self.records
                    .insert(address, Arc::new(Mutex::new(created.clone())));
                Ok(created)
            }
        }
    }

    fn with_contribution(
        record: &AllocationRecord,
        plan: &ContributionPlan,
        max_per_contributor: u64,
    ) -> Result<AllocationRecord, PresaleError> {
        if record.refunded {
            return Err(PresaleError::AllocationRefunded);
        }
        let currency_paid = record
            .currency_paid
            .checked_add(plan.amount_paid)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        if max_per_contributor != 0 && currency_paid > max_per_contributor {
            debug!(
                "contribute: {} would have paid {currency_paid}, limit {max_per_contributor}",
                record.contributor
            );
            return Err(PresaleError::ContributorLimitExceeded);
        }
        let tokens_allocated = record
            .tokens_allocated
            .checked_add(plan.tokens)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        Ok(AllocationRecord {
            currency_paid,
            tokens_allocated,
            ..record.clone()
        })
    }

    /// Delivers vested tokens from the allocation at `address`.
    ///
    /// `deliver` moves the tokens; `tokens_claimed` is only advanced once it
    /// succeeds.
    pub fn claim<F>(
        &self,
        address: &Pubkey,
        request: ClaimRequest,
        terms: VestingTerms,
        now: UnixTimestamp,
        calculator: &VestingCalculator,
        deliver: F,
    ) -> Result<ClaimReceipt, PresaleError>
    where
        F: FnOnce(&AllocationRecord, u64) -> Result<(), PresaleError>,
    {
        if let ClaimRequest::Contributor { amount: 0, .. } = request {
            return Err(PresaleError::InvalidParameters);
        }
        let slot = self
            .slot(address)
            .ok_or(PresaleError::AllocationNotFound)?;
        let mut record = slot.lock();

        if let ClaimRequest::Contributor { caller, .. } = request {
            AuthorizationGuard::require(caller, Role::Contributor(&record.contributor))?;
        }
        if record.refunded {
            return Err(PresaleError::AllocationRefunded);
        }
        if !VestingCalculator::cliff_reached(now, terms.cliff_timestamp) {
            return Err(PresaleError::VestingNotStarted);
        }

        let available =
            calculator.claimable_at(&record, now, terms.cliff_timestamp, terms.schedule);
        let amount = match request {
            ClaimRequest::Contributor { amount, .. } => amount,
            ClaimRequest::Airdrop => available,
        };
        if amount == 0 || amount > available {
            debug!(
                "claim: {} requested {amount}, {available} available",
                record.contributor
            );
            return Err(PresaleError::InsufficientClaimable);
        }

        let tokens_claimed = record
            .tokens_claimed
            .checked_add(amount)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        deliver(&*record, amount)?;
        record.tokens_claimed = tokens_claimed;

        Ok(ClaimReceipt {
            allocation: *address,
            contributor: record.contributor,
            amount,
            tokens_claimed,
            remaining: record.unclaimed(),
        })
    }

    /// Refunds the allocation at `address` and removes it from `presale`'s
    /// totals.
    ///
    /// `presale` must be the locked record the allocation belongs to. `repay`
    /// returns the currency; nothing is written unless it succeeds.
    pub(crate) fn refund<F>(
        &self,
        address: &Pubkey,
        caller: &Caller,
        presale: &mut PresaleRecord,
        repay: F,
    ) -> Result<RefundReceipt, PresaleError>
    where
        F: FnOnce(&AllocationRecord) -> Result<(), PresaleError>,
    {
        let slot = self
            .slot(address)
            .ok_or(PresaleError::AllocationNotFound)?;
        let mut record = slot.lock();

        AuthorizationGuard::require(caller, Role::Contributor(&record.contributor))?;
        if record.refunded || record.tokens_claimed > 0 {
            return Err(PresaleError::AlreadyClaimed);
        }

        let mut reversed = presale.clone();
        ContributionLedger::reverse(&mut reversed, record.tokens_allocated, record.currency_paid)?;
        repay(&*record)?;

        *presale = reversed;
        record.refunded = true;

        Ok(RefundReceipt {
            allocation: *address,
            contributor: record.contributor,
            currency_returned: record.currency_paid,
            tokens_released: record.tokens_allocated,
        })
    }
}
