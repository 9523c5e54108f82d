//! Presale-wide caps and running totals.
//!
//! [`ContributionLedger`] owns the [`PresaleRecord`] of one sale behind a
//! single mutex. Every operation that reads and then writes the shared totals
//! does so while holding that lock, so two contributions can never both pass
//! the cap check against the same stale totals.

use {
    crate::{
        authorization::{AuthorizationGuard, Caller, Role},
        error::{CapKind, PresaleError},
        state::PresaleRecord,
    },
    log::*,
    parking_lot::{Mutex, MutexGuard},
    solana_clock::UnixTimestamp,
};

/// The checked outcome of a contribution, computed before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionPlan {
    /// Currency paid by this contribution.
    pub amount_paid: u64,
    /// Tokens bought by this contribution (`amount_paid / price`, truncated).
    pub tokens: u64,
    /// Price in force when the plan was made.
    pub price: u64,
    /// `total_tokens_sold` after the contribution.
    pub total_tokens_sold: u64,
    /// `total_raised` after the contribution.
    pub total_raised: u64,
}

/// Owner of one presale's [`PresaleRecord`].
#[derive(Debug)]
pub struct ContributionLedger {
    record: Mutex<PresaleRecord>,
}

impl ContributionLedger {
    pub fn new(record: PresaleRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> PresaleRecord {
        self.record.lock().clone()
    }

    pub fn is_open(&self) -> bool {
        self.record.lock().is_open
    }

    /// Holds the presale lock for a multi-record transition (refunds,
    /// consistent snapshots). Lock order is presale before allocation.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PresaleRecord> {
        self.record.lock()
    }

    /// Validates a contribution of `amount_paid` made at `now` against
    /// `record` without mutating anything.
    ///
    /// The per-contributor limit depends on the allocation and is checked by
    /// [`crate::allocation::AllocationStore`] instead.
    pub fn plan_contribution(
        record: &PresaleRecord,
        amount_paid: u64,
        now: UnixTimestamp,
    ) -> Result<ContributionPlan, PresaleError> {
        if !record.is_open {
            return Err(PresaleError::PresaleClosed);
        }
        if !record.limits.is_active(now) {
            return Err(PresaleError::SaleNotActive);
        }
        if amount_paid == 0 {
            return Err(PresaleError::InvalidParameters);
        }
        if amount_paid < record.limits.min_contribution {
            return Err(PresaleError::ContributionBelowLimit);
        }
        let tokens = amount_paid
            .checked_div(record.price)
            .ok_or(PresaleError::InvalidParameters)?;
        if tokens == 0 {
            return Err(PresaleError::BelowMinimumContribution);
        }

        let total_tokens_sold = record
            .total_tokens_sold
            .checked_add(tokens)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        if total_tokens_sold > record.max_tokens {
            return Err(PresaleError::CapExceeded {
                kind: CapKind::Tokens,
            });
        }
        let total_raised = record
            .total_raised
            .checked_add(amount_paid)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        if total_raised > record.max_raise {
            return Err(PresaleError::CapExceeded {
                kind: CapKind::Raise,
            });
        }

        Ok(ContributionPlan {
            amount_paid,
            tokens,
            price: record.price,
            total_tokens_sold,
            total_raised,
        })
    }

    /// Records a contribution of `amount_paid`.
    ///
    /// `settle` runs with the presale lock held, after the caps have been
    /// checked and before the totals are written. It is where the caller
    /// updates the contributor's allocation and moves the currency; if it
    /// fails, the totals are left untouched.
    pub fn contribute<T, F>(
        &self,
        amount_paid: u64,
        now: UnixTimestamp,
        settle: F,
    ) -> Result<(ContributionPlan, T), PresaleError>
    where
        F: FnOnce(&PresaleRecord, &ContributionPlan) -> Result<T, PresaleError>,
    {
        let mut record = self.record.lock();
        let plan = Self::plan_contribution(&record, amount_paid, now).inspect_err(|err| {
            debug!("contribute: {amount_paid} rejected: {err}");
        })?;
        let settled = settle(&*record, &plan)?;
        record.total_tokens_sold = plan.total_tokens_sold;
        record.total_raised = plan.total_raised;
        Ok((plan, settled))
    }

    /// Removes a refunded allocation's tokens and currency from the totals.
    pub fn reverse(
        record: &mut PresaleRecord,
        tokens: u64,
        currency: u64,
    ) -> Result<(), PresaleError> {
        let total_tokens_sold = record
            .total_tokens_sold
            .checked_sub(tokens)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        let total_raised = record
            .total_raised
            .checked_sub(currency)
            .ok_or(PresaleError::ArithmeticOverflow)?;
        record.total_tokens_sold = total_tokens_sold;
        record.total_raised = total_raised;
        Ok(())
    }

    /// Checks that `caller` is the admin of this presale.
    pub fn authorize_admin(&self, caller: &Caller) -> Result<PresaleRecord, PresaleError> {
        let record = self.record.lock();
        AuthorizationGuard::require(caller, Role::Admin(&record))?;
        Ok(record.clone())
    }

    /// Sets a new price for future contributions. Returns the old price.
    pub fn update_price(&self, caller: &Caller, new_price: u64) -> Result<u64, PresaleError> {
        let mut record = self.record.lock();
        AuthorizationGuard::require(caller, Role::Admin(&record))?;
        if !record.is_open {
            return Err(PresaleError::PresaleClosed);
        }
        if new_price == 0 {
            return Err(PresaleError::InvalidParameters);
        }
        let old_price = record.price;
        record.price = new_price;
        Ok(old_price)
    }

    /// Stops contributions. Closing twice is an error.
    pub fn close(&self, caller: &Caller) -> Result<PresaleRecord, PresaleError> {
        let mut record = self.record.lock();
        AuthorizationGuard::require(caller, Role::Admin(&record))?;
        if !record.is_open {
            return Err(PresaleError::AlreadyClosed);
        }
        record.is_open = false;
        Ok(record.clone())
    }
}
