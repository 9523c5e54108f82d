//! Vesting calculation for presale allocations.
//!
//! Claimable balances are a pure function of the allocation, the current time
//! and the presale's cliff and schedule. Nothing here touches ledger state.
//!
//! ## Schedules
//!
//! | Schedule | Before cliff | At cliff        | After cliff                         |
//! |----------|:------------:|:---------------:|-------------------------------------|
//! | Cliff    | 0            | 100%            | 100%                                |
//! | Monthly  | 0            | `upfront_bps`   | `+ monthly_bps` per full month, 100% after `months` |

use {
    crate::{
        constants::{BPS_DENOMINATOR, SECONDS_PER_MONTH},
        state::{AllocationRecord, VestingSchedule},
    },
    solana_clock::UnixTimestamp,
};

/// Computes how much of an allocation has vested at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VestingCalculator {
    seconds_per_month: i64,
}

impl Default for VestingCalculator {
    fn default() -> Self {
        Self::new(SECONDS_PER_MONTH)
    }
}

impl VestingCalculator {
    /// `seconds_per_month` values below one second are clamped to one.
    pub fn new(seconds_per_month: i64) -> Self {
        Self {
            seconds_per_month: seconds_per_month.max(1),
        }
    }

    /// Returns `true` once `now` has reached `cliff_timestamp`.
    pub fn cliff_reached(now: UnixTimestamp, cliff_timestamp: UnixTimestamp) -> bool {
        now >= cliff_timestamp
    }

    /// Tokens of `total` released by `schedule` at `now`, ignoring what has
    /// already been claimed.
    pub fn vested_amount(
        &self,
        total: u64,
        now: UnixTimestamp,
        cliff_timestamp: UnixTimestamp,
        schedule: VestingSchedule,
    ) -> u64 {
        if !Self::cliff_reached(now, cliff_timestamp) {
            return 0;
        }
        match schedule {
            VestingSchedule::Cliff => total,
            VestingSchedule::Monthly {
                upfront_bps,
                monthly_bps,
                months,
            } => {
                let elapsed = now.saturating_sub(cliff_timestamp);
                let months_elapsed =
                    u64::try_from(elapsed.checked_div(self.seconds_per_month).unwrap_or(0))
                        .unwrap_or(0);
                if months_elapsed >= u64::from(months) {
                    return total;
                }
                let released_bps = u64::from(monthly_bps)
                    .saturating_mul(months_elapsed)
                    .saturating_add(u64::from(upfront_bps))
                    .min(BPS_DENOMINATOR);
                let vested = u128::from(total)
                    .saturating_mul(u128::from(released_bps))
                    .checked_div(u128::from(BPS_DENOMINATOR))
                    .unwrap_or(0);
                // released_bps <= BPS_DENOMINATOR, so vested <= total.
                u64::try_from(vested).unwrap_or(total)
            }
        }
    }

    /// Tokens the contributor may claim right now.
    ///
    /// Zero before the cliff and for refunded allocations. Never exceeds
    /// `tokens_allocated - tokens_claimed`.
    pub fn claimable_at(
        &self,
        allocation: &AllocationRecord,
        now: UnixTimestamp,
        cliff_timestamp: UnixTimestamp,
        schedule: VestingSchedule,
    ) -> u64 {
        if allocation.refunded {
            return 0;
        }
        self.vested_amount(allocation.tokens_allocated, now, cliff_timestamp, schedule)
            .saturating_sub(allocation.tokens_claimed)
            .min(allocation.unclaimed())
    }
}
