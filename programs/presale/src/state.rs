//! Account state types for the Presale program.

use {
    crate::{constants::BPS_DENOMINATOR, error::PresaleError},
    borsh::{BorshDeserialize, BorshSerialize},
    solana_clock::UnixTimestamp,
    solana_pubkey::Pubkey,
};

/// Discriminator byte written at the start of every presale record.
pub const PRESALE_RECORD_DISCRIMINATOR: u8 = 1;

/// Discriminator byte written at the start of every allocation record.
pub const ALLOCATION_RECORD_DISCRIMINATOR: u8 = 2;

/// Token release policy, fixed when the presale is initialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum VestingSchedule {
    /// Nothing before the cliff, the whole allocation at the cliff.
    #[default]
    Cliff,
    /// `upfront_bps` at the cliff, then `monthly_bps` after each full month
    /// until `months` months have elapsed.
    Monthly {
        upfront_bps: u16,
        monthly_bps: u16,
        months: u16,
    },
}

impl VestingSchedule {
    /// Largest Borsh encoding of any variant (tag + three `u16`).
    pub const MAX_SERIALIZED_SIZE: usize = 1 + 2 + 2 + 2;

    /// A monthly schedule must release exactly 100% of the allocation.
    pub fn validate(&self) -> Result<(), PresaleError> {
        match *self {
            VestingSchedule::Cliff => Ok(()),
            VestingSchedule::Monthly {
                upfront_bps,
                monthly_bps,
                months,
            } => {
                if months == 0 {
                    return Err(PresaleError::InvalidParameters);
                }
                let total = u64::from(monthly_bps)
                    .checked_mul(u64::from(months))
                    .and_then(|released| released.checked_add(u64::from(upfront_bps)))
                    .ok_or(PresaleError::ArithmeticOverflow)?;
                if total != BPS_DENOMINATOR {
                    return Err(PresaleError::InvalidParameters);
                }
                Ok(())
            }
        }
    }
}

/// Bounds on individual contributions and the window in which they are
/// accepted. A zero field places no bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ContributionLimits {
    /// Smallest `amount_paid` of a single contribution.
    pub min_contribution: u64,

    /// Largest cumulative `currency_paid` of one allocation.
    pub max_per_contributor: u64,

    /// First unix time at which contributions are accepted.
    pub sale_start: UnixTimestamp,

    /// Last unix time at which contributions are accepted.
    pub sale_end: UnixTimestamp,
}

impl ContributionLimits {
    pub const SERIALIZED_SIZE: usize = 8 + 8 + 8 + 8;

    pub fn validate(&self) -> Result<(), PresaleError> {
        if self.max_per_contributor != 0 && self.max_per_contributor < self.min_contribution {
            return Err(PresaleError::InvalidParameters);
        }
        if self.sale_end != 0 && self.sale_end < self.sale_start {
            return Err(PresaleError::InvalidParameters);
        }
        Ok(())
    }

    /// Whether `now` falls inside the sale window (both ends inclusive).
    pub fn is_active(&self, now: UnixTimestamp) -> bool {
        (self.sale_start == 0 || now >= self.sale_start)
            && (self.sale_end == 0 || now <= self.sale_end)
    }
}

/// One presale: its caps, running totals and vesting parameters.
///
/// Serialised with Borsh; the first byte of account data is the discriminator.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PresaleRecord {
    /// Mint of the token being sold.
    pub mint: Pubkey,

    /// Key that must sign every admin instruction.
    pub admin: Pubkey,

    /// Smallest currency units per smallest token unit.
    pub price: u64,

    /// Cap on `total_tokens_sold`.
    pub max_tokens: u64,

    /// Cap on `total_raised`.
    pub max_raise: u64,

    /// Running total of tokens allocated to contributors, net of refunds.
    pub total_tokens_sold: u64,

    /// Running total of currency collected, net of refunds.
    pub total_raised: u64,

    /// Unix timestamp at which vesting starts.
    pub cliff_timestamp: UnixTimestamp,

    /// `true` until the admin closes the sale.
    pub is_open: bool,

    /// Release policy applied from `cliff_timestamp` on.
    pub vesting: VestingSchedule,

    /// Per-contribution bounds and sale window.
    pub limits: ContributionLimits,

    /// Bump seed of the presale address.
    pub bump: u8,
}

impl PresaleRecord {
    /// Returns the serialised size of a `PresaleRecord` (discriminator + borsh payload).
    ///
    /// Layout:
    ///   discriminator     (1)
    ///   mint              (32)
    ///   admin             (32)
    ///   price             (8)
    ///   max_tokens        (8)
    ///   max_raise         (8)
    ///   total_tokens_sold (8)
    ///   total_raised      (8)
    ///   cliff_timestamp   (8)
    ///   is_open           (1)
    ///   vesting           (up to 7)
    ///   limits            (32)
    ///   bump              (1)
    ///   = 154 bytes
    pub const SERIALIZED_SIZE: usize = 1
        + 32
        + 32
        + 8
        + 8
        + 8
        + 8
        + 8
        + 8
        + 1
        + VestingSchedule::MAX_SERIALIZED_SIZE
        + ContributionLimits::SERIALIZED_SIZE
        + 1;

    /// Tokens that can still be sold before hitting `max_tokens`.
    pub fn remaining_tokens(&self) -> u64 {
        self.max_tokens.saturating_sub(self.total_tokens_sold)
    }

    /// Currency that can still be raised before hitting `max_raise`.
    pub fn remaining_raise(&self) -> u64 {
        self.max_raise.saturating_sub(self.total_raised)
    }

    /// Whether the record satisfies everything `initialize` and
    /// `contribute` guarantee: non-zero price and caps, totals within the
    /// caps, a valid schedule and valid limits.
    pub fn is_consistent(&self) -> bool {
        self.price != 0
            && self.max_tokens != 0
            && self.max_raise != 0
            && self.total_tokens_sold <= self.max_tokens
            && self.total_raised <= self.max_raise
            && self.vesting.validate().is_ok()
            && self.limits.validate().is_ok()
    }

    /// Deserialise from raw account data (expects leading discriminator byte).
    pub fn deserialize(data: &[u8]) -> Result<Self, std::io::Error> {
        deserialize_with_discriminator(data, PRESALE_RECORD_DISCRIMINATOR, "presale record")
    }

    /// Serialise into raw account data (prepends discriminator byte).
    pub fn serialize_into(&self, data: &mut [u8]) -> Result<(), std::io::Error> {
        serialize_with_discriminator(
            self,
            data,
            PRESALE_RECORD_DISCRIMINATOR,
            Self::SERIALIZED_SIZE,
        )
    }
}

/// A single contributor's stake in one presale.
///
/// Never deleted: a refund sets `refunded` and leaves the amounts in place
/// for auditing.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AllocationRecord {
    /// Presale this allocation belongs to.
    pub presale: Pubkey,

    /// Contributor that owns the allocation.
    pub contributor: Pubkey,

    /// Cumulative currency paid in.
    pub currency_paid: u64,

    /// Cumulative tokens bought, each contribution priced at the time it was made.
    pub tokens_allocated: u64,

    /// Cumulative tokens already delivered. Never exceeds `tokens_allocated`.
    pub tokens_claimed: u64,

    /// Terminal flag set by a refund.
    pub refunded: bool,

    /// Bump seed of the allocation address.
    pub bump: u8,
}

impl AllocationRecord {
    /// discriminator (1) + presale (32) + contributor (32) + currency_paid (8)
    /// + tokens_allocated (8) + tokens_claimed (8) + refunded (1) + bump (1)
    /// = 91 bytes
    pub const SERIALIZED_SIZE: usize = 1 + 32 + 32 + 8 + 8 + 8 + 1 + 1;

    pub fn new(presale: Pubkey, contributor: Pubkey, bump: u8) -> Self {
        Self {
            presale,
            contributor,
            currency_paid: 0,
            tokens_allocated: 0,
            tokens_claimed: 0,
            refunded: false,
            bump,
        }
    }

    /// Tokens allocated but not yet claimed.
    pub fn unclaimed(&self) -> u64 {
        self.tokens_allocated.saturating_sub(self.tokens_claimed)
    }

    /// Claims never exceed the allocation, and a refunded allocation was
    /// never claimed from.
    pub fn is_consistent(&self) -> bool {
        self.tokens_claimed <= self.tokens_allocated && !(self.refunded && self.tokens_claimed > 0)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, std::io::Error> {
        deserialize_with_discriminator(data, ALLOCATION_RECORD_DISCRIMINATOR, "allocation record")
    }

    pub fn serialize_into(&self, data: &mut [u8]) -> Result<(), std::io::Error> {
        serialize_with_discriminator(
            self,
            data,
            ALLOCATION_RECORD_DISCRIMINATOR,
            Self::SERIALIZED_SIZE,
        )
    }
}

fn deserialize_with_discriminator<T: BorshDeserialize>(
    data: &[u8],
    discriminator: u8,
    what: &str,
) -> Result<T, std::io::Error> {
    match data.split_first() {
        Some((tag, mut cursor)) if *tag == discriminator => {
            BorshDeserialize::deserialize_reader(&mut cursor)
        }
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("missing or invalid {what} discriminator"),
        )),
    }
}

fn serialize_with_discriminator<T: BorshSerialize>(
    value: &T,
    data: &mut [u8],
    discriminator: u8,
    size: usize,
) -> Result<(), std::io::Error> {
    if data.len() < size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "account data buffer too small",
        ));
    }
    let (tag, mut cursor) = data
        .split_first_mut()
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    *tag = discriminator;
    BorshSerialize::serialize(value, &mut cursor)
}
