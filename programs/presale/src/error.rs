//! Custom errors for the Presale program.

use {
    num_derive::{FromPrimitive, ToPrimitive},
    num_traits::{FromPrimitive, ToPrimitive},
    solana_instruction::error::InstructionError,
    thiserror::Error,
};

/// Offset added to the [`CapKind`] discriminant to form the numeric code of
/// [`PresaleError::CapExceeded`].
const CAP_EXCEEDED_CODE_BASE: u32 = 100;

/// Which presale cap a contribution would have broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum CapKind {
    /// `total_tokens_sold` would exceed `max_tokens`.
    Tokens = 0,
    /// `total_raised` would exceed `max_raise`.
    Raise = 1,
}

impl std::fmt::Display for CapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapKind::Tokens => f.write_str("token"),
            CapKind::Raise => f.write_str("raise"),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresaleError {
    // ── Parameters / lifecycle ───────────────────────────────────────────
    #[error("Presale parameters are invalid")]
    InvalidParameters,

    #[error("Presale is already initialised")]
    AlreadyInitialized,

    #[error("Presale is not initialised")]
    NotInitialized,

    #[error("Caller does not hold the required signing authority")]
    Unauthorized,

    #[error("Presale is closed")]
    PresaleClosed,

    #[error("Presale is already closed")]
    AlreadyClosed,

    // ── Contributions ────────────────────────────────────────────────────
    #[error("Contribution would exceed the presale {kind} cap")]
    CapExceeded { kind: CapKind },

    #[error("Contribution is too small to buy a single token")]
    BelowMinimumContribution,

    #[error("Presale is not accepting contributions at this time")]
    SaleNotActive,

    #[error("Contribution is below the presale minimum")]
    ContributionBelowLimit,

    #[error("Contribution would exceed the per-contributor limit")]
    ContributorLimitExceeded,

    // ── Allocations ──────────────────────────────────────────────────────
    #[error("Allocation account not found")]
    AllocationNotFound,

    #[error("Allocation has been refunded")]
    AllocationRefunded,

    #[error("Vesting has not started yet")]
    VestingNotStarted,

    #[error("Requested amount exceeds the claimable balance")]
    InsufficientClaimable,

    #[error("Allocation has already been claimed from or refunded")]
    AlreadyClaimed,

    #[error("Too many allocation accounts in one airdrop")]
    AirdropBatchTooLarge,

    // ── Collaborators / wire format ──────────────────────────────────────
    #[error("Paired token or currency transfer failed")]
    TransferFailed,

    #[error("Instruction data is invalid")]
    InvalidInstructionData,

    #[error("Instruction is addressed to a different program")]
    IncorrectProgramId,

    #[error("Not enough account keys supplied")]
    NotEnoughAccountKeys,

    #[error("Account address does not match the derived address")]
    InvalidAccountAddress,

    #[error("Account must be writable")]
    AccountNotWritable,

    #[error("Account data is invalid or corrupted")]
    InvalidAccountData,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl PresaleError {
    /// Stable numeric code reported through `InstructionError::Custom`.
    pub fn code(self) -> u32 {
        match self {
            PresaleError::InvalidParameters => 0,
            PresaleError::AlreadyInitialized => 1,
            PresaleError::NotInitialized => 2,
            PresaleError::Unauthorized => 3,
            PresaleError::PresaleClosed => 4,
            PresaleError::AlreadyClosed => 5,
            PresaleError::BelowMinimumContribution => 6,
            PresaleError::AllocationNotFound => 7,
            PresaleError::AllocationRefunded => 8,
            PresaleError::VestingNotStarted => 9,
            PresaleError::InsufficientClaimable => 10,
            PresaleError::AlreadyClaimed => 11,
            PresaleError::AirdropBatchTooLarge => 12,
            PresaleError::TransferFailed => 13,
            PresaleError::InvalidInstructionData => 14,
            PresaleError::IncorrectProgramId => 15,
            PresaleError::NotEnoughAccountKeys => 16,
            PresaleError::InvalidAccountAddress => 17,
            PresaleError::AccountNotWritable => 18,
            PresaleError::InvalidAccountData => 19,
            PresaleError::ArithmeticOverflow => 20,
            PresaleError::SaleNotActive => 21,
            PresaleError::ContributionBelowLimit => 22,
            PresaleError::ContributorLimitExceeded => 23,
            PresaleError::CapExceeded { kind } => {
                // CapKind only has small non-negative discriminants.
                CAP_EXCEEDED_CODE_BASE.saturating_add(kind.to_u32().unwrap_or_default())
            }
        }
    }

    /// Inverse of [`PresaleError::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        let error = match code {
            0 => PresaleError::InvalidParameters,
            1 => PresaleError::AlreadyInitialized,
            2 => PresaleError::NotInitialized,
            3 => PresaleError::Unauthorized,
            4 => PresaleError::PresaleClosed,
            5 => PresaleError::AlreadyClosed,
            6 => PresaleError::BelowMinimumContribution,
            7 => PresaleError::AllocationNotFound,
            8 => PresaleError::AllocationRefunded,
            9 => PresaleError::VestingNotStarted,
            10 => PresaleError::InsufficientClaimable,
            11 => PresaleError::AlreadyClaimed,
            12 => PresaleError::AirdropBatchTooLarge,
            13 => PresaleError::TransferFailed,
            14 => PresaleError::InvalidInstructionData,
            15 => PresaleError::IncorrectProgramId,
            16 => PresaleError::NotEnoughAccountKeys,
            17 => PresaleError::InvalidAccountAddress,
            18 => PresaleError::AccountNotWritable,
            19 => PresaleError::InvalidAccountData,
            20 => PresaleError::ArithmeticOverflow,
            21 => PresaleError::SaleNotActive,
            22 => PresaleError::ContributionBelowLimit,
            23 => PresaleError::ContributorLimitExceeded,
            code => {
                let kind = CapKind::from_u32(code.checked_sub(CAP_EXCEEDED_CODE_BASE)?)?;
                PresaleError::CapExceeded { kind }
            }
        };
        Some(error)
    }
}

impl From<PresaleError> for InstructionError {
    fn from(error: PresaleError) -> Self {
        InstructionError::Custom(error.code())
    }
}
